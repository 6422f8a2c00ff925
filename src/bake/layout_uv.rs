//! Lightmap UV chart discovery and atlas packing.
//!
//! The mesh is viewed as a flat list of triangle corners ("wedges"). Charts
//! are groups of triangles joined across edges whose corners agree on
//! position, normal and source UV. Each chart is rescaled to a uniform world
//! texel density, rasterized into a [`Footprint`] and placed into an
//! [`Allocator2D`] atlas, trying several orientations. The uniform scale is
//! searched so the layout fills as much of the target resolution as it can.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::allocator2d::{Allocator2D, Footprint};
use super::components::{component_labels, connected_components};
use super::core::{MAX_UV_CHANNELS, Tolerance, Vec2, Vec3};
use super::ids::VertexInstanceId;
use super::mesh_graph::{MeshGraph, MeshGraphError};
use super::overlap::OverlappingCorners;
use crate::debug_log;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("source UV channel {channel} does not exist ({count} channels)")]
    SourceChannelOutOfRange { channel: usize, count: usize },
    #[error("destination UV channel {channel} exceeds the channel limit")]
    DestinationChannelOutOfRange { channel: usize },
    #[error("no packed layout to commit")]
    NotPacked,
    #[error(transparent)]
    MeshGraph(#[from] MeshGraphError),
}

/// Packing behavior revisions. Later versions never change the output of
/// content authored against an earlier one.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum LightmapUvVersion {
    BitByBit,
    Segments,
    SmallChartPacking,
    ScaleChartsOrderingFix,
    ChartJoiningLfix,
    Allocator2DFlipFix,
    ConsiderLightmapPadding,
    ForceLightmapPadding,
    #[default]
    Latest,
}

impl LightmapUvVersion {
    /// UV equality threshold used when joining triangles into charts.
    #[must_use]
    pub fn uv_epsilon(self) -> f32 {
        if self >= Self::Segments { Tolerance::KINDA_SMALL_NUMBER } else { Tolerance::THRESH_UVS_ARE_SAME }
    }

    #[must_use]
    pub fn normal_epsilon(self) -> f32 {
        if self >= Self::Segments { Tolerance::KINDA_SMALL_NUMBER } else { Tolerance::THRESH_NORMALS_ARE_SAME }
    }

    /// Quarter turns tried for each chart.
    #[must_use]
    pub fn orientations(self) -> &'static [u8] {
        if self == Self::BitByBit {
            &[0]
        } else if self < Self::Allocator2DFlipFix {
            &[0, 2]
        } else {
            &[0, 1, 2, 3]
        }
    }

    /// Gutter texels around every chart.
    #[must_use]
    pub fn padding(self, resolution: u32) -> u32 {
        if self >= Self::ForceLightmapPadding {
            1
        } else if self >= Self::ConsiderLightmapPadding && resolution >= 64 {
            1
        } else {
            0
        }
    }

    #[must_use]
    pub fn min_chart_texels(self) -> u32 {
        if self >= Self::SmallChartPacking { 1 } else { 2 }
    }

    #[must_use]
    pub fn stable_chart_order(self) -> bool {
        self >= Self::ScaleChartsOrderingFix
    }

    #[must_use]
    pub fn joins_charts(self) -> bool {
        self >= Self::ChartJoiningLfix
    }
}

/// Chart sides in `joins` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartSide {
    Left = 0,
    Right = 1,
    Bottom = 2,
    Top = 3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    /// Triangle indices into the wedge view.
    pub triangles: Vec<u32>,
    pub min_uv: Vec2,
    pub max_uv: Vec2,
    pub uv_area: f32,
    pub world_area: f32,
    /// World units per source UV unit.
    pub world_scale: f32,
    /// Adjacent chart per [`ChartSide`], across a UV seam.
    pub joins: [Option<usize>; 4],
}

/// Final location of one chart in the atlas.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPlacement {
    pub chart: usize,
    pub orientation: u8,
    pub x: u32,
    pub y: u32,
    /// Rotated, padded footprint as added to the atlas.
    pub footprint: Footprint,
}

#[derive(Debug, Clone, PartialEq)]
struct PackedLayout {
    scale: f32,
    placements: Vec<ChartPlacement>,
    uvs: Vec<Vec2>,
}

/// Result of [`create_lightmap_uv_layout`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutOutcome {
    pub chart_count: usize,
    pub packed: bool,
    pub resolution: u32,
    pub disconnected_joins: usize,
}

#[derive(Debug, Clone)]
pub struct LayoutUv {
    src_channel: usize,
    dst_channel: usize,
    min_resolution: u32,
    max_resolution: u32,
    resolution: u32,
    version: LightmapUvVersion,
    wedges: Vec<VertexInstanceId>,
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    tex_coords: Vec<Vec2>,
    charts: Vec<Chart>,
    packed: Option<PackedLayout>,
    disconnected_joins: usize,
}

const SCALE_SHRINK: f32 = 0.8;
const SCALE_GROW: f32 = 1.25;
const MAX_SHRINK_STEPS: usize = 32;
const MAX_GROW_STEPS: usize = 8;
const REFINE_STEPS: usize = 6;
/// Fraction of the atlas the initial scale aims to cover.
const TARGET_FILL: f32 = 0.5;

impl LayoutUv {
    /// Flattens the triangulated mesh into a wedge view reading
    /// `src_channel` and targeting `dst_channel`.
    pub fn new(mesh: &MeshGraph, src_channel: usize, dst_channel: usize, resolution: u32) -> Result<Self, LayoutError> {
        if src_channel >= mesh.num_uv_channels() {
            return Err(LayoutError::SourceChannelOutOfRange { channel: src_channel, count: mesh.num_uv_channels() });
        }
        if dst_channel >= MAX_UV_CHANNELS {
            return Err(LayoutError::DestinationChannelOutOfRange { channel: dst_channel });
        }

        let mut wedges = Vec::with_capacity(mesh.num_triangles() * 3);
        for (_, polygon) in mesh.polygons() {
            for triangle in polygon.triangles() {
                wedges.extend_from_slice(&triangle.corners);
            }
        }
        let positions = wedges.iter().map(|&vi| mesh.instance_position(vi)).collect();
        let normals = wedges
            .iter()
            .map(|&vi| mesh.vertex_instance(vi).map_or(Vec3::ZERO, |i| i.normal))
            .collect();
        let tex_coords = wedges
            .iter()
            .map(|&vi| mesh.vertex_instance(vi).map_or(Vec2::ZERO, |i| i.uv(src_channel)))
            .collect();

        Ok(Self {
            src_channel,
            dst_channel,
            min_resolution: resolution.max(1),
            max_resolution: resolution.max(1),
            resolution: resolution.max(1),
            version: LightmapUvVersion::default(),
            wedges,
            positions,
            normals,
            tex_coords,
            charts: Vec::new(),
            packed: None,
            disconnected_joins: 0,
        })
    }

    #[must_use]
    pub fn with_version(mut self, version: LightmapUvVersion) -> Self {
        self.version = version;
        self
    }

    /// Allows [`find_best_packing`](Self::find_best_packing) to double the
    /// resolution up to `max_resolution` when charts do not fit.
    #[must_use]
    pub fn with_max_resolution(mut self, max_resolution: u32) -> Self {
        self.max_resolution = max_resolution.max(self.min_resolution);
        self
    }

    #[must_use]
    pub fn num_wedges(&self) -> usize {
        self.wedges.len()
    }

    #[must_use]
    pub fn charts(&self) -> &[Chart] {
        &self.charts
    }

    #[must_use]
    pub fn placements(&self) -> &[ChartPlacement] {
        self.packed.as_ref().map_or(&[], |p| p.placements.as_slice())
    }

    /// Resolution of the accepted layout, or the minimum before packing.
    #[must_use]
    pub const fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Packed UV per wedge, empty before a successful packing.
    #[must_use]
    pub fn packed_uvs(&self) -> &[Vec2] {
        self.packed.as_ref().map_or(&[], |p| p.uvs.as_slice())
    }

    #[must_use]
    pub const fn disconnected_joins(&self) -> usize {
        self.disconnected_joins
    }

    #[must_use]
    pub const fn channels(&self) -> (usize, usize) {
        (self.src_channel, self.dst_channel)
    }

    /// Overlap relation over this view's wedge positions.
    #[must_use]
    pub fn wedge_overlaps(&self, threshold: f32) -> OverlappingCorners {
        OverlappingCorners::build(&self.positions, threshold)
    }

    fn corners_match(&self, a: usize, b: usize) -> bool {
        self.normals[a].equals(self.normals[b], self.version.normal_epsilon())
            && self.tex_coords[a].equals(self.tex_coords[b], self.version.uv_epsilon())
    }

    // ── charts ──────────────────────────────────────────────────────────────

    /// Groups triangles into charts. `overlaps` must be keyed by wedge index
    /// (see [`wedge_overlaps`](Self::wedge_overlaps)). Returns the chart count.
    pub fn find_charts(&mut self, overlaps: &OverlappingCorners) -> usize {
        let num_tris = self.wedges.len() / 3;

        // Triangles sharing an instance edge are one chart whatever the
        // overlap test says; a shared corner alone does not join them.
        let instance_edge = |a: usize, b: usize| {
            let (x, y) = (self.wedges[a], self.wedges[b]);
            if x < y { (x, y) } else { (y, x) }
        };
        let mut by_instance_edge: HashMap<(VertexInstanceId, VertexInstanceId), Vec<usize>> = HashMap::new();
        for t in 0..num_tris {
            for c in 0..3 {
                by_instance_edge.entry(instance_edge(3 * t + c, 3 * t + (c + 1) % 3)).or_default().push(t);
            }
        }

        let mut seams: Vec<(usize, usize, usize, usize)> = Vec::new();
        let components = connected_components(num_tris, |t, out| {
            for c in 0..3 {
                let a = 3 * t + c;
                let b = 3 * t + (c + 1) % 3;
                for &ja in overlaps.find_if_overlapping(a as u32) {
                    let ja = ja as usize;
                    let u = ja / 3;
                    if u == t {
                        continue;
                    }
                    for jb in (3 * u..3 * u + 3).filter(|&j| j != ja) {
                        if overlaps.find_if_overlapping(b as u32).binary_search(&(jb as u32)).is_err() {
                            continue;
                        }
                        if self.corners_match(a, ja) && self.corners_match(b, jb) {
                            out.push(u);
                        } else {
                            seams.push((t, u, a, b));
                        }
                    }
                }
                for &u in by_instance_edge.get(&instance_edge(a, b)).into_iter().flatten() {
                    if u != t {
                        out.push(u);
                    }
                }
            }
        });

        self.charts = components.iter().map(|members| self.build_chart(members)).collect();

        if self.version.joins_charts() {
            let labels = component_labels(num_tris, &components);
            self.link_joins(&labels, &seams);
        }

        self.packed = None;
        log::debug!("layout UV: {num_tris} triangles in {} charts", self.charts.len());
        self.charts.len()
    }

    fn build_chart(&self, members: &[usize]) -> Chart {
        let mut min_uv = Vec2::new(f32::MAX, f32::MAX);
        let mut max_uv = Vec2::new(f32::MIN, f32::MIN);
        let mut uv_area = 0.0;
        let mut world_area = 0.0;
        for &t in members {
            let uv = [self.tex_coords[3 * t], self.tex_coords[3 * t + 1], self.tex_coords[3 * t + 2]];
            let p = [self.positions[3 * t], self.positions[3 * t + 1], self.positions[3 * t + 2]];
            for corner in uv {
                min_uv = min_uv.min(corner);
                max_uv = max_uv.max(corner);
            }
            uv_area += (uv[1] - uv[0]).cross(uv[2] - uv[0]).abs() * 0.5;
            world_area += (p[1] - p[0]).cross(p[2] - p[0]).length() * 0.5;
        }
        let world_scale = if uv_area > Tolerance::SMALL_NUMBER && world_area > Tolerance::SMALL_NUMBER {
            (world_area / uv_area).sqrt()
        } else {
            1.0
        };
        Chart {
            triangles: members.iter().map(|&t| t as u32).collect(),
            min_uv,
            max_uv,
            uv_area,
            world_area,
            world_scale,
            joins: [None; 4],
        }
    }

    fn link_joins(&mut self, labels: &[u32], seams: &[(usize, usize, usize, usize)]) {
        let eps = self.version.uv_epsilon();
        for &(t, u, a, b) in seams {
            let (ct, cu) = (labels[t] as usize, labels[u] as usize);
            if ct == cu {
                continue;
            }
            let (ua, ub) = (self.tex_coords[a], self.tex_coords[b]);
            let chart = &self.charts[ct];
            let side = if (ua.x - chart.min_uv.x).abs() <= eps && (ub.x - chart.min_uv.x).abs() <= eps {
                ChartSide::Left
            } else if (ua.x - chart.max_uv.x).abs() <= eps && (ub.x - chart.max_uv.x).abs() <= eps {
                ChartSide::Right
            } else if (ua.y - chart.min_uv.y).abs() <= eps && (ub.y - chart.min_uv.y).abs() <= eps {
                ChartSide::Bottom
            } else if (ua.y - chart.max_uv.y).abs() <= eps && (ub.y - chart.max_uv.y).abs() <= eps {
                ChartSide::Top
            } else {
                continue;
            };
            let slot = &mut self.charts[ct].joins[side as usize];
            if slot.is_none() {
                *slot = Some(cu);
            }
        }
    }

    // ── packing ─────────────────────────────────────────────────────────────

    /// Tries candidate resolutions from the minimum upwards, doubling each
    /// time, and keeps the first at which every chart fits. Returns `false`,
    /// leaving no layout, when none does.
    pub fn find_best_packing(&mut self) -> bool {
        self.packed = None;
        if self.charts.is_empty() {
            return false;
        }

        let mut resolution = self.min_resolution;
        loop {
            if let Some(layout) = self.pack_at_resolution(resolution) {
                self.resolution = resolution;
                self.disconnected_joins = self.count_disconnected_joins(&layout);
                log::debug!(
                    "layout UV: packed {} charts at resolution {resolution}, scale {} ({} joins disconnected)",
                    self.charts.len(),
                    layout.scale,
                    self.disconnected_joins
                );
                self.packed = Some(layout);
                return true;
            }
            if resolution >= self.max_resolution {
                break;
            }
            resolution = (resolution * 2).min(self.max_resolution);
        }
        log::warn!(
            "layout UV: {} charts do not fit at resolution {}",
            self.charts.len(),
            self.max_resolution
        );
        false
    }

    /// Searches the largest uniform scale at which every chart fits.
    fn pack_at_resolution(&self, resolution: u32) -> Option<PackedLayout> {
        let total_world_area: f32 = self.charts.iter().map(|c| c.world_area).sum();
        let raster_area = (resolution as f32).powi(2);
        let mut scale = if total_world_area > Tolerance::SMALL_NUMBER {
            (raster_area * TARGET_FILL / total_world_area).sqrt()
        } else {
            1.0
        };

        let mut best: Option<PackedLayout> = None;
        for _ in 0..MAX_SHRINK_STEPS {
            debug_log!("layout UV: trying scale {scale} at resolution {resolution}");
            if let Some(layout) = self.try_pack(resolution, scale) {
                best = Some(layout);
                break;
            }
            scale *= SCALE_SHRINK;
        }
        let mut layout = best?;

        // Grow until a failure brackets the answer, then bisect.
        let mut lo = layout.scale;
        let mut hi = None;
        for _ in 0..MAX_GROW_STEPS {
            let candidate = lo * SCALE_GROW;
            match self.try_pack(resolution, candidate) {
                Some(bigger) => {
                    lo = candidate;
                    layout = bigger;
                }
                None => {
                    hi = Some(candidate);
                    break;
                }
            }
        }
        if let Some(mut hi) = hi {
            for _ in 0..REFINE_STEPS {
                let mid = 0.5 * (lo + hi);
                match self.try_pack(resolution, mid) {
                    Some(bigger) => {
                        lo = mid;
                        layout = bigger;
                    }
                    None => hi = mid,
                }
            }
        }
        Some(layout)
    }

    fn chart_order(&self, sizes: &[(u32, u32)]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.charts.len()).collect();
        let key = |&i: &usize| {
            let (w, h) = sizes[i];
            (u64::from(w) * u64::from(h), h.max(w))
        };
        if self.version.stable_chart_order() {
            order.sort_by(|a, b| key(b).cmp(&key(a)).then(a.cmp(b)));
        } else {
            order.sort_unstable_by(|a, b| key(b).cmp(&key(a)));
        }
        order
    }

    fn try_pack(&self, resolution: u32, scale: f32) -> Option<PackedLayout> {
        let padding = self.version.padding(resolution);
        let rasters: Vec<(Footprint, f32)> =
            self.charts.iter().map(|chart| self.rasterize_chart(chart, scale)).collect();
        let sizes: Vec<(u32, u32)> = rasters.iter().map(|(f, _)| (f.width(), f.height())).collect();

        let mut atlas = Allocator2D::new(resolution, resolution);
        let mut orientation_of: Vec<Option<u8>> = vec![None; self.charts.len()];
        let mut placements = Vec::with_capacity(self.charts.len());

        for chart_index in self.chart_order(&sizes) {
            let (raster, _) = &rasters[chart_index];
            let preferred = self.charts[chart_index]
                .joins
                .iter()
                .flatten()
                .find_map(|&partner| orientation_of[partner]);

            let mut best: Option<(u32, u32, u8, Footprint)> = None;
            let candidates = preferred.into_iter().chain(self.version.orientations().iter().copied());
            for orientation in candidates {
                let footprint = raster.rotated(orientation).dilated(padding);
                let Some((x, y)) = atlas.find_position(&footprint) else { continue };
                let better = best.as_ref().is_none_or(|&(bx, by, _, _)| (y, x) < (by, bx));
                if better {
                    best = Some((x, y, orientation, footprint));
                }
            }
            let (x, y, orientation, footprint) = best?;
            atlas.add(&footprint, x, y);
            orientation_of[chart_index] = Some(orientation);
            debug_log!("chart {chart_index} at ({x}, {y}) turn {orientation}");
            placements.push(ChartPlacement { chart: chart_index, orientation, x, y, footprint });
        }

        let mut uvs = vec![Vec2::ZERO; self.wedges.len()];
        let inv_res = 1.0 / resolution as f32;
        for placement in &placements {
            let chart = &self.charts[placement.chart];
            let (raster, texels_per_uv) = &rasters[placement.chart];
            let (w, h) = (raster.width() as f32, raster.height() as f32);
            for &t in &chart.triangles {
                for w_index in 3 * t as usize..3 * t as usize + 3 {
                    let local = (self.tex_coords[w_index] - chart.min_uv) * *texels_per_uv;
                    let rotated = match placement.orientation % 4 {
                        0 => local,
                        1 => Vec2::new(h - local.y, local.x),
                        2 => Vec2::new(w - local.x, h - local.y),
                        _ => Vec2::new(local.y, w - local.x),
                    };
                    let atlas_pos = Vec2::new(
                        (placement.x + padding) as f32 + rotated.x,
                        (placement.y + padding) as f32 + rotated.y,
                    );
                    uvs[w_index] = Vec2::new(
                        (atlas_pos.x * inv_res).clamp(0.0, 1.0),
                        (atlas_pos.y * inv_res).clamp(0.0, 1.0),
                    );
                }
            }
        }
        Some(PackedLayout { scale, placements, uvs })
    }

    /// Footprint of a chart at `scale` texels per world unit, plus the
    /// texels-per-UV factor used to map its UVs into the footprint.
    fn rasterize_chart(&self, chart: &Chart, scale: f32) -> (Footprint, f32) {
        let texels_per_uv = scale * chart.world_scale;
        let extent = (chart.max_uv - chart.min_uv) * texels_per_uv;
        let min_texels = self.version.min_chart_texels();
        let width = (extent.x.ceil().max(0.0) as u32).max(min_texels);
        let height = (extent.y.ceil().max(0.0) as u32).max(min_texels);
        let mut footprint = Footprint::new(width, height);

        for &t in &chart.triangles {
            let t = t as usize;
            let q = [0, 1, 2].map(|c| (self.tex_coords[3 * t + c] - chart.min_uv) * texels_per_uv);
            for corner in q {
                footprint.set(texel(corner.x, width), texel(corner.y, height));
            }
            let lo = q[0].min(q[1]).min(q[2]);
            let hi = q[0].max(q[1]).max(q[2]);
            for y in texel(lo.y, height)..=texel(hi.y, height) {
                for x in texel(lo.x, width)..=texel(hi.x, width) {
                    if triangle_overlaps_cell(q, x as f32, y as f32) {
                        footprint.set(x, y);
                    }
                }
            }
        }
        (footprint, texels_per_uv)
    }

    fn count_disconnected_joins(&self, layout: &PackedLayout) -> usize {
        let mut orientation = vec![0u8; self.charts.len()];
        for placement in &layout.placements {
            orientation[placement.chart] = placement.orientation;
        }
        self.charts
            .iter()
            .enumerate()
            .flat_map(|(i, chart)| chart.joins.iter().flatten().map(move |&j| (i, j)))
            .filter(|&(i, j)| orientation[i] != orientation[j])
            .count()
    }

    /// Writes packed UVs into the destination channel, adding channels as
    /// needed. Fails without touching the mesh when nothing was packed.
    pub fn commit_packed_uvs(&self, mesh: &mut MeshGraph) -> Result<usize, LayoutError> {
        let packed = self.packed.as_ref().ok_or(LayoutError::NotPacked)?;
        mesh.ensure_uv_channel(self.dst_channel)?;
        let mut written = 0;
        for (&vi, &uv) in self.wedges.iter().zip(&packed.uvs) {
            if let Some(instance) = mesh.vertex_instance_mut(vi) {
                instance.uvs[self.dst_channel] = uv;
                written += 1;
            }
        }
        Ok(written)
    }
}

fn texel(v: f32, size: u32) -> u32 {
    (v.floor().max(0.0) as u32).min(size.saturating_sub(1))
}

/// Separating-axis test of a 2D triangle against the unit cell at `(x, y)`.
fn triangle_overlaps_cell(q: [Vec2; 3], x: f32, y: f32) -> bool {
    let area2 = (q[1] - q[0]).cross(q[2] - q[0]);
    if area2.abs() <= f32::EPSILON {
        return false;
    }
    let orientation = area2.signum();
    let corners = [Vec2::new(x, y), Vec2::new(x + 1.0, y), Vec2::new(x, y + 1.0), Vec2::new(x + 1.0, y + 1.0)];
    for i in 0..3 {
        let a = q[i];
        let edge = q[(i + 1) % 3] - a;
        if corners.iter().all(|&c| edge.cross(c - a) * orientation < 0.0) {
            return false;
        }
    }
    true
}

/// Packs `src` into `dst` on `mesh` using overlaps computed over the wedge view.
pub fn create_lightmap_uv_layout(
    mesh: &mut MeshGraph,
    src_channel: usize,
    dst_channel: usize,
    min_resolution: u32,
    max_resolution: u32,
    version: LightmapUvVersion,
) -> Result<LayoutOutcome, LayoutError> {
    mesh.ensure_triangulated();
    let mut packer = LayoutUv::new(mesh, src_channel, dst_channel, min_resolution)?
        .with_version(version)
        .with_max_resolution(max_resolution);
    let overlaps = packer.wedge_overlaps(Tolerance::THRESH_POINTS_ARE_SAME);
    let chart_count = packer.find_charts(&overlaps);
    let packed = packer.find_best_packing();
    if packed {
        packer.commit_packed_uvs(mesh)?;
    }
    Ok(LayoutOutcome {
        chart_count,
        packed,
        resolution: packer.resolution(),
        disconnected_joins: packer.disconnected_joins(),
    })
}

/// Generates a non-overlapping UV set from UV0 on a copy of `mesh` and
/// returns the new coordinates per vertex instance in id order, or `None`
/// when packing fails.
#[must_use]
pub fn generate_unique_uvs(mesh: &MeshGraph, texture_resolution: u32) -> Option<Vec<Vec2>> {
    let mut copy = mesh.clone();
    copy.ensure_triangulated();
    let resolution = (texture_resolution / 4).clamp(32, 512);
    let mut packer = LayoutUv::new(&copy, 0, 1, resolution).ok()?;
    let overlaps = packer.wedge_overlaps(Tolerance::THRESH_POINTS_ARE_SAME);
    packer.find_charts(&overlaps);
    if !packer.find_best_packing() {
        return None;
    }
    packer.commit_packed_uvs(&mut copy).ok()?;
    Some(copy.vertex_instances().map(|(_, vi)| vi.uv(1)).collect())
}
