//! Bridge between [`MeshGraph`] and a pluggable mesh reducer.
//!
//! The reducer sees a flat, de-duplicated vertex array where each vertex
//! carries every attribute plus its material index, an index list, and the
//! position overlap relation over those vertices. Its output is turned back
//! into a fresh [`MeshGraph`] with one triangle per polygon.

use serde::{Deserialize, Serialize};

use super::core::{LinearColor, MAX_UV_CHANNELS, Tolerance, Vec2, Vec3};
use super::diagnostics::BakeWarning;
use super::ids::{PolygonGroupId, VertexId, VertexInstanceId};
use super::mesh_graph::{MeshGraph, MeshGraphError};
use super::overlap::OverlappingCorners;
use super::weld::{dedup_positions, weld_positions};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReductionError {
    #[error("source mesh has no triangles")]
    EmptySource,
    #[error("reducer returned an invalid buffer: {reason}")]
    InvalidOutput { reason: String },
    #[error("LOD{lod} uses LOD{base} as its base, which is not an earlier LOD")]
    InvalidBaseLod { lod: usize, base: usize },
    #[error("reducer failed: {0}")]
    Backend(String),
    #[error(transparent)]
    MeshGraph(#[from] MeshGraphError),
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationCriterion {
    #[default]
    Triangles,
    Vertices,
    /// Stop as soon as either target is met.
    Any,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceLevel {
    Off,
    Lowest,
    Low,
    #[default]
    Normal,
    High,
    Highest,
}

impl ImportanceLevel {
    /// Scale applied to the matching attribute weights.
    #[must_use]
    pub const fn multiplier(self) -> f32 {
        match self {
            Self::Off => 0.0,
            Self::Lowest => 0.125,
            Self::Low => 0.35,
            Self::Normal => 1.0,
            Self::High => 2.8,
            Self::Highest => 8.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionSettings {
    pub termination_criterion: TerminationCriterion,
    /// Fraction of source triangles to keep, `0.0..=1.0`.
    pub percent_triangles: f32,
    /// Fraction of source vertices to keep, `0.0..=1.0`.
    pub percent_vertices: f32,
    /// Stop once the error of the next collapse would exceed this. `0` disables.
    pub max_deviation: f32,
    /// Positions closer than this are welded before reduction. `0` disables.
    pub welding_threshold: f32,
    /// Reduce from this earlier LOD's source instead of this LOD's own.
    pub base_lod_model: Option<usize>,
    /// Degrees. Edges whose faces meet at a sharper angle become hard when
    /// normals are recalculated.
    pub hard_angle_threshold: f32,
    pub recalculate_normals: bool,
    pub silhouette_importance: ImportanceLevel,
    pub texture_importance: ImportanceLevel,
    pub shading_importance: ImportanceLevel,
}

impl Default for ReductionSettings {
    fn default() -> Self {
        Self {
            termination_criterion: TerminationCriterion::Triangles,
            percent_triangles: 1.0,
            percent_vertices: 1.0,
            max_deviation: 0.0,
            welding_threshold: 0.0,
            base_lod_model: None,
            hard_angle_threshold: 80.0,
            recalculate_normals: false,
            silhouette_importance: ImportanceLevel::Normal,
            texture_importance: ImportanceLevel::Normal,
            shading_importance: ImportanceLevel::Normal,
        }
    }
}

/// Result triangle counts never drop below this.
pub const MIN_RESULT_TRIANGLES: usize = 2;

impl ReductionSettings {
    #[must_use]
    pub const fn with_percent_triangles(mut self, value: f32) -> Self {
        self.percent_triangles = value;
        self
    }

    #[must_use]
    pub const fn with_percent_vertices(mut self, value: f32) -> Self {
        self.percent_vertices = value;
        self
    }

    #[must_use]
    pub const fn with_termination_criterion(mut self, value: TerminationCriterion) -> Self {
        self.termination_criterion = value;
        self
    }

    #[must_use]
    pub const fn with_max_deviation(mut self, value: f32) -> Self {
        self.max_deviation = value;
        self
    }

    #[must_use]
    pub const fn with_welding_threshold(mut self, value: f32) -> Self {
        self.welding_threshold = value;
        self
    }

    #[must_use]
    pub const fn with_base_lod_model(mut self, value: Option<usize>) -> Self {
        self.base_lod_model = value;
        self
    }

    #[must_use]
    pub const fn with_recalculate_normals(mut self, value: bool) -> Self {
        self.recalculate_normals = value;
        self
    }

    /// `true` when these settings ask for any simplification at all.
    #[must_use]
    pub fn is_reduction_active(&self) -> bool {
        let by_count = match self.termination_criterion {
            TerminationCriterion::Triangles => self.percent_triangles < 1.0,
            TerminationCriterion::Vertices => self.percent_vertices < 1.0,
            TerminationCriterion::Any => self.percent_triangles < 1.0 || self.percent_vertices < 1.0,
        };
        by_count || self.max_deviation > 0.0
    }

    /// Triangle target for a source of `source_triangles`, floored at
    /// [`MIN_RESULT_TRIANGLES`].
    #[must_use]
    pub fn target_triangles(&self, source_triangles: usize) -> usize {
        let target = (source_triangles as f32 * self.percent_triangles.clamp(0.0, 1.0)).round() as usize;
        target.max(MIN_RESULT_TRIANGLES)
    }

    #[must_use]
    pub fn target_vertices(&self, source_vertices: usize) -> usize {
        let target = (source_vertices as f32 * self.percent_vertices.clamp(0.0, 1.0)).round() as usize;
        target.max(3)
    }
}

/// Settings for one LOD after following its base-LOD chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedReduction {
    pub settings: ReductionSettings,
    /// LOD whose source mesh feeds the reducer.
    pub source_lod: usize,
    pub warning: Option<BakeWarning>,
}

/// Follows `base_lod_model` links from `lod` back to a LOD that reduces its
/// own source, multiplying the percentages of every reduced link on the way.
/// The product ignores the real counts each link produced, so a chain longer
/// than one link carries an approximation warning.
pub fn resolve_reduction_settings(lods: &[ReductionSettings], lod: usize) -> Result<ResolvedReduction, ReductionError> {
    let Some(own) = lods.get(lod) else {
        return Err(ReductionError::InvalidBaseLod { lod, base: lod });
    };
    let mut settings = *own;
    let mut current = lod;
    let mut links = 0usize;

    while let Some(base) = lods[current].base_lod_model {
        if base == current {
            break;
        }
        if base > current || base >= lods.len() {
            return Err(ReductionError::InvalidBaseLod { lod: current, base });
        }
        if current != lod && lods[current].is_reduction_active() {
            settings.percent_triangles *= lods[current].percent_triangles;
            settings.percent_vertices *= lods[current].percent_vertices;
            links += 1;
        }
        current = base;
    }
    if current != lod && lods[current].is_reduction_active() {
        settings.percent_triangles *= lods[current].percent_triangles;
        settings.percent_vertices *= lods[current].percent_vertices;
        links += 1;
    }
    settings.base_lod_model = None;

    let warning = (links > 0).then(|| {
        let warning = BakeWarning::ApproximatedReductionChain {
            lod,
            base_lod: current,
            percent_triangles: settings.percent_triangles,
            percent_vertices: settings.percent_vertices,
        };
        log::warn!("{warning}");
        warning
    });
    Ok(ResolvedReduction { settings, source_lod: current, warning })
}

// ─────────────────────────────────────────────────────────────────────────────
// Vertex format
// ─────────────────────────────────────────────────────────────────────────────

/// Attributes after the position: normal, tangent, binormal, color, UVs.
pub const NUM_REDUCTION_ATTRIBUTES: usize = 3 + 3 + 3 + 4 + 2 * MAX_UV_CHANNELS;

pub const NORMAL_WEIGHT: f32 = 16.0;
pub const TANGENT_WEIGHT: f32 = 0.1;
pub const BINORMAL_WEIGHT: f32 = 0.1;
pub const COLOR_WEIGHT: f32 = 0.1;
pub const UV_WEIGHT: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReductionVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub binormal: Vec3,
    pub color: LinearColor,
    pub uvs: [Vec2; MAX_UV_CHANNELS],
    pub material_index: u32,
}

impl ReductionVertex {
    /// Flat attribute vector matching [`attribute_weights`].
    #[must_use]
    pub fn attributes(&self) -> [f32; NUM_REDUCTION_ATTRIBUTES] {
        let mut out = [0.0; NUM_REDUCTION_ATTRIBUTES];
        out[0..3].copy_from_slice(&self.normal.to_array());
        out[3..6].copy_from_slice(&self.tangent.to_array());
        out[6..9].copy_from_slice(&self.binormal.to_array());
        out[9..13].copy_from_slice(&self.color.to_array());
        for (i, uv) in self.uvs.iter().enumerate() {
            out[13 + 2 * i] = uv.x;
            out[14 + 2 * i] = uv.y;
        }
        out
    }

    /// Renormalizes the basis after interpolation and clamps the color.
    pub fn correct(&mut self) {
        self.normal = self.normal.safe_normal(Tolerance::SMALL_NUMBER);
        self.tangent -= self.normal * self.normal.dot(self.tangent);
        self.tangent = self.tangent.safe_normal(Tolerance::SMALL_NUMBER);
        self.binormal -= self.normal * self.normal.dot(self.binormal);
        self.binormal -= self.tangent * self.tangent.dot(self.binormal);
        self.binormal = self.binormal.safe_normal(Tolerance::SMALL_NUMBER);
        self.color = self.color.clamped();
    }

    #[must_use]
    pub fn equals(&self, other: &Self) -> bool {
        self.material_index == other.material_index
            && Tolerance::POINTS.points_equal(self.position, other.position)
            && self.normal.equals(other.normal, Tolerance::THRESH_NORMALS_ARE_SAME)
            && self.tangent.equals(other.tangent, Tolerance::THRESH_NORMALS_ARE_SAME)
            && self.binormal.equals(other.binormal, Tolerance::THRESH_NORMALS_ARE_SAME)
            && self.color.equals(other.color, Tolerance::KINDA_SMALL_NUMBER)
            && self.uvs.iter().zip(&other.uvs).all(|(a, b)| a.equals(*b, Tolerance::THRESH_UVS_ARE_SAME))
    }

    /// Weighted squared attribute distance, ignoring position.
    #[must_use]
    pub fn attribute_distance(&self, other: &Self, weights: &[f32; NUM_REDUCTION_ATTRIBUTES]) -> f32 {
        let (a, b) = (self.attributes(), other.attributes());
        a.iter().zip(&b).zip(weights).map(|((x, y), w)| w * (x - y) * (x - y)).sum()
    }
}

/// Per-attribute error weights. Normals dominate; unused UV channels weigh nothing.
#[must_use]
pub fn attribute_weights(settings: &ReductionSettings, num_uv_channels: usize) -> [f32; NUM_REDUCTION_ATTRIBUTES] {
    let shading = settings.shading_importance.multiplier();
    let texture = settings.texture_importance.multiplier();
    let mut weights = [0.0; NUM_REDUCTION_ATTRIBUTES];
    weights[0..3].fill(NORMAL_WEIGHT * shading);
    weights[3..6].fill(TANGENT_WEIGHT * shading);
    weights[6..9].fill(BINORMAL_WEIGHT * shading);
    weights[9..13].fill(COLOR_WEIGHT);
    weights[13..13 + 2 * num_uv_channels.min(MAX_UV_CHANNELS)].fill(UV_WEIGHT * texture);
    weights
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReductionBuffer {
    pub vertices: Vec<ReductionVertex>,
    pub indices: Vec<u32>,
    pub num_uv_channels: usize,
}

impl ReductionBuffer {
    #[must_use]
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Checks triangle-list shape and index bounds.
    pub fn validate(&self) -> Result<(), ReductionError> {
        if self.indices.is_empty() {
            return Err(ReductionError::InvalidOutput { reason: "no triangles".into() });
        }
        if self.indices.len() % 3 != 0 {
            return Err(ReductionError::InvalidOutput {
                reason: format!("{} indices is not a triangle list", self.indices.len()),
            });
        }
        if let Some(&bad) = self.indices.iter().find(|&&i| i as usize >= self.vertices.len()) {
            return Err(ReductionError::InvalidOutput {
                reason: format!("index {bad} out of {} vertices", self.vertices.len()),
            });
        }
        Ok(())
    }
}

/// A mesh simplification backend.
pub trait MeshReducer {
    /// Writes the reduced mesh into `dest` and returns the largest deviation
    /// it introduced. `overlaps` relates `src` vertices sharing a position.
    fn reduce(
        &self,
        dest: &mut ReductionBuffer,
        src: &ReductionBuffer,
        overlaps: &OverlappingCorners,
        settings: &ReductionSettings,
    ) -> Result<f32, ReductionError>;

    fn name(&self) -> &'static str {
        "reducer"
    }
}

/// Copies the source unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughReducer;

impl MeshReducer for PassthroughReducer {
    fn reduce(
        &self,
        dest: &mut ReductionBuffer,
        src: &ReductionBuffer,
        _overlaps: &OverlappingCorners,
        _settings: &ReductionSettings,
    ) -> Result<f32, ReductionError> {
        dest.clone_from(src);
        Ok(0.0)
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bridge
// ─────────────────────────────────────────────────────────────────────────────

/// Flat reducer input derived from a mesh.
#[derive(Debug, Clone)]
pub struct ReductionInput {
    pub buffer: ReductionBuffer,
    pub overlaps: OverlappingCorners,
    /// Slot name per material index, in polygon group order.
    pub material_names: Vec<String>,
    pub welded_vertices: usize,
}

#[derive(Debug, Clone)]
pub struct ReductionOutcome {
    pub mesh: MeshGraph,
    pub max_deviation: f32,
    pub welded_vertices: usize,
    pub source_triangles: usize,
    pub result_triangles: usize,
}

pub struct ReductionBridge<'r> {
    reducer: &'r dyn MeshReducer,
}

impl<'r> ReductionBridge<'r> {
    #[must_use]
    pub fn new(reducer: &'r dyn MeshReducer) -> Self {
        Self { reducer }
    }

    /// Flattens the triangulated `mesh` into reducer vertices, merging corners
    /// whose attributes match. Vertex positions are welded first when
    /// `welding_threshold` is positive.
    #[must_use]
    pub fn to_reduction_vertices(mesh: &MeshGraph, welding_threshold: f32) -> ReductionInput {
        let num_uv_channels = mesh.num_uv_channels();
        let vertex_ids: Vec<VertexId> = mesh.vertex_ids().collect();
        let weld = weld_positions(
            &vertex_ids.iter().map(|&v| mesh.vertex_position(v)).collect::<Vec<_>>(),
            Tolerance::new(welding_threshold),
        );
        let mut welded_position = vec![Vec3::ZERO; vertex_ids.iter().map(|v| v.index() + 1).max().unwrap_or(0)];
        for (i, &v) in vertex_ids.iter().enumerate() {
            welded_position[v.index()] = weld.positions[weld.remap[i] as usize];
        }

        let groups: Vec<PolygonGroupId> = mesh.polygon_group_ids().collect();
        let material_names = groups
            .iter()
            .map(|&g| mesh.polygon_group(g).map(|pg| pg.material_slot_name.clone()).unwrap_or_default())
            .collect();

        let mut wedges: Vec<ReductionVertex> = Vec::with_capacity(mesh.num_triangles() * 3);
        for (_, polygon) in mesh.polygons() {
            let material_index = groups.iter().position(|&g| g == polygon.group()).unwrap_or(0) as u32;
            for triangle in polygon.triangles() {
                for &corner in &triangle.corners {
                    wedges.push(reduction_vertex(mesh, corner, &welded_position, material_index));
                }
            }
        }

        let wedge_positions: Vec<Vec3> = wedges.iter().map(|w| w.position).collect();
        let wedge_overlaps = OverlappingCorners::build(&wedge_positions, Tolerance::THRESH_POINTS_ARE_SAME);

        let mut vertices: Vec<ReductionVertex> = Vec::new();
        let mut indices = Vec::with_capacity(wedges.len());
        let mut wedge_to_vertex = vec![u32::MAX; wedges.len()];
        for (w, wedge) in wedges.iter().enumerate() {
            let existing = wedge_overlaps
                .find_if_overlapping(w as u32)
                .iter()
                .map(|&o| o as usize)
                .take_while(|&o| o < w)
                .map(|o| wedge_to_vertex[o])
                .find(|&v| vertices[v as usize].equals(wedge));
            let index = existing.unwrap_or_else(|| {
                vertices.push(*wedge);
                (vertices.len() - 1) as u32
            });
            wedge_to_vertex[w] = index;
            indices.push(index);
        }

        let positions: Vec<Vec3> = vertices.iter().map(|v| v.position).collect();
        let overlaps = OverlappingCorners::build(&positions, Tolerance::THRESH_POINTS_ARE_SAME);
        log::debug!(
            "reduction input: {} triangles, {} vertices, {} welded",
            indices.len() / 3,
            vertices.len(),
            weld.welded
        );
        ReductionInput {
            buffer: ReductionBuffer { vertices, indices, num_uv_channels },
            overlaps,
            material_names,
            welded_vertices: weld.welded,
        }
    }

    /// Runs the reducer on `mesh` and rebuilds the result.
    pub fn reduce(&self, mesh: &MeshGraph, settings: &ReductionSettings) -> Result<ReductionOutcome, ReductionError> {
        if mesh.num_triangles() == 0 {
            return Err(ReductionError::EmptySource);
        }
        let input = Self::to_reduction_vertices(mesh, settings.welding_threshold);
        let source_triangles = input.buffer.num_triangles();
        log::info!(
            "reducing {source_triangles} triangles with {} (triangles {:.3}, vertices {:.3})",
            self.reducer.name(),
            settings.percent_triangles,
            settings.percent_vertices
        );

        let mut dest = ReductionBuffer { num_uv_channels: input.buffer.num_uv_channels, ..ReductionBuffer::default() };
        let max_deviation = self.reducer.reduce(&mut dest, &input.buffer, &input.overlaps, settings)?;
        dest.validate()?;

        let mesh = Self::rebuild_mesh_graph(&dest, &input.material_names)?;
        let result_triangles = mesh.num_triangles();
        Ok(ReductionOutcome {
            mesh,
            max_deviation,
            welded_vertices: input.welded_vertices,
            source_triangles,
            result_triangles,
        })
    }

    /// Builds a mesh with one polygon per triangle. Groups are created in
    /// material order and only for materials that keep at least one triangle.
    /// Edges whose two sides disagree on a normal are marked hard.
    pub fn rebuild_mesh_graph(buffer: &ReductionBuffer, material_names: &[String]) -> Result<MeshGraph, ReductionError> {
        buffer.validate()?;
        let mut mesh = MeshGraph::with_uv_channels(buffer.num_uv_channels.clamp(1, MAX_UV_CHANNELS))?;

        let positions: Vec<Vec3> = buffer.vertices.iter().map(|v| v.position).collect();
        let (position_of, unique) = dedup_positions(&positions);
        let mut mesh_vertices: Vec<Option<VertexId>> = vec![None; unique];
        let mut instances: Vec<Option<VertexInstanceId>> = vec![None; buffer.vertices.len()];

        let mut triangles: Vec<(u32, [u32; 3])> = buffer
            .indices
            .chunks_exact(3)
            .map(|t| (buffer.vertices[t[0] as usize].material_index, [t[0], t[1], t[2]]))
            .filter(|(_, t)| {
                let p = t.map(|i| position_of[i as usize]);
                p[0] != p[1] && p[1] != p[2] && p[0] != p[2]
            })
            .collect();
        triangles.sort_by_key(|(material, _)| *material);

        let mut current_group: Option<(u32, PolygonGroupId)> = None;
        for (material, tri) in triangles {
            let group = match current_group {
                Some((m, g)) if m == material => g,
                _ => {
                    let name = material_names
                        .get(material as usize)
                        .cloned()
                        .unwrap_or_else(|| format!("material_{material}"));
                    let g = mesh.create_polygon_group(name);
                    current_group = Some((material, g));
                    g
                }
            };

            let mut corners = [VertexInstanceId(0); 3];
            for (slot, &i) in corners.iter_mut().zip(&tri) {
                let i = i as usize;
                if let Some(existing) = instances[i] {
                    *slot = existing;
                    continue;
                }
                let source = &buffer.vertices[i];
                let unique_index = position_of[i] as usize;
                let vertex = *mesh_vertices[unique_index].get_or_insert_with(|| mesh.create_vertex(source.position));
                let id = mesh.create_vertex_instance(vertex)?;
                if let Some(instance) = mesh.vertex_instance_mut(id) {
                    instance.normal = source.normal;
                    instance.tangent = source.tangent;
                    instance.binormal_sign =
                        super::core::basis_determinant_sign(source.tangent, source.binormal, source.normal);
                    instance.color = source.color;
                    for (dst, src) in instance.uvs.iter_mut().zip(&source.uvs) {
                        *dst = *src;
                    }
                }
                instances[i] = Some(id);
                *slot = id;
            }
            mesh.create_polygon(group, &corners)?;
        }

        mark_normal_seams_hard(&mut mesh);
        Ok(mesh)
    }
}

fn reduction_vertex(
    mesh: &MeshGraph,
    corner: VertexInstanceId,
    welded_position: &[Vec3],
    material_index: u32,
) -> ReductionVertex {
    let position = mesh
        .vertex_instance_vertex(corner)
        .and_then(|v| welded_position.get(v.index()).copied())
        .unwrap_or_else(|| mesh.instance_position(corner));
    let mut vertex = ReductionVertex {
        position,
        normal: Vec3::ZERO,
        tangent: Vec3::ZERO,
        binormal: Vec3::ZERO,
        color: LinearColor::WHITE,
        uvs: [Vec2::ZERO; MAX_UV_CHANNELS],
        material_index,
    };
    if let Some(instance) = mesh.vertex_instance(corner) {
        vertex.normal = instance.normal;
        vertex.tangent = instance.tangent;
        vertex.binormal =
            instance.normal.cross(instance.tangent).safe_normal(Tolerance::SMALL_NUMBER) * instance.binormal_sign;
        vertex.color = instance.color;
        for (dst, src) in vertex.uvs.iter_mut().zip(&instance.uvs) {
            *dst = *src;
        }
    }
    vertex
}

fn mark_normal_seams_hard(mesh: &mut MeshGraph) {
    let mut hard = Vec::new();
    for edge_id in mesh.edge_ids() {
        let polygons = mesh.connected_polygons_of_edge(edge_id);
        if polygons.len() != 2 {
            continue;
        }
        let Some(edge) = mesh.edge(edge_id) else { continue };
        let normal_at = |polygon, vertex| {
            mesh.polygon_perimeter(polygon)
                .iter()
                .find(|&&vi| mesh.vertex_instance_vertex(vi) == Some(vertex))
                .and_then(|&vi| mesh.vertex_instance(vi))
                .map(|vi| vi.normal)
        };
        let seam = edge.vertices().iter().any(|&v| match (normal_at(polygons[0], v), normal_at(polygons[1], v)) {
            (Some(a), Some(b)) => !a.equals(b, Tolerance::THRESH_NORMALS_ARE_SAME),
            _ => false,
        });
        if seam {
            hard.push(edge_id);
        }
    }
    for edge_id in hard {
        if let Some(edge) = mesh.edge_mut(edge_id) {
            edge.is_hard = true;
        }
    }
}
