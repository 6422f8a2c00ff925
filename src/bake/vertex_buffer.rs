//! Render vertex assembly.
//!
//! Walks every polygon triangle, produces one [`StaticMeshBuildVertex`] per
//! corner and merges corners whose attributes all match an earlier one. The
//! overlap relation limits candidates to corners at the same position, and
//! only earlier wedges are considered so each corner is compared once.

use bytemuck::{Pod, Zeroable};
use half::f16;

use super::cache_optimize::{CACHE_OPTIMIZE_VERTEX_CEILING, CacheOptimizeStrategy, first_use_remap, optimize_for_cache};
use super::core::{LinearColor, MAX_UV_CHANNELS, Matrix3, Tolerance, Vec2, Vec3, basis_determinant_sign};
use super::ids::PolygonGroupId;
use super::index_buffer::MeshSection;
use super::mesh_graph::MeshGraph;
use super::overlap::OverlappingCorners;
use super::parallel::fill_indexed;
use crate::debug_log;

/// Wedge map entry of a corner dropped with its degenerate triangle.
pub const INDEX_NONE: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticMeshBuildVertex {
    pub position: Vec3,
    pub tangent_x: Vec3,
    pub tangent_y: Vec3,
    pub tangent_z: Vec3,
    pub color: LinearColor,
    pub uvs: [Vec2; MAX_UV_CHANNELS],
}

impl StaticMeshBuildVertex {
    /// Attribute equality used for corner merging.
    #[must_use]
    pub fn equals(&self, other: &Self, num_uvs: usize) -> bool {
        Tolerance::POINTS.points_equal(self.position, other.position)
            && self.tangent_x.equals(other.tangent_x, Tolerance::THRESH_NORMALS_ARE_SAME)
            && self.tangent_y.equals(other.tangent_y, Tolerance::THRESH_NORMALS_ARE_SAME)
            && self.tangent_z.equals(other.tangent_z, Tolerance::THRESH_NORMALS_ARE_SAME)
            && self.color.to_rgba8() == other.color.to_rgba8()
            && self.uvs[..num_uvs]
                .iter()
                .zip(&other.uvs[..num_uvs])
                .all(|(a, b)| a.equals(*b, Tolerance::THRESH_UVS_ARE_SAME))
    }

    #[must_use]
    pub fn binormal_sign(&self) -> f32 {
        basis_determinant_sign(self.tangent_x, self.tangent_y, self.tangent_z)
    }
}

/// Triangle list of one polygon group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionIndices {
    pub polygon_group: PolygonGroupId,
    pub material_index: u32,
    pub indices: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexBufferOptions {
    pub build_scale: Vec3,
    pub remove_degenerates: bool,
    pub cache_optimize: CacheOptimizeStrategy,
}

impl Default for VertexBufferOptions {
    fn default() -> Self {
        Self { build_scale: Vec3::ONE, remove_degenerates: true, cache_optimize: CacheOptimizeStrategy::default() }
    }
}

impl VertexBufferOptions {
    #[must_use]
    pub const fn with_build_scale(mut self, scale: Vec3) -> Self {
        self.build_scale = scale;
        self
    }

    #[must_use]
    pub const fn with_remove_degenerates(mut self, value: bool) -> Self {
        self.remove_degenerates = value;
        self
    }

    #[must_use]
    pub const fn with_cache_optimize(mut self, strategy: CacheOptimizeStrategy) -> Self {
        self.cache_optimize = strategy;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VertexBufferStats {
    pub corner_count: usize,
    pub deduplicated_corners: usize,
    pub degenerate_triangles: usize,
    pub cache_optimized: bool,
}

/// Output of [`VertexBufferBuilder::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct VertexBufferBuild {
    pub vertices: Vec<StaticMeshBuildVertex>,
    pub sections: Vec<SectionIndices>,
    /// Render vertex index per flattened triangle corner, [`INDEX_NONE`] for
    /// corners of dropped triangles.
    pub wedge_map: Vec<u32>,
    pub num_uv_channels: usize,
    pub stats: VertexBufferStats,
}

impl VertexBufferBuild {
    /// All section indices concatenated with the matching section ranges.
    #[must_use]
    pub fn combined_indices(&self) -> (Vec<u32>, Vec<MeshSection>) {
        let mut indices = Vec::with_capacity(self.sections.iter().map(|s| s.indices.len()).sum());
        let mut ranges = Vec::with_capacity(self.sections.len());
        for section in &self.sections {
            let (min, max) = section
                .indices
                .iter()
                .fold((u32::MAX, 0), |(lo, hi), &i| (lo.min(i), hi.max(i)));
            ranges.push(MeshSection {
                material_index: section.material_index,
                first_index: indices.len() as u32,
                num_triangles: (section.indices.len() / 3) as u32,
                min_vertex_index: if section.indices.is_empty() { 0 } else { min },
                max_vertex_index: max,
            });
            indices.extend_from_slice(&section.indices);
        }
        (indices, ranges)
    }

    #[must_use]
    pub fn positions(&self) -> Vec<Vec3> {
        self.vertices.iter().map(|v| v.position).collect()
    }

    /// Reorders each section for post-transform locality, then renumbers
    /// vertices in first-use order for pre-transform locality. Skipped at or
    /// above [`CACHE_OPTIMIZE_VERTEX_CEILING`]. Returns whether it ran.
    pub fn optimize(&mut self, strategy: CacheOptimizeStrategy) -> bool {
        if strategy == CacheOptimizeStrategy::None || self.vertices.len() >= CACHE_OPTIMIZE_VERTEX_CEILING {
            return false;
        }
        let vertex_count = self.vertices.len();
        for section in &mut self.sections {
            section.indices = optimize_for_cache(&section.indices, vertex_count, strategy);
        }

        let remap = first_use_remap(self.sections.iter().map(|s| s.indices.as_slice()), vertex_count);
        let mut reordered = self.vertices.clone();
        for (old, &new) in remap.iter().enumerate() {
            reordered[new as usize] = self.vertices[old];
        }
        self.vertices = reordered;
        for section in &mut self.sections {
            for i in &mut section.indices {
                *i = remap[*i as usize];
            }
        }
        for w in &mut self.wedge_map {
            if *w != INDEX_NONE {
                *w = remap[*w as usize];
            }
        }
        self.stats.cache_optimized = true;
        true
    }
}

pub struct VertexBufferBuilder<'a> {
    mesh: &'a MeshGraph,
    options: VertexBufferOptions,
}

impl<'a> VertexBufferBuilder<'a> {
    /// The mesh must already be triangulated.
    #[must_use]
    pub const fn new(mesh: &'a MeshGraph, options: VertexBufferOptions) -> Self {
        Self { mesh, options }
    }

    fn corner_vertex(&self, corner: super::ids::VertexInstanceId, basis_matrix: &Matrix3) -> StaticMeshBuildVertex {
        let mesh = self.mesh;
        let position = mesh.instance_position(corner).mul_components(self.options.build_scale);
        let mut vertex = StaticMeshBuildVertex {
            position,
            tangent_x: Vec3::ZERO,
            tangent_y: Vec3::ZERO,
            tangent_z: Vec3::ZERO,
            color: LinearColor::WHITE,
            uvs: [Vec2::ZERO; MAX_UV_CHANNELS],
        };
        if let Some(instance) = mesh.vertex_instance(corner) {
            let binormal = instance.normal.cross(instance.tangent).safe_normal(Tolerance::SMALL_NUMBER)
                * instance.binormal_sign;
            vertex.tangent_x = basis_matrix.transform_vector(instance.tangent).safe_normal(Tolerance::SMALL_NUMBER);
            vertex.tangent_y = basis_matrix.transform_vector(binormal).safe_normal(Tolerance::SMALL_NUMBER);
            vertex.tangent_z = basis_matrix.transform_vector(instance.normal).safe_normal(Tolerance::SMALL_NUMBER);
            vertex.color = instance.color;
            for (dst, src) in vertex.uvs.iter_mut().zip(&instance.uvs) {
                *dst = *src;
            }
        }
        vertex
    }

    /// Assembles deduplicated vertices and per-section indices, then cache
    /// optimizes according to the options.
    #[must_use]
    pub fn build(&self) -> VertexBufferBuild {
        let mesh = self.mesh;
        let num_uvs = mesh.num_uv_channels().min(MAX_UV_CHANNELS);
        let basis_matrix = Matrix3::scale(self.options.build_scale)
            .inverse(Tolerance::SMALL_NUMBER)
            .map_or(Matrix3::IDENTITY, |m| m.transpose());

        // Flatten corners in polygon order so the overlap relation can key
        // them by wedge index.
        let mut corners = Vec::with_capacity(mesh.num_triangles() * 3);
        let mut corner_groups = Vec::with_capacity(mesh.num_triangles());
        for (_, polygon) in mesh.polygons() {
            for triangle in polygon.triangles() {
                corners.extend_from_slice(&triangle.corners);
                corner_groups.push(polygon.group());
            }
        }
        let wedge_vertices: Vec<StaticMeshBuildVertex> =
            corners.iter().map(|&c| self.corner_vertex(c, &basis_matrix)).collect();
        let positions: Vec<Vec3> = wedge_vertices.iter().map(|v| v.position).collect();
        let overlaps = OverlappingCorners::build(&positions, Tolerance::THRESH_POINTS_ARE_SAME);

        let group_ids: Vec<PolygonGroupId> = mesh.polygon_group_ids().collect();
        let mut sections: Vec<SectionIndices> = group_ids
            .iter()
            .enumerate()
            .map(|(m, &g)| SectionIndices { polygon_group: g, material_index: m as u32, indices: Vec::new() })
            .collect();

        let mut vertices: Vec<StaticMeshBuildVertex> = Vec::with_capacity(corners.len());
        let mut wedge_map = vec![INDEX_NONE; corners.len()];
        let mut stats = VertexBufferStats { corner_count: corners.len(), ..VertexBufferStats::default() };

        for (t, group) in corner_groups.iter().enumerate() {
            let base = 3 * t;
            let p = [positions[base], positions[base + 1], positions[base + 2]];
            if self.options.remove_degenerates
                && (Tolerance::POINTS.points_equal(p[0], p[1])
                    || Tolerance::POINTS.points_equal(p[1], p[2])
                    || Tolerance::POINTS.points_equal(p[0], p[2]))
            {
                stats.degenerate_triangles += 1;
                debug_log!("triangle {t} is degenerate");
                continue;
            }

            let mut tri = [0u32; 3];
            for (c, slot) in tri.iter_mut().enumerate() {
                let wedge = base + c;
                let candidate = &wedge_vertices[wedge];
                let existing = overlaps
                    .find_if_overlapping(wedge as u32)
                    .iter()
                    .map(|&o| o as usize)
                    .take_while(|&o| o < wedge)
                    .filter(|&o| wedge_map[o] != INDEX_NONE)
                    .map(|o| wedge_map[o])
                    .find(|&v| vertices[v as usize].equals(candidate, num_uvs));
                let index = existing.unwrap_or_else(|| {
                    vertices.push(*candidate);
                    (vertices.len() - 1) as u32
                });
                if existing.is_some() {
                    stats.deduplicated_corners += 1;
                }
                wedge_map[wedge] = index;
                *slot = index;
            }

            if let Some(section) = group_ids.iter().position(|g| g == group) {
                sections[section].indices.extend_from_slice(&tri);
            }
        }

        log::debug!(
            "vertex buffer: {} corners, {} vertices, {} merged, {} degenerate triangles",
            stats.corner_count,
            vertices.len(),
            stats.deduplicated_corners,
            stats.degenerate_triangles
        );

        let mut build = VertexBufferBuild { vertices, sections, wedge_map, num_uv_channels: num_uvs, stats };
        build.optimize(self.options.cache_optimize);
        build
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Packed GPU formats
// ─────────────────────────────────────────────────────────────────────────────

/// Tangent and normal as signed normalized bytes; `tangent_z[3]` holds the
/// binormal sign.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct PackedNormal8 {
    pub tangent_x: [i8; 4],
    pub tangent_z: [i8; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct PackedNormal16 {
    pub tangent_x: [i16; 4],
    pub tangent_z: [i16; 4],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackedTangentBasis {
    Normal(Vec<PackedNormal8>),
    HighPrecision(Vec<PackedNormal16>),
}

impl PackedTangentBasis {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Normal(v) => bytemuck::cast_slice(v),
            Self::HighPrecision(v) => bytemuck::cast_slice(v),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Normal(v) => v.len(),
            Self::HighPrecision(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// UVs interleaved per vertex: `num_uv_channels` entries for vertex 0, then
/// vertex 1, and so on.
#[derive(Debug, Clone, PartialEq)]
pub enum PackedUvs {
    Half(Vec<[f16; 2]>),
    Full(Vec<[f32; 2]>),
}

impl PackedUvs {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Half(v) => bytemuck::cast_slice(v),
            Self::Full(v) => bytemuck::cast_slice(v),
        }
    }

    /// UV `channel` of `vertex`, widened to f32.
    #[must_use]
    pub fn get(&self, vertex: usize, channel: usize, num_channels: usize) -> Option<Vec2> {
        let i = vertex * num_channels + channel;
        match self {
            Self::Half(v) => v.get(i).map(|uv| Vec2::new(uv[0].to_f32(), uv[1].to_f32())),
            Self::Full(v) => v.get(i).map(|&uv| Vec2::from(uv)),
        }
    }
}

fn quantize_snorm8(v: f32) -> i8 {
    (v.clamp(-1.0, 1.0) * 127.0).round() as i8
}

fn quantize_snorm16(v: f32) -> i16 {
    (v.clamp(-1.0, 1.0) * 32767.0).round() as i16
}

/// GPU vertex streams.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticMeshVertexBuffers {
    pub positions: Vec<[f32; 3]>,
    pub tangents: PackedTangentBasis,
    pub uvs: PackedUvs,
    pub colors: Vec<[u8; 4]>,
    pub num_uv_channels: usize,
}

impl StaticMeshVertexBuffers {
    #[must_use]
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    #[must_use]
    pub fn color_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.colors)
    }
}

/// Packs build vertices into GPU streams at the requested precisions.
#[must_use]
pub fn pack_vertex_buffers(
    vertices: &[StaticMeshBuildVertex],
    num_uv_channels: usize,
    high_precision_tangents: bool,
    full_precision_uvs: bool,
) -> StaticMeshVertexBuffers {
    let num_uv_channels = num_uv_channels.clamp(1, MAX_UV_CHANNELS);
    let mut positions = vec![[0.0f32; 3]; vertices.len()];
    fill_indexed(&mut positions, |i| vertices[i].position.to_array());
    let colors = vertices.iter().map(|v| v.color.to_rgba8()).collect();

    let tangents = if high_precision_tangents {
        PackedTangentBasis::HighPrecision(
            vertices
                .iter()
                .map(|v| {
                    let x = v.tangent_x;
                    let z = v.tangent_z;
                    PackedNormal16 {
                        tangent_x: [quantize_snorm16(x.x), quantize_snorm16(x.y), quantize_snorm16(x.z), 0],
                        tangent_z: [
                            quantize_snorm16(z.x),
                            quantize_snorm16(z.y),
                            quantize_snorm16(z.z),
                            quantize_snorm16(v.binormal_sign()),
                        ],
                    }
                })
                .collect(),
        )
    } else {
        PackedTangentBasis::Normal(
            vertices
                .iter()
                .map(|v| {
                    let x = v.tangent_x;
                    let z = v.tangent_z;
                    PackedNormal8 {
                        tangent_x: [quantize_snorm8(x.x), quantize_snorm8(x.y), quantize_snorm8(x.z), 0],
                        tangent_z: [
                            quantize_snorm8(z.x),
                            quantize_snorm8(z.y),
                            quantize_snorm8(z.z),
                            quantize_snorm8(v.binormal_sign()),
                        ],
                    }
                })
                .collect(),
        )
    };

    let uv_iter = vertices.iter().flat_map(|v| v.uvs[..num_uv_channels].iter().copied());
    let uvs = if full_precision_uvs {
        PackedUvs::Full(uv_iter.map(Vec2::to_array).collect())
    } else {
        PackedUvs::Half(uv_iter.map(|uv| [f16::from_f32(uv.x), f16::from_f32(uv.y)]).collect())
    };

    StaticMeshVertexBuffers { positions, tangents, uvs, colors, num_uv_channels }
}
