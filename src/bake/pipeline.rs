//! Per-LOD orchestration of the bake stages.
//!
//! ```text
//! MeshGraph ─► triangulate ─► NTB ─► [lightmap UVs] ─► [reduction ─► NTB] ─► vertex buffer
//!                                                                          └► derived index buffers
//! ```
//!
//! Each LOD bakes from its own copy of the source; the caller's mesh is never
//! mutated.

use serde::{Deserialize, Serialize};

use super::cache_optimize::CacheOptimizeStrategy;
use super::core::{BBox, BoundingSphere, MAX_UV_CHANNELS, Tolerance, Vec3};
use super::diagnostics::{BakeDiagnostics, BakeWarning};
use super::error::{BakeError, BakeResult};
use super::index_buffer::{
    AdjacencyBuilder, IndexBuffer, MeshSection, PnAenAdjacency, build_depth_only_indices, build_reversed_indices,
    build_wireframe_indices,
};
use super::layout_uv::{LayoutError, LightmapUvVersion, create_lightmap_uv_layout};
use super::mesh_graph::MeshGraph;
use super::metrics::{BakeMetrics, TimingBucket};
use super::ntb::{NtbOptions, compute_polygon_ntb, synthesize_normals_and_tangents};
use super::parallel::{compute_bounding_sphere, compute_bounds};
use super::reduction::{MeshReducer, ReductionBridge, ReductionError, ReductionSettings, resolve_reduction_settings};
use super::vertex_buffer::{
    StaticMeshBuildVertex, StaticMeshVertexBuffers, VertexBufferBuilder, VertexBufferOptions, pack_vertex_buffers,
};

// ─────────────────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Build options shared by every LOD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Drop triangles with two coincident corners.
    pub remove_degenerates: bool,
    pub recompute_normals: bool,
    pub recompute_tangents: bool,
    pub use_mikk_tspace: bool,
    /// Weight polygon normals by corner angle times area.
    pub compute_weighted_normals: bool,
    pub generate_lightmap_uvs: bool,
    pub src_lightmap_index: usize,
    pub dst_lightmap_index: usize,
    pub min_lightmap_resolution: u32,
    pub max_lightmap_resolution: u32,
    pub lightmap_uv_version: LightmapUvVersion,
    /// Non-uniform scale applied to positions; bases use its inverse transpose.
    pub build_scale: Vec3,
    pub use_high_precision_tangent_basis: bool,
    pub use_full_precision_uvs: bool,
    pub build_adjacency_buffer: bool,
    pub build_reversed_index_buffer: bool,
    pub cache_optimize: CacheOptimizeStrategy,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            remove_degenerates: true,
            recompute_normals: false,
            recompute_tangents: false,
            use_mikk_tspace: true,
            compute_weighted_normals: false,
            generate_lightmap_uvs: false,
            src_lightmap_index: 0,
            dst_lightmap_index: 1,
            min_lightmap_resolution: 64,
            max_lightmap_resolution: 1024,
            lightmap_uv_version: LightmapUvVersion::Latest,
            build_scale: Vec3::ONE,
            use_high_precision_tangent_basis: false,
            use_full_precision_uvs: false,
            build_adjacency_buffer: false,
            build_reversed_index_buffer: true,
            cache_optimize: CacheOptimizeStrategy::Forsyth,
        }
    }
}

impl BuildSettings {
    #[must_use]
    pub const fn with_remove_degenerates(mut self, value: bool) -> Self {
        self.remove_degenerates = value;
        self
    }

    #[must_use]
    pub const fn with_recompute_normals(mut self, value: bool) -> Self {
        self.recompute_normals = value;
        self
    }

    #[must_use]
    pub const fn with_recompute_tangents(mut self, value: bool) -> Self {
        self.recompute_tangents = value;
        self
    }

    #[must_use]
    pub const fn with_mikk_tspace(mut self, value: bool) -> Self {
        self.use_mikk_tspace = value;
        self
    }

    #[must_use]
    pub const fn with_weighted_normals(mut self, value: bool) -> Self {
        self.compute_weighted_normals = value;
        self
    }

    /// Enables lightmap UV generation from `src` into `dst`.
    #[must_use]
    pub const fn with_lightmap_uvs(mut self, src: usize, dst: usize, min_resolution: u32) -> Self {
        self.generate_lightmap_uvs = true;
        self.src_lightmap_index = src;
        self.dst_lightmap_index = dst;
        self.min_lightmap_resolution = min_resolution;
        self
    }

    #[must_use]
    pub const fn with_max_lightmap_resolution(mut self, value: u32) -> Self {
        self.max_lightmap_resolution = value;
        self
    }

    #[must_use]
    pub const fn with_lightmap_uv_version(mut self, version: LightmapUvVersion) -> Self {
        self.lightmap_uv_version = version;
        self
    }

    #[must_use]
    pub const fn with_build_scale(mut self, scale: Vec3) -> Self {
        self.build_scale = scale;
        self
    }

    #[must_use]
    pub const fn with_high_precision_tangent_basis(mut self, value: bool) -> Self {
        self.use_high_precision_tangent_basis = value;
        self
    }

    #[must_use]
    pub const fn with_full_precision_uvs(mut self, value: bool) -> Self {
        self.use_full_precision_uvs = value;
        self
    }

    #[must_use]
    pub const fn with_adjacency_buffer(mut self, value: bool) -> Self {
        self.build_adjacency_buffer = value;
        self
    }

    #[must_use]
    pub const fn with_reversed_index_buffer(mut self, value: bool) -> Self {
        self.build_reversed_index_buffer = value;
        self
    }

    #[must_use]
    pub const fn with_cache_optimize(mut self, strategy: CacheOptimizeStrategy) -> Self {
        self.cache_optimize = strategy;
        self
    }

    #[must_use]
    pub fn ntb_options(&self) -> NtbOptions {
        NtbOptions::default()
            .with_recompute_normals(self.recompute_normals)
            .with_recompute_tangents(self.recompute_tangents)
            .with_mikk_tspace(self.use_mikk_tspace)
            .with_weighted_normals(self.compute_weighted_normals)
    }

    #[must_use]
    pub fn vertex_buffer_options(&self) -> VertexBufferOptions {
        VertexBufferOptions::default()
            .with_build_scale(self.build_scale)
            .with_remove_degenerates(self.remove_degenerates)
            .with_cache_optimize(self.cache_optimize)
    }

    /// Rejects settings no stage could honor.
    pub fn validate(&self) -> BakeResult<()> {
        let scale = self.build_scale.to_array();
        if scale.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(BakeError::invalid_input(format!("build scale {scale:?} must be finite and non-zero")));
        }
        if self.generate_lightmap_uvs {
            if self.dst_lightmap_index >= MAX_UV_CHANNELS {
                return Err(BakeError::resource_limit(format!(
                    "lightmap channel {} exceeds the {MAX_UV_CHANNELS} channel limit",
                    self.dst_lightmap_index
                )));
            }
            if self.src_lightmap_index == self.dst_lightmap_index {
                return Err(BakeError::invalid_input("lightmap source and destination channels must differ"));
            }
            if self.min_lightmap_resolution == 0 || self.max_lightmap_resolution < self.min_lightmap_resolution {
                return Err(BakeError::invalid_input(format!(
                    "lightmap resolution range {}..={} is empty",
                    self.min_lightmap_resolution, self.max_lightmap_resolution
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodSettings {
    pub reduction: ReductionSettings,
}

impl LodSettings {
    #[must_use]
    pub const fn new(reduction: ReductionSettings) -> Self {
        Self { reduction }
    }
}

/// Build settings plus one entry per LOD, loadable from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub build: BuildSettings,
    pub lods: Vec<LodSettings>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self { build: BuildSettings::default(), lods: vec![LodSettings::default()] }
    }
}

impl PipelineSettings {
    pub fn from_toml_str(text: &str) -> BakeResult<Self> {
        toml::from_str(text).map_err(|e| BakeError::Settings(e.to_string()))
    }

    pub fn to_toml_string(&self) -> BakeResult<String> {
        toml::to_string_pretty(self).map_err(|e| BakeError::Settings(e.to_string()))
    }

    #[must_use]
    pub fn reduction_settings(&self) -> Vec<ReductionSettings> {
        self.lods.iter().map(|l| l.reduction).collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

/// Renderer-ready data for one LOD.
#[derive(Debug, Clone)]
pub struct LodRenderData {
    pub vertices: Vec<StaticMeshBuildVertex>,
    pub vertex_buffers: StaticMeshVertexBuffers,
    pub sections: Vec<MeshSection>,
    pub index_buffer: IndexBuffer,
    pub reversed_index_buffer: Option<IndexBuffer>,
    pub depth_only_index_buffer: IndexBuffer,
    pub reversed_depth_only_index_buffer: Option<IndexBuffer>,
    pub wireframe_index_buffer: IndexBuffer,
    pub adjacency_index_buffer: Option<IndexBuffer>,
    /// Render vertex per flattened triangle corner of the baked mesh.
    pub wedge_map: Vec<u32>,
    pub num_uv_channels: usize,
    pub bounds: BBox,
    pub bounding_sphere: BoundingSphere,
    pub diagnostics: BakeDiagnostics,
}

impl LodRenderData {
    #[must_use]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn num_triangles(&self) -> usize {
        self.index_buffer.len() / 3
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline
// ─────────────────────────────────────────────────────────────────────────────

pub struct Pipeline;

impl Pipeline {
    /// Bakes one LOD from `source`. Reduction runs only when `reduction` asks
    /// for it; the reducer is supplied by the caller.
    pub fn build_lod(
        source: &MeshGraph,
        build: &BuildSettings,
        reduction: &ReductionSettings,
        reducer: &dyn MeshReducer,
    ) -> BakeResult<LodRenderData> {
        build.validate()?;
        if source.num_polygons() == 0 {
            return Err(BakeError::invalid_input("source mesh has no polygons"));
        }
        if build.generate_lightmap_uvs && build.src_lightmap_index >= source.num_uv_channels() {
            return Err(LayoutError::SourceChannelOutOfRange {
                channel: build.src_lightmap_index,
                count: source.num_uv_channels(),
            }
            .into());
        }

        let mut metrics = BakeMetrics::default();
        metrics.begin();
        let mut diagnostics = BakeDiagnostics::new();

        let mut mesh = source.clone();
        metrics.time(TimingBucket::Triangulation, || {
            if mesh.has_holes() {
                mesh.compact();
            }
            mesh.ensure_triangulated();
        });
        log::info!(
            "baking {} polygons, {} vertex instances ({} triangles)",
            mesh.num_polygons(),
            mesh.num_vertex_instances(),
            mesh.num_triangles()
        );

        let ntb_options = build.ntb_options();
        metrics.time(TimingBucket::Ntb, || synthesize_normals_and_tangents(&mut mesh, &ntb_options, &mut diagnostics));

        if build.generate_lightmap_uvs {
            let outcome = metrics.time(TimingBucket::LayoutUv, || {
                create_lightmap_uv_layout(
                    &mut mesh,
                    build.src_lightmap_index,
                    build.dst_lightmap_index,
                    build.min_lightmap_resolution,
                    build.max_lightmap_resolution,
                    build.lightmap_uv_version,
                )
            })?;
            if outcome.packed {
                diagnostics.lightmap_chart_count = outcome.chart_count;
                diagnostics.lightmap_resolution = Some(outcome.resolution);
            } else {
                diagnostics.warn(BakeWarning::LightmapPackingFailed { resolution: outcome.resolution });
            }
        }

        if reduction.is_reduction_active() {
            let bridge = ReductionBridge::new(reducer);
            match metrics.time(TimingBucket::Reduction, || bridge.reduce(&mesh, reduction)) {
                Ok(outcome) => {
                    log::info!(
                        "reduced {} -> {} triangles (deviation {:.5})",
                        outcome.source_triangles,
                        outcome.result_triangles,
                        outcome.max_deviation
                    );
                    diagnostics.max_deviation = diagnostics.max_deviation.max(outcome.max_deviation);
                    diagnostics.welded_vertex_count += outcome.welded_vertices;
                    mesh = outcome.mesh;
                    metrics.time(TimingBucket::Ntb, || {
                        refresh_reduced_basis(&mut mesh, build, reduction, &mut diagnostics);
                    });
                }
                Err(ReductionError::InvalidOutput { reason }) => {
                    diagnostics.warn(BakeWarning::ReductionSkipped { reason });
                }
                Err(err) => return Err(err.into()),
            }
        }

        let mut vertex_build =
            metrics.time(TimingBucket::VertexBuffer, || VertexBufferBuilder::new(&mesh, build.vertex_buffer_options()).build());
        if build.cache_optimize != CacheOptimizeStrategy::None && !vertex_build.stats.cache_optimized {
            log::debug!("cache optimization skipped for {} vertices", vertex_build.vertices.len());
        }
        if vertex_build.sections.iter().all(|s| s.indices.is_empty()) {
            return Err(BakeError::invalid_input("every triangle was degenerate"));
        }
        diagnostics.deduplicated_corner_count += vertex_build.stats.deduplicated_corners;
        diagnostics.degenerate_triangle_count += vertex_build.stats.degenerate_triangles;

        let (indices, sections) = vertex_build.combined_indices();
        let positions = vertex_build.positions();

        let (depth_only, wireframe, adjacency) = metrics.time(TimingBucket::DerivedIndices, || {
            let depth_only = build_depth_only_indices(&indices, &positions, build.cache_optimize);
            let wireframe = build_wireframe_indices(&indices, &positions);
            let adjacency = build
                .build_adjacency_buffer
                .then(|| PnAenAdjacency.build_adjacency(&indices, &positions));
            (depth_only, wireframe, adjacency)
        });
        let (reversed, reversed_depth_only) = if build.build_reversed_index_buffer {
            let whole = [MeshSection { num_triangles: (depth_only.len() / 3) as u32, ..MeshSection::default() }];
            (
                Some(build_reversed_indices(&indices, &sections)),
                Some(build_reversed_indices(&depth_only, &whole)),
            )
        } else {
            (None, None)
        };

        let (bounds, bounding_sphere) = metrics.time(TimingBucket::Bounds, || {
            let bounds = compute_bounds(&positions);
            (bounds, compute_bounding_sphere(&positions, bounds))
        });

        let vertex_buffers = pack_vertex_buffers(
            &vertex_build.vertices,
            vertex_build.num_uv_channels,
            build.use_high_precision_tangent_basis,
            build.use_full_precision_uvs,
        );

        diagnostics.vertex_count = vertex_build.vertices.len();
        diagnostics.triangle_count = indices.len() / 3;
        diagnostics.timing = metrics.end();
        log::info!("LOD baked: {}", diagnostics.summary());

        // Reuse the vertex list; the wedge map stays with it.
        let wedge_map = std::mem::take(&mut vertex_build.wedge_map);
        Ok(LodRenderData {
            vertices: vertex_build.vertices,
            vertex_buffers,
            sections,
            index_buffer: IndexBuffer::from_indices(&indices),
            reversed_index_buffer: reversed.as_deref().map(IndexBuffer::from_indices),
            depth_only_index_buffer: IndexBuffer::from_indices(&depth_only),
            reversed_depth_only_index_buffer: reversed_depth_only.as_deref().map(IndexBuffer::from_indices),
            wireframe_index_buffer: IndexBuffer::from_indices(&wireframe),
            adjacency_index_buffer: adjacency.as_deref().map(IndexBuffer::from_indices),
            wedge_map,
            num_uv_channels: vertex_build.num_uv_channels,
            bounds,
            bounding_sphere,
            diagnostics,
        })
    }

    /// Bakes every LOD in `settings`. LOD `i` reads `sources[i]` when present;
    /// LODs without their own source reduce from LOD0's. A missing LOD0 fails
    /// every entry. Results are independent: one failing LOD does not stop
    /// the others.
    #[must_use]
    pub fn build_all(
        sources: &[MeshGraph],
        settings: &PipelineSettings,
        reducer: &dyn MeshReducer,
    ) -> Vec<BakeResult<LodRenderData>> {
        let reductions = settings.reduction_settings();
        let lod_count = reductions.len().max(1);
        (0..lod_count)
            .map(|lod| {
                let resolved = if reductions.is_empty() {
                    None
                } else {
                    Some(resolve_reduction_settings(&reductions, lod)?)
                };
                let (reduction, source_lod, warning) = match resolved {
                    Some(r) => (r.settings, r.source_lod, r.warning),
                    None => (ReductionSettings::default(), lod, None),
                };
                let source = match sources.get(source_lod) {
                    Some(mesh) => mesh,
                    None if source_lod == 0 => return Err(BakeError::MissingSourceLod { lod: 0 }),
                    None => sources.first().ok_or(BakeError::MissingSourceLod { lod: 0 })?,
                };
                log::info!("building LOD{lod} from LOD{source_lod} source");
                let mut data = Self::build_lod(source, &settings.build, &reduction, reducer)?;
                if let Some(warning) = warning {
                    data.diagnostics.warnings.insert(0, warning);
                }
                Ok(data)
            })
            .collect()
    }
}

/// After reduction the rebuilt mesh carries reducer-interpolated bases.
/// Tangents are always regenerated; normals only when the LOD asks for it,
/// in which case hard edges are re-derived from the face angle threshold.
fn refresh_reduced_basis(
    mesh: &mut MeshGraph,
    build: &BuildSettings,
    reduction: &ReductionSettings,
    diagnostics: &mut BakeDiagnostics,
) {
    if reduction.recalculate_normals {
        for (_, instance) in mesh.vertex_instances_mut() {
            instance.normal = Vec3::ZERO;
        }
        mesh.ensure_triangulated();
        compute_polygon_ntb(mesh, Tolerance::THRESH_POINTS_ARE_SAME);
        let hard = apply_hard_angle_threshold(mesh, reduction.hard_angle_threshold);
        log::debug!("{hard} edges hard above {:.1} degrees", reduction.hard_angle_threshold);
    }
    for (_, instance) in mesh.vertex_instances_mut() {
        instance.tangent = Vec3::ZERO;
        instance.binormal_sign = 1.0;
    }
    let options = build.ntb_options().with_recompute_normals(false).with_recompute_tangents(false);
    synthesize_normals_and_tangents(mesh, &options, diagnostics);
}

/// Marks each two-sided edge hard when its polygons' normals differ by more
/// than `degrees`, soft otherwise. Returns the number of hard edges.
pub fn apply_hard_angle_threshold(mesh: &mut MeshGraph, degrees: f32) -> usize {
    let cos_threshold = degrees.to_radians().cos();
    let decisions: Vec<_> = mesh
        .edge_ids()
        .filter_map(|edge| {
            let polygons = mesh.connected_polygons_of_edge(edge);
            if polygons.len() != 2 {
                return None;
            }
            let normal = |p| mesh.polygon(p).map_or(Vec3::ZERO, |polygon| polygon.normal);
            let (a, b) = (normal(polygons[0]), normal(polygons[1]));
            Some((edge, a.dot(b) < cos_threshold))
        })
        .collect();
    let mut hard = 0;
    for (edge, is_hard) in decisions {
        if let Some(e) = mesh.edge_mut(edge) {
            e.is_hard = is_hard;
            hard += usize::from(is_hard);
        }
    }
    hard
}
