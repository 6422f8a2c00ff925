mod allocator2d;
mod cache_optimize;
mod components;
mod core;
mod diagnostics;
mod edge_collapse;
mod error;
mod ids;
mod index_buffer;
mod layout_uv;
mod mesh_graph;
mod metrics;
mod mikktspace;
mod ntb;
mod overlap;
mod parallel;
mod pipeline;
pub mod primitives;
mod reduction;
mod smoothing;
mod snapshot;
mod vertex_buffer;
mod weld;

pub use allocator2d::{Allocator2D, Footprint};
pub use cache_optimize::{
    CACHE_OPTIMIZE_VERTEX_CEILING, CacheOptimizeStrategy, average_cache_miss_ratio, first_use_remap,
    optimize_for_cache,
};
pub use components::{component_labels, connected_components};
pub use self::core::{
    BBox, BoundingSphere, LinearColor, MAX_UV_CHANNELS, Matrix3, Tolerance, Vec2, Vec3, basis_determinant_sign,
    create_orthonormal_basis,
};
pub use diagnostics::{BakeDiagnostics, BakeWarning};
pub use edge_collapse::EdgeCollapseReducer;
pub use error::{BakeError, BakeResult};
pub use ids::{EdgeId, PolygonGroupId, PolygonId, VertexId, VertexInstanceId};
pub use index_buffer::{
    AdjacencyBuilder, IndexBuffer, IndexWidth, MAX_16BIT_INDEX, MeshSection, PnAenAdjacency,
    build_depth_only_indices, build_reversed_indices, build_wireframe_indices,
};
pub use layout_uv::{
    Chart, ChartPlacement, ChartSide, LayoutError, LayoutOutcome, LayoutUv, LightmapUvVersion,
    create_lightmap_uv_layout, generate_unique_uvs,
};
pub use mesh_graph::{
    CompactionRemap, Edge, MeshGraph, MeshGraphError, Polygon, PolygonGroup, Triangle, Vertex, VertexInstance,
};
pub use metrics::{BakeMetrics, BakeTimingReport, TimingBucket};
pub use mikktspace::{MikktspaceError, compute_mikktspace_tangents};
pub use ntb::{
    NtbOptions, PolygonNtbStats, VertexNtbStats, compute_polygon_ntb, compute_vertex_instance_ntb,
    synthesize_normals_and_tangents, triangle_basis,
};
pub use overlap::{OverlappingCorners, projection_key};
pub use parallel::{chunked_map_reduce, compute_bounding_sphere, compute_bounds, fill_indexed};
pub use pipeline::{
    BuildSettings, LodRenderData, LodSettings, Pipeline, PipelineSettings, apply_hard_angle_threshold,
};
pub use reduction::{
    ImportanceLevel, MIN_RESULT_TRIANGLES, MeshReducer, PassthroughReducer, ReductionBridge, ReductionBuffer,
    ReductionError, ReductionInput, ReductionOutcome, ReductionSettings, ReductionVertex, ResolvedReduction,
    TerminationCriterion, attribute_weights, resolve_reduction_settings,
};
pub use smoothing::{convert_hard_edges_to_smooth_group, convert_smooth_group_to_hard_edges};
pub use snapshot::{SNAPSHOT_DECIMALS, SNAPSHOT_QUANTIZE, lod_snapshot, write_obj};
pub use vertex_buffer::{
    INDEX_NONE, PackedNormal8, PackedNormal16, PackedTangentBasis, PackedUvs, SectionIndices,
    StaticMeshBuildVertex, StaticMeshVertexBuffers, VertexBufferBuild, VertexBufferBuilder, VertexBufferOptions,
    VertexBufferStats, pack_vertex_buffers,
};
pub use weld::{DedupOutcome, WeldResult, dedup_positions, dedup_vertex_positions, weld_positions};

#[cfg(test)]
mod tests;
