use super::layout_uv::LayoutError;
use super::mesh_graph::MeshGraphError;
use super::reduction::ReductionError;

/// Pipeline-level failures. Degenerate geometry is never reported here; it is
/// skipped and counted in [`BakeDiagnostics`](super::BakeDiagnostics).
#[derive(Debug, thiserror::Error)]
pub enum BakeError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("resource limit exceeded: {reason}")]
    ResourceLimit { reason: String },

    #[error("source data for LOD{lod} is missing")]
    MissingSourceLod { lod: usize },

    #[error(transparent)]
    MeshGraph(#[from] MeshGraphError),

    #[error(transparent)]
    Reduction(#[from] ReductionError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("failed to parse settings: {0}")]
    Settings(String),
}

impl BakeError {
    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput { reason: reason.into() }
    }

    pub(crate) fn resource_limit(reason: impl Into<String>) -> Self {
        Self::ResourceLimit { reason: reason.into() }
    }
}

pub type BakeResult<T> = Result<T, BakeError>;
