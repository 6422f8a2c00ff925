//! Shared fixtures for the bake stage tests.

mod test_layout_uv;
mod test_mesh_graph;
mod test_ntb;
mod test_pipeline;

use crate::bake::{MeshGraph, Vec3, primitives};

/// Unit quad in the XY plane facing +Z, UV0 equal to XY.
pub(super) fn quad() -> MeshGraph {
    primitives::quad().expect("valid quad")
}

/// Unit cube with outward faces, one instance per face corner and a full
/// 0..1 UV square on every face. `hard` marks all twelve edges hard.
pub(super) fn cube(hard: bool) -> MeshGraph {
    primitives::unit_box(hard).expect("valid cube")
}

/// `n` x `n` quads over the unit square facing +Z.
pub(super) fn grid(n: usize) -> MeshGraph {
    primitives::grid(n).expect("valid grid")
}

pub(super) fn assert_unit(v: Vec3) {
    assert!((v.length() - 1.0).abs() < 1e-3, "expected unit vector, got {v:?}");
}
