//! Tests for normal, tangent and binormal synthesis.

use super::{assert_unit, cube, quad};
use crate::bake::{
    BakeDiagnostics, MeshGraph, NtbOptions, Vec2, Vec3, VertexInstanceId, compute_polygon_ntb,
    synthesize_normals_and_tangents, triangle_basis,
};

fn synthesize(mesh: &mut MeshGraph, options: &NtbOptions) -> BakeDiagnostics {
    let mut diagnostics = BakeDiagnostics::new();
    synthesize_normals_and_tangents(mesh, options, &mut diagnostics);
    diagnostics
}

#[test]
fn triangle_basis_follows_uv_axes() {
    let p = [Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0), Vec3::new(1.0, 1.0, 0.0)];
    let uv = [Vec2::new(0.0, 0.0), Vec2::new(0.0, 1.0), Vec2::new(1.0, 1.0)];
    let (tangent, binormal, normal, singular) = triangle_basis(p, uv, 1e-6).expect("triangle has area");
    assert!(!singular);
    assert!(normal.equals(Vec3::Z, 1e-5), "normal {normal:?}");
    assert!(tangent.equals(Vec3::X, 1e-5), "tangent {tangent:?}");
    assert!(binormal.equals(Vec3::Y, 1e-5), "binormal {binormal:?}");
}

#[test]
fn triangle_basis_rejects_collinear_corners() {
    let p = [Vec3::ZERO, Vec3::X, Vec3::X * 2.0];
    assert!(triangle_basis(p, [Vec2::ZERO; 3], 1e-6).is_none());
}

#[test]
fn quad_gets_facing_normals_and_u_tangents() {
    let mut mesh = quad();
    let diagnostics = synthesize(&mut mesh, &NtbOptions::default());
    assert_eq!(diagnostics.degenerate_polygon_count, 0);
    assert_eq!(diagnostics.singular_uv_polygon_count, 0);

    for (_, instance) in mesh.vertex_instances() {
        assert!(instance.normal.equals(Vec3::Z, 1e-4), "normal {:?}", instance.normal);
        assert_unit(instance.tangent);
        assert!(instance.tangent.dot(Vec3::X) > 0.99, "tangent {:?}", instance.tangent);
        assert!(instance.tangent.dot(instance.normal).abs() < 1e-3);
        assert!(instance.binormal_sign == 1.0 || instance.binormal_sign == -1.0);
    }
}

#[test]
fn hard_cube_normals_match_faces() {
    let mut mesh = cube(true);
    synthesize(&mut mesh, &NtbOptions::default());

    let center = Vec3::new(0.5, 0.5, 0.5);
    for (_, polygon) in mesh.polygons() {
        let face_center = polygon
            .perimeter()
            .iter()
            .fold(Vec3::ZERO, |acc, &vi| acc + mesh.instance_position(vi))
            * 0.25;
        let outward = (face_center - center) * 2.0;
        assert!(polygon.normal.equals(outward, 1e-4), "face normal {:?} vs {outward:?}", polygon.normal);
        for &vi in polygon.perimeter() {
            let instance = mesh.vertex_instance(vi).expect("live instance");
            assert!(instance.normal.equals(polygon.normal, 1e-4));
            assert_unit(instance.tangent);
        }
    }
}

#[test]
fn soft_cube_normals_point_along_diagonals() {
    let mut mesh = cube(false);
    synthesize(&mut mesh, &NtbOptions::default().with_mikk_tspace(false));

    let center = Vec3::new(0.5, 0.5, 0.5);
    for (id, instance) in mesh.vertex_instances() {
        let diagonal = (mesh.instance_position(id) - center).safe_normal(1e-8);
        assert!(instance.normal.equals(diagonal, 1e-4), "normal {:?} vs {diagonal:?}", instance.normal);
    }
}

#[test]
fn synthesis_is_idempotent() {
    let mut mesh = cube(true);
    let options = NtbOptions::default();
    synthesize(&mut mesh, &options);
    let first: Vec<_> = mesh.vertex_instances().map(|(_, vi)| vi.clone()).collect();

    let stats = synthesize(&mut mesh, &options);
    let second: Vec<_> = mesh.vertex_instances().map(|(_, vi)| vi.clone()).collect();
    assert_eq!(first, second);
    assert!(stats.warnings.is_empty() || cfg!(not(feature = "mikktspace")));
}

#[test]
fn authored_normals_survive_unless_recomputed() {
    let tilted = Vec3::new(0.0, 0.6, 0.8);
    let mut mesh = quad();
    let first: VertexInstanceId = mesh.vertex_instance_ids().next().expect("quad has corners");
    mesh.vertex_instance_mut(first).expect("live instance").normal = tilted;

    let mut kept = mesh.clone();
    synthesize(&mut kept, &NtbOptions::default().with_mikk_tspace(false));
    assert!(kept.vertex_instance(first).expect("live").normal.equals(tilted, 1e-6));

    synthesize(&mut mesh, &NtbOptions::default().with_recompute_normals(true).with_mikk_tspace(false));
    assert!(mesh.vertex_instance(first).expect("live").normal.equals(Vec3::Z, 1e-4));
}

#[test]
fn collapsed_uvs_are_counted_as_singular() {
    let mut mesh = quad();
    let ids: Vec<_> = mesh.vertex_instance_ids().collect();
    for vi in ids {
        mesh.vertex_instance_mut(vi).expect("live instance").uvs[0] = Vec2::new(0.5, 0.5);
    }
    let diagnostics = synthesize(&mut mesh, &NtbOptions::default().with_mikk_tspace(false));
    assert_eq!(diagnostics.singular_uv_polygon_count, 1);
    for (_, instance) in mesh.vertex_instances() {
        assert!(instance.normal.equals(Vec3::Z, 1e-4));
    }
}

#[test]
fn zero_area_polygon_is_degenerate() {
    let mut mesh = MeshGraph::new();
    let group = mesh.create_polygon_group("line");
    let corners: Vec<VertexInstanceId> = [Vec3::ZERO, Vec3::X, Vec3::X * 2.0]
        .into_iter()
        .map(|p| {
            let v = mesh.create_vertex(p);
            mesh.create_vertex_instance(v).expect("vertex exists")
        })
        .collect();
    mesh.create_polygon(group, &corners).expect("three corners");

    let stats = compute_polygon_ntb(&mut mesh, 1e-6);
    assert_eq!(stats.degenerate, 1);
    let polygon = mesh.polygon_ids().next().expect("one polygon");
    assert_eq!(mesh.polygon(polygon).expect("live").normal, Vec3::ZERO);
}
