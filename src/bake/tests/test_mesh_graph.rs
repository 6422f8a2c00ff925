//! Tests for the mesh description graph.

use super::{cube, grid, quad};
use crate::bake::{MAX_UV_CHANNELS, MeshGraph, MeshGraphError, Vec2, Vec3, VertexInstanceId};

#[test]
fn quad_has_expected_element_counts() {
    let mesh = quad();
    assert_eq!(mesh.num_vertices(), 4);
    assert_eq!(mesh.num_vertex_instances(), 4);
    assert_eq!(mesh.num_edges(), 4);
    assert_eq!(mesh.num_polygons(), 1);
    assert_eq!(mesh.num_triangles(), 2);
    mesh.validate().expect("quad is consistent");
}

#[test]
fn cube_edges_are_shared_by_two_faces() {
    let mesh = cube(false);
    assert_eq!(mesh.num_vertices(), 8);
    assert_eq!(mesh.num_vertex_instances(), 24);
    assert_eq!(mesh.num_edges(), 12);
    for edge in mesh.edge_ids() {
        assert_eq!(mesh.connected_polygons_of_edge(edge).len(), 2);
    }
    for v in mesh.vertex_ids() {
        assert_eq!(mesh.polygons_of_vertex(v).len(), 3);
        assert_eq!(mesh.connected_edges_of_vertex(v).len(), 3);
    }
    mesh.validate().expect("cube is consistent");
}

#[test]
fn pentagon_triangulates_into_three_triangles() {
    let mut mesh = MeshGraph::new();
    let group = mesh.create_polygon_group("pentagon");
    let corners: Vec<VertexInstanceId> = (0..5)
        .map(|i| {
            let angle = -(i as f32) * std::f32::consts::TAU / 5.0;
            let v = mesh.create_vertex(Vec3::new(angle.cos(), angle.sin(), 0.0));
            mesh.create_vertex_instance(v).expect("vertex exists")
        })
        .collect();
    let polygon = mesh.create_polygon(group, &corners).expect("valid pentagon");

    assert_eq!(mesh.triangles(polygon).len(), 3);
    assert_eq!(mesh.polygon_perimeter_edges(polygon).len(), 5);
    for triangle in mesh.triangles(polygon) {
        assert!(triangle.corners.iter().all(|c| corners.contains(c)));
    }
}

#[test]
fn polygon_needs_three_corners() {
    let mut mesh = MeshGraph::new();
    let group = mesh.create_polygon_group("bad");
    let a = mesh.create_vertex(Vec3::ZERO);
    let b = mesh.create_vertex(Vec3::X);
    let corners = [mesh.create_vertex_instance(a).expect("a"), mesh.create_vertex_instance(b).expect("b")];
    assert_eq!(mesh.create_polygon(group, &corners), Err(MeshGraphError::TooFewCorners { corners: 2 }));
}

#[test]
fn delete_polygon_removes_orphans_and_compact_closes_holes() {
    let mut mesh = grid(2);
    let first = mesh.polygon_ids().next().expect("grid has polygons");
    mesh.delete_polygon(first, true).expect("polygon exists");

    assert_eq!(mesh.num_polygons(), 3);
    // Only the corner vertex at the origin belonged to nothing else.
    assert_eq!(mesh.num_vertices(), 8);
    assert!(mesh.has_holes());
    mesh.validate().expect("still consistent after delete");

    let remap = mesh.compact();
    assert!(!mesh.has_holes());
    assert_eq!(remap.polygons[first.index()], None);
    assert_eq!(mesh.polygon_array_size(), 3);
    assert_eq!(mesh.vertex_instance_array_size(), mesh.num_vertex_instances());
    mesh.validate().expect("consistent after compaction");
}

#[test]
fn delete_group_deletes_its_polygons() {
    let mut mesh = cube(false);
    let group = mesh.polygon_group_ids().next().expect("cube has a group");
    mesh.delete_polygon_group(group).expect("group exists");
    assert!(mesh.is_empty());
    assert_eq!(mesh.num_polygon_groups(), 0);
}

#[test]
fn moving_a_vertex_dirties_its_polygons() {
    let mut mesh = grid(2);
    let center = mesh
        .vertex_ids()
        .find(|&v| mesh.vertex_position(v).equals(Vec3::new(0.5, 0.5, 0.0), 1e-6))
        .expect("grid has a center vertex");
    mesh.set_vertex_position(center, Vec3::new(0.5, 0.5, 0.25)).expect("vertex exists");
    assert_eq!(mesh.ensure_triangulated(), 4);
    assert_eq!(mesh.ensure_triangulated(), 0);
}

#[test]
fn uv_channels_are_bounded() {
    assert_eq!(
        MeshGraph::with_uv_channels(MAX_UV_CHANNELS + 1).err(),
        Some(MeshGraphError::TooManyUvChannels { max: MAX_UV_CHANNELS })
    );

    let mut mesh = quad();
    assert_eq!(mesh.remove_uv_channel(0), Err(MeshGraphError::LastUvChannel));

    mesh.ensure_uv_channel(MAX_UV_CHANNELS - 1).expect("within the limit");
    assert_eq!(mesh.num_uv_channels(), MAX_UV_CHANNELS);
    assert!(mesh.add_uv_channel().is_err());
    for (_, instance) in mesh.vertex_instances() {
        assert_eq!(instance.uvs.len(), MAX_UV_CHANNELS);
    }
}

#[test]
fn inserting_a_channel_shifts_existing_uvs() {
    let mut mesh = quad();
    mesh.insert_uv_channel(0).expect("room for a channel");
    assert_eq!(mesh.num_uv_channels(), 2);
    for (id, instance) in mesh.vertex_instances() {
        let p = mesh.instance_position(id);
        assert_eq!(instance.uv(0), Vec2::ZERO);
        assert_eq!(instance.uv(1), Vec2::new(p.x, p.y));
    }
}

#[test]
fn hard_edges_are_set_by_vertex_pair() {
    let mut mesh = quad();
    let [a, b] = {
        let e = mesh.edge_ids().next().expect("quad has edges");
        mesh.edge(e).expect("live edge").vertices()
    };
    let edge = mesh.set_edge_hard(a, b, true).expect("edge exists");
    assert!(mesh.edge(edge).expect("live edge").is_hard);
    assert_eq!(mesh.edge_ids().filter(|&e| mesh.edge(e).is_some_and(|e| e.is_hard)).count(), 1);
}
