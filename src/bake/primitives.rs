//! Small procedural meshes used by the scenario runner and the tests.
//!
//! Faces wind clockwise when seen from outside, matching the normal
//! convention of [`triangle_basis`](super::triangle_basis).

use std::f32::consts::TAU;

use super::core::{Vec2, Vec3};
use super::ids::{VertexId, VertexInstanceId};
use super::mesh_graph::{MeshGraph, MeshGraphError};

fn corner(mesh: &mut MeshGraph, vertex: VertexId, uv: Vec2) -> Result<VertexInstanceId, MeshGraphError> {
    let id = mesh.create_vertex_instance(vertex)?;
    if let Some(instance) = mesh.vertex_instance_mut(id) {
        instance.uvs[0] = uv;
    }
    Ok(id)
}

/// Unit quad in the XY plane facing +Z, UV0 equal to XY.
pub fn quad() -> Result<MeshGraph, MeshGraphError> {
    let mut mesh = MeshGraph::new();
    let group = mesh.create_polygon_group("quad");
    let mut corners = Vec::with_capacity(4);
    for [x, y] in [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]] {
        let v = mesh.create_vertex(Vec3::new(x, y, 0.0));
        corners.push(corner(&mut mesh, v, Vec2::new(x, y))?);
    }
    mesh.create_polygon(group, &corners)?;
    Ok(mesh)
}

/// Unit cube spanning `0..=1`, one instance per face corner and a full UV
/// square on every face. `hard` marks all twelve edges hard.
pub fn unit_box(hard: bool) -> Result<MeshGraph, MeshGraphError> {
    const FACES: [[usize; 4]; 6] = [[1, 3, 2, 0], [6, 7, 5, 4], [4, 5, 1, 0], [3, 7, 6, 2], [2, 6, 4, 0], [5, 7, 3, 1]];

    let mut mesh = MeshGraph::new();
    let group = mesh.create_polygon_group("cube");
    let v: Vec<VertexId> = (0..8)
        .map(|i| mesh.create_vertex(Vec3::new((i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32)))
        .collect();
    let uvs = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)];
    for face in FACES {
        let mut corners = Vec::with_capacity(4);
        for (&i, uv) in face.iter().zip(uvs) {
            corners.push(corner(&mut mesh, v[i], uv)?);
        }
        mesh.create_polygon(group, &corners)?;
    }
    if hard {
        mesh.set_all_edges_hard(true);
    }
    Ok(mesh)
}

/// `n` x `n` quads over the unit square facing +Z. Neighboring cells share
/// one instance per vertex; UV0 equals XY.
pub fn grid(n: usize) -> Result<MeshGraph, MeshGraphError> {
    let n = n.max(1);
    let mut mesh = MeshGraph::new();
    let group = mesh.create_polygon_group("grid");
    let step = 1.0 / n as f32;
    let mut instances = Vec::with_capacity((n + 1) * (n + 1));
    for y in 0..=n {
        for x in 0..=n {
            let p = Vec3::new(x as f32 * step, y as f32 * step, 0.0);
            let v = mesh.create_vertex(p);
            instances.push(corner(&mut mesh, v, Vec2::new(p.x, p.y))?);
        }
    }
    let at = |x: usize, y: usize| instances[y * (n + 1) + x];
    for y in 0..n {
        for x in 0..n {
            mesh.create_polygon(group, &[at(x, y), at(x, y + 1), at(x + 1, y + 1), at(x + 1, y)])?;
        }
    }
    Ok(mesh)
}

/// Capped cylinder around +Z with `segments` side quads and two n-gon caps.
/// Sides share instances except along the UV seam; the rim edges are hard.
pub fn cylinder(segments: usize, radius: f32, height: f32) -> Result<MeshGraph, MeshGraphError> {
    let n = segments.max(3);
    let mut mesh = MeshGraph::new();
    let sides = mesh.create_polygon_group("sides");
    let caps = mesh.create_polygon_group("caps");

    let ring = |i: usize| {
        let angle = TAU * i as f32 / n as f32;
        (angle.cos(), angle.sin())
    };
    let bottom: Vec<VertexId> = (0..n)
        .map(|i| {
            let (c, s) = ring(i);
            mesh.create_vertex(Vec3::new(c * radius, s * radius, 0.0))
        })
        .collect();
    let top: Vec<VertexId> = (0..n)
        .map(|i| {
            let (c, s) = ring(i);
            mesh.create_vertex(Vec3::new(c * radius, s * radius, height))
        })
        .collect();

    // Column n repeats column 0 with u = 1.
    let mut bottom_side = Vec::with_capacity(n + 1);
    let mut top_side = Vec::with_capacity(n + 1);
    for k in 0..=n {
        let u = k as f32 / n as f32;
        bottom_side.push(corner(&mut mesh, bottom[k % n], Vec2::new(u, 0.0))?);
        top_side.push(corner(&mut mesh, top[k % n], Vec2::new(u, 1.0))?);
    }
    for k in 0..n {
        mesh.create_polygon(sides, &[bottom_side[k], top_side[k], top_side[k + 1], bottom_side[k + 1]])?;
    }

    let cap_uv = |i: usize| {
        let (c, s) = ring(i);
        Vec2::new(0.5 + 0.5 * c, 0.5 + 0.5 * s)
    };
    let mut bottom_cap = Vec::with_capacity(n);
    for i in 0..n {
        bottom_cap.push(corner(&mut mesh, bottom[i], cap_uv(i))?);
    }
    mesh.create_polygon(caps, &bottom_cap)?;
    let mut top_cap = Vec::with_capacity(n);
    for i in (0..n).rev() {
        top_cap.push(corner(&mut mesh, top[i], cap_uv(i))?);
    }
    mesh.create_polygon(caps, &top_cap)?;

    for i in 0..n {
        let j = (i + 1) % n;
        mesh.set_edge_hard(bottom[i], bottom[j], true);
        mesh.set_edge_hard(top[i], top[j], true);
    }
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cylinder_counts() {
        let mesh = cylinder(8, 1.0, 2.0).expect("valid cylinder");
        assert_eq!(mesh.num_vertices(), 16);
        assert_eq!(mesh.num_polygons(), 10);
        assert_eq!(mesh.num_vertex_instances(), 2 * 9 + 2 * 8);
        assert_eq!(mesh.num_triangles(), 8 * 2 + 2 * 6);
        let hard = mesh.edge_ids().filter(|&e| mesh.edge(e).is_some_and(|e| e.is_hard)).count();
        assert_eq!(hard, 16);
        mesh.validate().expect("consistent");
    }

    #[test]
    fn grid_clamps_to_one_cell() {
        let mesh = grid(0).expect("valid grid");
        assert_eq!(mesh.num_polygons(), 1);
    }
}
