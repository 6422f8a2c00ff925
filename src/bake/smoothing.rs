//! Conversions between per-edge hardness and per-polygon smoothing masks.
//!
//! A smoothing mask is a `u32` bit set. Two polygons sharing an edge are
//! smoothed across it when their masks intersect.

use std::collections::HashMap;

use super::ids::{EdgeId, PolygonId};
use super::mesh_graph::MeshGraph;

/// Assigns smoothing masks, indexed by polygon arena index (deleted slots get
/// `0`). Polygons reached through soft edges inherit their neighbors' bits;
/// a polygon with a hard neighbor picks the lowest bit that neighbor and its
/// already-visited soft neighbors do not use.
#[must_use]
pub fn convert_hard_edges_to_smooth_group(mesh: &MeshGraph) -> Vec<u32> {
    let size = mesh.polygon_array_size();
    let mut masks = vec![0u32; size];
    let mut consumed = vec![false; size];
    let mut avoidances: HashMap<PolygonId, u32> = HashMap::new();

    for seed in mesh.polygon_ids() {
        if consumed[seed.index()] {
            continue;
        }
        let mut stack: Vec<(PolygonId, Option<PolygonId>)> = vec![(seed, None)];
        while let Some((current, previous)) = stack.pop() {
            if consumed[current.index()] {
                continue;
            }
            let previous_mask = previous.map_or(0, |p| masks[p.index()]);
            let mut avoid = 0u32;
            let mut neighbor_mask = 0u32;
            let mut soft_neighbors: Vec<PolygonId> = Vec::new();

            for edge in mesh.polygon_perimeter_edges(current) {
                let hard = mesh.edge(edge).is_some_and(|e| e.is_hard);
                for &other in mesh.connected_polygons_of_edge(edge) {
                    if other == current {
                        continue;
                    }
                    let value = masks[other.index()];
                    if hard {
                        avoid |= value;
                    } else {
                        neighbor_mask |= value;
                        if consumed[other.index()] {
                            soft_neighbors.push(other);
                        } else {
                            stack.push((other, Some(current)));
                        }
                    }
                }
            }

            if avoid != 0 {
                avoidances.insert(current, avoid);
                for neighbor in &soft_neighbors {
                    if let Some(&a) = avoidances.get(neighbor) {
                        avoid |= a;
                    }
                }
                let mut bit = 1u32;
                while bit & avoid != 0 && bit != 1 << 31 {
                    bit <<= 1;
                }
                masks[current.index()] = bit;
                for neighbor in soft_neighbors {
                    masks[neighbor.index()] |= bit;
                }
            } else if neighbor_mask != 0 {
                masks[current.index()] |= previous_mask | neighbor_mask;
            } else {
                masks[current.index()] = 1;
            }
            consumed[current.index()] = true;
        }
    }
    masks
}

/// Marks an edge hard wherever the masks of two polygons across a soft edge
/// share no bit. `masks` is indexed by polygon arena index; missing entries
/// count as `0`. Existing hard edges are kept.
pub fn convert_smooth_group_to_hard_edges(masks: &[u32], mesh: &mut MeshGraph) -> usize {
    let mask_of = |p: PolygonId| masks.get(p.index()).copied().unwrap_or(0);
    let mut consumed = vec![false; mesh.polygon_array_size()];
    let mut to_harden: Vec<EdgeId> = Vec::new();
    let mut hardened: Vec<bool> = Vec::new();
    let polygons: Vec<PolygonId> = mesh.polygon_ids().collect();

    for seed in polygons {
        if consumed[seed.index()] {
            continue;
        }
        let mut stack = vec![seed];
        while let Some(current) = stack.pop() {
            if consumed[current.index()] {
                continue;
            }
            let reference = mask_of(current);
            for edge in mesh.polygon_perimeter_edges(current) {
                if hardened.get(edge.index()).copied().unwrap_or(false)
                    || mesh.edge(edge).is_none_or(|e| e.is_hard)
                {
                    continue;
                }
                for &other in mesh.connected_polygons_of_edge(edge) {
                    if other == current || consumed[other.index()] {
                        continue;
                    }
                    if mask_of(other) & reference == 0 {
                        if hardened.len() <= edge.index() {
                            hardened.resize(edge.index() + 1, false);
                        }
                        hardened[edge.index()] = true;
                        to_harden.push(edge);
                        break;
                    }
                    stack.push(other);
                }
            }
            consumed[current.index()] = true;
        }
    }

    for &edge in &to_harden {
        if let Some(e) = mesh.edge_mut(edge) {
            e.is_hard = true;
        }
    }
    log::debug!("smoothing masks: {} edges marked hard", to_harden.len());
    to_harden.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bake::core::Vec3;
    use crate::bake::ids::{VertexId, VertexInstanceId};

    /// Unit cube with one vertex instance per face corner.
    fn cube() -> MeshGraph {
        let mut mesh = MeshGraph::new();
        let group = mesh.create_polygon_group("cube");
        let v: Vec<VertexId> = (0..8)
            .map(|i| mesh.create_vertex(Vec3::new((i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32)))
            .collect();
        let faces = [[0, 2, 3, 1], [4, 5, 7, 6], [0, 1, 5, 4], [2, 6, 7, 3], [0, 4, 6, 2], [1, 3, 7, 5]];
        for face in faces {
            let corners: Vec<VertexInstanceId> =
                face.iter().map(|&i| mesh.create_vertex_instance(v[i]).unwrap()).collect();
            mesh.create_polygon(group, &corners).unwrap();
        }
        mesh
    }

    #[test]
    fn all_soft_edges_share_one_group() {
        let masks = convert_hard_edges_to_smooth_group(&cube());
        assert!(masks.iter().all(|&m| m == 1));
    }

    #[test]
    fn hard_edges_separate_adjacent_faces() {
        let mut mesh = cube();
        mesh.set_all_edges_hard(true);
        let masks = convert_hard_edges_to_smooth_group(&mesh);
        for edge in mesh.edge_ids() {
            let polygons = mesh.connected_polygons_of_edge(edge);
            assert_eq!(polygons.len(), 2);
            assert_eq!(masks[polygons[0].index()] & masks[polygons[1].index()], 0);
        }
    }

    #[test]
    fn masks_round_trip_to_hard_edges() {
        let mut hard = cube();
        hard.set_all_edges_hard(true);
        let masks = convert_hard_edges_to_smooth_group(&hard);

        let mut soft = cube();
        let marked = convert_smooth_group_to_hard_edges(&masks, &mut soft);
        assert_eq!(marked, 12);
        assert!(soft.edge_ids().all(|e| soft.edge(e).unwrap().is_hard));
    }
}
