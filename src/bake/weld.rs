//! Position welding and de-duplication.
//!
//! [`weld_positions`] merges points closer than a tolerance using a hash grid
//! whose cell equals the tolerance, probing the 27 cells around each point.
//! [`dedup_vertex_positions`] produces the "no-duplicate" mesh variant handed
//! to reduction, where no two vertices share a position.

use std::collections::HashMap;

use super::core::{Tolerance, Vec3};
use super::ids::{PolygonGroupId, VertexId, VertexInstanceId};
use super::mesh_graph::{MeshGraph, MeshGraphError};
use super::overlap::projection_key;

#[derive(Debug, Clone, PartialEq)]
pub struct WeldResult {
    pub positions: Vec<Vec3>,
    /// Input index to output index.
    pub remap: Vec<u32>,
    /// Number of input points merged into an earlier one.
    pub welded: usize,
}

/// Quantizes a coordinate to a grid cell, `None` for non-finite values.
fn quantize(value: f32, inv: f32) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    let q = (f64::from(value) * f64::from(inv)).floor();
    Some(q.clamp(i64::MIN as f64, i64::MAX as f64) as i64)
}

/// Welds points within `tol.eps` of an earlier kept point. First occurrences
/// are kept in input order. A non-positive or non-finite tolerance welds
/// nothing, and non-finite points are never welded.
#[must_use]
pub fn weld_positions(positions: &[Vec3], tol: Tolerance) -> WeldResult {
    if !tol.eps.is_finite() || tol.eps <= 0.0 {
        return WeldResult {
            positions: positions.to_vec(),
            remap: (0..positions.len() as u32).collect(),
            welded: 0,
        };
    }

    let inv = 1.0 / tol.eps;
    let mut buckets: HashMap<(i64, i64, i64), Vec<u32>> = HashMap::new();
    let mut remap = Vec::with_capacity(positions.len());
    let mut out: Vec<Vec3> = Vec::with_capacity(positions.len());

    for &p in positions {
        let key = match (quantize(p.x, inv), quantize(p.y, inv), quantize(p.z, inv)) {
            (Some(kx), Some(ky), Some(kz)) => Some((kx, ky, kz)),
            _ => None,
        };

        let found = key.and_then(|(kx, ky, kz)| {
            (-1i64..=1)
                .flat_map(|dx| (-1i64..=1).flat_map(move |dy| (-1i64..=1).map(move |dz| (dx, dy, dz))))
                .filter_map(|(dx, dy, dz)| buckets.get(&(kx + dx, ky + dy, kz + dz)))
                .flatten()
                .copied()
                .find(|&candidate| tol.points_equal(out[candidate as usize], p))
        });

        let index = if let Some(existing) = found {
            existing
        } else {
            let index = out.len() as u32;
            out.push(p);
            if let Some(key) = key {
                buckets.entry(key).or_default().push(index);
            }
            index
        };
        remap.push(index);
    }

    let welded = positions.len() - out.len();
    log::debug!("weld: {} points, {welded} welded (tolerance {})", positions.len(), tol.eps);
    WeldResult { positions: out, remap, welded }
}

/// Groups exactly coincident points (within [`Tolerance::SMALL_NUMBER`]).
/// Returns a remap to dense unique indices, numbered in sorted-key order,
/// and the unique count.
#[must_use]
pub fn dedup_positions(positions: &[Vec3]) -> (Vec<u32>, usize) {
    let mut keyed: Vec<(f32, usize)> = positions.iter().enumerate().map(|(i, &p)| (projection_key(p), i)).collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut remap = vec![u32::MAX; positions.len()];
    let mut count = 0u32;
    for i in 0..keyed.len() {
        let (zi, a) = keyed[i];
        if remap[a] != u32::MAX {
            continue;
        }
        remap[a] = count;
        for &(zj, b) in &keyed[i + 1..] {
            if (zj - zi).abs() > Tolerance::SMALL_NUMBER {
                break;
            }
            if remap[b] == u32::MAX && positions[a].equals(positions[b], Tolerance::SMALL_NUMBER) {
                remap[b] = count;
            }
        }
        count += 1;
    }
    (remap, count as usize)
}

#[derive(Debug, Clone)]
pub struct DedupOutcome {
    pub mesh: MeshGraph,
    /// Vertices merged into another with the same position.
    pub merged_vertices: usize,
    /// Polygons dropped because two corners collapsed onto one vertex.
    pub dropped_polygons: usize,
}

/// Rebuilds `mesh` so that no two vertices share a position. Vertex order
/// follows the first occurrence in the source, so a mesh without duplicates
/// comes back unchanged apart from compaction.
pub fn dedup_vertex_positions(mesh: &MeshGraph) -> Result<DedupOutcome, MeshGraphError> {
    let vertex_ids: Vec<VertexId> = mesh.vertex_ids().collect();
    let positions: Vec<Vec3> = vertex_ids.iter().map(|&v| mesh.vertex_position(v)).collect();
    let (unique_of, unique_count) = dedup_positions(&positions);

    let mut out = MeshGraph::with_uv_channels(mesh.num_uv_channels())?;

    let mut group_map: HashMap<PolygonGroupId, PolygonGroupId> = HashMap::new();
    for group_id in mesh.polygon_group_ids() {
        let name = mesh.polygon_group(group_id).map(|g| g.material_slot_name.clone()).unwrap_or_default();
        group_map.insert(group_id, out.create_polygon_group(name));
    }

    let mut created: Vec<Option<VertexId>> = vec![None; unique_count];
    let mut vertex_map: HashMap<VertexId, VertexId> = HashMap::with_capacity(vertex_ids.len());
    for (i, &old) in vertex_ids.iter().enumerate() {
        let slot = &mut created[unique_of[i] as usize];
        let new = *slot.get_or_insert_with(|| out.create_vertex(positions[i]));
        vertex_map.insert(old, new);
    }

    let mut instance_map: HashMap<VertexInstanceId, VertexInstanceId> = HashMap::new();
    for (old_id, instance) in mesh.vertex_instances() {
        let Some(&vertex) = vertex_map.get(&instance.vertex()) else { continue };
        let new_id = out.create_vertex_instance(vertex)?;
        if let Some(target) = out.vertex_instance_mut(new_id) {
            target.normal = instance.normal;
            target.tangent = instance.tangent;
            target.binormal_sign = instance.binormal_sign;
            target.color = instance.color;
            target.uvs.clone_from(&instance.uvs);
        }
        instance_map.insert(old_id, new_id);
    }

    let mut dropped_polygons = 0;
    for (_, polygon) in mesh.polygons() {
        let perimeter: Vec<VertexInstanceId> =
            polygon.perimeter().iter().filter_map(|vi| instance_map.get(vi).copied()).collect();
        let mut corner_vertices: Vec<VertexId> =
            perimeter.iter().filter_map(|&vi| out.vertex_instance_vertex(vi)).collect();
        corner_vertices.sort_unstable();
        corner_vertices.dedup();
        let Some(&group) = group_map.get(&polygon.group()) else { continue };
        if perimeter.len() < 3 || corner_vertices.len() != perimeter.len() {
            dropped_polygons += 1;
            continue;
        }
        out.create_polygon(group, &perimeter)?;
    }

    for edge_id in mesh.edge_ids() {
        let Some(edge) = mesh.edge(edge_id) else { continue };
        let [a, b] = edge.vertices();
        let (Some(&na), Some(&nb)) = (vertex_map.get(&a), vertex_map.get(&b)) else { continue };
        if na == nb || !(edge.is_hard || edge.crease_sharpness != 0.0) {
            continue;
        }
        let Some(target) = out.vertex_pair_edge(na, nb).and_then(|e| out.edge_mut(e)) else { continue };
        target.is_hard |= edge.is_hard;
        target.crease_sharpness = target.crease_sharpness.max(edge.crease_sharpness);
    }

    let merged_vertices = vertex_ids.len() - unique_count;
    if merged_vertices > 0 || dropped_polygons > 0 {
        log::debug!("dedup: merged {merged_vertices} vertices, dropped {dropped_polygons} polygons");
    }
    Ok(DedupOutcome { mesh: out, merged_vertices, dropped_polygons })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weld_merges_within_tolerance_across_cells() {
        let tol = Tolerance::new(0.01);
        // 0.0099 and 0.0101 fall in different grid cells but are 2e-4 apart.
        let points = [Vec3::new(0.0099, 0.0, 0.0), Vec3::new(0.0101, 0.0, 0.0), Vec3::X];
        let result = weld_positions(&points, tol);
        assert_eq!(result.positions.len(), 2);
        assert_eq!(result.remap, vec![0, 0, 1]);
        assert_eq!(result.welded, 1);
    }

    #[test]
    fn weld_with_zero_tolerance_is_identity() {
        let points = [Vec3::ZERO, Vec3::ZERO];
        let result = weld_positions(&points, Tolerance::EXACT);
        assert_eq!(result.remap, vec![0, 1]);
        assert_eq!(result.welded, 0);
    }

    #[test]
    fn weld_keeps_nan_points_separate() {
        let nan = Vec3::new(f32::NAN, 0.0, 0.0);
        let result = weld_positions(&[nan, nan], Tolerance::POINTS);
        assert_eq!(result.positions.len(), 2);
    }

    #[test]
    fn dedup_positions_groups_exact_duplicates() {
        let points = [Vec3::ONE, Vec3::ZERO, Vec3::ONE, Vec3::new(1.0, 1.0, 1.001)];
        let (remap, count) = dedup_positions(&points);
        assert_eq!(count, 3);
        assert_eq!(remap[0], remap[2]);
        assert_ne!(remap[0], remap[3]);
    }

    #[test]
    fn dedup_mesh_merges_split_vertices_and_keeps_hard_edges() {
        let mut mesh = MeshGraph::new();
        let group = mesh.create_polygon_group("mat");
        // Two triangles sharing an edge, with the shared vertices duplicated.
        let p = [Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::X, Vec3::Y, Vec3::new(1.0, 1.0, 0.0)];
        let vertices: Vec<VertexId> = p.iter().map(|&x| mesh.create_vertex(x)).collect();
        let instances: Vec<VertexInstanceId> = vertices
            .iter()
            .map(|&v| mesh.create_vertex_instance(v))
            .collect::<Result<_, _>>()
            .unwrap();
        mesh.create_polygon(group, &instances[0..3]).unwrap();
        mesh.create_polygon(group, &[instances[3], instances[5], instances[4]]).unwrap();
        mesh.set_edge_hard(vertices[1], vertices[2], true).unwrap();

        let outcome = dedup_vertex_positions(&mesh).unwrap();
        assert_eq!(outcome.merged_vertices, 2);
        assert_eq!(outcome.dropped_polygons, 0);
        assert_eq!(outcome.mesh.num_vertices(), 4);
        assert_eq!(outcome.mesh.num_polygons(), 2);
        assert_eq!(outcome.mesh.num_edges(), 5);
        let hard = outcome.mesh.edge_ids().filter(|&e| outcome.mesh.edge(e).unwrap().is_hard).count();
        assert_eq!(hard, 1);
        outcome.mesh.validate().unwrap();
    }
}
