//! Normal / tangent / binormal synthesis.
//!
//! Runs in two passes. [`compute_polygon_ntb`] derives a face basis per
//! polygon from its triangulation and UV0. [`compute_vertex_instance_ntb`] then
//! walks every vertex, partitions the polygons around it into smoothing groups
//! split by hard edges, averages the face bases per group and writes the
//! result to the vertex instances that still need it.
//!
//! Attributes that are already non-zero on entry are authoritative: the
//! passes only fill what is missing. Callers that want a full recompute zero
//! the attributes first (see [`synthesize_normals_and_tangents`]).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::components::connected_components;
use super::core::{Matrix3, Tolerance, Vec2, Vec3, basis_determinant_sign, create_orthonormal_basis};
use super::diagnostics::{BakeDiagnostics, BakeWarning};
use super::ids::{EdgeId, PolygonId, VertexId, VertexInstanceId};
use super::mesh_graph::MeshGraph;
use super::mikktspace::compute_mikktspace_tangents;
use crate::debug_log;

/// Switches for the vertex-instance pass and the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NtbOptions {
    /// Zero every vertex-instance normal before synthesis.
    pub recompute_normals: bool,
    /// Zero every vertex-instance tangent before synthesis.
    pub recompute_tangents: bool,
    /// Compute tangents in the smoothing pass. Ignored when MikkTSpace is used.
    pub compute_tangents: bool,
    /// Replace smoothed tangents with the MikkTSpace solution.
    pub use_mikk_tspace: bool,
    /// Weight polygon normals by corner angle times polygon area.
    pub weighted_normals: bool,
    /// Threshold for the polygon normal degeneracy test.
    pub comparison_threshold: f32,
}

impl Default for NtbOptions {
    fn default() -> Self {
        Self {
            recompute_normals: false,
            recompute_tangents: false,
            compute_tangents: true,
            use_mikk_tspace: true,
            weighted_normals: false,
            comparison_threshold: Tolerance::THRESH_POINTS_ARE_SAME,
        }
    }
}

impl NtbOptions {
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
        self.weighted_normals = value;
        self
    }

    #[must_use]
    pub const fn with_compute_tangents(mut self, value: bool) -> Self {
        self.compute_tangents = value;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolygonNtbStats {
    /// Polygons whose basis was (re)computed.
    pub computed: usize,
    /// Polygons skipped because a normal was already present.
    pub skipped: usize,
    /// Polygons left with a zero basis because a triangle had no normal.
    pub degenerate: usize,
    /// Polygons with at least one triangle whose UV map was singular.
    pub singular_uv: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VertexNtbStats {
    /// Vertices whose instances already had a complete basis.
    pub complete: usize,
    /// Vertices that went through smoothing-group assignment.
    pub processed: usize,
    pub smoothing_groups: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Polygon basis
// ─────────────────────────────────────────────────────────────────────────────

/// Tangent, binormal and normal of a single triangle from its positions and
/// UVs, or `None` when the triangle has no normal.
///
/// A singular UV map yields zero tangent and binormal with a valid normal.
#[must_use]
pub fn triangle_basis(p: [Vec3; 3], uv: [Vec2; 3], threshold: f32) -> Option<(Vec3, Vec3, Vec3, bool)> {
    let normal = (p[1] - p[2]).cross(p[0] - p[2]).safe_normal(threshold);
    if normal.is_nearly_zero(threshold) {
        return None;
    }

    let parameter_to_local = Matrix3::from_rows(p[1] - p[0], p[2] - p[0], p[0]);
    let parameter_to_texture = Matrix3::from_rows(
        Vec3::new(uv[1].x - uv[0].x, uv[1].y - uv[0].y, 0.0),
        Vec3::new(uv[2].x - uv[0].x, uv[2].y - uv[0].y, 0.0),
        Vec3::new(uv[0].x, uv[0].y, 1.0),
    );

    let (mut tangent_x, mut tangent_y, singular) =
        match parameter_to_texture.inverse(Tolerance::SMALL_NUMBER) {
            Some(inverse) => {
                let texture_to_local = inverse.mul(&parameter_to_local);
                (
                    texture_to_local.transform_vector(Vec3::X).safe_normal(Tolerance::SMALL_NUMBER),
                    texture_to_local.transform_vector(Vec3::Y).safe_normal(Tolerance::SMALL_NUMBER),
                    false,
                )
            }
            None => (Vec3::ZERO, Vec3::ZERO, true),
        };
    let mut tangent_z = normal;
    create_orthonormal_basis(&mut tangent_x, &mut tangent_y, &mut tangent_z);
    Some((tangent_x, tangent_y, tangent_z, singular))
}

/// Fills the face basis of every polygon whose normal is still zero.
///
/// The basis is the normalized sum of its triangles' bases. The first
/// triangle without a normal zeroes the whole polygon so that it contributes
/// nothing to smoothing and is recomputed next time.
pub fn compute_polygon_ntb(mesh: &mut MeshGraph, comparison_threshold: f32) -> PolygonNtbStats {
    let mut stats = PolygonNtbStats::default();
    let mut updates: Vec<(PolygonId, Vec3, Vec3, Vec3)> = Vec::new();

    for (id, polygon) in mesh.polygons() {
        if !polygon.normal.is_nearly_zero(Tolerance::KINDA_SMALL_NUMBER) {
            stats.skipped += 1;
            continue;
        }

        let mut tangent_x = Vec3::ZERO;
        let mut tangent_y = Vec3::ZERO;
        let mut tangent_z = Vec3::ZERO;
        let mut singular = false;
        let mut degenerate = false;

        for triangle in polygon.triangles() {
            let corners = triangle.corners;
            let p = corners.map(|vi| mesh.instance_position(vi));
            let uv = corners.map(|vi| mesh.vertex_instance(vi).map_or(Vec2::ZERO, |i| i.uv(0)));
            match triangle_basis(p, uv, comparison_threshold) {
                Some((x, y, z, singular_uv)) => {
                    tangent_x += x;
                    tangent_y += y;
                    tangent_z += z;
                    singular |= singular_uv;
                }
                None => {
                    tangent_x = Vec3::ZERO;
                    tangent_y = Vec3::ZERO;
                    tangent_z = Vec3::ZERO;
                    degenerate = true;
                    break;
                }
            }
        }

        tangent_x.normalize();
        tangent_y.normalize();
        tangent_z.normalize();
        stats.computed += 1;
        stats.degenerate += usize::from(degenerate);
        stats.singular_uv += usize::from(singular && !degenerate);
        updates.push((id, tangent_x, tangent_y, tangent_z));
    }

    for (id, tangent, binormal, normal) in updates {
        if let Some(polygon) = mesh.polygon_mut(id) {
            polygon.tangent = tangent;
            polygon.binormal = binormal;
            polygon.normal = normal;
        }
    }

    log::debug!(
        "polygon NTB: {} computed, {} skipped, {} degenerate, {} singular UV",
        stats.computed,
        stats.skipped,
        stats.degenerate,
        stats.singular_uv
    );
    stats
}

// ─────────────────────────────────────────────────────────────────────────────
// Vertex-instance basis
// ─────────────────────────────────────────────────────────────────────────────

/// One polygon around the vertex being smoothed.
struct VertexInfo {
    polygon: PolygonId,
    instance: Option<VertexInstanceId>,
    uv: Vec2,
    edges: Vec<EdgeId>,
    weight: f32,
}

struct GroupResult {
    instances: Vec<VertexInstanceId>,
    normal: Vec3,
    tangents: HashMap<[u32; 2], (Vec3, Vec3)>,
}

fn has_complete_basis(mesh: &MeshGraph, instance: VertexInstanceId) -> bool {
    let Some(vi) = mesh.vertex_instance(instance) else {
        return false;
    };
    if vi.normal.is_nearly_zero(Tolerance::KINDA_SMALL_NUMBER)
        || vi.tangent.is_nearly_zero(Tolerance::KINDA_SMALL_NUMBER)
    {
        return false;
    }
    let tangent_x = vi.tangent.safe_normal(Tolerance::SMALL_NUMBER);
    let tangent_z = vi.normal.safe_normal(Tolerance::SMALL_NUMBER);
    let tangent_y = (tangent_z.cross(tangent_x).safe_normal(Tolerance::SMALL_NUMBER) * vi.binormal_sign)
        .safe_normal(Tolerance::SMALL_NUMBER);
    [tangent_x, tangent_y, tangent_z]
        .iter()
        .all(|v| !v.contains_nan() && !v.is_nearly_zero(Tolerance::SMALL_NUMBER))
}

/// Interior angle at `vertex` times polygon area, used for weighted normals.
fn corner_weight(mesh: &MeshGraph, polygon: PolygonId, vertex: VertexId) -> f32 {
    let perimeter = mesh.polygon_perimeter(polygon);
    let n = perimeter.len();
    let positions: Vec<Vec3> = perimeter.iter().map(|&vi| mesh.instance_position(vi)).collect();
    let Some(corner) = perimeter
        .iter()
        .position(|&vi| mesh.vertex_instance_vertex(vi) == Some(vertex))
    else {
        return 1.0;
    };
    let here = positions[corner];
    let a = (positions[(corner + n - 1) % n] - here).safe_normal(Tolerance::SMALL_NUMBER);
    let b = (positions[(corner + 1) % n] - here).safe_normal(Tolerance::SMALL_NUMBER);
    let angle = a.dot(b).clamp(-1.0, 1.0).acos();

    let area = mesh
        .triangles(polygon)
        .iter()
        .map(|t| {
            let p = t.corners.map(|vi| mesh.instance_position(vi));
            (p[1] - p[0]).cross(p[2] - p[0]).length() * 0.5
        })
        .sum::<f32>();

    let weight = angle * area;
    if weight.is_finite() && weight > Tolerance::SMALL_NUMBER { weight } else { 1.0 }
}

fn gather_vertex_infos(mesh: &MeshGraph, vertex: VertexId, weighted: bool) -> (Vec<VertexInfo>, bool) {
    let mut infos: Vec<VertexInfo> = Vec::new();
    let mut has_all_tangents = true;

    for &edge in mesh.connected_edges_of_vertex(vertex) {
        for &polygon in mesh.connected_polygons_of_edge(edge) {
            if let Some(info) = infos.iter_mut().find(|info| info.polygon == polygon) {
                if !info.edges.contains(&edge) {
                    info.edges.push(edge);
                }
                continue;
            }

            let instance = mesh
                .polygon_perimeter(polygon)
                .iter()
                .copied()
                .find(|&vi| mesh.vertex_instance_vertex(vi) == Some(vertex));
            let uv = instance
                .and_then(|vi| mesh.vertex_instance(vi))
                .map_or(Vec2::ZERO, |vi| vi.uv(0));
            if let Some(vi) = instance {
                has_all_tangents &= has_complete_basis(mesh, vi);
            }
            let weight = if weighted { corner_weight(mesh, polygon, vertex) } else { 1.0 };
            infos.push(VertexInfo { polygon, instance, uv, edges: vec![edge], weight });
        }
    }
    (infos, has_all_tangents)
}

fn smooth_vertex(mesh: &MeshGraph, infos: &[VertexInfo], compute_tangents: bool) -> Vec<GroupResult> {
    let groups = connected_components(infos.len(), |i, out| {
        let info = &infos[i];
        for &edge in &info.edges {
            if mesh.edge(edge).is_some_and(|e| e.is_hard) {
                continue;
            }
            for &polygon in mesh.connected_polygons_of_edge(edge) {
                if polygon == info.polygon {
                    continue;
                }
                if let Some(j) = infos.iter().position(|other| other.polygon == polygon) {
                    out.push(j);
                }
            }
        }
    });

    groups
        .into_iter()
        .map(|members| {
            let mut normal = Vec3::ZERO;
            let mut tangents: HashMap<[u32; 2], (Vec3, Vec3)> = HashMap::new();
            let mut instances = Vec::with_capacity(members.len());

            for &m in &members {
                let info = &infos[m];
                let Some(polygon) = mesh.polygon(info.polygon) else { continue };
                if let Some(vi) = info.instance {
                    instances.push(vi);
                }
                if !polygon.normal.is_nearly_zero(Tolerance::SMALL_NUMBER) && !polygon.normal.contains_nan() {
                    normal += polygon.normal * info.weight;
                }
                if compute_tangents {
                    let entry = tangents.entry(info.uv.bits_key()).or_insert((Vec3::ZERO, Vec3::ZERO));
                    if !polygon.tangent.is_nearly_zero(Tolerance::SMALL_NUMBER) && !polygon.tangent.contains_nan() {
                        entry.0 += polygon.tangent;
                    }
                    if !polygon.binormal.is_nearly_zero(Tolerance::SMALL_NUMBER) && !polygon.binormal.contains_nan() {
                        entry.1 += polygon.binormal;
                    }
                }
            }

            normal.normalize();
            for (tangent, binormal) in tangents.values_mut() {
                tangent.normalize();
                binormal.normalize();
            }
            GroupResult { instances, normal, tangents }
        })
        .collect()
}

fn apply_group(mesh: &mut MeshGraph, group: &GroupResult, compute_tangents: bool) {
    for &id in &group.instances {
        let Some(instance) = mesh.vertex_instance_mut(id) else { continue };

        if instance.normal.is_nearly_zero(Tolerance::SMALL_NUMBER) {
            instance.normal = group.normal;
        }
        if !compute_tangents {
            continue;
        }

        let (mut tangent, mut binormal) = group
            .tangents
            .get(&instance.uv(0).bits_key())
            .copied()
            .unwrap_or((Vec3::ZERO, Vec3::ZERO));
        if !instance.tangent.is_nearly_zero(Tolerance::SMALL_NUMBER) {
            tangent = instance.tangent;
        }
        let normal = instance.normal;
        if !normal.is_nearly_zero(Tolerance::SMALL_NUMBER) && !instance.tangent.is_nearly_zero(Tolerance::SMALL_NUMBER) {
            let existing = normal.cross(instance.tangent).safe_normal(Tolerance::SMALL_NUMBER) * instance.binormal_sign;
            if !existing.is_nearly_zero(Tolerance::SMALL_NUMBER) {
                binormal = existing;
            }
        }

        // Gram-Schmidt
        binormal -= tangent * tangent.dot(binormal);
        binormal.normalize();
        tangent -= normal * normal.dot(tangent);
        tangent.normalize();
        binormal -= normal * normal.dot(binormal);
        binormal.normalize();

        instance.tangent = tangent;
        instance.binormal_sign = basis_determinant_sign(tangent, binormal, normal);
    }
}

/// Smooths face bases into vertex instances, one vertex at a time.
///
/// Vertices whose instances all carry a valid normal and tangent are skipped
/// untouched, which makes the pass idempotent on its own output.
pub fn compute_vertex_instance_ntb(mesh: &mut MeshGraph, options: &NtbOptions) -> VertexNtbStats {
    let compute_tangents = options.compute_tangents && !options.use_mikk_tspace;
    let mut stats = VertexNtbStats::default();
    let vertices: Vec<VertexId> = mesh.vertex_ids().collect();

    for vertex in vertices {
        let (infos, has_all_tangents) = gather_vertex_infos(mesh, vertex, options.weighted_normals);
        if has_all_tangents {
            stats.complete += 1;
            continue;
        }
        stats.processed += 1;
        let groups = smooth_vertex(mesh, &infos, compute_tangents);
        stats.smoothing_groups += groups.len();
        debug_log!("vertex {vertex}: {} polygons in {} smoothing groups", infos.len(), groups.len());
        for group in &groups {
            apply_group(mesh, group, compute_tangents);
        }
    }

    log::debug!(
        "vertex NTB: {} processed, {} already complete, {} smoothing groups",
        stats.processed,
        stats.complete,
        stats.smoothing_groups
    );
    stats
}

/// Full NTB stage: optional reset, face bases, smoothing and the optional
/// MikkTSpace refinement. Counts degenerate polygons into `diagnostics`.
pub fn synthesize_normals_and_tangents(
    mesh: &mut MeshGraph,
    options: &NtbOptions,
    diagnostics: &mut BakeDiagnostics,
) {
    if options.recompute_normals || options.recompute_tangents {
        for (_, instance) in mesh.vertex_instances_mut() {
            if options.recompute_normals {
                instance.normal = Vec3::ZERO;
            }
            if options.recompute_tangents || options.recompute_normals {
                instance.tangent = Vec3::ZERO;
                instance.binormal_sign = 1.0;
            }
        }
        for (_, polygon) in mesh.polygons_mut() {
            polygon.normal = Vec3::ZERO;
            polygon.tangent = Vec3::ZERO;
            polygon.binormal = Vec3::ZERO;
        }
    }

    mesh.ensure_triangulated();
    let polygon_stats = compute_polygon_ntb(mesh, options.comparison_threshold);
    diagnostics.degenerate_polygon_count += polygon_stats.degenerate;
    diagnostics.singular_uv_polygon_count += polygon_stats.singular_uv;

    compute_vertex_instance_ntb(mesh, options);

    if options.use_mikk_tspace && options.compute_tangents {
        if let Err(err) = compute_mikktspace_tangents(mesh) {
            log::warn!("MikkTSpace refinement skipped: {err}");
            diagnostics.warn(BakeWarning::MikktspaceFailed);
            // Fall back to smoothed tangents.
            compute_vertex_instance_ntb(mesh, &options.with_mikk_tspace(false));
        }
    }
}
