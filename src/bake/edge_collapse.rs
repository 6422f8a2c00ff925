//! Default [`MeshReducer`]: priority-queue driven edge collapse.
//!
//! Collapses run on position vertices (reducer vertices sharing a position
//! per the overlap relation) so attribute seams never tear. When a position
//! is merged away, each corner that used it is rebound to the closest
//! matching wedge at the surviving position.
//!
//! # Limitations
//!
//! - The cost is edge length scaled by a normal-deviation term, not a quadric
//!   error metric, so curved regions are not preferred over flat ones.
//! - Wedge attributes are not interpolated; the surviving wedges keep theirs.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use super::core::{Tolerance, Vec3};
use super::overlap::OverlappingCorners;
use super::reduction::{
    ImportanceLevel, MIN_RESULT_TRIANGLES, MeshReducer, NORMAL_WEIGHT, NUM_REDUCTION_ATTRIBUTES,
    ReductionBuffer, ReductionError, ReductionSettings, ReductionVertex, TerminationCriterion, attribute_weights,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeCollapseReducer {
    /// Collapses that would produce a triangle with a larger aspect ratio
    /// (longest edge over shortest altitude) are rejected. `0` disables.
    pub max_aspect_ratio: f32,
    /// Reject collapses whose link condition fails.
    pub strict_manifold: bool,
}

impl Default for EdgeCollapseReducer {
    fn default() -> Self {
        Self { max_aspect_ratio: 20.0, strict_manifold: true }
    }
}

impl EdgeCollapseReducer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn max_aspect_ratio(mut self, ratio: f32) -> Self {
        self.max_aspect_ratio = ratio;
        self
    }

    #[must_use]
    pub const fn strict_manifold(mut self, strict: bool) -> Self {
        self.strict_manifold = strict;
        self
    }
}

impl MeshReducer for EdgeCollapseReducer {
    fn reduce(
        &self,
        dest: &mut ReductionBuffer,
        src: &ReductionBuffer,
        overlaps: &OverlappingCorners,
        settings: &ReductionSettings,
    ) -> Result<f32, ReductionError> {
        if src.indices.is_empty() {
            return Err(ReductionError::EmptySource);
        }
        src.validate()?;

        let mut collapser =
            Collapser::new(&src.vertices, &src.indices, src.num_uv_channels, overlaps, settings, *self);
        let source_triangles = collapser.live_triangles;
        let source_vertices = collapser.positions.len();

        let target_triangles = if settings.percent_triangles < 1.0 {
            settings.target_triangles(source_triangles)
        } else if settings.max_deviation > 0.0 {
            MIN_RESULT_TRIANGLES
        } else {
            source_triangles
        };
        let target_vertices = if settings.percent_vertices < 1.0 {
            settings.target_vertices(source_vertices)
        } else if settings.max_deviation > 0.0 {
            3
        } else {
            source_vertices
        };

        collapser.run(target_triangles, target_vertices, settings.termination_criterion, settings.max_deviation);
        *dest = collapser.extract(src.num_uv_channels);

        log::debug!(
            "edge collapse: {} -> {} triangles, {} collapses, {} rejections, deviation {:.5}",
            source_triangles,
            dest.num_triangles(),
            collapser.collapses,
            collapser.rejections,
            collapser.max_error
        );
        Ok(collapser.max_error)
    }

    fn name(&self) -> &'static str {
        "edge-collapse"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Collapse state
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EdgeKey(u32, u32);

impl EdgeKey {
    #[inline]
    fn new(v0: u32, v1: u32) -> Self {
        if v0 <= v1 { Self(v0, v1) } else { Self(v1, v0) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Veto {
    Degenerate,
    LinkCondition,
    NormalFlip,
    AspectRatio,
}

#[derive(Debug, Clone)]
struct CollapseCandidate {
    edge: EdgeKey,
    /// Position vertex removed by the collapse.
    from: u32,
    /// Position vertex that survives at `target`.
    to: u32,
    cost: f32,
    target: Vec3,
    stamp: u64,
}

impl PartialEq for CollapseCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.edge == other.edge && self.stamp == other.stamp
    }
}

impl Eq for CollapseCandidate {}

impl PartialOrd for CollapseCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CollapseCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on cost; ties broken by edge for a stable order.
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| (other.edge.0, other.edge.1).cmp(&(self.edge.0, self.edge.1)))
    }
}

#[derive(Debug, Clone, Copy)]
struct Triangle {
    /// Position vertex per corner.
    v: [u32; 3],
    /// Source wedge per corner.
    w: [u32; 3],
    deleted: bool,
}

impl Triangle {
    #[inline]
    fn contains(&self, p: u32) -> bool {
        self.v.contains(&p)
    }
}

struct Collapser<'a> {
    src: &'a [ReductionVertex],
    positions: Vec<Vec3>,
    /// Averaged normal per position vertex, for the cost term.
    normals: Vec<Vec3>,
    position_deleted: Vec<bool>,
    position_triangles: Vec<Vec<usize>>,
    wedges_at: Vec<Vec<u32>>,
    triangles: Vec<Triangle>,
    open_edges: HashSet<EdgeKey>,
    edge_stamps: HashMap<EdgeKey, u64>,
    heap: BinaryHeap<CollapseCandidate>,
    weights: [f32; NUM_REDUCTION_ATTRIBUTES],
    shading: f32,
    preserve_boundary: bool,
    boundary_weight: f32,
    options: EdgeCollapseReducer,
    next_stamp: u64,
    live_triangles: usize,
    live_positions: usize,
    collapses: usize,
    rejections: usize,
    max_error: f32,
}

impl<'a> Collapser<'a> {
    fn new(
        src: &'a [ReductionVertex],
        indices: &[u32],
        num_uv_channels: usize,
        overlaps: &OverlappingCorners,
        settings: &ReductionSettings,
        options: EdgeCollapseReducer,
    ) -> Self {
        // Position vertex of each source vertex: the smallest overlapping index.
        let mut position_of_wedge = vec![0u32; src.len()];
        let mut dense: HashMap<u32, u32> = HashMap::new();
        let mut positions = Vec::new();
        let mut normal_sums: Vec<Vec3> = Vec::new();
        let mut wedges_at: Vec<Vec<u32>> = Vec::new();
        for (i, vertex) in src.iter().enumerate() {
            let representative = overlaps.find_if_overlapping(i as u32).first().copied().unwrap_or(i as u32);
            let p = *dense.entry(representative).or_insert_with(|| {
                positions.push(vertex.position);
                normal_sums.push(Vec3::ZERO);
                wedges_at.push(Vec::new());
                (positions.len() - 1) as u32
            });
            position_of_wedge[i] = p;
            normal_sums[p as usize] += vertex.normal;
            wedges_at[p as usize].push(i as u32);
        }

        let mut position_triangles = vec![Vec::new(); positions.len()];
        let mut triangles = Vec::with_capacity(indices.len() / 3);
        let mut live_triangles = 0;
        for (t, tri) in indices.chunks_exact(3).enumerate() {
            let w = [tri[0], tri[1], tri[2]];
            let v = w.map(|i| position_of_wedge[i as usize]);
            let deleted = v[0] == v[1] || v[1] == v[2] || v[0] == v[2];
            if !deleted {
                live_triangles += 1;
                for &p in &v {
                    position_triangles[p as usize].push(t);
                }
            }
            triangles.push(Triangle { v, w, deleted });
        }

        let weights = attribute_weights(settings, num_uv_channels);
        let silhouette = settings.silhouette_importance;
        let mut collapser = Self {
            src,
            live_positions: positions.len(),
            normals: normal_sums.into_iter().map(|n| n.safe_normal(Tolerance::SMALL_NUMBER)).collect(),
            position_deleted: vec![false; positions.len()],
            positions,
            position_triangles,
            wedges_at,
            triangles,
            open_edges: HashSet::new(),
            edge_stamps: HashMap::new(),
            heap: BinaryHeap::new(),
            shading: weights[0] / NORMAL_WEIGHT,
            weights,
            preserve_boundary: silhouette != ImportanceLevel::Off,
            boundary_weight: 10.0 * silhouette.multiplier().max(1.0),
            options,
            next_stamp: 0,
            live_triangles,
            collapses: 0,
            rejections: 0,
            max_error: 0.0,
        };
        collapser.open_edges = collapser.compute_boundary_edges();
        collapser
    }

    fn compute_boundary_edges(&self) -> HashSet<EdgeKey> {
        let mut counts: HashMap<EdgeKey, u32> = HashMap::new();
        for tri in self.triangles.iter().filter(|t| !t.deleted) {
            for k in 0..3 {
                *counts.entry(EdgeKey::new(tri.v[k], tri.v[(k + 1) % 3])).or_insert(0) += 1;
            }
        }
        counts.into_iter().filter(|&(_, c)| c == 1).map(|(e, _)| e).collect()
    }

    fn target_reached(
        &self,
        target_triangles: usize,
        target_vertices: usize,
        criterion: TerminationCriterion,
    ) -> bool {
        let triangles = self.live_triangles <= target_triangles;
        let vertices = self.live_positions <= target_vertices;
        match criterion {
            TerminationCriterion::Triangles => triangles,
            TerminationCriterion::Vertices => vertices,
            TerminationCriterion::Any => triangles || vertices,
        }
    }

    fn run(&mut self, target_triangles: usize, target_vertices: usize, criterion: TerminationCriterion, max_deviation: f32) {
        self.seed_heap();
        while !self.target_reached(target_triangles, target_vertices, criterion) {
            let Some(candidate) = self.next_live_candidate() else {
                log::debug!(
                    "edge collapse stopped at {} triangles (target {target_triangles})",
                    self.live_triangles
                );
                break;
            };
            let deviation = (self.positions[candidate.from as usize] - candidate.target).length();
            if max_deviation > 0.0 && deviation > max_deviation {
                break;
            }
            let removed = self.shared_triangle_count(candidate.edge);
            if self.live_triangles.saturating_sub(removed) < MIN_RESULT_TRIANGLES {
                break;
            }
            self.collapse_edge(&candidate);
            self.max_error = self.max_error.max(deviation);
            self.collapses += 1;
        }
    }

    fn seed_heap(&mut self) {
        let mut seen: HashSet<EdgeKey> = HashSet::new();
        let mut edges = Vec::new();
        for tri in self.triangles.iter().filter(|t| !t.deleted) {
            for k in 0..3 {
                let edge = EdgeKey::new(tri.v[k], tri.v[(k + 1) % 3]);
                if seen.insert(edge) {
                    edges.push(edge);
                }
            }
        }
        for edge in edges {
            if let Some(candidate) = self.evaluate_edge(edge) {
                self.heap.push(candidate);
            }
        }
    }

    fn evaluate_edge(&mut self, edge: EdgeKey) -> Option<CollapseCandidate> {
        let (v0, v1) = (edge.0 as usize, edge.1 as usize);
        if self.position_deleted[v0] || self.position_deleted[v1] {
            return None;
        }
        let boundary = self.open_edges.contains(&edge);
        if boundary && self.preserve_boundary {
            return None;
        }

        let (p0, p1) = (self.positions[v0], self.positions[v1]);
        // A border vertex never moves: the interior end collapses onto it.
        let (from, to, target) = if self.preserve_boundary {
            match (self.is_boundary_vertex(edge.0), self.is_boundary_vertex(edge.1)) {
                (true, true) => return None,
                (true, false) => (edge.1, edge.0, p0),
                (false, true) => (edge.0, edge.1, p1),
                (false, false) => (edge.0, edge.1, (p0 + p1) * 0.5),
            }
        } else {
            (edge.0, edge.1, (p0 + p1) * 0.5)
        };
        let bend = (1.0 - self.normals[v0].dot(self.normals[v1])).max(0.0);
        let mut cost = (p1 - p0).length() * (1.0 + self.shading * bend);
        if boundary {
            cost *= self.boundary_weight;
        }

        self.next_stamp += 1;
        let stamp = self.next_stamp;
        self.edge_stamps.insert(edge, stamp);
        Some(CollapseCandidate { edge, from, to, cost, target, stamp })
    }

    fn is_boundary_vertex(&self, p: u32) -> bool {
        self.neighbors(p).into_iter().any(|n| self.open_edges.contains(&EdgeKey::new(p, n)))
    }

    fn is_open_edge(&self, edge: EdgeKey) -> bool {
        self.shared_triangle_count(edge) == 1
    }

    fn shared_triangle_count(&self, edge: EdgeKey) -> usize {
        self.position_triangles[edge.0 as usize]
            .iter()
            .filter(|&&t| {
                let tri = &self.triangles[t];
                !tri.deleted && tri.contains(edge.1)
            })
            .count()
    }

    fn next_live_candidate(&mut self) -> Option<CollapseCandidate> {
        while let Some(candidate) = self.heap.pop() {
            if self.edge_stamps.get(&candidate.edge) != Some(&candidate.stamp) {
                continue;
            }
            let (v0, v1) = (candidate.edge.0 as usize, candidate.edge.1 as usize);
            if self.position_deleted[v0] || self.position_deleted[v1] {
                continue;
            }
            if self.preserve_boundary && self.is_open_edge(candidate.edge) {
                continue;
            }
            if self.preserve_boundary && self.is_boundary_vertex(candidate.from) {
                // The border reached this vertex after the candidate was queued.
                if let Some(fresh) = self.evaluate_edge(candidate.edge) {
                    self.heap.push(fresh);
                }
                continue;
            }
            match self.can_collapse(candidate.from, candidate.to, candidate.target) {
                Ok(()) => return Some(candidate),
                Err(reason) => {
                    log::trace!("edge {:?} rejected: {reason:?}", candidate.edge);
                    self.rejections += 1;
                }
            }
        }
        None
    }

    fn neighbors(&self, p: u32) -> HashSet<u32> {
        let mut out = HashSet::new();
        for &t in &self.position_triangles[p as usize] {
            let tri = &self.triangles[t];
            if tri.deleted {
                continue;
            }
            out.extend(tri.v.iter().copied().filter(|&v| v != p));
        }
        out
    }

    fn triangle_normal(p: [Vec3; 3]) -> Option<Vec3> {
        (p[1] - p[0]).cross(p[2] - p[0]).normalized()
    }

    fn can_collapse(&self, v0: u32, v1: u32, target: Vec3) -> Result<(), Veto> {
        let affected: HashSet<usize> = self.position_triangles[v0 as usize]
            .iter()
            .chain(&self.position_triangles[v1 as usize])
            .copied()
            .filter(|&t| {
                let tri = &self.triangles[t];
                !tri.deleted && !(tri.contains(v0) && tri.contains(v1))
            })
            .collect();

        if self.options.strict_manifold && self.neighbors(v0).intersection(&self.neighbors(v1)).count() > 2 {
            return Err(Veto::LinkCondition);
        }

        for &t in &affected {
            let tri = &self.triangles[t];
            let moved = tri.v.map(|v| if v == v0 { v1 } else { v });
            if moved[0] == moved[1] || moved[1] == moved[2] || moved[0] == moved[2] {
                return Err(Veto::Degenerate);
            }
            let before = tri.v.map(|v| self.positions[v as usize]);
            let after = moved.map(|v| if v == v1 { target } else { self.positions[v as usize] });

            if let (Some(a), Some(b)) = (Self::triangle_normal(before), Self::triangle_normal(after)) {
                if a.dot(b) < 0.0 {
                    return Err(Veto::NormalFlip);
                }
            }
            if self.options.max_aspect_ratio > 0.0 && triangle_aspect_ratio(after) > self.options.max_aspect_ratio {
                return Err(Veto::AspectRatio);
            }
        }
        Ok(())
    }

    /// Closest wedge at `p` with the same material as `wedge`, by weighted
    /// attribute distance.
    fn closest_wedge(&self, p: u32, wedge: u32) -> Option<u32> {
        let reference = &self.src[wedge as usize];
        self.wedges_at[p as usize]
            .iter()
            .copied()
            .filter(|&w| self.src[w as usize].material_index == reference.material_index)
            .map(|w| (w, self.src[w as usize].attribute_distance(reference, &self.weights)))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
            .map(|(w, _)| w)
    }

    /// Merges position `from` into `to` at the candidate target. Triangles
    /// spanning the edge are deleted; the rest rebind their `from` corner to
    /// the closest wedge at `to`, or carry their wedge over when none matches.
    fn collapse_edge(&mut self, candidate: &CollapseCandidate) {
        let (v0, v1) = (candidate.from, candidate.to);
        self.positions[v1 as usize] = candidate.target;
        self.normals[v1 as usize] =
            (self.normals[v0 as usize] + self.normals[v1 as usize]).safe_normal(Tolerance::SMALL_NUMBER);

        for t in std::mem::take(&mut self.position_triangles[v0 as usize]) {
            let tri = self.triangles[t];
            if tri.deleted {
                continue;
            }
            if tri.contains(v1) {
                self.triangles[t].deleted = true;
                self.live_triangles -= 1;
                continue;
            }
            let Some(k) = tri.v.iter().position(|&v| v == v0) else { continue };
            let wedge = match self.closest_wedge(v1, tri.w[k]) {
                Some(w) => w,
                None => {
                    self.wedges_at[v1 as usize].push(tri.w[k]);
                    tri.w[k]
                }
            };
            self.triangles[t].v[k] = v1;
            self.triangles[t].w[k] = wedge;
            if !self.position_triangles[v1 as usize].contains(&t) {
                self.position_triangles[v1 as usize].push(t);
            }
        }
        self.position_deleted[v0 as usize] = true;
        self.wedges_at[v0 as usize].clear();
        self.live_positions -= 1;
        self.edge_stamps.remove(&candidate.edge);

        self.open_edges.retain(|e| e.0 != v0 && e.1 != v0);
        // Sorted, and boundaries settled before any cost is recomputed, so
        // the result does not depend on hash order.
        let mut ring: Vec<u32> = self.neighbors(v1).into_iter().collect();
        ring.sort_unstable();
        for &neighbor in &ring {
            let edge = EdgeKey::new(v1, neighbor);
            if self.is_open_edge(edge) {
                self.open_edges.insert(edge);
            } else {
                self.open_edges.remove(&edge);
            }
        }
        for neighbor in ring {
            if let Some(candidate) = self.evaluate_edge(EdgeKey::new(v1, neighbor)) {
                self.heap.push(candidate);
            }
        }
    }

    /// Live triangles as a compact buffer. Each used wedge becomes one output
    /// vertex placed at its current position.
    fn extract(&self, num_uv_channels: usize) -> ReductionBuffer {
        let mut remap: HashMap<u32, u32> = HashMap::new();
        let mut vertices = Vec::new();
        let mut indices = Vec::with_capacity(self.live_triangles * 3);
        for tri in self.triangles.iter().filter(|t| !t.deleted) {
            for k in 0..3 {
                let index = *remap.entry(tri.w[k]).or_insert_with(|| {
                    let mut vertex = self.src[tri.w[k] as usize];
                    vertex.position = self.positions[tri.v[k] as usize];
                    vertices.push(vertex);
                    (vertices.len() - 1) as u32
                });
                indices.push(index);
            }
        }
        ReductionBuffer { vertices, indices, num_uv_channels }
    }
}

/// Longest edge over shortest altitude; infinite for degenerate triangles.
fn triangle_aspect_ratio(p: [Vec3; 3]) -> f32 {
    let edges = [p[1] - p[0], p[2] - p[1], p[0] - p[2]];
    let longest = edges.iter().map(|e| e.length()).fold(0.0f32, f32::max);
    let area = edges[0].cross(-edges[2]).length() * 0.5;
    if area <= Tolerance::SMALL_NUMBER || longest <= 0.0 {
        return f32::INFINITY;
    }
    longest * longest / (2.0 * area)
}
