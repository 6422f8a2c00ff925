//! Symmetric "which corners share a position" relation.
//!
//! Corners are projected to a single key `0.30x + 0.33y + 0.37z`, sorted, and
//! each corner scans forward only while the key difference stays within the
//! threshold. Candidates are confirmed with a per-component comparison, so a
//! key collision costs scan time but never yields a false overlap.

use super::core::Vec3;
use super::mesh_graph::MeshGraph;

#[derive(Debug, Clone, Default)]
pub struct OverlappingCorners {
    pending: Vec<Vec<u32>>,
    arrays: Vec<Vec<u32>>,
    finished: bool,
}

const EMPTY: &[u32] = &[];

impl OverlappingCorners {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets to "no overlaps" for `count` corners.
    pub fn init(&mut self, count: usize) {
        self.pending = vec![Vec::new(); count];
        self.arrays = Vec::new();
        self.finished = false;
    }

    /// Records that `key` overlaps `value`. Callers add both directions.
    /// Repeats are kept until [`finish_adding`](Self::finish_adding).
    pub fn add(&mut self, key: u32, value: u32) {
        let Some(slot) = self.pending.get_mut(key as usize) else {
            return;
        };
        if slot.is_empty() {
            slot.push(key);
        }
        slot.push(value);
    }

    /// Freezes recorded pairs into sorted, duplicate-free arrays.
    pub fn finish_adding(&mut self) {
        self.arrays = std::mem::take(&mut self.pending)
            .into_iter()
            .map(|mut set| {
                set.sort_unstable();
                set.dedup();
                set
            })
            .collect();
        self.finished = true;
    }

    /// Sorted overlap set of `key`, including `key` itself, or empty when the
    /// corner overlaps nothing.
    #[must_use]
    pub fn find_if_overlapping(&self, key: u32) -> &[u32] {
        debug_assert!(self.finished, "find_if_overlapping before finish_adding");
        self.arrays.get(key as usize).map_or(EMPTY, Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        if self.finished { self.arrays.len() } else { self.pending.len() }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds the relation over flattened corner positions.
    #[must_use]
    pub fn build(positions: &[Vec3], threshold: f32) -> Self {
        let mut out = Self::new();
        out.init(positions.len());

        let mut keyed: Vec<(f32, u32)> = positions
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.contains_nan())
            .map(|(i, p)| (projection_key(*p), i as u32))
            .collect();
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut pairs = 0usize;
        for i in 0..keyed.len() {
            let (zi, a) = keyed[i];
            for &(zj, b) in &keyed[i + 1..] {
                if (zj - zi).abs() > threshold {
                    break;
                }
                if positions[a as usize].equals(positions[b as usize], threshold) {
                    out.add(a, b);
                    out.add(b, a);
                    pairs += 1;
                }
            }
        }
        out.finish_adding();
        log::debug!("overlapping corners: {} corners, {pairs} pairs (threshold {threshold})", positions.len());
        out
    }

    /// Builds the relation over the vertex-instance arena of `mesh`, keyed by
    /// vertex-instance index. Deleted slots never overlap anything.
    #[must_use]
    pub fn from_mesh(mesh: &MeshGraph, threshold: f32) -> Self {
        let size = mesh.vertex_instance_array_size();
        let mut positions = vec![Vec3::new(f32::NAN, f32::NAN, f32::NAN); size];
        for (id, _) in mesh.vertex_instances() {
            positions[id.index()] = mesh.instance_position(id);
        }
        Self::build(&positions, threshold)
    }
}

/// Cheap near-monotonic projection that keeps nearby points close together.
#[must_use]
pub fn projection_key(p: Vec3) -> f32 {
    0.30 * p.x + 0.33 * p.y + 0.37 * p.z
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_are_symmetric_and_include_self() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::new(1e-6, 0.0, 0.0), Vec3::Y];
        let corners = OverlappingCorners::build(&positions, 1e-5);
        assert_eq!(corners.find_if_overlapping(0), &[0, 2]);
        assert_eq!(corners.find_if_overlapping(2), &[0, 2]);
        assert!(corners.find_if_overlapping(1).is_empty());
        assert!(corners.find_if_overlapping(3).is_empty());
    }

    #[test]
    fn zero_threshold_matches_exact_duplicates_only() {
        let positions = [Vec3::ONE, Vec3::ONE, Vec3::new(1.0, 1.0, 1.000_001)];
        let corners = OverlappingCorners::build(&positions, 0.0);
        assert_eq!(corners.find_if_overlapping(0), &[0, 1]);
        assert!(corners.find_if_overlapping(2).is_empty());
    }

    #[test]
    fn equal_keys_far_apart_are_rejected() {
        // Same projection key, different points.
        let a = Vec3::new(0.33, 0.0, 0.0);
        let b = Vec3::new(0.0, 0.30, 0.0);
        assert!((projection_key(a) - projection_key(b)).abs() < 1e-6);
        let corners = OverlappingCorners::build(&[a, b], 1e-3);
        assert!(corners.find_if_overlapping(0).is_empty());
    }

    #[test]
    fn repeated_pairs_collapse_on_finish() {
        let mut corners = OverlappingCorners::new();
        corners.init(3);
        for _ in 0..4 {
            corners.add(0, 2);
            corners.add(2, 0);
        }
        corners.add(0, 0);
        corners.finish_adding();
        assert_eq!(corners.find_if_overlapping(0), &[0, 2]);
        assert_eq!(corners.find_if_overlapping(2), &[0, 2]);
        assert!(corners.find_if_overlapping(1).is_empty());
    }

    #[test]
    fn coincident_stack_overlaps_every_member() {
        let n = 600u32;
        let positions = vec![Vec3::new(0.5, -2.0, 3.0); n as usize];
        let corners = OverlappingCorners::build(&positions, 1e-5);
        let all: Vec<u32> = (0..n).collect();
        for key in 0..n {
            assert_eq!(corners.find_if_overlapping(key), all.as_slice());
        }
    }

    #[test]
    fn empty_input() {
        let corners = OverlappingCorners::build(&[], 1.0);
        assert!(corners.is_empty());
        assert!(corners.find_if_overlapping(0).is_empty());
    }
}
