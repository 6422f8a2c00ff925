//! Index buffers and the derived index lists built from a render mesh.

use std::collections::HashMap;

use super::cache_optimize::{CACHE_OPTIMIZE_VERTEX_CEILING, CacheOptimizeStrategy, optimize_for_cache};
use super::core::{Tolerance, Vec3};
use super::overlap::OverlappingCorners;

/// Largest index representable in a 16-bit buffer. `0xFFFF` stays reserved
/// as the primitive-restart value.
pub const MAX_16BIT_INDEX: u32 = 0xFFFE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexWidth {
    U16,
    U32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexBuffer {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl Default for IndexBuffer {
    fn default() -> Self {
        Self::U16(Vec::new())
    }
}

impl IndexBuffer {
    /// Picks 16-bit storage when every index fits.
    #[must_use]
    pub fn from_indices(indices: &[u32]) -> Self {
        let max = indices.iter().copied().max().unwrap_or(0);
        if max <= MAX_16BIT_INDEX {
            Self::U16(indices.iter().map(|&i| i as u16).collect())
        } else {
            Self::U32(indices.to_vec())
        }
    }

    #[must_use]
    pub const fn width(&self) -> IndexWidth {
        match self {
            Self::U16(_) => IndexWidth::U16,
            Self::U32(_) => IndexWidth::U32,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get(&self, i: usize) -> Option<u32> {
        match self {
            Self::U16(v) => v.get(i).map(|&x| u32::from(x)),
            Self::U32(v) => v.get(i).copied(),
        }
    }

    #[must_use]
    pub fn to_u32_vec(&self) -> Vec<u32> {
        match self {
            Self::U16(v) => v.iter().map(|&x| u32::from(x)).collect(),
            Self::U32(v) => v.clone(),
        }
    }

    /// Raw little-endian bytes for upload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::U16(v) => bytemuck::cast_slice(v),
            Self::U32(v) => bytemuck::cast_slice(v),
        }
    }
}

/// Index range of one material section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeshSection {
    pub material_index: u32,
    pub first_index: u32,
    pub num_triangles: u32,
    pub min_vertex_index: u32,
    pub max_vertex_index: u32,
}

impl MeshSection {
    #[must_use]
    pub const fn index_range(&self) -> std::ops::Range<usize> {
        let start = self.first_index as usize;
        start..start + self.num_triangles as usize * 3
    }
}

/// Flips winding by reversing each section's index range in place order,
/// keeping sections where they are.
#[must_use]
pub fn build_reversed_indices(indices: &[u32], sections: &[MeshSection]) -> Vec<u32> {
    let mut out = indices.to_vec();
    for section in sections {
        let range = section.index_range();
        if range.end <= out.len() {
            out[range].reverse();
        }
    }
    out
}

fn position_key(p: Vec3) -> [u32; 3] {
    // -0.0 and 0.0 describe the same point.
    (p + Vec3::ZERO).bits_key()
}

/// Remaps every index to the smallest vertex index within
/// [`Tolerance::THRESH_POINTS_ARE_SAME`] of its position, the threshold the
/// vertex builder merges corners with, so a depth pass transforms each
/// position once. Cache optimized when the mesh is small enough.
#[must_use]
pub fn build_depth_only_indices(indices: &[u32], positions: &[Vec3], strategy: CacheOptimizeStrategy) -> Vec<u32> {
    let overlaps = OverlappingCorners::build(positions, Tolerance::THRESH_POINTS_ARE_SAME);
    let mut representative: Vec<u32> = (0..positions.len() as u32).collect();
    for i in 0..representative.len() {
        if let Some(&first) = overlaps.find_if_overlapping(i as u32).first() {
            if (first as usize) < i {
                representative[i] = representative[first as usize];
            }
        }
    }

    let remapped: Vec<u32> = indices
        .iter()
        .map(|&i| representative.get(i as usize).copied().unwrap_or(i))
        .collect();
    if positions.len() < CACHE_OPTIMIZE_VERTEX_CEILING {
        optimize_for_cache(&remapped, positions.len(), strategy)
    } else {
        remapped
    }
}

/// Line list with one entry per unique undirected edge, edges matched by
/// position so UV or normal seams do not produce doubled lines.
#[must_use]
pub fn build_wireframe_indices(indices: &[u32], positions: &[Vec3]) -> Vec<u32> {
    let mut seen: std::collections::HashSet<([u32; 3], [u32; 3])> = std::collections::HashSet::new();
    let mut out = Vec::new();
    for tri in indices.chunks_exact(3) {
        for k in 0..3 {
            let (a, b) = (tri[k], tri[(k + 1) % 3]);
            let (Some(&pa), Some(&pb)) = (positions.get(a as usize), positions.get(b as usize)) else {
                continue;
            };
            let (ka, kb) = (position_key(pa), position_key(pb));
            if ka == kb {
                continue;
            }
            let key = if ka < kb { (ka, kb) } else { (kb, ka) };
            if seen.insert(key) {
                out.extend_from_slice(&[a, b]);
            }
        }
    }
    out
}

/// Builds a tessellation adjacency index buffer.
pub trait AdjacencyBuilder {
    /// Indices emitted per input triangle.
    fn indices_per_triangle(&self) -> usize;

    fn build_adjacency(&self, indices: &[u32], positions: &[Vec3]) -> Vec<u32>;
}

/// PN-AEN layout: 12 indices per triangle. The three corners, then for each
/// edge the matching vertices of the neighbor across it (or the edge's own
/// vertices on a border), then each corner's dominant vertex, the smallest
/// index at its position.
#[derive(Debug, Clone, Copy, Default)]
pub struct PnAenAdjacency;

impl AdjacencyBuilder for PnAenAdjacency {
    fn indices_per_triangle(&self) -> usize {
        12
    }

    fn build_adjacency(&self, indices: &[u32], positions: &[Vec3]) -> Vec<u32> {
        let key_of = |i: u32| positions.get(i as usize).map_or([u32::MAX; 3], |&p| position_key(p));

        let mut dominant: HashMap<[u32; 3], u32> = HashMap::new();
        for &i in indices {
            let entry = dominant.entry(key_of(i)).or_insert(i);
            *entry = (*entry).min(i);
        }

        // Directed edge by position to the (from, to) vertex indices that own it.
        let mut directed: HashMap<([u32; 3], [u32; 3]), (usize, u32, u32)> = HashMap::new();
        for (t, tri) in indices.chunks_exact(3).enumerate() {
            for k in 0..3 {
                let (a, b) = (tri[k], tri[(k + 1) % 3]);
                directed.entry((key_of(a), key_of(b))).or_insert((t, a, b));
            }
        }

        let mut out = Vec::with_capacity(indices.len() / 3 * 12);
        for (t, tri) in indices.chunks_exact(3).enumerate() {
            out.extend_from_slice(tri);
            for k in 0..3 {
                let (a, b) = (tri[k], tri[(k + 1) % 3]);
                match directed.get(&(key_of(b), key_of(a))) {
                    Some(&(other, nb, na)) if other != t => out.extend_from_slice(&[na, nb]),
                    _ => out.extend_from_slice(&[a, b]),
                }
            }
            for &corner in tri {
                out.push(dominant.get(&key_of(corner)).copied().unwrap_or(corner));
            }
        }
        out
    }
}
