//! Index reordering for GPU vertex cache locality.
//!
//! Post-transform locality comes from reordering triangles
//! ([`optimize_for_cache`]); pre-transform locality from renumbering vertices
//! in first-use order ([`first_use_remap`]). Both keep every triangle's
//! corners and winding intact.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Meshes with at least this many vertices are left in build order.
pub const CACHE_OPTIMIZE_VERTEX_CEILING: usize = 100_000 * 3;

/// Triangle reordering strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheOptimizeStrategy {
    /// Keep build order.
    None,
    /// Greedy vertex-score selection over a simulated LRU cache.
    #[default]
    Forsyth,
    /// Walk edge-adjacent triangles into strip-like runs.
    Strip,
}

// ── Forsyth scoring ─────────────────────────────────────────────────────────

const CACHE_SIZE: usize = 32;
const CACHE_DECAY_POWER: f32 = 1.5;
const LAST_TRI_SCORE: f32 = 0.75;
const VALENCE_BOOST_SCALE: f32 = 2.0;
const VALENCE_BOOST_POWER: f32 = 0.5;

fn vertex_score(cache_position: Option<usize>, remaining: u32) -> f32 {
    if remaining == 0 {
        return -1.0;
    }
    let cache_score = match cache_position {
        None => 0.0,
        Some(p) if p < 3 => LAST_TRI_SCORE,
        Some(p) => {
            let scaled = 1.0 - (p - 3) as f32 / (CACHE_SIZE - 3) as f32;
            scaled.max(0.0).powf(CACHE_DECAY_POWER)
        }
    };
    cache_score + VALENCE_BOOST_SCALE * (remaining as f32).powf(-VALENCE_BOOST_POWER)
}

fn optimize_forsyth(indices: &[u32], vertex_count: usize) -> Vec<u32> {
    let tri_count = indices.len() / 3;
    let mut remaining = vec![0u32; vertex_count];
    for &i in indices {
        remaining[i as usize] += 1;
    }
    let mut vertex_tris: Vec<Vec<u32>> = remaining.iter().map(|&n| Vec::with_capacity(n as usize)).collect();
    for (t, tri) in indices.chunks_exact(3).enumerate() {
        for &i in tri {
            vertex_tris[i as usize].push(t as u32);
        }
    }

    let mut cache_pos: Vec<Option<usize>> = vec![None; vertex_count];
    let mut scores: Vec<f32> = (0..vertex_count).map(|v| vertex_score(None, remaining[v])).collect();
    let tri_score = |scores: &[f32], t: usize| -> f32 { indices[3 * t..3 * t + 3].iter().map(|&i| scores[i as usize]).sum() };

    let mut emitted = vec![false; tri_count];
    let mut cache: Vec<u32> = Vec::with_capacity(CACHE_SIZE + 3);
    let mut out = Vec::with_capacity(indices.len());
    let mut cursor = 0usize;

    for _ in 0..tri_count {
        // Best triangle touching the cache, else the next unemitted one.
        let mut best: Option<(usize, f32)> = None;
        for &v in &cache {
            for &t in &vertex_tris[v as usize] {
                let t = t as usize;
                if emitted[t] {
                    continue;
                }
                let score = tri_score(&scores, t);
                if best.is_none_or(|(_, s)| score > s) {
                    best = Some((t, score));
                }
            }
        }
        let next = match best {
            Some((t, _)) => t,
            None => {
                while emitted[cursor] {
                    cursor += 1;
                }
                cursor
            }
        };

        emitted[next] = true;
        let tri = &indices[3 * next..3 * next + 3];
        out.extend_from_slice(tri);

        for &v in tri {
            remaining[v as usize] -= 1;
            if let Some(p) = cache.iter().position(|&c| c == v) {
                cache.remove(p);
            }
        }
        for &v in tri.iter().rev() {
            cache.insert(0, v);
        }
        let evicted: Vec<u32> = if cache.len() > CACHE_SIZE { cache.split_off(CACHE_SIZE) } else { Vec::new() };

        for (p, &v) in cache.iter().enumerate() {
            cache_pos[v as usize] = Some(p);
            scores[v as usize] = vertex_score(Some(p), remaining[v as usize]);
        }
        for v in evicted {
            cache_pos[v as usize] = None;
            scores[v as usize] = vertex_score(None, remaining[v as usize]);
        }
    }
    out
}

// ── strips ──────────────────────────────────────────────────────────────────

fn optimize_strips(indices: &[u32]) -> Vec<u32> {
    let tri_count = indices.len() / 3;
    let mut edge_tris: HashMap<(u32, u32), Vec<u32>> = HashMap::new();
    for (t, tri) in indices.chunks_exact(3).enumerate() {
        for k in 0..3 {
            let (a, b) = (tri[k], tri[(k + 1) % 3]);
            edge_tris.entry((a.min(b), a.max(b))).or_default().push(t as u32);
        }
    }

    let mut emitted = vec![false; tri_count];
    let mut out = Vec::with_capacity(indices.len());
    for seed in 0..tri_count {
        if emitted[seed] {
            continue;
        }
        let mut current = seed;
        loop {
            emitted[current] = true;
            let tri = &indices[3 * current..3 * current + 3];
            out.extend_from_slice(tri);

            // Prefer the neighbor across the most recently emitted edge.
            let next = [2usize, 1, 0].into_iter().find_map(|k| {
                let (a, b) = (tri[k], tri[(k + 1) % 3]);
                edge_tris
                    .get(&(a.min(b), a.max(b)))
                    .into_iter()
                    .flatten()
                    .map(|&t| t as usize)
                    .find(|&t| !emitted[t])
            });
            match next {
                Some(t) => current = t,
                None => break,
            }
        }
    }
    out
}

/// Reorders triangles of one section for post-transform cache locality.
/// The output is a permutation of the input triangles.
#[must_use]
pub fn optimize_for_cache(indices: &[u32], vertex_count: usize, strategy: CacheOptimizeStrategy) -> Vec<u32> {
    if indices.len() < 6 || indices.iter().any(|&i| i as usize >= vertex_count) {
        return indices.to_vec();
    }
    match strategy {
        CacheOptimizeStrategy::None => indices.to_vec(),
        CacheOptimizeStrategy::Forsyth => optimize_forsyth(indices, vertex_count),
        CacheOptimizeStrategy::Strip => optimize_strips(indices),
    }
}

/// Old-to-new vertex numbering in first-use order over `index_lists`.
/// Vertices no index refers to keep their relative order after used ones.
#[must_use]
pub fn first_use_remap<'a>(index_lists: impl IntoIterator<Item = &'a [u32]>, vertex_count: usize) -> Vec<u32> {
    let mut remap = vec![u32::MAX; vertex_count];
    let mut next = 0u32;
    for list in index_lists {
        for &i in list {
            let slot = &mut remap[i as usize];
            if *slot == u32::MAX {
                *slot = next;
                next += 1;
            }
        }
    }
    for slot in &mut remap {
        if *slot == u32::MAX {
            *slot = next;
            next += 1;
        }
    }
    remap
}

/// Average cache miss ratio (misses per triangle) of a FIFO cache.
#[must_use]
pub fn average_cache_miss_ratio(indices: &[u32], cache_size: usize) -> f32 {
    if indices.len() < 3 {
        return 0.0;
    }
    let mut fifo: std::collections::VecDeque<u32> = std::collections::VecDeque::with_capacity(cache_size);
    let mut misses = 0usize;
    for &i in indices {
        if !fifo.contains(&i) {
            misses += 1;
            fifo.push_back(i);
            if fifo.len() > cache_size {
                fifo.pop_front();
            }
        }
    }
    misses as f32 / (indices.len() / 3) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_use_numbers_in_order_and_keeps_unused_last() {
        let remap = first_use_remap([[3u32, 1, 3].as_slice(), [0u32].as_slice()], 5);
        assert_eq!(remap, vec![2, 1, 3, 0, 4]);
    }

    #[test]
    fn small_inputs_are_untouched() {
        assert_eq!(optimize_for_cache(&[0, 1, 2], 3, CacheOptimizeStrategy::Forsyth), vec![0, 1, 2]);
    }

    #[test]
    fn forsyth_prefers_cached_neighbors() {
        // Two disjoint quads interleaved.
        let indices = [0, 1, 2, 4, 5, 6, 2, 1, 3, 6, 5, 7];
        let out = optimize_for_cache(&indices, 8, CacheOptimizeStrategy::Forsyth);
        assert_eq!(&out[..6], &[0, 1, 2, 2, 1, 3]);
    }
}
