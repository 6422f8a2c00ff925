//! Chunked fan-out/fan-in over an index range.
//!
//! Each chunk is mapped without shared mutable state and the partial results
//! are folded with an associative reducer. With the `parallel` feature the
//! chunks run on the rayon pool; otherwise they run in order on the caller.

use std::ops::Range;

use super::core::{BBox, BoundingSphere, Vec3};

/// Smallest chunk handed to a worker.
pub const MIN_CHUNK_LEN: usize = 1024;

fn chunk_ranges(len: usize, chunk_len: usize) -> Vec<Range<usize>> {
    let chunk_len = chunk_len.max(1);
    (0..len.div_ceil(chunk_len))
        .map(|i| i * chunk_len..((i + 1) * chunk_len).min(len))
        .collect()
}

cfg_if::cfg_if! {
    if #[cfg(feature = "parallel")] {
        use rayon::prelude::*;

        /// Maps contiguous chunks of `0..len` and folds the results with `reduce`.
        pub fn chunked_map_reduce<T, M, R>(len: usize, chunk_len: usize, identity: T, map: M, reduce: R) -> T
        where
            T: Send + Clone,
            M: Fn(Range<usize>) -> T + Sync + Send,
            R: Fn(T, T) -> T + Sync + Send,
        {
            chunk_ranges(len, chunk_len)
                .into_par_iter()
                .map(map)
                .reduce(|| identity.clone(), &reduce)
        }

        /// Fills `out[i] = f(i)`; each worker writes a disjoint slice.
        pub fn fill_indexed<T, F>(out: &mut [T], f: F)
        where
            T: Send,
            F: Fn(usize) -> T + Sync + Send,
        {
            out.par_chunks_mut(MIN_CHUNK_LEN).enumerate().for_each(|(chunk, slice)| {
                let base = chunk * MIN_CHUNK_LEN;
                for (offset, slot) in slice.iter_mut().enumerate() {
                    *slot = f(base + offset);
                }
            });
        }
    } else {
        /// Maps contiguous chunks of `0..len` and folds the results with `reduce`.
        pub fn chunked_map_reduce<T, M, R>(len: usize, chunk_len: usize, identity: T, map: M, reduce: R) -> T
        where
            T: Send + Clone,
            M: Fn(Range<usize>) -> T + Sync + Send,
            R: Fn(T, T) -> T + Sync + Send,
        {
            chunk_ranges(len, chunk_len).into_iter().map(map).fold(identity, reduce)
        }

        /// Fills `out[i] = f(i)`.
        pub fn fill_indexed<T, F>(out: &mut [T], f: F)
        where
            T: Send,
            F: Fn(usize) -> T + Sync + Send,
        {
            for (i, slot) in out.iter_mut().enumerate() {
                *slot = f(i);
            }
        }
    }
}

/// Axis-aligned bounds of a point set.
#[must_use]
pub fn compute_bounds(positions: &[Vec3]) -> BBox {
    chunked_map_reduce(
        positions.len(),
        MIN_CHUNK_LEN,
        BBox::EMPTY,
        |range| BBox::from_points(positions[range].iter().copied()),
        BBox::union,
    )
}

/// Sphere centered on the box center, radius reaching the farthest point.
#[must_use]
pub fn compute_bounding_sphere(positions: &[Vec3], bounds: BBox) -> BoundingSphere {
    if !bounds.is_valid() {
        return BoundingSphere::default();
    }
    let center = bounds.center();
    let radius_sq = chunked_map_reduce(
        positions.len(),
        MIN_CHUNK_LEN,
        0.0f32,
        |range| {
            positions[range]
                .iter()
                .map(|&p| (p - center).length_squared())
                .fold(0.0, f32::max)
        },
        f32::max,
    );
    BoundingSphere { center, radius: radius_sq.sqrt() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ranges_cover_everything_once() {
        let ranges = chunk_ranges(2500, 1024);
        assert_eq!(ranges, vec![0..1024, 1024..2048, 2048..2500]);
        assert!(chunk_ranges(0, 1024).is_empty());
    }

    #[test]
    fn map_reduce_matches_serial_sum() {
        let values: Vec<u64> = (0..5000).collect();
        let total = chunked_map_reduce(values.len(), 777, 0u64, |r| values[r].iter().sum(), |a, b| a + b);
        assert_eq!(total, values.iter().sum());
    }

    #[test]
    fn bounds_and_sphere() {
        let points: Vec<Vec3> = (0..3000)
            .map(|i| Vec3::new(i as f32, -(i as f32), 0.5))
            .collect();
        let bounds = compute_bounds(&points);
        assert_eq!(bounds.min, Vec3::new(0.0, -2999.0, 0.5));
        assert_eq!(bounds.max, Vec3::new(2999.0, 0.0, 0.5));
        let sphere = compute_bounding_sphere(&points, bounds);
        assert!((sphere.radius - bounds.extent().length()).abs() < 1e-2);
    }

    #[test]
    fn fill_indexed_writes_every_slot() {
        let mut out = vec![0usize; 3000];
        fill_indexed(&mut out, |i| i * 2);
        assert!(out.iter().enumerate().all(|(i, &v)| v == i * 2));
    }
}
