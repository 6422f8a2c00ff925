//! Opt-in per-stage timing for the bake pipeline.
//!
//! Timing is only collected when the `bake_metrics` feature is enabled and the
//! target is not WASM (`std::time::Instant` is unavailable there). Otherwise
//! every call compiles down to invoking the closure.
//!
//! ```ignore
//! use mesh_bake::bake::{BakeMetrics, TimingBucket};
//!
//! let mut metrics = BakeMetrics::default();
//! metrics.begin();
//! let overlaps = metrics.time(TimingBucket::Overlap, || OverlappingCorners::from_mesh(&mesh, tol));
//! if let Some(report) = metrics.end() {
//!     println!("overlap: {} ns", report.overlap_ns);
//! }
//! ```

/// Pipeline stages that can be timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingBucket {
    /// Retriangulation of dirty polygons.
    Triangulation,
    /// Overlapping-corner index construction.
    Overlap,
    /// Polygon and vertex-instance normal/tangent synthesis.
    Ntb,
    /// MikkTSpace tangent refinement.
    Mikktspace,
    /// Lightmap UV chart discovery and packing.
    LayoutUv,
    /// Welding ahead of reduction.
    Welding,
    /// Reducer call plus mesh rebuild.
    Reduction,
    /// Vertex dedup and section index assembly.
    VertexBuffer,
    /// Index reordering for the post-transform cache.
    CacheOptimize,
    /// Depth-only, reversed, wireframe and adjacency buffers.
    DerivedIndices,
    /// Bounding box and sphere.
    Bounds,
}

/// Cumulative nanoseconds per [`TimingBucket`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BakeTimingReport {
    pub triangulation_ns: u64,
    pub overlap_ns: u64,
    pub ntb_ns: u64,
    pub mikktspace_ns: u64,
    pub layout_uv_ns: u64,
    pub welding_ns: u64,
    pub reduction_ns: u64,
    pub vertex_buffer_ns: u64,
    pub cache_optimize_ns: u64,
    pub derived_indices_ns: u64,
    pub bounds_ns: u64,
}

impl BakeTimingReport {
    #[must_use]
    pub fn total_ns(&self) -> u64 {
        [
            self.triangulation_ns,
            self.overlap_ns,
            self.ntb_ns,
            self.mikktspace_ns,
            self.layout_uv_ns,
            self.welding_ns,
            self.reduction_ns,
            self.vertex_buffer_ns,
            self.cache_optimize_ns,
            self.derived_indices_ns,
            self.bounds_ns,
        ]
        .into_iter()
        .fold(0u64, u64::saturating_add)
    }

    #[must_use]
    pub fn total_ms(&self) -> f64 {
        self.total_ns() as f64 / 1_000_000.0
    }

    fn slot_mut(&mut self, bucket: TimingBucket) -> &mut u64 {
        match bucket {
            TimingBucket::Triangulation => &mut self.triangulation_ns,
            TimingBucket::Overlap => &mut self.overlap_ns,
            TimingBucket::Ntb => &mut self.ntb_ns,
            TimingBucket::Mikktspace => &mut self.mikktspace_ns,
            TimingBucket::LayoutUv => &mut self.layout_uv_ns,
            TimingBucket::Welding => &mut self.welding_ns,
            TimingBucket::Reduction => &mut self.reduction_ns,
            TimingBucket::VertexBuffer => &mut self.vertex_buffer_ns,
            TimingBucket::CacheOptimize => &mut self.cache_optimize_ns,
            TimingBucket::DerivedIndices => &mut self.derived_indices_ns,
            TimingBucket::Bounds => &mut self.bounds_ns,
        }
    }
}

/// Accumulator for stage timings.
///
/// Call [`begin`](Self::begin) to reset, wrap stages with
/// [`time`](Self::time) and read the report with [`end`](Self::end), which
/// returns `None` when metrics are compiled out.
#[derive(Debug, Default)]
pub struct BakeMetrics {
    #[cfg(all(feature = "bake_metrics", not(target_arch = "wasm32")))]
    report: BakeTimingReport,
}

impl BakeMetrics {
    pub fn begin(&mut self) {
        #[cfg(all(feature = "bake_metrics", not(target_arch = "wasm32")))]
        {
            self.report = BakeTimingReport::default();
        }
    }

    #[must_use]
    pub fn end(&self) -> Option<BakeTimingReport> {
        #[cfg(all(feature = "bake_metrics", not(target_arch = "wasm32")))]
        {
            Some(self.report.clone())
        }
        #[cfg(not(all(feature = "bake_metrics", not(target_arch = "wasm32"))))]
        {
            None
        }
    }

    /// Runs `f`, adding its wall time to `bucket`.
    pub fn time<R>(&mut self, bucket: TimingBucket, f: impl FnOnce() -> R) -> R {
        #[cfg(all(feature = "bake_metrics", not(target_arch = "wasm32")))]
        {
            let start = std::time::Instant::now();
            let result = f();
            let nanos = start.elapsed().as_nanos().min(u128::from(u64::MAX)) as u64;
            let slot = self.report.slot_mut(bucket);
            *slot = slot.saturating_add(nanos);
            result
        }

        #[cfg(not(all(feature = "bake_metrics", not(target_arch = "wasm32"))))]
        {
            let _ = bucket;
            f()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_total_sums_buckets() {
        let mut report = BakeTimingReport::default();
        *report.slot_mut(TimingBucket::Overlap) = 1_000;
        *report.slot_mut(TimingBucket::CacheOptimize) = 2_500;
        assert_eq!(report.total_ns(), 3_500);
        assert!((report.total_ms() - 0.0035).abs() < 1e-12);
    }

    #[test]
    fn time_always_returns_closure_result() {
        let mut metrics = BakeMetrics::default();
        metrics.begin();
        let value = metrics.time(TimingBucket::Bounds, || 42);
        assert_eq!(value, 42);
        #[cfg(not(all(feature = "bake_metrics", not(target_arch = "wasm32"))))]
        assert!(metrics.end().is_none());
    }
}
