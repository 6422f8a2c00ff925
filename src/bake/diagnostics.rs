//! Counters and warnings collected while baking a LOD.
//!
//! Degenerate geometry never aborts a stage: the offending element is skipped
//! and counted here instead. Non-fatal conditions that a caller may want to
//! surface (an approximated LOD chain, a lightmap that did not fit) are kept as
//! typed [`BakeWarning`] values.

use std::fmt;

/// Non-fatal conditions raised by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum BakeWarning {
    /// Percentages were multiplied along a base-LOD chain without checking
    /// the actual triangle/vertex counts at each link.
    ApproximatedReductionChain { lod: usize, base_lod: usize, percent_triangles: f32, percent_vertices: f32 },
    /// No candidate resolution produced a conflict-free lightmap layout.
    LightmapPackingFailed { resolution: u32 },
    /// MikkTSpace was requested but the solver rejected the mesh.
    MikktspaceFailed,
    /// The reducer returned an empty or invalid buffer and the source was kept.
    ReductionSkipped { reason: String },
    Other(String),
}

impl fmt::Display for BakeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApproximatedReductionChain { lod, base_lod, percent_triangles, percent_vertices } => write!(
                f,
                "LOD{lod} reduction settings approximated from LOD{base_lod} \
                 (triangles {percent_triangles:.3}, vertices {percent_vertices:.3})"
            ),
            Self::LightmapPackingFailed { resolution } => {
                write!(f, "lightmap UVs did not fit at resolution {resolution}")
            }
            Self::MikktspaceFailed => write!(f, "MikkTSpace tangent generation failed"),
            Self::ReductionSkipped { reason } => write!(f, "reduction skipped: {reason}"),
            Self::Other(message) => f.write_str(message),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct BakeDiagnostics {
    /// Vertices in the final render buffer.
    pub vertex_count: usize,
    /// Triangles across all sections of the final index buffer.
    pub triangle_count: usize,
    /// Corners that were merged into an existing render vertex.
    pub deduplicated_corner_count: usize,
    /// Triangles dropped because two corners coincide.
    pub degenerate_triangle_count: usize,
    /// Polygons whose face normal could not be computed.
    pub degenerate_polygon_count: usize,
    /// Polygons whose UV-to-local map was singular (zero tangents).
    pub singular_uv_polygon_count: usize,
    /// Vertices merged by welding ahead of reduction.
    pub welded_vertex_count: usize,
    /// Lightmap charts found, zero when lightmap UVs were not generated.
    pub lightmap_chart_count: usize,
    /// Raster resolution that the lightmap layout fit into.
    pub lightmap_resolution: Option<u32>,
    /// Deviation reported by the reducer.
    pub max_deviation: f32,
    pub timing: Option<super::metrics::BakeTimingReport>,
    pub warnings: Vec<BakeWarning>,
}

impl BakeDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if nothing was skipped and no warning was raised.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.degenerate_triangle_count == 0
            && self.degenerate_polygon_count == 0
            && self.singular_uv_polygon_count == 0
            && self.warnings.is_empty()
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Records a warning and forwards it to the `log` facade.
    pub fn warn(&mut self, warning: BakeWarning) {
        log::warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Sums counters, keeps the larger deviation and appends warnings.
    pub fn merge(&mut self, other: &Self) {
        self.vertex_count += other.vertex_count;
        self.triangle_count += other.triangle_count;
        self.deduplicated_corner_count += other.deduplicated_corner_count;
        self.degenerate_triangle_count += other.degenerate_triangle_count;
        self.degenerate_polygon_count += other.degenerate_polygon_count;
        self.singular_uv_polygon_count += other.singular_uv_polygon_count;
        self.welded_vertex_count += other.welded_vertex_count;
        self.lightmap_chart_count += other.lightmap_chart_count;
        self.lightmap_resolution = self.lightmap_resolution.or(other.lightmap_resolution);
        self.max_deviation = self.max_deviation.max(other.max_deviation);
        self.warnings.extend(other.warnings.iter().cloned());
    }

    /// Skip and merge counters paired with a short tag and a long label.
    fn counters(&self) -> [(&'static str, &'static str, usize); 5] {
        [
            ("dedup", "Deduplicated corners", self.deduplicated_corner_count),
            ("degenerate", "Degenerate triangles", self.degenerate_triangle_count),
            ("bad-basis", "Polygons without a normal", self.degenerate_polygon_count),
            ("singular-uv", "Polygons with singular UVs", self.singular_uv_polygon_count),
            ("welded", "Welded vertices", self.welded_vertex_count),
        ]
    }

    /// One-line summary: `"V:{vertices} T:{triangles} [counters...]"`.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = format!("V:{} T:{}", self.vertex_count, self.triangle_count);
        for (tag, _, count) in self.counters() {
            if count > 0 {
                out.push_str(&format!(" {tag}:{count}"));
            }
        }
        if let Some(resolution) = self.lightmap_resolution {
            out.push_str(&format!(" lightmap:{}@{resolution}", self.lightmap_chart_count));
        }
        if self.max_deviation > 0.0 {
            out.push_str(&format!(" deviation:{:.5}", self.max_deviation));
        }
        if self.has_warnings() {
            out.push_str(&format!(" warnings:{}", self.warnings.len()));
        }
        out
    }
}

impl fmt::Display for BakeDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Bake Diagnostics:")?;
        writeln!(f, "  Render vertices: {}", self.vertex_count)?;
        writeln!(f, "  Render triangles: {}", self.triangle_count)?;
        for (_, label, count) in self.counters() {
            if count > 0 {
                writeln!(f, "  {label}: {count}")?;
            }
        }
        if let Some(resolution) = self.lightmap_resolution {
            writeln!(f, "  Lightmap: {} charts at {resolution}", self.lightmap_chart_count)?;
        }
        if self.max_deviation > 0.0 {
            writeln!(f, "  Max deviation: {}", self.max_deviation)?;
        }
        for warning in &self.warnings {
            writeln!(f, "  Warning: {warning}")?;
        }
        if let Some(timing) = &self.timing {
            writeln!(f, "  Bake time: {} ms", timing.total_ms())?;
        }
        writeln!(f, "  Status: {}", if self.is_clean() { "CLEAN" } else { "SKIPPED ELEMENTS" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_clean() {
        let diag = BakeDiagnostics::default();
        assert!(diag.is_clean());
        assert!(!diag.has_warnings());
    }

    #[test]
    fn merge_sums_and_keeps_worst_deviation() {
        let mut a = BakeDiagnostics {
            vertex_count: 10,
            degenerate_triangle_count: 1,
            max_deviation: 0.5,
            ..Default::default()
        };
        let b = BakeDiagnostics {
            vertex_count: 5,
            max_deviation: 0.25,
            warnings: vec![BakeWarning::MikktspaceFailed],
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.vertex_count, 15);
        assert_eq!(a.max_deviation, 0.5);
        assert_eq!(a.warnings.len(), 1);
        assert!(!a.is_clean());
    }

    #[test]
    fn summary_and_display_mention_counters() {
        let mut diag = BakeDiagnostics {
            vertex_count: 24,
            triangle_count: 12,
            degenerate_triangle_count: 2,
            ..Default::default()
        };
        diag.warn(BakeWarning::LightmapPackingFailed { resolution: 64 });
        let summary = diag.summary();
        assert!(summary.contains("V:24 T:12"));
        assert!(summary.contains("degenerate:2"));
        let text = diag.to_string();
        assert!(text.contains("Degenerate triangles: 2"));
        assert!(text.contains("resolution 64"));
        assert!(text.contains("SKIPPED ELEMENTS"));
    }
}
