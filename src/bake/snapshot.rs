//! Text dumps of baked LODs: a quantized line-per-value snapshot for golden
//! comparisons and a Wavefront OBJ export for inspection.

use std::fmt::Write as _;
use std::io;

use super::core::{Vec2, Vec3};
use super::diagnostics::BakeDiagnostics;
use super::pipeline::LodRenderData;

pub const SNAPSHOT_QUANTIZE: f32 = 1e-5;
pub const SNAPSHOT_DECIMALS: usize = 5;

fn quantize(value: f32) -> f32 {
    if !value.is_finite() {
        return value;
    }
    let q = (value / SNAPSHOT_QUANTIZE).round() * SNAPSHOT_QUANTIZE;
    // Never print "-0.00000".
    if q == 0.0 { 0.0 } else { q }
}

fn write_f32(out: &mut String, value: f32) {
    let _ = write!(out, "{:.SNAPSHOT_DECIMALS$}", quantize(value));
}

fn write_vec3_line(out: &mut String, prefix: &str, v: Vec3) {
    let _ = write!(out, "{prefix} ");
    write_f32(out, v.x);
    out.push(' ');
    write_f32(out, v.y);
    out.push(' ');
    write_f32(out, v.z);
    out.push('\n');
}

fn write_vec2_line(out: &mut String, prefix: &str, v: Vec2) {
    let _ = write!(out, "{prefix} ");
    write_f32(out, v.x);
    out.push(' ');
    write_f32(out, v.y);
    out.push('\n');
}

fn write_diagnostics(out: &mut String, diag: &BakeDiagnostics) {
    let _ = writeln!(out, "diag.vertex_count {}", diag.vertex_count);
    let _ = writeln!(out, "diag.triangle_count {}", diag.triangle_count);
    let _ = writeln!(out, "diag.deduplicated_corner_count {}", diag.deduplicated_corner_count);
    let _ = writeln!(out, "diag.degenerate_triangle_count {}", diag.degenerate_triangle_count);
    let _ = writeln!(out, "diag.degenerate_polygon_count {}", diag.degenerate_polygon_count);
    let _ = writeln!(out, "diag.singular_uv_polygon_count {}", diag.singular_uv_polygon_count);
    let _ = writeln!(out, "diag.welded_vertex_count {}", diag.welded_vertex_count);
    let _ = writeln!(out, "diag.lightmap_chart_count {}", diag.lightmap_chart_count);
    match diag.lightmap_resolution {
        Some(resolution) => {
            let _ = writeln!(out, "diag.lightmap_resolution {resolution}");
        }
        None => out.push_str("diag.lightmap_resolution none\n"),
    }
    out.push_str("diag.max_deviation ");
    write_f32(out, diag.max_deviation);
    out.push('\n');
    let _ = writeln!(out, "diag.warning_count {}", diag.warnings.len());
    for (idx, warning) in diag.warnings.iter().enumerate() {
        let _ = writeln!(out, "diag.warning.{idx} {warning}");
    }
}

/// Deterministic text form of one LOD. Timing is left out; every float is
/// rounded to [`SNAPSHOT_QUANTIZE`].
#[must_use]
pub fn lod_snapshot(data: &LodRenderData) -> String {
    let mut out = String::new();
    write_diagnostics(&mut out, &data.diagnostics);

    let _ = writeln!(out, "lod.vertex_count {}", data.num_vertices());
    let _ = writeln!(out, "lod.triangle_count {}", data.num_triangles());
    let _ = writeln!(out, "lod.uv_channel_count {}", data.num_uv_channels);
    let _ = writeln!(out, "lod.index_width {:?}", data.index_buffer.width());
    write_vec3_line(&mut out, "bounds.min", data.bounds.min);
    write_vec3_line(&mut out, "bounds.max", data.bounds.max);
    write_vec3_line(&mut out, "sphere.center", data.bounding_sphere.center);
    out.push_str("sphere.radius ");
    write_f32(&mut out, data.bounding_sphere.radius);
    out.push('\n');

    let _ = writeln!(out, "section_count {}", data.sections.len());
    for (idx, s) in data.sections.iter().enumerate() {
        let _ = writeln!(
            out,
            "section.{idx} material {} first {} triangles {} vertices {}..={}",
            s.material_index, s.first_index, s.num_triangles, s.min_vertex_index, s.max_vertex_index
        );
    }

    for v in &data.vertices {
        write_vec3_line(&mut out, "v", v.position);
        write_vec3_line(&mut out, "n", v.tangent_z);
        write_vec3_line(&mut out, "t", v.tangent_x);
        for (channel, uv) in v.uvs.iter().take(data.num_uv_channels).enumerate() {
            write_vec2_line(&mut out, &format!("uv{channel}"), *uv);
        }
    }
    for tri in data.index_buffer.to_u32_vec().chunks_exact(3) {
        let _ = writeln!(out, "f {} {} {}", tri[0], tri[1], tri[2]);
    }

    let _ = writeln!(out, "depth_only.index_count {}", data.depth_only_index_buffer.len());
    let _ = writeln!(out, "wireframe.index_count {}", data.wireframe_index_buffer.len());
    if let Some(adjacency) = &data.adjacency_index_buffer {
        let _ = writeln!(out, "adjacency.index_count {}", adjacency.len());
    }
    out
}

/// Writes `data` as OBJ with UV0 and normals. OBJ faces are counter-clockwise,
/// so each triangle is emitted with its winding flipped.
pub fn write_obj<W: io::Write>(mut out: W, name: &str, data: &LodRenderData) -> io::Result<()> {
    writeln!(out, "# mesh-bake LOD: {}", data.diagnostics.summary())?;
    writeln!(out, "o {name}")?;
    for v in &data.vertices {
        writeln!(out, "v {} {} {}", v.position.x, v.position.y, v.position.z)?;
    }
    for v in &data.vertices {
        writeln!(out, "vt {} {}", v.uvs[0].x, v.uvs[0].y)?;
    }
    for v in &data.vertices {
        writeln!(out, "vn {} {} {}", v.tangent_z.x, v.tangent_z.y, v.tangent_z.z)?;
    }

    let indices = data.index_buffer.to_u32_vec();
    for section in &data.sections {
        let Some(triangles) = indices.get(section.index_range()).filter(|t| !t.is_empty()) else {
            continue;
        };
        writeln!(out, "usemtl material_{}", section.material_index)?;
        for tri in triangles.chunks_exact(3) {
            let [a, b, c] = [tri[0] + 1, tri[2] + 1, tri[1] + 1];
            writeln!(out, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}")?;
        }
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_drops_negative_zero() {
        let mut out = String::new();
        write_f32(&mut out, -0.000_001);
        assert_eq!(out, "0.00000");
    }

    #[test]
    fn quantize_rounds_to_grid() {
        let mut out = String::new();
        write_f32(&mut out, 0.123_456_7);
        assert_eq!(out, "0.12346");
    }
}
