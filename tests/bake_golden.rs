use mesh_bake::bake::{
    BuildSettings, CacheOptimizeStrategy, EdgeCollapseReducer, LodRenderData, MeshGraph, PassthroughReducer, Pipeline, ReductionSettings,
    lod_snapshot, primitives,
};

use std::path::{Path, PathBuf};

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join("bake")
}

fn fixture_path(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

fn normalize_snapshot_text(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    if normalized.ends_with('\n') { normalized } else { format!("{normalized}\n") }
}

/// Compares against the stored fixture. `BAKE_UPDATE_GOLDEN` rewrites it
/// instead; a missing fixture is a failure otherwise.
fn assert_or_update_fixture(name: &str, actual: &str) {
    let path = fixture_path(name);
    let actual = normalize_snapshot_text(actual);

    if std::env::var_os("BAKE_UPDATE_GOLDEN").is_some() {
        std::fs::create_dir_all(fixtures_dir()).expect("create fixtures dir");
        std::fs::write(&path, actual).expect("write golden fixture");
        return;
    }

    let expected = std::fs::read_to_string(&path)
        .unwrap_or_else(|err| panic!("missing fixture `{}`: {err}", path.display()));
    let expected = normalize_snapshot_text(&expected);

    assert_eq!(actual, expected, "golden mismatch for `{name}` (set BAKE_UPDATE_GOLDEN=1 to update)");
}

fn build() -> BuildSettings {
    // MikkTSpace is optional; keep fixtures independent of the feature set.
    // Without cache optimization vertices appear in corner order.
    BuildSettings::default().with_mikk_tspace(false).with_cache_optimize(CacheOptimizeStrategy::None)
}

fn bake(mesh: &MeshGraph, build: &BuildSettings) -> LodRenderData {
    Pipeline::build_lod(mesh, build, &ReductionSettings::default(), &PassthroughReducer).expect("bake should succeed")
}

#[test]
fn golden_quad() {
    let data = bake(&primitives::quad().expect("quad"), &build());
    assert!(data.diagnostics.is_clean());
    assert_or_update_fixture("quad.snap", &lod_snapshot(&data));
}

#[test]
fn golden_hard_cube() {
    let settings = build().with_adjacency_buffer(true);
    let data = bake(&primitives::unit_box(true).expect("cube"), &settings);
    assert_eq!(data.num_vertices(), 24);
    assert_or_update_fixture("hard_cube.snap", &lod_snapshot(&data));
}

#[test]
fn cylinder_lightmap_snapshot_is_in_range() {
    let settings = build().with_lightmap_uvs(0, 1, 32).with_max_lightmap_resolution(256);
    let data = bake(&primitives::cylinder(12, 0.5, 1.0).expect("cylinder"), &settings);
    assert!(data.diagnostics.lightmap_resolution.is_some());
    assert_eq!(data.num_uv_channels, 2);
    assert!(data.vertices.iter().all(|v| (0.0..=1.0).contains(&v.uvs[1].x) && (0.0..=1.0).contains(&v.uvs[1].y)));

    let snapshot = lod_snapshot(&data);
    assert!(snapshot.contains("lod.uv_channel_count 2\n"));
    assert_eq!(snapshot.lines().filter(|l| l.starts_with("uv1 ")).count(), data.num_vertices());
}

#[test]
fn reduced_grid_snapshot_matches_its_data() {
    let mesh = primitives::grid(6).expect("grid");
    let reduction = ReductionSettings::default().with_percent_triangles(0.5);
    let data = Pipeline::build_lod(&mesh, &build(), &reduction, &EdgeCollapseReducer::new())
        .expect("bake should succeed");
    assert!(data.num_triangles() < 72);

    let snapshot = lod_snapshot(&data);
    assert!(snapshot.contains(&format!("lod.triangle_count {}\n", data.num_triangles())));
    assert_eq!(snapshot.lines().filter(|l| l.starts_with("f ")).count(), data.num_triangles());
    assert_eq!(snapshot.lines().filter(|l| l.starts_with("v ")).count(), data.num_vertices());
}

#[test]
fn snapshots_are_stable_across_runs() {
    let mesh = primitives::cylinder(10, 1.0, 1.0).expect("cylinder");
    let reduction = ReductionSettings::default().with_percent_triangles(0.6);
    let first = Pipeline::build_lod(&mesh, &build(), &reduction, &EdgeCollapseReducer::new()).expect("first bake");
    let second = Pipeline::build_lod(&mesh, &build(), &reduction, &EdgeCollapseReducer::new()).expect("second bake");
    assert_eq!(lod_snapshot(&first), lod_snapshot(&second));
}
