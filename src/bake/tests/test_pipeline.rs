//! End-to-end LOD bakes through [`Pipeline`].

use super::{cube, grid, quad};
use crate::bake::{
    BakeDiagnostics, BakeError, BakeWarning, BuildSettings, EdgeCollapseReducer, LayoutError, LodSettings, MeshGraph,
    NtbOptions, PassthroughReducer, Pipeline, PipelineSettings, ReductionSettings, Vec3, apply_hard_angle_threshold,
    synthesize_normals_and_tangents,
};

fn build() -> BuildSettings {
    BuildSettings::default().with_mikk_tspace(false)
}

fn half() -> ReductionSettings {
    ReductionSettings::default().with_percent_triangles(0.5)
}

// ── settings ────────────────────────────────────────────────────────────────

#[test]
fn settings_round_trip_through_toml() {
    let settings = PipelineSettings {
        build: build().with_lightmap_uvs(0, 1, 32).with_adjacency_buffer(true),
        lods: vec![LodSettings::default(), LodSettings::new(half().with_base_lod_model(Some(0)))],
    };
    let text = settings.to_toml_string().expect("serializes");
    let parsed = PipelineSettings::from_toml_str(&text).expect("parses back");
    assert_eq!(parsed, settings);
}

#[test]
fn partial_toml_fills_defaults() {
    let text = r#"
        [build]
        use_mikk_tspace = false

        [[lods]]

        [[lods]]
        [lods.reduction]
        percent_triangles = 0.5
        base_lod_model = 0
    "#;
    let settings = PipelineSettings::from_toml_str(text).expect("valid settings");
    assert!(!settings.build.use_mikk_tspace);
    assert!(settings.build.remove_degenerates);
    assert_eq!(settings.lods.len(), 2);
    let reductions = settings.reduction_settings();
    assert!(!reductions[0].is_reduction_active());
    assert_eq!(reductions[1].base_lod_model, Some(0));
    assert!((reductions[1].percent_triangles - 0.5).abs() < 1e-6);
}

#[test]
fn malformed_toml_is_a_settings_error() {
    let err = PipelineSettings::from_toml_str("[build]\nbuild_scale = \"big\"").expect_err("bad type");
    assert!(matches!(err, BakeError::Settings(_)));
}

#[test]
fn invalid_build_settings_are_rejected() {
    let mesh = quad();
    let reduction = ReductionSettings::default();

    let flat = build().with_build_scale(Vec3::new(1.0, 0.0, 1.0));
    let err = Pipeline::build_lod(&mesh, &flat, &reduction, &PassthroughReducer).expect_err("zero scale");
    assert!(matches!(err, BakeError::InvalidInput { .. }));

    let too_many = build().with_lightmap_uvs(0, 8, 32);
    let err = Pipeline::build_lod(&mesh, &too_many, &reduction, &PassthroughReducer).expect_err("channel limit");
    assert!(matches!(err, BakeError::ResourceLimit { .. }));

    let same = build().with_lightmap_uvs(0, 0, 32);
    assert!(same.validate().is_err());

    let missing = build().with_lightmap_uvs(2, 3, 32);
    let err = Pipeline::build_lod(&mesh, &missing, &reduction, &PassthroughReducer).expect_err("no channel 2");
    assert!(matches!(err, BakeError::Layout(LayoutError::SourceChannelOutOfRange { channel: 2, count: 1 })));

    let err = Pipeline::build_lod(&MeshGraph::new(), &build(), &reduction, &PassthroughReducer).expect_err("empty");
    assert!(matches!(err, BakeError::InvalidInput { .. }));
}

// ── single LOD ──────────────────────────────────────────────────────────────

#[test]
fn quad_bakes_into_two_triangles() {
    let data = Pipeline::build_lod(&quad(), &build(), &ReductionSettings::default(), &PassthroughReducer)
        .expect("quad bakes");
    assert_eq!(data.num_vertices(), 4);
    assert_eq!(data.num_triangles(), 2);
    assert_eq!(data.sections.len(), 1);
    assert_eq!(data.sections[0].num_triangles, 2);
    assert_eq!(data.wedge_map.len(), 6);
    assert_eq!(data.wireframe_index_buffer.len(), 10);
    assert_eq!(data.depth_only_index_buffer.len(), 6);
    assert!(data.adjacency_index_buffer.is_none());

    let forward = data.index_buffer.to_u32_vec();
    let reversed = data.reversed_index_buffer.as_ref().expect("built by default").to_u32_vec();
    assert_eq!(reversed, forward.iter().rev().copied().collect::<Vec<_>>());

    assert_eq!(data.diagnostics.vertex_count, 4);
    assert_eq!(data.diagnostics.triangle_count, 2);
    assert!(data.diagnostics.is_clean(), "{}", data.diagnostics.summary());
}

#[test]
fn cube_bakes_with_every_derived_buffer() {
    let settings = build().with_adjacency_buffer(true);
    let data = Pipeline::build_lod(&cube(true), &settings, &ReductionSettings::default(), &PassthroughReducer)
        .expect("cube bakes");
    assert_eq!(data.num_vertices(), 24);
    assert_eq!(data.num_triangles(), 12);
    assert_eq!(data.wireframe_index_buffer.len(), 2 * 18);
    assert_eq!(data.adjacency_index_buffer.as_ref().map(|b| b.len()), Some(12 * 12));
    assert_eq!(
        data.reversed_depth_only_index_buffer.as_ref().map(|b| b.len()),
        Some(data.depth_only_index_buffer.len())
    );

    let mut depth = data.depth_only_index_buffer.to_u32_vec();
    depth.sort_unstable();
    depth.dedup();
    assert_eq!(depth.len(), 8);

    assert!(data.bounds.min.equals(Vec3::ZERO, 1e-6));
    assert!(data.bounds.max.equals(Vec3::ONE, 1e-6));
    assert!(data.bounding_sphere.radius >= 3f32.sqrt() * 0.5 - 1e-4);
    for v in &data.vertices {
        assert!((v.position - data.bounding_sphere.center).length() <= data.bounding_sphere.radius + 1e-4);
    }
}

#[test]
fn reversed_buffers_are_optional() {
    let settings = build().with_reversed_index_buffer(false);
    let data = Pipeline::build_lod(&quad(), &settings, &ReductionSettings::default(), &PassthroughReducer)
        .expect("quad bakes");
    assert!(data.reversed_index_buffer.is_none());
    assert!(data.reversed_depth_only_index_buffer.is_none());
}

#[test]
fn source_mesh_is_left_untouched() {
    let source = cube(true);
    let snapshot = |mesh: &MeshGraph| mesh.vertex_instances().map(|(_, vi)| vi.clone()).collect::<Vec<_>>();
    let before = snapshot(&source);
    Pipeline::build_lod(&source, &build(), &half(), &EdgeCollapseReducer::new()).expect("cube bakes");
    assert_eq!(snapshot(&source), before);
    assert_eq!(source.num_polygons(), 6);
    assert_eq!(source.num_vertices(), 8);
}

#[test]
fn lightmap_uvs_fill_the_destination_channel() {
    let settings = build().with_lightmap_uvs(0, 1, 32).with_max_lightmap_resolution(512);
    let data = Pipeline::build_lod(&cube(true), &settings, &ReductionSettings::default(), &PassthroughReducer)
        .expect("cube bakes");
    assert_eq!(data.num_uv_channels, 2);
    assert_eq!(data.diagnostics.lightmap_chart_count, 6);
    assert!(data.diagnostics.lightmap_resolution.is_some());
    for v in &data.vertices {
        let uv = v.uvs[1];
        assert!((0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y), "lightmap uv {uv:?}");
    }
}

#[test]
fn failed_lightmap_packing_leaves_uv_channels_alone() {
    let settings = build().with_lightmap_uvs(0, 3, 1).with_max_lightmap_resolution(1);
    let source = quad();
    let data = Pipeline::build_lod(&source, &settings, &ReductionSettings::default(), &PassthroughReducer)
        .expect("quad bakes");
    assert_eq!(data.diagnostics.warnings, vec![BakeWarning::LightmapPackingFailed { resolution: 1 }]);
    assert_eq!(data.num_uv_channels, source.num_uv_channels());
    assert_eq!(data.diagnostics.lightmap_resolution, None);
    for v in &data.vertices {
        assert!(source.vertex_instances().any(|(_, vi)| vi.uv(0) == v.uvs[0]), "uv0 {:?} changed", v.uvs[0]);
    }
}

#[test]
fn reduction_runs_inside_the_bake() {
    let reduction = ReductionSettings::default().with_percent_triangles(0.25);
    let data = Pipeline::build_lod(&grid(8), &build(), &reduction, &EdgeCollapseReducer::new()).expect("grid bakes");
    assert!(data.num_triangles() < 128);
    assert!(data.num_triangles() >= 2);
    assert!(data.diagnostics.max_deviation > 0.0);
    for v in &data.vertices {
        assert!(v.tangent_z.equals(Vec3::Z, 1e-3), "normal {:?}", v.tangent_z);
    }
}

#[test]
fn recalculated_normals_rederive_hard_edges() {
    let reduction = half().with_recalculate_normals(true);
    let data =
        Pipeline::build_lod(&cube(false), &build(), &reduction, &PassthroughReducer).expect("cube bakes");
    // Every face gets its own normals again, so corners split per face.
    assert_eq!(data.num_vertices(), 24);
    for v in &data.vertices {
        let n = v.tangent_z;
        let axis_aligned = [n.x.abs(), n.y.abs(), n.z.abs()].iter().filter(|c| (**c - 1.0).abs() < 1e-3).count();
        assert_eq!(axis_aligned, 1, "normal {n:?} is not a face normal");
    }
}

// ── LOD chains ──────────────────────────────────────────────────────────────

#[test]
fn build_all_follows_base_lods() {
    let settings = PipelineSettings {
        build: build(),
        lods: vec![
            LodSettings::default(),
            LodSettings::new(half().with_base_lod_model(Some(0))),
            LodSettings::new(half().with_base_lod_model(Some(1))),
        ],
    };
    let results = Pipeline::build_all(&[grid(8)], &settings, &EdgeCollapseReducer::new());
    assert_eq!(results.len(), 3);
    let lods: Vec<_> = results.into_iter().map(|r| r.expect("LOD bakes")).collect();

    assert_eq!(lods[0].num_triangles(), 128);
    assert!(lods[1].num_triangles() < lods[0].num_triangles());
    assert!(lods[2].num_triangles() <= lods[1].num_triangles());

    assert!(lods[1].diagnostics.warnings.is_empty());
    assert!(matches!(
        lods[2].diagnostics.warnings.first(),
        Some(BakeWarning::ApproximatedReductionChain { lod: 2, base_lod: 0, .. })
    ));
}

#[test]
fn lods_without_a_source_reduce_lod0() {
    let settings = PipelineSettings {
        build: build(),
        lods: vec![LodSettings::default(), LodSettings::new(half())],
    };
    let results = Pipeline::build_all(&[grid(4)], &settings, &EdgeCollapseReducer::new());
    let lod1 = results[1].as_ref().expect("falls back to LOD0");
    assert!(lod1.num_triangles() < 32);
}

#[test]
fn missing_lod0_fails_every_lod() {
    let settings = PipelineSettings {
        build: build(),
        lods: vec![LodSettings::default(), LodSettings::new(half())],
    };
    let results = Pipeline::build_all(&[], &settings, &PassthroughReducer);
    assert_eq!(results.len(), 2);
    for result in results {
        assert!(matches!(result, Err(BakeError::MissingSourceLod { lod: 0 })));
    }
}

#[test]
fn one_bad_lod_does_not_stop_the_rest() {
    let settings = PipelineSettings {
        build: build(),
        lods: vec![LodSettings::default(), LodSettings::new(half().with_base_lod_model(Some(3)))],
    };
    let results = Pipeline::build_all(&[quad()], &settings, &PassthroughReducer);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(BakeError::Reduction(_))));
}

// ── hard edges ──────────────────────────────────────────────────────────────

#[test]
fn hard_angle_threshold_marks_cube_edges() {
    let mut mesh = cube(false);
    let mut diagnostics = BakeDiagnostics::new();
    synthesize_normals_and_tangents(&mut mesh, &NtbOptions::default().with_mikk_tspace(false), &mut diagnostics);

    assert_eq!(apply_hard_angle_threshold(&mut mesh, 45.0), 12);
    assert_eq!(apply_hard_angle_threshold(&mut mesh, 95.0), 0);
}
