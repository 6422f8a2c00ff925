use mesh_bake::bake::{
    BakeError, BakeWarning, BuildSettings, EdgeCollapseReducer, LodRenderData, LodSettings, PassthroughReducer,
    Pipeline, PipelineSettings, ReductionSettings, Vec3, lod_snapshot, primitives, write_obj,
};

fn build() -> BuildSettings {
    BuildSettings::default().with_mikk_tspace(false)
}

fn triangles(data: &LodRenderData) -> Vec<[u32; 3]> {
    data.index_buffer.to_u32_vec().chunks_exact(3).map(|t| [t[0], t[1], t[2]]).collect()
}

/// Every non-sliver triangle's face normal must agree with the normals
/// stored at its corners.
fn assert_faces_match_normals(data: &LodRenderData) {
    for [a, b, c] in triangles(data) {
        let p = [a, b, c].map(|i| data.vertices[i as usize].position);
        let face = (p[1] - p[2]).cross(p[0] - p[2]);
        if face.length() < 1e-6 {
            continue;
        }
        for i in [a, b, c] {
            let n = data.vertices[i as usize].tangent_z;
            assert!(face.dot(n) > 0.0, "triangle {a} {b} {c} faces away from normal {n:?}");
        }
    }
}

fn assert_unit(v: Vec3, what: &str) {
    assert!((v.length() - 1.0).abs() < 1e-3, "{what} {v:?} is not unit length");
}

#[test]
fn quad_scenario_shares_normals() {
    let quad = primitives::quad().expect("quad");
    let data = Pipeline::build_lod(&quad, &build(), &ReductionSettings::default(), &PassthroughReducer)
        .expect("quad bakes");

    assert_eq!(data.num_vertices(), 4);
    assert_eq!(data.num_triangles(), 2);
    for v in &data.vertices {
        assert!(v.tangent_z.equals(Vec3::Z, 1e-5), "normal {:?}", v.tangent_z);
    }
    let mut depth = data.depth_only_index_buffer.to_u32_vec();
    assert_eq!(depth.len(), 6);
    depth.sort_unstable();
    depth.dedup();
    assert!(depth.len() <= 4);
    assert_faces_match_normals(&data);
}

#[test]
fn hard_cube_scenario_splits_every_corner() {
    let cube = primitives::unit_box(true).expect("cube");
    let data = Pipeline::build_lod(&cube, &build(), &ReductionSettings::default(), &PassthroughReducer)
        .expect("cube bakes");

    assert_eq!(data.num_vertices(), 24);
    assert_eq!(data.num_triangles(), 12);
    let center = Vec3::new(0.5, 0.5, 0.5);
    for v in &data.vertices {
        let n = v.tangent_z;
        let axis = [n.x.abs(), n.y.abs(), n.z.abs()].iter().filter(|c| (**c - 1.0).abs() < 1e-4).count();
        assert_eq!(axis, 1, "normal {n:?} is not a face normal");
        assert!((v.position - center).dot(n) > 0.0, "normal {n:?} points inward");
    }
    assert_faces_match_normals(&data);
}

#[test]
fn mikktspace_tangents_stay_orthonormal() {
    let cube = primitives::unit_box(true).expect("cube");
    let data = Pipeline::build_lod(&cube, &BuildSettings::default(), &ReductionSettings::default(), &PassthroughReducer)
        .expect("cube bakes");
    for v in &data.vertices {
        assert_unit(v.tangent_x, "tangent");
        assert_unit(v.tangent_z, "normal");
        assert!(v.tangent_x.dot(v.tangent_z).abs() < 1e-3);
    }
    let mikk_failures = data.diagnostics.warnings.iter().filter(|w| **w == BakeWarning::MikktspaceFailed).count();
    assert!(mikk_failures <= 1);
}

#[test]
fn cylinder_scenario_keeps_caps_flat() {
    let cylinder = primitives::cylinder(8, 1.0, 2.0).expect("cylinder");
    let data = Pipeline::build_lod(&cylinder, &build(), &ReductionSettings::default(), &PassthroughReducer)
        .expect("cylinder bakes");

    assert_eq!(data.num_triangles(), 8 * 2 + 2 * 6);
    assert_eq!(data.num_vertices(), 2 * 9 + 2 * 8);
    assert_eq!(data.sections.len(), 2);
    for v in &data.vertices {
        let n = v.tangent_z;
        if n.z.abs() > 0.5 {
            let expected = if v.position.z > 1.0 { Vec3::Z } else { -Vec3::Z };
            assert!(n.equals(expected, 1e-4), "cap normal {n:?}");
        } else {
            let radial = Vec3::new(v.position.x, v.position.y, 0.0).safe_normal(1e-8);
            assert!(n.equals(radial, 1e-3), "side normal {n:?} vs {radial:?}");
        }
    }
    assert_faces_match_normals(&data);
    assert!(data.bounds.max.equals(Vec3::new(1.0, 1.0, 2.0), 1e-5));
}

#[test]
fn lod_chain_scenario_shrinks_each_level() {
    let settings = PipelineSettings::from_toml_str(
        r#"
        [build]
        use_mikk_tspace = false
        generate_lightmap_uvs = true
        min_lightmap_resolution = 32
        max_lightmap_resolution = 512

        [[lods]]

        [[lods]]
        [lods.reduction]
        percent_triangles = 0.5
        base_lod_model = 0

        [[lods]]
        [lods.reduction]
        percent_triangles = 0.5
        base_lod_model = 1
        "#,
    )
    .expect("valid settings");

    let source = primitives::grid(10).expect("grid");
    let results = Pipeline::build_all(&[source], &settings, &EdgeCollapseReducer::new());
    let lods: Vec<LodRenderData> = results.into_iter().map(|r| r.expect("LOD bakes")).collect();

    assert_eq!(lods[0].num_triangles(), 200);
    assert!(lods[1].num_triangles() < lods[0].num_triangles());
    assert!(lods[2].num_triangles() <= lods[1].num_triangles());
    for lod in &lods {
        assert_eq!(lod.num_uv_channels, 2);
        assert_eq!(lod.diagnostics.lightmap_chart_count, 1);
        assert_faces_match_normals(lod);
    }
    assert!(matches!(lods[2].diagnostics.warnings.first(), Some(BakeWarning::ApproximatedReductionChain { .. })));
}

#[test]
fn missing_sources_fail_each_lod() {
    let settings = PipelineSettings {
        build: build(),
        lods: vec![LodSettings::default(), LodSettings::new(ReductionSettings::default().with_percent_triangles(0.5))],
    };
    let results = Pipeline::build_all(&[], &settings, &PassthroughReducer);
    assert!(results.iter().all(|r| matches!(r, Err(BakeError::MissingSourceLod { lod: 0 }))));
}

#[test]
fn exports_are_well_formed() {
    let cube = primitives::unit_box(true).expect("cube");
    let data = Pipeline::build_lod(&cube, &build(), &ReductionSettings::default(), &PassthroughReducer)
        .expect("cube bakes");

    let mut obj = Vec::new();
    write_obj(&mut obj, "cube", &data).expect("in-memory write");
    let obj = String::from_utf8(obj).expect("utf-8");
    assert_eq!(obj.lines().filter(|l| l.starts_with("v ")).count(), 24);
    assert_eq!(obj.lines().filter(|l| l.starts_with("f ")).count(), 12);

    let snapshot = lod_snapshot(&data);
    assert!(snapshot.contains("lod.vertex_count 24\n"));
    assert!(snapshot.contains("lod.index_width U16\n"));
    assert_eq!(snapshot, lod_snapshot(&data));
}
