//! Tests for lightmap chart discovery and packing.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{cube, grid};
use crate::bake::{
    Allocator2D, BakeDiagnostics, LayoutError, LayoutUv, LightmapUvVersion, MeshGraph, NtbOptions, Tolerance, Vec2,
    Vec3, create_lightmap_uv_layout, generate_unique_uvs, synthesize_normals_and_tangents,
};

fn with_normals(mut mesh: MeshGraph) -> MeshGraph {
    let mut diagnostics = BakeDiagnostics::new();
    synthesize_normals_and_tangents(&mut mesh, &NtbOptions::default().with_mikk_tspace(false), &mut diagnostics);
    mesh
}

#[test]
fn connected_grid_is_one_chart() {
    let mesh = with_normals(grid(4));
    let mut packer = LayoutUv::new(&mesh, 0, 1, 64).expect("channel 0 exists");
    let overlaps = packer.wedge_overlaps(Tolerance::THRESH_POINTS_ARE_SAME);
    assert_eq!(packer.find_charts(&overlaps), 1);
    assert_eq!(packer.charts()[0].triangles.len(), 32);
}

#[test]
fn hard_cube_splits_into_face_charts() {
    let mesh = with_normals(cube(true));
    let mut packer = LayoutUv::new(&mesh, 0, 1, 64).expect("channel 0 exists");
    assert_eq!(packer.num_wedges(), 36);
    let overlaps = packer.wedge_overlaps(Tolerance::THRESH_POINTS_ARE_SAME);
    assert_eq!(packer.find_charts(&overlaps), 6);
    for chart in packer.charts() {
        assert_eq!(chart.triangles.len(), 2);
        assert!((chart.world_area - 1.0).abs() < 1e-4);
    }
}

#[test]
fn triangles_sharing_only_a_corner_are_separate_charts() {
    // Two triangles fanning out of one shared instance, no shared edge.
    let mut mesh = MeshGraph::new();
    let group = mesh.create_polygon_group("bowtie");
    let instance_at = |mesh: &mut MeshGraph, x: f32, y: f32| {
        let v = mesh.create_vertex(Vec3::new(x, y, 0.0));
        let vi = mesh.create_vertex_instance(v).expect("vertex exists");
        if let Some(instance) = mesh.vertex_instance_mut(vi) {
            instance.uvs[0] = Vec2::new(x, y);
        }
        vi
    };
    let shared = instance_at(&mut mesh, 0.0, 0.0);
    let left = [instance_at(&mut mesh, -1.0, 1.0), instance_at(&mut mesh, -1.0, -1.0)];
    let right = [instance_at(&mut mesh, 1.0, -1.0), instance_at(&mut mesh, 1.0, 1.0)];
    mesh.create_polygon(group, &[shared, left[0], left[1]]).expect("left triangle");
    mesh.create_polygon(group, &[shared, right[0], right[1]]).expect("right triangle");
    let mesh = with_normals(mesh);

    let mut packer = LayoutUv::new(&mesh, 0, 1, 64).expect("channel 0 exists");
    let overlaps = packer.wedge_overlaps(Tolerance::THRESH_POINTS_ARE_SAME);
    assert_eq!(packer.find_charts(&overlaps), 2);
    assert!(packer.charts().iter().all(|chart| chart.triangles.len() == 1));
}

#[test]
fn packed_charts_do_not_overlap() {
    let mesh = with_normals(cube(true));
    let mut packer = LayoutUv::new(&mesh, 0, 1, 32).expect("channel 0 exists").with_max_resolution(256);
    let overlaps = packer.wedge_overlaps(Tolerance::THRESH_POINTS_ARE_SAME);
    packer.find_charts(&overlaps);
    assert!(packer.find_best_packing());

    let resolution = packer.resolution();
    let mut atlas = Allocator2D::new(resolution, resolution);
    for placement in packer.placements() {
        assert!(
            atlas.test(&placement.footprint, placement.x, placement.y),
            "chart {} overlaps an earlier one",
            placement.chart
        );
        atlas.add(&placement.footprint, placement.x, placement.y);
    }
    assert_eq!(packer.placements().len(), 6);
    assert!(packer.packed_uvs().iter().all(|uv| (0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y)));
}

/// Disconnected rectangles of random size and depth, each with its own
/// randomly scaled UV rectangle.
fn scattered_rectangles(rng: &mut StdRng, count: usize) -> MeshGraph {
    let mut mesh = MeshGraph::new();
    let group = mesh.create_polygon_group("scattered");
    for _ in 0..count {
        let origin = Vec3::new(rng.random_range(-5.0..5.0), rng.random_range(-5.0..5.0), rng.random_range(-1.0..1.0));
        let (w, h) = (rng.random_range(0.1..2.0), rng.random_range(0.1..2.0));
        let uv_origin = Vec2::new(rng.random_range(-2.0..2.0), rng.random_range(-2.0..2.0));
        let (su, sv) = (rng.random_range(0.2..3.0), rng.random_range(0.2..3.0));
        let mut corners = Vec::with_capacity(4);
        for [x, y] in [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]] {
            let v = mesh.create_vertex(origin + Vec3::new(x * w, y * h, 0.0));
            let vi = mesh.create_vertex_instance(v).expect("vertex exists");
            if let Some(instance) = mesh.vertex_instance_mut(vi) {
                instance.uvs[0] = uv_origin + Vec2::new(x * su, y * sv);
            }
            corners.push(vi);
        }
        mesh.create_polygon(group, &corners).expect("rectangle");
    }
    with_normals(mesh)
}

#[test]
fn random_charts_pack_inside_the_atlas_without_overlap() {
    let mut rng = StdRng::seed_from_u64(0x1a70_u64);
    for _ in 0..4 {
        let count = rng.random_range(5..30);
        let mesh = scattered_rectangles(&mut rng, count);
        let mut packer = LayoutUv::new(&mesh, 0, 1, 64).expect("channel 0 exists").with_max_resolution(1024);
        let overlaps = packer.wedge_overlaps(Tolerance::THRESH_POINTS_ARE_SAME);
        assert_eq!(packer.find_charts(&overlaps), count);
        assert!(packer.find_best_packing(), "{count} charts did not pack");

        let resolution = packer.resolution();
        let mut atlas = Allocator2D::new(resolution, resolution);
        for placement in packer.placements() {
            assert!(placement.x + placement.footprint.width() <= resolution);
            assert!(placement.y + placement.footprint.height() <= resolution);
            assert!(
                atlas.test(&placement.footprint, placement.x, placement.y),
                "chart {} overlaps an earlier one",
                placement.chart
            );
            atlas.add(&placement.footprint, placement.x, placement.y);
        }
        assert_eq!(packer.placements().len(), count);
        for uv in packer.packed_uvs() {
            assert!((0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y), "uv {uv:?} outside the atlas");
        }
    }
}

#[test]
fn layout_writes_destination_channel() {
    let mut mesh = with_normals(cube(true));
    let source = mesh.clone();
    let outcome = create_lightmap_uv_layout(&mut mesh, 0, 1, 32, 512, LightmapUvVersion::Latest)
        .expect("valid channels");
    assert!(outcome.packed);
    assert_eq!(outcome.chart_count, 6);
    assert_eq!(mesh.num_uv_channels(), 2);
    for (_, instance) in mesh.vertex_instances() {
        let uv = instance.uv(1);
        assert!((0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y), "uv {uv:?}");
    }
    for ((_, a), (_, b)) in source.vertex_instances().zip(mesh.vertex_instances()) {
        assert_eq!(a.uv(0), b.uv(0));
    }
}

#[test]
fn resolution_doubles_until_charts_fit() {
    let mut mesh = with_normals(grid(1));
    let outcome = create_lightmap_uv_layout(&mut mesh, 0, 1, 2, 64, LightmapUvVersion::Latest)
        .expect("valid channels");
    assert!(outcome.packed);
    assert!(outcome.resolution > 2 && outcome.resolution.is_power_of_two(), "resolution {}", outcome.resolution);
}

#[test]
fn packing_failure_leaves_mesh_untouched() {
    let mut mesh = with_normals(cube(true));
    let before = mesh.clone();
    let outcome = create_lightmap_uv_layout(&mut mesh, 0, 1, 2, 2, LightmapUvVersion::Latest)
        .expect("valid channels");
    assert!(!outcome.packed);
    assert_eq!(mesh.num_uv_channels(), before.num_uv_channels());
}

#[test]
fn channel_bounds_are_checked() {
    let mesh = cube(true);
    assert_eq!(
        LayoutUv::new(&mesh, 3, 1, 64).err(),
        Some(LayoutError::SourceChannelOutOfRange { channel: 3, count: 1 })
    );
    assert_eq!(LayoutUv::new(&mesh, 0, 8, 64).err(), Some(LayoutError::DestinationChannelOutOfRange { channel: 8 }));
}

#[test]
fn unique_uvs_cover_every_instance() {
    let mesh = with_normals(cube(true));
    let uvs = generate_unique_uvs(&mesh, 512).expect("cube packs");
    assert_eq!(uvs.len(), mesh.num_vertex_instances());
}
