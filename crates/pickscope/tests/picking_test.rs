//! End-to-end picking tests for pickscope.
//!
//! These exercise the full path from a scene (with or without a selection
//! octree) through the orchestrator down to the mesh intersection tests.

use pickscope::*;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn camera_at(z: f32) -> Camera {
    Camera::looking_at(Vec3::new(0.0, 0.0, z), Vec3::ZERO, 800.0 / 600.0)
}

fn cube(name: &str, center: Vec3, half: f32) -> Mesh {
    Mesh::cuboid(name, center - Vec3::splat(half), center + Vec3::splat(half))
}

fn down_ray(x: f32, y: f32) -> Ray {
    Ray::infinite(Vec3::new(x, y, 10.0), Vec3::NEG_Z)
}

#[test]
fn test_multi_pick_matches_nearest_pick() {
    init_logging();
    let mut scene = Scene::new(800.0, 600.0);
    let near = scene.add_item(cube("near", Vec3::ZERO, 1.0)).unwrap();
    let far = scene.add_item(cube("far", Vec3::new(0.0, 0.0, -4.0), 1.0)).unwrap();

    let ray = down_ray(0.2, 0.1);
    let mut picker = scene.picker();

    let mut hits = picker.multi_pick_with_ray(&ray, None, None);
    assert_eq!(hits.len(), 2);
    hits.sort_by(compare_distance);
    assert_eq!(hits[0].picked_item, Some(near));
    assert_eq!(hits[1].picked_item, Some(far));
    assert!((hits[0].distance - 9.0).abs() < 1e-4);
    assert!((hits[1].distance - 13.0).abs() < 1e-4);

    let nearest = picker.pick_with_ray(&ray, None, false, None);
    assert_eq!(nearest.picked_item, hits[0].picked_item);
    assert_eq!(nearest.distance, hits[0].distance);
    assert_eq!(nearest.ray, Some(ray));
}

#[test]
fn test_ray_intersects_items_sorted() {
    let far = cube("far", Vec3::new(0.0, 0.0, -4.0), 1.0);
    let near = cube("near", Vec3::ZERO, 1.0);
    let items: [&dyn Pickable; 2] = [&far, &near];

    let hits = down_ray(0.2, 0.1).intersects_items(&items, false);
    assert_eq!(hits.len(), 2);
    assert!(hits[0].distance < hits[1].distance);
    let point = hits[0].picked_point.unwrap();
    assert!((point - Vec3::new(0.2, 0.1, 1.0)).length() < 1e-4);
}

#[test]
fn test_screen_pick_through_camera() {
    let mut scene = Scene::new(800.0, 600.0);
    scene.set_active_camera(Some(camera_at(10.0)));
    let id = scene.add_item(cube("box", Vec3::ZERO, 1.0)).unwrap();

    let mut picker = scene.picker();
    let info = picker.pick(400.0, 300.0, None, false, None).unwrap();
    assert!(info.hit);
    assert_eq!(info.picked_item, Some(id));

    // Far corner of the screen misses the box
    let info = picker.pick(5.0, 5.0, None, false, None).unwrap();
    assert!(!info.hit);
    assert!(info.ray.is_some());

    let hits = picker.multi_pick(400.0, 300.0, None, None, None).unwrap();
    assert_eq!(hits.len(), 1);
}

#[test]
fn test_no_active_camera() {
    let mut scene = Scene::new(800.0, 600.0);
    scene.add_item(cube("box", Vec3::ZERO, 1.0)).unwrap();
    let mut picker = scene.picker();

    assert!(matches!(
        picker.multi_pick(400.0, 300.0, None, None, None),
        Err(PickscopeError::NoActiveCamera)
    ));
    assert!(matches!(
        picker.pick_with_bounding_info(400.0, 300.0, None, false, None),
        Err(PickscopeError::NoActiveCamera)
    ));
    assert!(matches!(
        picker.create_picking_ray_in_camera_space(400.0, 300.0, None),
        Err(PickscopeError::NoActiveCamera)
    ));

    // A world ray needs no camera
    assert!(picker.pick_with_ray(&down_ray(0.0, 0.0), None, false, None).hit);
}

#[test]
fn test_fast_check_single_candidate() {
    let mut scene = Scene::new(800.0, 600.0);
    scene.add_item(cube("box", Vec3::ZERO, 1.0)).unwrap();
    let mut picker = scene.picker();

    for ray in [down_ray(0.5, 0.5), down_ray(3.0, 0.0)] {
        let exhaustive = picker.pick_with_ray(&ray, None, false, None);
        let fast = picker.pick_with_ray(&ray, None, true, None);
        assert_eq!(exhaustive.hit, fast.hit);
        assert_eq!(exhaustive.picked_item, fast.picked_item);
    }
}

#[test]
fn test_custom_predicate() {
    let mut scene = Scene::new(800.0, 600.0);
    scene.add_item(cube("near", Vec3::ZERO, 1.0)).unwrap();
    let far = scene.add_item(cube("far", Vec3::new(0.0, 0.0, -4.0), 1.0)).unwrap();

    let info = scene.picker().pick_with_ray(
        &down_ray(0.0, 0.0),
        Some(&|item: &dyn Pickable| item.name() != "near"),
        false,
        None,
    );
    assert_eq!(info.picked_item, Some(far));
}

#[test]
fn test_triangle_predicate_through_scene() {
    let mut scene = Scene::new(800.0, 600.0);
    let id = scene.add_item(cube("box", Vec3::ZERO, 1.0)).unwrap();

    // Only accept triangles on the bottom face
    let bottom_only = |p0: Vec3, p1: Vec3, p2: Vec3, _: &Ray, _: [u32; 3]| {
        p0.z < 0.0 && p1.z < 0.0 && p2.z < 0.0
    };
    let info = scene
        .picker()
        .pick_with_ray(&down_ray(0.1, 0.1), None, false, Some(&bottom_only));
    assert_eq!(info.picked_item, Some(id));
    assert!((info.distance - 11.0).abs() < 1e-4);
}

#[test]
fn test_thin_instances() {
    let mut scene = Scene::new(800.0, 600.0);
    let mut mesh = cube("instanced", Vec3::ZERO, 0.5);
    for i in 0..3 {
        mesh.thin_instance_add(Mat4::from_translation(Vec3::new(i as f32 * 3.0, 0.0, 0.0)));
    }
    let id = scene.add_item(mesh).unwrap();
    let mut picker = scene.picker();

    let info = picker.pick_with_ray(&down_ray(3.1, 0.2), None, false, None);
    assert!(info.hit);
    assert_eq!(info.picked_item, Some(id));
    assert_eq!(info.thin_instance_index, Some(1));
    assert!((info.picked_point.unwrap() - Vec3::new(3.1, 0.2, 0.5)).length() < 1e-4);

    // Between instances there is nothing to hit, although the bounds cover it
    assert!(!picker.pick_with_ray(&down_ray(1.5, 0.0), None, false, None).hit);

    // A ray along the row sees every instance
    let along = Ray::infinite(Vec3::new(-10.0, 0.1, 0.1), Vec3::X);
    let hits = picker.multi_pick_with_ray(&along, None, None);
    let mut instances: Vec<_> = hits.iter().filter_map(|h| h.thin_instance_index).collect();
    instances.sort_unstable();
    assert_eq!(instances, vec![0, 1, 2]);

    let nearest = picker.pick_with_ray(&along, None, false, None);
    assert_eq!(nearest.thin_instance_index, Some(0));
    assert!((nearest.distance - 9.5).abs() < 1e-4);

    let fast = picker.pick_with_ray(&along, None, true, None);
    assert!(fast.hit);
    assert!(fast.thin_instance_index.is_some());
}

#[test]
fn test_thin_instances_bounding_info() {
    let mut scene = Scene::new(800.0, 600.0);
    scene.set_active_camera(Some(camera_at(10.0)));
    let mut mesh = cube("instanced", Vec3::ZERO, 0.5);
    mesh.thin_instance_add(Mat4::from_translation(Vec3::new(-2.0, 0.0, 0.0)));
    mesh.thin_instance_add(Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)));
    scene.add_item(mesh).unwrap();

    // The screen center falls in the gap between the instances
    let mut picker = scene.picker();
    assert!(!picker.pick(400.0, 300.0, None, false, None).unwrap().hit);

    let bounds = picker
        .pick_with_bounding_info(400.0, 300.0, None, false, None)
        .unwrap();
    assert!(bounds.hit);
    assert!(bounds.thin_instance_index.is_none());
}

#[test]
fn test_thin_instance_picking_disabled() {
    let mut scene = Scene::new(800.0, 600.0);
    let mut mesh = cube("instanced", Vec3::ZERO, 0.5);
    mesh.thin_instance_add(Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0)));
    mesh.set_thin_instance_picking(false);
    scene.add_item(mesh).unwrap();

    let mut picker = scene.picker();
    let base = picker.pick_with_ray(&down_ray(0.1, 0.1), None, false, None);
    assert!(base.hit);
    assert!(base.thin_instance_index.is_none());
    assert!(!picker.pick_with_ray(&down_ray(3.1, 0.1), None, false, None).hit);
}

#[test]
fn test_instance_normal_and_uv() {
    let mut scene = Scene::new(800.0, 600.0);
    let mut ground = Mesh::plane("ground", 2.0, 1).with_uvs(vec![
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(0.0, 1.0),
        Vec2::new(1.0, 1.0),
    ]);
    // Lay the plane flat so it faces +y
    ground.thin_instance_add(Mat4::from_rotation_x(-std::f32::consts::FRAC_PI_2));
    let id = scene.add_item(ground).unwrap();

    let ray = Ray::infinite(Vec3::new(0.5, 10.0, 0.5), Vec3::NEG_Y);
    let info = scene.picker().pick_with_ray(&ray, None, false, None);
    assert!(info.hit);
    assert_eq!(info.thin_instance_index, Some(0));

    let item = scene.item(id).unwrap();
    let flat = info.normal(item, true, false).unwrap();
    assert!((flat - Vec3::Y).length() < 1e-4);
    let smooth = info.normal(item, true, true).unwrap();
    assert!((smooth - Vec3::Y).length() < 1e-4);

    // World (0.5, 0, 0.5) is local (0.5, -0.5, 0)
    let uv = info.texture_coordinates(item).unwrap();
    assert!((uv - Vec2::new(0.75, 0.25)).length() < 1e-4);
}

#[test]
fn test_sub_mesh_ids_through_scene() {
    let mut scene = Scene::new(800.0, 600.0);
    let mut positions = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0)).corners().to_vec();
    positions.extend(
        Aabb::new(Vec3::new(-1.0, -1.0, -6.0), Vec3::new(1.0, 1.0, -4.0)).corners(),
    );
    let top = Mesh::cuboid("top", Vec3::splat(-1.0), Vec3::splat(1.0));
    let mut indices = top.indices().to_vec();
    indices.extend(top.indices().iter().map(|i| i + 8));

    let mesh = Mesh::new("stack", positions, indices).with_sub_meshes(vec![
        SubMesh::new(0, 8, 8, 36, 36),
        SubMesh::new(1, 0, 8, 0, 36),
    ]);
    let id = scene.add_item(mesh).unwrap();
    scene.create_or_update_sub_meshes_octree(id).unwrap();

    let info = scene.picker().pick_with_ray(&down_ray(0.2, 0.3), None, false, None);
    assert!(info.hit);
    assert_eq!(info.sub_mesh_id, 1);
    let face = info.face_id.unwrap();
    assert!(face < 12);
    assert_eq!(info.sub_mesh_face_id, Some(face));
    assert!((info.distance - 9.0).abs() < 1e-4);
}

#[test]
fn test_line_pick_through_scene() {
    let mut scene = Scene::new(800.0, 600.0);
    scene.options_mut().line_intersection_threshold = 0.2;
    let id = scene
        .register_lines(
            "rail",
            vec![Vec3::new(-5.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0)],
            vec![0, 1],
        )
        .unwrap();
    scene.create_or_update_selection_octree(4, 2).unwrap();

    let mut picker = scene.picker();
    let info = picker.pick_with_ray(&down_ray(1.0, 0.15), None, false, None);
    assert_eq!(info.picked_item, Some(id));
    assert_eq!(info.face_id, Some(0));
    assert!(!picker.pick_with_ray(&down_ray(1.0, 0.3), None, false, None).hit);
}

#[test]
fn test_incremental_octree_updates() {
    let mut scene = Scene::new(800.0, 600.0);
    for i in 0..10 {
        scene
            .add_item(cube(&format!("cube {i}"), Vec3::new(i as f32 * 3.0, 0.0, 0.0), 1.0))
            .unwrap();
    }
    scene.create_or_update_selection_octree(2, 3).unwrap();

    let late = scene
        .add_item(cube("late", Vec3::new(100.0, 100.0, 0.0), 1.0))
        .unwrap();
    let ray = Ray::infinite(Vec3::new(100.0, 100.0, 10.0), Vec3::NEG_Z);
    assert_eq!(
        scene.picker().pick_with_ray(&ray, None, false, None).picked_item,
        Some(late)
    );

    scene.remove_item(late).unwrap();
    assert!(!scene.picker().pick_with_ray(&ray, None, false, None).hit);

    // Move an indexed cube; the scene re-indexes it
    let moved = scene.item_by_name("cube 0").map(Pickable::id).unwrap();
    scene
        .item_mut(moved, |item| {
            if let Some(mesh) = item.as_any_mut().downcast_mut::<Mesh>() {
                mesh.set_transform(Mat4::from_translation(Vec3::new(100.0, 100.0, 0.0)));
            }
        })
        .unwrap();
    assert_eq!(
        scene.picker().pick_with_ray(&ray, None, false, None).picked_item,
        Some(moved)
    );
}

fn random_scene(rng: &mut StdRng, count: usize) -> Scene {
    let mut scene = Scene::new(800.0, 600.0);
    for i in 0..count {
        let center = Vec3::new(
            rng.gen_range(-50.0..50.0),
            rng.gen_range(-50.0..50.0),
            rng.gen_range(-50.0..50.0),
        );
        let half = rng.gen_range(0.5..3.0);
        scene.add_item(cube(&format!("cube {i}"), center, half)).unwrap();
    }
    scene
}

fn random_ray(rng: &mut StdRng) -> Ray {
    let origin = Vec3::new(
        rng.gen_range(-100.0..100.0),
        rng.gen_range(-100.0..100.0),
        rng.gen_range(-100.0..100.0),
    );
    let target = Vec3::new(
        rng.gen_range(-50.0..50.0),
        rng.gen_range(-50.0..50.0),
        rng.gen_range(-50.0..50.0),
    );
    Ray::infinite(origin, (target - origin).normalize())
}

#[test]
fn test_octree_matches_full_scan() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut scene = random_scene(&mut rng, 300);
    let rays: Vec<Ray> = (0..200).map(|_| random_ray(&mut rng)).collect();

    let expected: Vec<PickingInfo> = {
        let mut picker = scene.picker();
        rays.iter()
            .map(|ray| picker.pick_with_ray(ray, None, false, None))
            .collect()
    };
    assert!(expected.iter().any(|info| info.hit));

    scene.create_or_update_selection_octree(8, 3).unwrap();
    let mut picker = scene.picker();
    for (ray, expected) in rays.iter().zip(&expected) {
        let actual = picker.pick_with_ray(ray, None, false, None);
        assert_eq!(actual.hit, expected.hit);
        assert_eq!(actual.picked_item, expected.picked_item);
        assert!((actual.distance - expected.distance).abs() < 1e-4);

        let mut all_expected: Vec<_> = scene
            .items()
            .map(|item| ray.intersects_item(item, false))
            .filter(|info| info.hit)
            .filter_map(|info| info.picked_item)
            .collect();
        let mut all_actual: Vec<_> = picker
            .multi_pick_with_ray(ray, None, None)
            .into_iter()
            .filter_map(|info| info.picked_item)
            .collect();
        all_expected.sort();
        all_actual.sort();
        assert_eq!(all_actual, all_expected);
    }
}

#[test]
fn test_frustum_candidates_cover_visible_items() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut scene = random_scene(&mut rng, 100);
    scene.set_active_camera(Some(camera_at(120.0)));
    scene.create_or_update_selection_octree(4, 2).unwrap();

    let frustum = scene.frustum().unwrap();
    let candidates = scene.active_item_candidates();
    for item in scene.items() {
        let bounds = item.world_bounding_box().unwrap();
        let center_visible = frustum.contains_point(bounds.center());
        if center_visible {
            assert!(candidates.contains(&item.id()), "{} omitted", item.name());
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_fast_check_agrees_on_single_item(
        x in -3.0f32..3.0,
        y in -3.0f32..3.0,
        dx in -0.5f32..0.5,
        dy in -0.5f32..0.5,
    ) {
        let mut scene = Scene::new(800.0, 600.0);
        scene.add_item(cube("box", Vec3::ZERO, 1.0)).unwrap();
        let ray = Ray::infinite(Vec3::new(x, y, 10.0), Vec3::new(dx, dy, -1.0).normalize());

        let mut picker = scene.picker();
        let exhaustive = picker.pick_with_ray(&ray, None, false, None);
        let fast = picker.pick_with_ray(&ray, None, true, None);
        prop_assert_eq!(exhaustive.hit, fast.hit);
        if exhaustive.hit {
            prop_assert!(fast.distance >= exhaustive.distance - 1e-4);
        }
    }

    #[test]
    fn prop_multi_pick_contains_nearest(seed in 0u64..1000) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut scene = random_scene(&mut rng, 40);
        scene.create_or_update_selection_octree(4, 2).unwrap();
        let ray = random_ray(&mut rng);

        let mut picker = scene.picker();
        let nearest = picker.pick_with_ray(&ray, None, false, None);
        let mut hits = picker.multi_pick_with_ray(&ray, None, None);
        hits.sort_by(compare_distance);

        prop_assert_eq!(nearest.hit, !hits.is_empty());
        if let Some(first) = hits.first() {
            prop_assert!((first.distance - nearest.distance).abs() < 1e-4);
        }
    }
}
