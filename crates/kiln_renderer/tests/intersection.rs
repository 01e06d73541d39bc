//! The intersection engine against a brute-force scan of the same scene.

use kiln_core::{Color, Light, Material, Mesh, Scene, Sphere};
use kiln_renderer::{Hittable, Interval, Ray, Triangle, Vec3, World, EPSILON};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_vec(rng: &mut StdRng, extent: f32) -> Vec3 {
    Vec3::new(
        rng.gen_range(-extent..extent),
        rng.gen_range(-extent..extent),
        rng.gen_range(-extent..extent),
    )
}

/// A random triangle soup mesh plus a few spheres and a light.
fn random_scene(rng: &mut StdRng) -> Scene {
    let mut scene = Scene::new("random");
    let materials: Vec<usize> = (0..4)
        .map(|i| scene.add_material(Material::lambertian(Color::splat(0.2 * i as f32))))
        .collect();

    for m in 0..3 {
        let mut positions = Vec::new();
        let mut indices = Vec::new();
        for _ in 0..400 {
            let base = random_vec(rng, 20.0);
            for _ in 0..3 {
                indices.push(positions.len() as u32);
                positions.push(base + random_vec(rng, 1.5));
            }
        }
        let mut mesh = Mesh::from_indices(format!("soup{m}"), positions, &indices, materials[m]);
        for (i, face) in mesh.faces.iter_mut().enumerate() {
            face.material = materials[i % materials.len()];
        }
        scene.add_mesh(mesh);
    }

    for _ in 0..10 {
        let material = materials[rng.gen_range(0..materials.len())];
        scene.add_sphere(Sphere::new(random_vec(rng, 20.0), rng.gen_range(0.5..2.0), material));
    }
    scene.add_light(Light::new(Vec3::new(0.0, 25.0, 0.0), 3.0, Color::splat(10.0)));
    scene
}

/// Closest hit by testing every primitive, spheres (lights last) then faces.
fn brute_force(scene: &Scene, ray: &Ray) -> Option<(f32, usize)> {
    let ray_t = Interval::new(EPSILON, f32::INFINITY);
    let light_material = scene.materials.len();
    let light_spheres = scene
        .lights
        .iter()
        .enumerate()
        .map(|(i, l)| Sphere::new(l.position, l.radius, light_material + i));

    let spheres = scene.spheres.iter().copied().chain(light_spheres);
    let sphere_hits = spheres.filter_map(|s| s.hit(ray, ray_t));

    let triangles = scene.meshes.iter().flat_map(|mesh| {
        mesh.faces
            .iter()
            .filter_map(move |face| Triangle::from_face(mesh, face))
    });
    let triangle_hits = triangles.filter_map(|t| t.hit(ray, ray_t));

    let mut best: Option<(f32, usize)> = None;
    for rec in sphere_hits.chain(triangle_hits) {
        if best.map_or(true, |(t, _)| rec.t < t) {
            best = Some((rec.t, rec.material));
        }
    }
    best
}

#[test]
fn world_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(2718);
    let scene = random_scene(&mut rng);
    let world = World::build(&scene);
    assert_eq!(world.triangle_count(), 1200);
    assert_eq!(world.sphere_count(), 11);

    let mut hits = 0;
    for _ in 0..2000 {
        let origin = random_vec(&mut rng, 30.0);
        let target = random_vec(&mut rng, 15.0);
        let ray = Ray::new(origin, target - origin);

        let expected = brute_force(&scene, &ray);
        let actual = world.intersect(&ray, f32::INFINITY).map(|rec| (rec.t, rec.material));

        match (expected, actual) {
            (None, None) => {}
            (Some((et, em)), Some((at, am))) => {
                assert!((et - at).abs() < 1e-4, "distance {et} vs {at}");
                assert_eq!(em, am);
                hits += 1;
            }
            (e, a) => panic!("brute force {e:?} vs world {a:?}"),
        }
    }

    // The scene is dense enough that most rays hit something
    assert!(hits > 500, "only {hits} hits");
}

#[test]
fn max_distance_bounds_the_query() {
    let mut rng = StdRng::seed_from_u64(31);
    let scene = random_scene(&mut rng);
    let world = World::build(&scene);

    for _ in 0..500 {
        let origin = random_vec(&mut rng, 30.0);
        let ray = Ray::new(origin, -origin);
        if let Some(rec) = world.intersect(&ray, f32::INFINITY) {
            assert!(world.intersect(&ray, rec.t * 0.999).is_none());
            let again = world.intersect(&ray, rec.t).unwrap();
            assert_eq!(again.t, rec.t);
        }
    }
}
