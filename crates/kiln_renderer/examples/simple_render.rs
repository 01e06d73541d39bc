//! Simple path tracer example.
//!
//! Builds a scene in code, renders it on all cores and saves a PNG.
//!
//! Run with: cargo run --release --example simple_render -- [output.png]

use anyhow::{Context, Result};
use kiln_core::{
    Camera, Color, Light, Material, Mesh, RenderSettings, Scene, Sphere, TileOrder,
};
use kiln_renderer::{RenderController, RenderState, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let output = env::args().nth(1).unwrap_or_else(|| "output.png".to_string());
    let scene = build_scene();
    log::info!(
        "Scene '{}': {} spheres, {} triangles, {} lights",
        scene.name,
        scene.spheres.len(),
        scene.total_triangle_count(),
        scene.lights.len()
    );

    let controller = RenderController::new();
    let handle = controller.handle();

    let done = AtomicBool::new(false);
    let frame = thread::scope(|scope| {
        // Report the estimate now and then while the frame renders
        scope.spawn(|| {
            while !done.load(Ordering::Acquire) {
                thread::sleep(Duration::from_millis(500));
                if handle.state() != RenderState::Rendering {
                    continue;
                }
                if let Some(eta) = handle.estimated_remaining() {
                    log::info!(
                        "{}/{} tiles, about {:.0?} remaining",
                        handle.finished_tiles(),
                        handle.total_tiles(),
                        eta
                    );
                }
            }
        });

        let result = controller.render(&scene);
        done.store(true, Ordering::Release);
        result
    })?;

    image::save_buffer(
        &output,
        frame.as_rgba_bytes(),
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
    )
    .with_context(|| format!("Failed to save {}", output))?;

    log::info!(
        "Saved {} ({} samples in {:.2?})",
        output,
        frame.samples,
        frame.duration
    );
    Ok(())
}

fn build_scene() -> Scene {
    let mut scene = Scene::new("simple");
    let mut rng = StdRng::seed_from_u64(2024);

    // Ground
    let ground = scene.add_material(Material::lambertian(Color::new(0.5, 0.5, 0.5)));
    scene.add_sphere(Sphere::new(Vec3::new(0.0, -1000.0, 0.0), 1000.0, ground));

    // Three main spheres
    let glass = scene.add_material(Material::dielectric(1.5));
    scene.add_sphere(Sphere::new(Vec3::new(0.0, 1.0, 0.0), 1.0, glass));

    let brown = scene.add_material(Material::lambertian(Color::new(0.4, 0.2, 0.1)));
    scene.add_sphere(Sphere::new(Vec3::new(-4.0, 1.0, 0.0), 1.0, brown));

    let mirror = scene.add_material(Material::metal(Color::new(0.7, 0.6, 0.5), 0.0));
    scene.add_sphere(Sphere::new(Vec3::new(4.0, 1.0, 0.0), 1.0, mirror));

    // Small random spheres
    for a in -5..5 {
        for b in -5..5 {
            let center = Vec3::new(
                a as f32 + 0.9 * rng.gen::<f32>(),
                0.2,
                b as f32 + 0.9 * rng.gen::<f32>(),
            );
            if (center - Vec3::new(4.0, 0.2, 0.0)).length() <= 0.9 {
                continue;
            }

            let choose_mat: f32 = rng.gen();
            let material = if choose_mat < 0.8 {
                // Diffuse
                let albedo = Color::new(
                    rng.gen::<f32>() * rng.gen::<f32>(),
                    rng.gen::<f32>() * rng.gen::<f32>(),
                    rng.gen::<f32>() * rng.gen::<f32>(),
                );
                Material::lambertian(albedo)
            } else if choose_mat < 0.95 {
                // Metal
                let albedo = Color::new(
                    0.5 + 0.5 * rng.gen::<f32>(),
                    0.5 + 0.5 * rng.gen::<f32>(),
                    0.5 + 0.5 * rng.gen::<f32>(),
                );
                Material::metal(albedo, 0.5 * rng.gen::<f32>())
            } else {
                // Tinted glass
                Material::glass(Color::new(0.9, 1.0, 0.9), 1.5, 0.05)
            };
            let id = scene.add_material(material);
            scene.add_sphere(Sphere::new(center, 0.2, id));
        }
    }

    // Smooth-shaded pyramid behind the spheres
    let copper = scene.add_material(Material::metal(Color::new(0.8, 0.5, 0.3), 0.2));
    let mut pyramid = Mesh::from_indices(
        "pyramid",
        vec![
            Vec3::new(-2.0, 0.0, -4.0),
            Vec3::new(2.0, 0.0, -4.0),
            Vec3::new(2.0, 0.0, -8.0),
            Vec3::new(-2.0, 0.0, -8.0),
            Vec3::new(0.0, 3.0, -6.0),
        ],
        &[0, 1, 4, 1, 2, 4, 2, 3, 4, 3, 0, 4],
        copper,
    );
    pyramid.compute_normals();
    scene.add_mesh(pyramid);

    scene.add_light(Light::new(Vec3::new(0.0, 8.0, 4.0), 1.5, Color::splat(6.0)));

    scene
        .with_camera(
            Camera::new()
                .with_position(Vec3::new(13.0, 2.0, 3.0), Vec3::ZERO, Vec3::Y)
                .with_fov(20.0),
        )
        .with_settings(
            RenderSettings::default()
                .with_resolution(800, 450)
                .with_quality(64, 12)
                .with_tiles(32, 32, TileOrder::FromMiddle),
        )
}
