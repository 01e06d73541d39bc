//! Monte Carlo path tracing integrator.
//!
//! Implements the path loop with:
//! - Bounce limit from the render settings
//! - Russian roulette termination from the third bounce on
//! - Emission gathered at every hit

use crate::{Ray, Scatter, World};
use kiln_core::Color;
use rand::{Rng, RngCore};

/// Depth from which Russian roulette may end a path.
const ROULETTE_DEPTH: u32 = 2;

/// Compute the radiance arriving along `ray`.
///
/// The path is followed iteratively with a running throughput, which is
/// equivalent to recursing `emitted + attenuation * trace(scattered)`.
/// A path that reaches `max_bounces` returns the emission of its last hit.
pub fn trace(ray: &Ray, world: &World, max_bounces: u32, rng: &mut dyn RngCore) -> Color {
    let mut radiance = Color::ZERO;
    let mut throughput = Color::ONE;
    let mut ray = *ray;

    loop {
        // Ray didn't hit anything - return background
        let Some(rec) = world.intersect(&ray, f32::INFINITY) else {
            radiance += throughput * world.background().color(ray.direction());
            break;
        };

        // A dangling material id absorbs the path
        let Some(material) = world.material(rec.material) else {
            break;
        };
        let emitted = material.emitted(&rec);

        if ray.depth() >= max_bounces {
            radiance += throughput * emitted;
            break;
        }

        let Some(result) = material.scatter(&ray, &rec, rng) else {
            // Ray was absorbed - just return emission
            radiance += throughput * emitted;
            break;
        };

        let mut probability = 1.0;
        if ray.depth() >= ROULETTE_DEPTH {
            probability = result.attenuation.max_element().clamp(f32::EPSILON, 1.0);
            if rng.gen::<f32>() > probability {
                radiance += throughput * emitted;
                break;
            }
        }

        radiance += throughput * emitted / probability;
        throughput *= result.attenuation / probability;
        ray = result.scattered;
    }

    radiance
}
