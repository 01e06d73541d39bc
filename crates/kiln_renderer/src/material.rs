//! Scattering behaviour for scene materials.

use crate::{HitRecord, Ray};
use kiln_core::{Color, Material};
use kiln_math::Vec3;
use rand::{Rng, RngCore};

/// Result of a successful scatter.
#[derive(Debug, Clone, Copy)]
pub struct ScatterRecord {
    /// Fraction of incoming light carried by the scattered ray
    pub attenuation: Color,
    /// Continuation of the path
    pub scattered: Ray,
}

/// How light interacts with a surface.
pub trait Scatter {
    /// Scatter an incoming ray.
    ///
    /// Returns `None` if the ray is absorbed. All randomness is drawn from
    /// `rng`, so a path is reproducible from the generator state.
    fn scatter(&self, ray_in: &Ray, rec: &HitRecord, rng: &mut dyn RngCore)
        -> Option<ScatterRecord>;

    /// Light emitted at the hit point. Most materials return black.
    fn emitted(&self, _rec: &HitRecord) -> Color {
        Color::ZERO
    }
}

impl Scatter for Material {
    fn scatter(
        &self,
        ray_in: &Ray,
        rec: &HitRecord,
        rng: &mut dyn RngCore,
    ) -> Option<ScatterRecord> {
        match *self {
            Material::Lambertian { albedo } => {
                // Scatter in a random direction on the hemisphere around the normal
                let mut scatter_direction = rec.normal + random_unit_vector(rng);

                // Catch degenerate scatter direction
                if scatter_direction.length_squared() < 1e-8 {
                    scatter_direction = rec.normal;
                }

                Some(ScatterRecord {
                    attenuation: albedo,
                    scattered: ray_in.bounce(rec.p, scatter_direction, ray_in.medium()),
                })
            }

            Material::Metal { albedo, fuzz } => {
                let reflected = reflect(ray_in.direction(), rec.normal);
                let direction = reflected + fuzz * random_unit_vector(rng);

                // Fuzz pushed the ray below the surface
                if direction.dot(rec.normal) <= 0.0 {
                    return None;
                }

                Some(ScatterRecord {
                    attenuation: albedo,
                    scattered: ray_in.bounce(rec.p, direction, ray_in.medium()),
                })
            }

            Material::Dielectric {
                tint,
                ior,
                roughness,
            } => {
                let refraction_ratio = if rec.front_face { 1.0 / ior } else { ior };

                let unit_direction = ray_in.direction();
                let cos_theta = (-unit_direction).dot(rec.normal).min(1.0);
                let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();

                // Check for total internal reflection
                let cannot_refract = refraction_ratio * sin_theta > 1.0;

                let (direction, medium) = if cannot_refract
                    || reflectance(cos_theta, refraction_ratio) > rng.gen::<f32>()
                {
                    (reflect(unit_direction, rec.normal), ray_in.medium())
                } else {
                    (refract(unit_direction, rec.normal, refraction_ratio), rec.medium)
                };

                let perturbed = direction + roughness * random_unit_vector(rng);
                let direction = if perturbed.length_squared() < 1e-8 {
                    direction
                } else {
                    perturbed
                };

                Some(ScatterRecord {
                    attenuation: tint,
                    scattered: ray_in.bounce(rec.p, direction, medium),
                })
            }

            // Lights don't scatter rays
            Material::Emissive { .. } => None,
        }
    }

    fn emitted(&self, _rec: &HitRecord) -> Color {
        self.emission()
    }
}

// =============================================================================
// Helper functions
// =============================================================================

/// Reflect a vector about a normal.
#[inline]
pub(crate) fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Refract a vector through a surface.
#[inline]
pub(crate) fn refract(uv: Vec3, n: Vec3, etai_over_etat: f32) -> Vec3 {
    let cos_theta = (-uv).dot(n).min(1.0);
    let r_out_perp = etai_over_etat * (uv + cos_theta * n);
    let r_out_parallel = -(1.0 - r_out_perp.length_squared()).abs().sqrt() * n;
    r_out_perp + r_out_parallel
}

/// Schlick's approximation for reflectance
#[inline]
fn reflectance(cosine: f32, ior: f32) -> f32 {
    let r0 = ((1.0 - ior) / (1.0 + ior)).powi(2);
    r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
}

/// Generate a random unit vector on the unit sphere.
pub(crate) fn random_unit_vector(rng: &mut dyn RngCore) -> Vec3 {
    // Use rejection sampling for uniform distribution on sphere
    loop {
        let v = Vec3::new(
            rng.gen::<f32>() * 2.0 - 1.0,
            rng.gen::<f32>() * 2.0 - 1.0,
            rng.gen::<f32>() * 2.0 - 1.0,
        );
        let len_sq = v.length_squared();
        if len_sq > 1e-6 && len_sq <= 1.0 {
            return v / len_sq.sqrt();
        }
    }
}
