//! Surface material descriptions.
//!
//! Materials here are plain data. The renderer implements the scattering
//! behaviour for each variant; this crate only stores the parameters the
//! scene loader provides.

use kiln_math::Vec3;

/// Color type alias (linear RGB, non-negative, unbounded above)
pub type Color = Vec3;

/// Index of a material in `Scene::materials`.
pub type MaterialId = usize;

/// A closed set of surface behaviours.
#[derive(Clone, Debug, PartialEq)]
pub enum Material {
    /// Ideal diffuse reflector.
    Lambertian { albedo: Color },

    /// Specular reflector. `fuzz` perturbs the mirror direction
    /// (0 = perfect mirror, 1 = very rough).
    Metal { albedo: Color, fuzz: f32 },

    /// Transparent refractive medium such as glass or water.
    Dielectric {
        /// Transmission tint
        tint: Color,
        /// Index of refraction (1.0 = air, 1.5 = glass, 2.4 = diamond)
        ior: f32,
        /// Perturbation of reflected/refracted directions
        roughness: f32,
    },

    /// Light emitter. Never scatters.
    Emissive { emission: Color },
}

impl Default for Material {
    fn default() -> Self {
        Material::Lambertian {
            albedo: Color::splat(0.5), // Grey default
        }
    }
}

impl Material {
    pub fn lambertian(albedo: Color) -> Self {
        Material::Lambertian { albedo }
    }

    pub fn metal(albedo: Color, fuzz: f32) -> Self {
        Material::Metal {
            albedo,
            fuzz: fuzz.clamp(0.0, 1.0),
        }
    }

    /// Clear glass-like dielectric with the given index of refraction.
    pub fn dielectric(ior: f32) -> Self {
        Material::Dielectric {
            tint: Color::ONE,
            ior,
            roughness: 0.0,
        }
    }

    /// Tinted, optionally rough dielectric.
    pub fn glass(tint: Color, ior: f32, roughness: f32) -> Self {
        Material::Dielectric {
            tint,
            ior,
            roughness: roughness.clamp(0.0, 1.0),
        }
    }

    pub fn emissive(emission: Color) -> Self {
        Material::Emissive { emission }
    }

    /// Light emitted by the surface (zero for non-emissive materials).
    pub fn emission(&self) -> Color {
        match self {
            Material::Emissive { emission } => *emission,
            _ => Color::ZERO,
        }
    }

    pub fn is_emissive(&self) -> bool {
        self.emission().length_squared() > 0.0
    }

    /// True for materials that light passes through.
    pub fn is_transmissive(&self) -> bool {
        matches!(self, Material::Dielectric { .. })
    }
}
