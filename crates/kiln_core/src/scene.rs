//! Scene graph types for kiln.
//!
//! A `Scene` is produced once by an external loader and is read-only for
//! the lifetime of a render.

use kiln_math::{Aabb, Vec3};
use thiserror::Error;

use crate::camera::Camera;
use crate::material::{Color, Material, MaterialId};
use crate::mesh::Mesh;
use crate::settings::RenderSettings;

/// Structural problems found by `Scene::validate`.
#[derive(Error, Debug, PartialEq)]
pub enum SceneError {
    #[error("Sphere {index} references missing material {material}")]
    SphereMaterial { index: usize, material: MaterialId },

    #[error("Mesh '{mesh}' face {face} references missing material {material}")]
    FaceMaterial {
        mesh: String,
        face: usize,
        material: MaterialId,
    },

    #[error("Mesh '{mesh}' face {face} has an index outside its vertex arrays")]
    FaceIndex { mesh: String, face: usize },
}

pub type SceneResult<T> = Result<T, SceneError>;

/// A standalone analytic sphere.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
    pub material: MaterialId,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32, material: MaterialId) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
            material,
        }
    }

    pub fn bounds(&self) -> Aabb {
        let rvec = Vec3::splat(self.radius);
        Aabb::from_points(self.center - rvec, self.center + rvec)
    }
}

/// A spherical area light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub position: Vec3,
    pub radius: f32,
    pub intensity: Color,
}

impl Light {
    pub fn new(position: Vec3, radius: f32, intensity: Color) -> Self {
        Self {
            position,
            radius,
            intensity,
        }
    }
}

/// Radiance arriving from directions that hit nothing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Background {
    /// Linear blend from `bottom` (straight down) to `top` (straight up)
    Gradient { bottom: Color, top: Color },
    /// Constant color in every direction
    Solid(Color),
}

impl Default for Background {
    fn default() -> Self {
        Background::Gradient {
            bottom: Color::ONE,
            top: Color::new(0.5, 0.7, 1.0),
        }
    }
}

impl Background {
    /// Evaluate the background along a ray direction.
    pub fn color(&self, direction: Vec3) -> Color {
        match *self {
            Background::Gradient { bottom, top } => {
                let unit_direction = direction.normalize_or_zero();
                let a = 0.5 * (unit_direction.y + 1.0);
                bottom * (1.0 - a) + top * a
            }
            Background::Solid(color) => color,
        }
    }
}

/// A complete scene: geometry, materials, lights, camera and render parameters.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    /// Scene name (usually from filename)
    pub name: String,

    pub materials: Vec<Material>,

    /// Analytic spheres, intersected in this order
    pub spheres: Vec<Sphere>,

    /// Triangle meshes, intersected in this order after the spheres
    pub meshes: Vec<Mesh>,

    pub lights: Vec<Light>,

    pub camera: Camera,

    pub background: Background,

    pub settings: RenderSettings,
}

impl Scene {
    /// Create an empty scene.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a material to the scene and return its ID.
    pub fn add_material(&mut self, material: Material) -> MaterialId {
        let id = self.materials.len();
        self.materials.push(material);
        id
    }

    pub fn add_sphere(&mut self, sphere: Sphere) {
        self.spheres.push(sphere);
    }

    pub fn add_mesh(&mut self, mesh: Mesh) {
        self.meshes.push(mesh);
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_settings(mut self, settings: RenderSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }

    /// Get a material by ID.
    pub fn get_material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id)
    }

    /// Get total triangle count across all meshes.
    pub fn total_triangle_count(&self) -> usize {
        self.meshes.iter().map(Mesh::triangle_count).sum()
    }

    /// Number of intersectable primitives (spheres, triangles, lights).
    pub fn primitive_count(&self) -> usize {
        self.spheres.len() + self.total_triangle_count() + self.lights.len()
    }

    /// Check that every material and vertex reference resolves.
    pub fn validate(&self) -> SceneResult<()> {
        let material_count = self.materials.len();

        for (index, sphere) in self.spheres.iter().enumerate() {
            if sphere.material >= material_count {
                return Err(SceneError::SphereMaterial {
                    index,
                    material: sphere.material,
                });
            }
        }

        for mesh in &self.meshes {
            for (face_index, face) in mesh.faces.iter().enumerate() {
                if face.material >= material_count {
                    return Err(SceneError::FaceMaterial {
                        mesh: mesh.name.clone(),
                        face: face_index,
                        material: face.material,
                    });
                }

                let normals_ok = face.normals.is_none() || mesh.face_normals(face).is_some();
                let uvs_ok = face.uvs.is_none() || mesh.face_uvs(face).is_some();
                if mesh.face_positions(face).is_none() || !normals_ok || !uvs_ok {
                    return Err(SceneError::FaceIndex {
                        mesh: mesh.name.clone(),
                        face: face_index,
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Face;

    #[test]
    fn test_scene_creation() {
        let mut scene = Scene::new("test");
        let grey = scene.add_material(Material::default());
        scene.add_sphere(Sphere::new(Vec3::ZERO, 1.0, grey));
        scene.add_mesh(Mesh::from_indices(
            "triangle",
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            &[0, 1, 2],
            grey,
        ));
        scene.add_light(Light::new(Vec3::new(0.0, 5.0, 0.0), 0.5, Color::splat(10.0)));

        assert_eq!(grey, 0);
        assert_eq!(scene.total_triangle_count(), 1);
        assert_eq!(scene.primitive_count(), 3);
        assert_eq!(scene.validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_dangling_references() {
        let mut scene = Scene::new("broken");
        scene.add_sphere(Sphere::new(Vec3::ZERO, 1.0, 3));
        assert_eq!(
            scene.validate(),
            Err(SceneError::SphereMaterial { index: 0, material: 3 })
        );

        let mut scene = Scene::new("broken");
        let m = scene.add_material(Material::default());
        scene.add_mesh(Mesh::new(
            "tri",
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![Face::new([0, 1, 2], m).with_uvs([0, 1, 2])],
        ));
        assert!(matches!(scene.validate(), Err(SceneError::FaceIndex { face: 0, .. })));
    }

    #[test]
    fn test_background_gradient() {
        let background = Background::default();

        let up = background.color(Vec3::Y);
        let down = background.color(-Vec3::Y);
        assert!((up - Color::new(0.5, 0.7, 1.0)).length() < 1e-6);
        assert!((down - Color::ONE).length() < 1e-6);

        let solid = Background::Solid(Color::splat(0.25));
        assert_eq!(solid.color(Vec3::X), Color::splat(0.25));
    }

    #[test]
    fn test_negative_radius_clamped() {
        assert_eq!(Sphere::new(Vec3::ZERO, -2.0, 0).radius, 0.0);
    }
}
