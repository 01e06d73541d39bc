//! kiln core - renderer-agnostic scene description.
//!
//! This crate provides the value types an external scene loader fills in
//! and the renderer consumes read-only:
//!
//! - **Geometry**: `Mesh` (shared vertex arrays + indexed `Face`s), `Sphere`
//! - **Shading**: `Material`, `Light`, `Background`
//! - **View and quality**: `Camera`, `RenderSettings`, `TileOrder`
//!
//! # Example
//!
//! ```ignore
//! use kiln_core::{Camera, Material, RenderSettings, Scene, Sphere};
//! use kiln_math::Vec3;
//!
//! let mut scene = Scene::new("demo");
//! let grey = scene.add_material(Material::lambertian(Vec3::splat(0.5)));
//! scene.add_sphere(Sphere::new(Vec3::ZERO, 1.0, grey));
//! scene.camera = Camera::new().with_position(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
//! scene.settings = RenderSettings::default().with_resolution(320, 240);
//! scene.validate()?;
//! ```

pub mod camera;
pub mod material;
pub mod mesh;
pub mod scene;
pub mod settings;

// Re-export commonly used types
pub use camera::Camera;
pub use material::{Color, Material, MaterialId};
pub use mesh::{Face, Mesh};
pub use scene::{Background, Light, Scene, SceneError, Sphere};
pub use settings::{RenderSettings, TileOrder};
