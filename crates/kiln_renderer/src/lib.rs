//! kiln renderer - tile-scheduled CPU path tracing
//!
//! A Monte Carlo path tracer for physically-based rendering:
//!
//! - **Geometry**: sphere and triangle intersection, one BVH per mesh
//! - **World**: closest hit across spheres and meshes, nested media tracking
//! - **Integrator**: iterative path loop with Russian roulette
//! - **Scheduling**: tiles claimed through an atomic cursor by scoped worker
//!   threads, accumulated into a lock-free double-precision buffer
//!
//! # Example
//!
//! ```ignore
//! use kiln_renderer::RenderController;
//!
//! let controller = RenderController::new();
//! let handle = controller.handle(); // pause/abort/progress from another thread
//! let frame = controller.render(&scene)?;
//! image::save_buffer("out.png", frame.as_rgba_bytes(), frame.width, frame.height, image::ColorType::Rgba8)?;
//! ```

mod bvh;
mod controller;
mod error;
mod framebuffer;
mod hittable;
mod material;
mod ray;
mod sphere;
mod tile;
mod tracer;
mod triangle;
mod worker;
mod world;

pub use bvh::Bvh;
pub use controller::{RenderController, RenderHandle, RenderState, DEFAULT_POLL_INTERVAL};
pub use error::{RenderError, RenderResult};
pub use framebuffer::{color_to_rgba, linear_to_gamma, AccumulationBuffer, DisplayBuffer, Frame};
pub use hittable::{closest_hit_linear, HitRecord, Hittable};
pub use material::{Scatter, ScatterRecord};
pub use ray::Ray;
pub use tile::{partition, tile_count, Tile, TilePool, TileSnapshot};
pub use tracer::trace;
pub use triangle::Triangle;
pub use world::{World, EPSILON};

/// Re-export Vec3 and common math types from kiln_math
pub use kiln_math::{Aabb, Interval, Vec3};
