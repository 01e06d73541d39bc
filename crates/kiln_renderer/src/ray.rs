//! Ray type for path tracing.
//!
//! On top of the geometric ray this tracks the medium the ray is travelling
//! through (for nested transparent objects) and how many bounces produced it.

use kiln_core::MaterialId;
use kiln_math::Vec3;

/// A path segment. Immutable; every bounce produces a new `Ray`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Origin point of the ray
    origin: Vec3,
    /// Unit direction vector
    direction: Vec3,
    /// Dielectric material the ray is inside of, `None` for open space
    medium: Option<MaterialId>,
    /// Number of bounces that led to this ray (0 for camera rays)
    depth: u32,
}

impl Ray {
    /// Create a camera-depth ray in open space. The direction is normalized.
    #[inline]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
            medium: None,
            depth: 0,
        }
    }

    /// Create the ray that continues a path after a bounce.
    #[inline]
    pub fn bounce(&self, origin: Vec3, direction: Vec3, medium: Option<MaterialId>) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
            medium,
            depth: self.depth + 1,
        }
    }

    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    #[inline]
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    #[inline]
    pub fn medium(&self) -> Option<MaterialId> {
        self.medium
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Compute a point along the ray at parameter t.
    /// P(t) = origin + t * direction
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + t * self.direction
    }

    /// The purely geometric part of the ray, for bounding-box tests.
    #[inline]
    pub fn geometry(&self) -> kiln_math::Ray {
        kiln_math::Ray {
            origin: self.origin,
            direction: self.direction,
        }
    }
}

impl From<kiln_math::Ray> for Ray {
    fn from(ray: kiln_math::Ray) -> Self {
        Ray::new(ray.origin, ray.direction)
    }
}
