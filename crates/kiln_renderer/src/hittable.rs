//! Hittable trait and HitRecord for ray-object intersection.

use crate::Ray;
use kiln_core::MaterialId;
use kiln_math::{Aabb, Interval, Vec3};

/// Record of a ray-object intersection. Built fresh for every query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitRecord {
    /// Parameter t where the intersection occurs
    pub t: f32,
    /// Point of intersection
    pub p: Vec3,
    /// Surface normal at intersection (always points against ray)
    pub normal: Vec3,
    /// Whether the ray hit the front face (outside) of the surface
    pub front_face: bool,
    /// UV texture coordinates
    pub u: f32,
    pub v: f32,
    /// Material at the intersection point
    pub material: MaterialId,
    /// Medium a ray entering the surface continues into. Filled in by the
    /// intersection engine; primitives leave it `None`.
    pub medium: Option<MaterialId>,
}

impl HitRecord {
    /// Build a record for a hit at distance `t` with the geometric outward normal.
    pub fn new(ray: &Ray, t: f32, outward_normal: Vec3, material: MaterialId) -> Self {
        let mut rec = Self {
            t,
            p: ray.at(t),
            normal: outward_normal,
            front_face: true,
            u: 0.0,
            v: 0.0,
            material,
            medium: None,
        };
        rec.set_face_normal(ray, outward_normal);
        rec
    }

    /// Set the face normal based on ray direction and outward normal.
    ///
    /// The normal is always stored pointing against the ray direction,
    /// so we need to track whether we hit the front or back face.
    pub fn set_face_normal(&mut self, ray: &Ray, outward_normal: Vec3) {
        self.front_face = ray.direction().dot(outward_normal) < 0.0;
        self.normal = if self.front_face {
            outward_normal
        } else {
            -outward_normal
        };
    }

    pub fn with_uv(mut self, u: f32, v: f32) -> Self {
        self.u = u;
        self.v = v;
        self
    }
}

/// Trait for objects that can be hit by rays.
pub trait Hittable: Send + Sync {
    /// Test if a ray hits this object at a distance t with
    /// `ray_t.min < t <= ray_t.max`.
    ///
    /// Degenerate geometry reports no hit.
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord>;

    /// Get the axis-aligned bounding box of this object.
    fn bounding_box(&self) -> Aabb;
}

/// Acceptance test shared by all primitives: open below (so a bounced ray
/// does not re-hit its own origin), closed above (so equal-distance
/// candidates reach the caller's tie-break).
#[inline]
pub(crate) fn accepts(ray_t: Interval, t: f32) -> bool {
    ray_t.min < t && t <= ray_t.max
}

/// Closest hit among `primitives` by linear scan.
///
/// Returns the primitive index with the record. On equal distances the
/// lower index wins.
pub fn closest_hit_linear<P: Hittable>(
    primitives: &[P],
    ray: &Ray,
    ray_t: Interval,
) -> Option<(usize, HitRecord)> {
    let mut closest: Option<(usize, HitRecord)> = None;

    for (index, primitive) in primitives.iter().enumerate() {
        let max = closest.map_or(ray_t.max, |(_, rec)| rec.t);
        if let Some(rec) = primitive.hit(ray, ray_t.with_max(max)) {
            if closest.map_or(true, |(_, best)| rec.t < best.t) {
                closest = Some((index, rec));
            }
        }
    }

    closest
}
