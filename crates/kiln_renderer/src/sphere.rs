//! Sphere intersection.

use crate::hittable::{accepts, HitRecord, Hittable};
use crate::Ray;
use kiln_core::Sphere;
use kiln_math::{Aabb, Interval, Vec3};
use std::f32::consts::PI;

/// Get the UV coordinates for a point on the unit sphere.
fn sphere_uv(p: Vec3) -> (f32, f32) {
    // theta: angle down from +Y
    // phi: angle around Y axis from +X
    let theta = (-p.y).clamp(-1.0, 1.0).acos();
    let phi = (-p.z).atan2(p.x) + PI;
    (phi / (2.0 * PI), theta / PI)
}

impl Hittable for Sphere {
    /// Closed-form quadratic: nearest root inside the accepted range.
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord> {
        if self.radius <= 0.0 {
            return None;
        }

        let oc = self.center - ray.origin();
        let a = ray.direction().length_squared();
        let h = ray.direction().dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = h * h - a * c;
        if !(discriminant >= 0.0) {
            return None;
        }

        let sqrtd = discriminant.sqrt();

        let mut root = (h - sqrtd) / a;
        if !accepts(ray_t, root) {
            root = (h + sqrtd) / a;
            if !accepts(ray_t, root) {
                return None;
            }
        }

        let p = ray.at(root);
        let outward_normal = (p - self.center) / self.radius;
        let (u, v) = sphere_uv(outward_normal);
        Some(HitRecord::new(ray, root, outward_normal, self.material).with_uv(u, v))
    }

    fn bounding_box(&self) -> Aabb {
        self.bounds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval() -> Interval {
        Interval::new(0.001, f32::INFINITY)
    }

    #[test]
    fn test_sphere_hit() {
        let sphere = Sphere::new(Vec3::new(0.0, 0.0, -1.0), 0.5, 3);
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));

        let rec = sphere.hit(&ray, interval()).unwrap();
        assert!((rec.t - 0.5).abs() < 0.001);
        assert!(rec.front_face);
        assert_eq!(rec.material, 3);
        assert!((rec.normal - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_sphere_miss() {
        let sphere = Sphere::new(Vec3::new(0.0, 0.0, -1.0), 0.5, 0);
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0));
        assert!(sphere.hit(&ray, interval()).is_none());
    }

    #[test]
    fn test_hit_from_inside_uses_far_root() {
        let sphere = Sphere::new(Vec3::ZERO, 2.0, 0);
        let ray = Ray::new(Vec3::ZERO, Vec3::X);

        let rec = sphere.hit(&ray, interval()).unwrap();
        assert!((rec.t - 2.0).abs() < 1e-5);
        assert!(!rec.front_face);
        assert!((rec.normal + Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_respects_max_distance() {
        let sphere = Sphere::new(Vec3::new(0.0, 0.0, -10.0), 1.0, 0);
        let ray = Ray::new(Vec3::ZERO, -Vec3::Z);
        assert!(sphere.hit(&ray, Interval::new(0.001, 8.0)).is_none());
        assert!(sphere.hit(&ray, Interval::new(0.001, 9.0)).is_some());
    }

    #[test]
    fn test_degenerate_sphere_never_hits() {
        let sphere = Sphere::new(Vec3::new(0.0, 0.0, -1.0), 0.0, 0);
        let ray = Ray::new(Vec3::ZERO, -Vec3::Z);
        assert!(sphere.hit(&ray, interval()).is_none());
    }

    #[test]
    fn test_uv_range() {
        let (u, v) = sphere_uv(Vec3::Y);
        assert!((0.0..=1.0).contains(&u));
        assert!((v - 1.0).abs() < 1e-5);
    }
}
