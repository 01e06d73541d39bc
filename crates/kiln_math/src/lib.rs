// Re-export glam for convenience
pub use glam::*;

// kiln math types
mod aabb;
mod interval;
mod ray;

pub use aabb::Aabb;
pub use interval::Interval;
pub use ray::Ray;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_creation() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(v.x, 1.0);
        assert_eq!(v.y, 2.0);
        assert_eq!(v.z, 3.0);
    }

    #[test]
    fn test_dvec3_accumulates_vec3() {
        let mut acc = DVec3::ZERO;
        acc += Vec3::new(0.5, 0.25, 1.0).as_dvec3();
        acc += Vec3::new(0.5, 0.25, 1.0).as_dvec3();
        assert_eq!(acc, DVec3::new(1.0, 0.5, 2.0));
    }
}
