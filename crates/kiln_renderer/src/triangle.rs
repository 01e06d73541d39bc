//! Triangle primitive for ray tracing.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection.

use crate::hittable::{accepts, HitRecord, Hittable};
use crate::Ray;
use kiln_core::{Face, MaterialId, Mesh};
use kiln_math::{Aabb, Interval, Vec2, Vec3};

/// A mesh triangle with its corner data resolved from the mesh arrays.
#[derive(Debug, Clone)]
pub struct Triangle {
    /// Vertices
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
    /// Geometric face normal (unit length, zero for degenerate triangles)
    normal: Vec3,
    /// Per-corner shading normals
    normals: Option<[Vec3; 3]>,
    /// Per-corner texture coordinates
    uvs: Option<[Vec2; 3]>,
    material: MaterialId,
    bbox: Aabb,
}

impl Triangle {
    /// Create a flat-shaded triangle from three vertices.
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3, material: MaterialId) -> Self {
        let normal = (v1 - v0).cross(v2 - v0).normalize_or_zero();
        let min = v0.min(v1).min(v2);
        let max = v0.max(v1).max(v2);

        Self {
            v0,
            v1,
            v2,
            normal,
            normals: None,
            uvs: None,
            material,
            bbox: Aabb::from_points(min, max),
        }
    }

    /// Resolve a mesh face. Returns `None` if the face indexes outside the
    /// mesh's position array.
    pub fn from_face(mesh: &Mesh, face: &Face) -> Option<Self> {
        let [v0, v1, v2] = mesh.face_positions(face)?;
        let mut triangle = Self::new(v0, v1, v2, face.material);
        triangle.normals = mesh.face_normals(face);
        triangle.uvs = mesh.face_uvs(face);
        Some(triangle)
    }

    /// True when the triangle has no area and can never be hit.
    pub fn is_degenerate(&self) -> bool {
        self.normal == Vec3::ZERO
    }
}

impl Hittable for Triangle {
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord> {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;

        let h = ray.direction().cross(edge2);
        let a = edge1.dot(h);

        // Ray is parallel to triangle (or the triangle has no area)
        if !(a.abs() >= 1e-8) {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin() - self.v0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = f * ray.direction().dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(q);
        if !accepts(ray_t, t) {
            return None;
        }

        let mut rec = HitRecord::new(ray, t, self.normal, self.material);
        let w = 1.0 - u - v;

        if let Some([n0, n1, n2]) = self.normals {
            if let Some(shading) = (w * n0 + u * n1 + v * n2).try_normalize() {
                rec.normal = if rec.front_face { shading } else { -shading };
            }
        }

        let (tex_u, tex_v) = match self.uvs {
            Some([t0, t1, t2]) => {
                let uv = w * t0 + u * t1 + v * t2;
                (uv.x, uv.y)
            }
            None => (u, v),
        };

        Some(rec.with_uv(tex_u, tex_v))
    }

    fn bounding_box(&self) -> Aabb {
        self.bbox
    }
}
