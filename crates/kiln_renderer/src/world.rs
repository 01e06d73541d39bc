//! Render-time view of a scene: the intersection engine.
//!
//! `World` is built once per render from a read-only `Scene`. Lights become
//! emissive spheres and every mesh gets its own BVH. After construction the
//! world is immutable and shared by reference across all workers.

use crate::hittable::closest_hit_linear;
use crate::{Bvh, HitRecord, Ray, Triangle};
use kiln_core::{Background, Material, MaterialId, Scene, Sphere};
use kiln_math::Interval;
use rayon::prelude::*;

/// Minimum hit distance; keeps bounced rays from re-hitting their origin.
pub const EPSILON: f32 = 1e-3;

pub struct World {
    materials: Vec<Material>,
    /// Scene spheres followed by light spheres
    spheres: Vec<Sphere>,
    meshes: Vec<Bvh<Triangle>>,
    background: Background,
}

impl World {
    /// Build the acceleration structures for `scene`.
    pub fn build(scene: &Scene) -> Self {
        let mut materials = scene.materials.clone();
        let mut spheres = scene.spheres.clone();

        for light in &scene.lights {
            if light.radius <= 0.0 {
                log::warn!(
                    "Light at {:?} has radius {} and cannot be hit by paths, skipping it",
                    light.position,
                    light.radius
                );
                continue;
            }
            let material = materials.len();
            materials.push(Material::emissive(light.intensity));
            spheres.push(Sphere::new(light.position, light.radius, material));
        }

        let meshes: Vec<Bvh<Triangle>> = scene
            .meshes
            .par_iter()
            .map(|mesh| {
                let triangles: Vec<Triangle> = mesh
                    .faces
                    .iter()
                    .filter_map(|face| Triangle::from_face(mesh, face))
                    .collect();

                let skipped = mesh.faces.len() - triangles.len();
                if skipped > 0 {
                    log::warn!("Mesh '{}': skipped {} unresolvable faces", mesh.name, skipped);
                }
                let degenerate = triangles.iter().filter(|t| t.is_degenerate()).count();

                let bvh = Bvh::new(triangles);
                log::debug!(
                    "BVH '{}': {} triangles ({} degenerate), {} nodes, depth {}",
                    mesh.name,
                    bvh.len(),
                    degenerate,
                    bvh.node_count(),
                    bvh.depth()
                );
                bvh
            })
            .collect();

        Self {
            materials,
            spheres,
            meshes,
            background: scene.background,
        }
    }

    /// Closest hit along `ray` in `(EPSILON, max_distance]`.
    ///
    /// Spheres are tested first, then meshes in scene order. A later
    /// candidate only replaces the current best when strictly closer.
    pub fn intersect(&self, ray: &Ray, max_distance: f32) -> Option<HitRecord> {
        if self.is_empty() {
            return None;
        }

        let ray_t = Interval::new(EPSILON, max_distance);
        let mut closest = closest_hit_linear(&self.spheres, ray, ray_t).map(|(_, rec)| rec);

        for mesh in &self.meshes {
            let max = closest.map_or(max_distance, |rec| rec.t);
            if let Some((_, rec)) = mesh.closest_hit(ray, ray_t.with_max(max)) {
                if closest.map_or(true, |best| rec.t < best.t) {
                    closest = Some(rec);
                }
            }
        }

        closest.map(|mut rec| {
            rec.medium = self.medium_after(ray, &rec);
            rec
        })
    }

    /// Medium a ray continuing through the surface at `rec` travels in.
    fn medium_after(&self, ray: &Ray, rec: &HitRecord) -> Option<MaterialId> {
        match self.materials.get(rec.material) {
            Some(material) if material.is_transmissive() => {
                if rec.front_face {
                    Some(rec.material)
                } else {
                    None
                }
            }
            _ => ray.medium(),
        }
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id)
    }

    pub fn background(&self) -> &Background {
        &self.background
    }

    /// True when there is nothing to intersect.
    pub fn is_empty(&self) -> bool {
        self.spheres.is_empty() && self.meshes.iter().all(Bvh::is_empty)
    }

    /// Number of spheres, including those created for lights.
    pub fn sphere_count(&self) -> usize {
        self.spheres.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(Bvh::len).sum()
    }
}
