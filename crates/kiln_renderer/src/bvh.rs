//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! A binary tree over one collection of primitives. The tree stores indices
//! into the owned primitive list so a hit can be reported against the
//! primitive's position in that list, which keeps tie-breaking identical to
//! a front-to-back linear scan.

use crate::{HitRecord, Hittable, Ray};
use kiln_math::{Aabb, Interval, Vec3};

/// Maximum primitives per leaf node before splitting.
const LEAF_MAX_SIZE: usize = 4;

/// Depth at which splitting stops regardless of leaf size.
const MAX_DEPTH: usize = 32;

/// Subtrees larger than this are built on the rayon pool.
const PARALLEL_THRESHOLD: usize = 4096;

/// BVH node - either a branch with two children or a leaf with primitives.
#[derive(Debug)]
enum BvhNode {
    /// Internal node with two children.
    Branch {
        left: Box<BvhNode>,
        right: Box<BvhNode>,
        bbox: Aabb,
    },
    /// Leaf node holding indices into `Bvh::primitives`.
    Leaf { primitives: Vec<u32>, bbox: Aabb },
}

impl BvhNode {
    fn bbox(&self) -> &Aabb {
        match self {
            BvhNode::Branch { bbox, .. } | BvhNode::Leaf { bbox, .. } => bbox,
        }
    }

    fn node_count(&self) -> usize {
        match self {
            BvhNode::Branch { left, right, .. } => 1 + left.node_count() + right.node_count(),
            BvhNode::Leaf { .. } => 1,
        }
    }

    fn depth(&self) -> usize {
        match self {
            BvhNode::Branch { left, right, .. } => 1 + left.depth().max(right.depth()),
            BvhNode::Leaf { .. } => 1,
        }
    }
}

/// Per-primitive data the build needs, computed once up front.
struct BuildInfo {
    bounds: Vec<Aabb>,
    centroids: Vec<Vec3>,
}

/// Bounding volume hierarchy owning its primitives.
#[derive(Debug)]
pub struct Bvh<P> {
    primitives: Vec<P>,
    root: Option<BvhNode>,
}

impl<P: Hittable> Bvh<P> {
    /// Build a BVH over `primitives`.
    ///
    /// Simple median-split approach: sort primitives by centroid on the
    /// longest centroid axis, split in half, recurse.
    pub fn new(primitives: Vec<P>) -> Self {
        if primitives.is_empty() {
            return Self {
                primitives,
                root: None,
            };
        }

        let bounds: Vec<Aabb> = primitives.iter().map(Hittable::bounding_box).collect();
        let centroids = bounds.iter().map(Aabb::centroid).collect();
        let info = BuildInfo { bounds, centroids };

        let indices: Vec<u32> = (0..primitives.len() as u32).collect();
        let root = Self::build(&info, indices, 0);

        Self {
            primitives,
            root: Some(root),
        }
    }

    fn build(info: &BuildInfo, mut indices: Vec<u32>, depth: usize) -> BvhNode {
        // Compute bounding box of all primitives in this subtree
        let bbox = indices.iter().fold(Aabb::EMPTY, |acc, &i| {
            Aabb::surrounding(&acc, &info.bounds[i as usize])
        });

        if indices.len() <= LEAF_MAX_SIZE || depth >= MAX_DEPTH {
            return BvhNode::Leaf {
                primitives: indices,
                bbox,
            };
        }

        // Choose split axis based on centroid spread
        let centroid_bounds = indices.iter().fold(Aabb::EMPTY, |acc, &i| {
            acc.grow(info.centroids[i as usize])
        });
        let axis = centroid_bounds.longest_axis();

        // Stable sort keeps equal-centroid primitives in input order
        indices.sort_by(|&a, &b| {
            info.centroids[a as usize][axis].total_cmp(&info.centroids[b as usize][axis])
        });

        // Split at midpoint
        let mid = indices.len() / 2;
        let right_indices = indices.split_off(mid);
        let left_indices = indices;

        let (left, right) = if left_indices.len() + right_indices.len() > PARALLEL_THRESHOLD {
            rayon::join(
                || Self::build(info, left_indices, depth + 1),
                || Self::build(info, right_indices, depth + 1),
            )
        } else {
            (
                Self::build(info, left_indices, depth + 1),
                Self::build(info, right_indices, depth + 1),
            )
        };

        BvhNode::Branch {
            left: Box::new(left),
            right: Box::new(right),
            bbox,
        }
    }

    pub fn primitives(&self) -> &[P] {
        &self.primitives
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// Total number of tree nodes (0 for an empty tree).
    pub fn node_count(&self) -> usize {
        self.root.as_ref().map_or(0, BvhNode::node_count)
    }

    /// Length of the longest root-to-leaf path (0 for an empty tree).
    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, BvhNode::depth)
    }

    /// Closest primitive hit in `ray_t`, with the primitive's index.
    ///
    /// Equal distances resolve to the lower index, exactly as
    /// [`closest_hit_linear`](crate::hittable::closest_hit_linear) would.
    pub fn closest_hit(&self, ray: &Ray, ray_t: Interval) -> Option<(usize, HitRecord)> {
        let root = self.root.as_ref()?;
        let geometry = ray.geometry();
        root.bbox().hit(&geometry, ray_t)?;

        let mut best = None;
        self.traverse(root, ray, &geometry, ray_t, &mut best);
        best.map(|(index, rec)| (index as usize, rec))
    }

    fn traverse(
        &self,
        node: &BvhNode,
        ray: &Ray,
        geometry: &kiln_math::Ray,
        ray_t: Interval,
        best: &mut Option<(u32, HitRecord)>,
    ) {
        match node {
            BvhNode::Leaf { primitives, .. } => {
                for &index in primitives {
                    let max = best_distance(best, ray_t.max);
                    let Some(rec) = self.primitives[index as usize].hit(ray, ray_t.with_max(max))
                    else {
                        continue;
                    };

                    let closer = match *best {
                        None => true,
                        Some((best_index, best_rec)) => {
                            rec.t < best_rec.t || (rec.t == best_rec.t && index < best_index)
                        }
                    };
                    if closer {
                        *best = Some((index, rec));
                    }
                }
            }

            BvhNode::Branch { left, right, .. } => {
                let max = best_distance(best, ray_t.max);
                let t_left = left.bbox().hit(geometry, ray_t.with_max(max));
                let t_right = right.bbox().hit(geometry, ray_t.with_max(max));

                // Near child first so the far one is usually pruned
                let mut children = [(left, t_left), (right, t_right)];
                if let (Some(a), Some(b)) = (t_left, t_right) {
                    if b < a {
                        children.swap(0, 1);
                    }
                }

                for (child, entry) in children {
                    let Some(entry) = entry else {
                        continue;
                    };
                    // Inclusive so an equal-distance hit can still win on index
                    if entry <= best_distance(best, ray_t.max) {
                        self.traverse(child, ray, geometry, ray_t, best);
                    }
                }
            }
        }
    }
}

#[inline]
fn best_distance(best: &Option<(u32, HitRecord)>, default: f32) -> f32 {
    best.as_ref().map_or(default, |(_, rec)| rec.t)
}

impl<P: Hittable> Hittable for Bvh<P> {
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord> {
        self.closest_hit(ray, ray_t).map(|(_, rec)| rec)
    }

    fn bounding_box(&self) -> Aabb {
        self.root.as_ref().map_or(Aabb::EMPTY, |root| *root.bbox())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hittable::closest_hit_linear;
    use crate::Triangle;
    use kiln_core::Sphere;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn interval() -> Interval {
        Interval::new(0.001, f32::INFINITY)
    }

    fn random_vec(rng: &mut StdRng, extent: f32) -> Vec3 {
        Vec3::new(
            rng.gen_range(-extent..extent),
            rng.gen_range(-extent..extent),
            rng.gen_range(-extent..extent),
        )
    }

    #[test]
    fn test_bvh_empty() {
        let bvh: Bvh<Sphere> = Bvh::new(vec![]);
        assert!(bvh.is_empty());
        assert_eq!(bvh.node_count(), 0);
        assert_eq!(bvh.depth(), 0);

        let ray = Ray::new(Vec3::ZERO, -Vec3::Z);
        assert!(bvh.closest_hit(&ray, interval()).is_none());
        assert!(bvh.bounding_box().is_empty());
    }

    #[test]
    fn test_bvh_single_sphere() {
        let bvh = Bvh::new(vec![Sphere::new(Vec3::new(0.0, 0.0, -1.0), 0.5, 0)]);

        // Should create a single leaf
        assert_eq!(bvh.node_count(), 1);

        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        let (index, rec) = bvh.closest_hit(&ray, interval()).unwrap();
        assert_eq!(index, 0);
        assert!((rec.t - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_bvh_multiple_spheres() {
        let spheres: Vec<Sphere> = (0..10)
            .map(|i| Sphere::new(Vec3::new(i as f32, 0.0, -5.0), 0.5, i))
            .collect();
        let bvh = Bvh::new(spheres);
        assert!(bvh.depth() > 1);

        // Test ray that hits sphere at x=5
        let ray = Ray::new(Vec3::new(5.0, 0.0, 0.0), Vec3::new(0.0, 0.0, -1.0));
        let (index, rec) = bvh.closest_hit(&ray, interval()).unwrap();
        assert_eq!(index, 5);

        // Hit point should be near z = -4.5 (sphere at z=-5, radius 0.5)
        assert!((rec.p.z - (-4.5)).abs() < 0.01);
    }

    #[test]
    fn test_coincident_primitives_resolve_to_lowest_index() {
        // Same sphere repeated: the BVH must report the first copy
        let mut spheres: Vec<Sphere> = (0..20)
            .map(|i| Sphere::new(Vec3::new(i as f32 * 3.0, 0.0, -5.0), 1.0, i))
            .collect();
        spheres.push(Sphere::new(Vec3::new(30.0, 0.0, -5.0), 1.0, 99));
        spheres.push(Sphere::new(Vec3::new(30.0, 0.0, -5.0), 1.0, 100));

        let bvh = Bvh::new(spheres.clone());
        let ray = Ray::new(Vec3::new(30.0, 0.0, 0.0), -Vec3::Z);

        let (bvh_index, _) = bvh.closest_hit(&ray, interval()).unwrap();
        let (linear_index, _) = closest_hit_linear(&spheres, &ray, interval()).unwrap();
        assert_eq!(bvh_index, linear_index);
        assert_eq!(bvh_index, 10);
    }

    #[test]
    fn test_bvh_matches_linear_scan_on_random_triangles() {
        let mut rng = StdRng::seed_from_u64(7);

        let triangles: Vec<Triangle> = (0..500)
            .map(|i| {
                let base = random_vec(&mut rng, 10.0);
                Triangle::new(
                    base,
                    base + random_vec(&mut rng, 1.0),
                    base + random_vec(&mut rng, 1.0),
                    i,
                )
            })
            .collect();
        let bvh = Bvh::new(triangles.clone());

        for _ in 0..500 {
            let origin = random_vec(&mut rng, 15.0);
            let target = random_vec(&mut rng, 5.0);
            let ray = Ray::new(origin, target - origin);

            let expected = closest_hit_linear(&triangles, &ray, interval());
            let actual = bvh.closest_hit(&ray, interval());

            match (expected, actual) {
                (None, None) => {}
                (Some((ei, erec)), Some((ai, arec))) => {
                    assert_eq!(ei, ai);
                    assert_eq!(erec.t, arec.t);
                }
                (e, a) => panic!("linear {:?} vs bvh {:?}", e.map(|h| h.0), a.map(|h| h.0)),
            }
        }
    }

    #[test]
    fn test_large_bvh_builds_in_parallel() {
        let mut rng = StdRng::seed_from_u64(11);
        let spheres: Vec<Sphere> = (0..6000)
            .map(|i| Sphere::new(random_vec(&mut rng, 50.0), 0.2, i))
            .collect();
        let bvh = Bvh::new(spheres.clone());

        assert_eq!(bvh.len(), 6000);
        assert!(bvh.depth() <= MAX_DEPTH + 1);

        for _ in 0..100 {
            let origin = random_vec(&mut rng, 60.0);
            let ray = Ray::new(origin, -origin);
            let expected = closest_hit_linear(&spheres, &ray, interval()).map(|(i, _)| i);
            let actual = bvh.closest_hit(&ray, interval()).map(|(i, _)| i);
            assert_eq!(expected, actual);
        }
    }
}
