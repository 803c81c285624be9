// src/accel/bvh.rs
// Median-split BVH over the scene triangles; the reference ray oracle.
// This file provides closest-hit and any-hit queries with a flattened node
// array and stack-based traversal.
// RELEVANT FILES:src/accel/mod.rs,src/atlas/mod.rs,src/tracer.rs

use std::time::Instant;

use glam::Vec3;

use super::{Hit, Ray, RayOracle};
use crate::atlas::UnwrappedMesh;
use crate::error::{Error, Result};

const MAX_LEAF_SIZE: u32 = 4;
const MAX_DEPTH: u32 = 64;
const TRAVERSAL_STACK: usize = 64;

/// Axis-aligned bounding box with inverted empty bounds for unions.
#[derive(Debug, Clone, Copy)]
struct Aabb {
    min: Vec3,
    max: Vec3,
}

impl Aabb {
    fn empty() -> Self {
        Self {
            min: Vec3::INFINITY,
            max: Vec3::NEG_INFINITY,
        }
    }

    fn expand_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    fn expand_aabb(&mut self, other: &Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Slab test against the ray's current [tnear, tmax] window.
    #[inline]
    fn hit(&self, origin: Vec3, inv_dir: Vec3, tnear: f32, tmax: f32) -> bool {
        let t1 = (self.min - origin) * inv_dir;
        let t2 = (self.max - origin) * inv_dir;
        let lo = t1.min(t2);
        let hi = t1.max(t2);
        let t_enter = lo.max_element().max(tnear);
        let t_exit = hi.min_element().min(tmax);
        t_enter <= t_exit
    }
}

/// Flattened node. Leaves store a range into the primitive permutation;
/// internal nodes store child indices.
#[derive(Debug, Clone, Copy)]
struct BvhNode {
    aabb: Aabb,
    /// Leaf: first primitive. Internal: left child.
    left: u32,
    /// Leaf: primitive count. Internal: right child.
    right: u32,
    leaf: bool,
}

/// Reference `RayOracle`: a median-split BVH over the flattened scene.
///
/// Build is deterministic; traversal holds no mutable state, so one oracle
/// is shared read-only across every bake worker.
#[derive(Debug)]
pub struct BvhOracle {
    nodes: Vec<BvhNode>,
    prim_order: Vec<u32>,
    positions: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
}

impl BvhOracle {
    /// Build over a flat triangle list. An empty scene cannot answer
    /// queries and is reported as an oracle initialization failure.
    pub fn build(positions: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Result<Self> {
        if triangles.is_empty() {
            return Err(Error::oracle("cannot build over an empty triangle list"));
        }
        let start = Instant::now();

        let prim_aabbs: Vec<Aabb> = triangles
            .iter()
            .map(|tri| {
                let mut aabb = Aabb::empty();
                for &i in tri {
                    aabb.expand_point(positions[i as usize]);
                }
                aabb
            })
            .collect();
        let centroids: Vec<Vec3> = triangles
            .iter()
            .map(|tri| {
                (positions[tri[0] as usize]
                    + positions[tri[1] as usize]
                    + positions[tri[2] as usize])
                    / 3.0
            })
            .collect();

        let mut prim_order: Vec<u32> = (0..triangles.len() as u32).collect();
        let mut nodes = Vec::new();
        build_recursive(
            &prim_aabbs,
            &centroids,
            &mut prim_order,
            0,
            triangles.len() as u32,
            0,
            &mut nodes,
        );

        log::debug!(
            "bvh: {} triangles, {} nodes, built in {:.1} ms",
            triangles.len(),
            nodes.len(),
            start.elapsed().as_secs_f32() * 1000.0
        );

        Ok(Self {
            nodes,
            prim_order,
            positions,
            triangles,
        })
    }

    /// Build from an unwrapped mesh's flattened triangle soup.
    pub fn from_mesh(mesh: &UnwrappedMesh) -> Result<Self> {
        let soup = mesh.triangle_soup();
        Self::build(soup.positions, soup.triangles)
    }

    #[inline]
    fn triangle_hit(&self, prim: u32, ray: &Ray, tmax: f32) -> Option<(f32, Vec3)> {
        let tri = self.triangles[prim as usize];
        let v0 = self.positions[tri[0] as usize];
        let v1 = self.positions[tri[1] as usize];
        let v2 = self.positions[tri[2] as usize];
        intersect_triangle(ray.origin, ray.direction, v0, v1, v2, ray.tnear, tmax)
    }
}

impl RayOracle for BvhOracle {
    fn intersect(&self, ray: &Ray) -> Option<Hit> {
        let inv_dir = ray.direction.recip();
        let mut stack = [0u32; TRAVERSAL_STACK];
        let mut top = 0usize;
        stack[top] = 0;
        top += 1;

        let mut closest: Option<Hit> = None;
        let mut tmax = ray.tfar;

        while top > 0 {
            top -= 1;
            let node = &self.nodes[stack[top] as usize];
            if !node.aabb.hit(ray.origin, inv_dir, ray.tnear, tmax) {
                continue;
            }
            if node.leaf {
                for &prim in &self.prim_order[node.left as usize..(node.left + node.right) as usize]
                {
                    if let Some((t, normal_geo)) = self.triangle_hit(prim, ray, tmax) {
                        tmax = t;
                        closest = Some(Hit {
                            t,
                            prim_id: prim,
                            normal_geo,
                        });
                    }
                }
            } else {
                stack[top] = node.left;
                stack[top + 1] = node.right;
                top += 2;
            }
        }
        closest
    }

    fn occluded(&self, ray: &Ray) -> bool {
        let inv_dir = ray.direction.recip();
        let mut stack = [0u32; TRAVERSAL_STACK];
        let mut top = 0usize;
        stack[top] = 0;
        top += 1;

        while top > 0 {
            top -= 1;
            let node = &self.nodes[stack[top] as usize];
            if !node.aabb.hit(ray.origin, inv_dir, ray.tnear, ray.tfar) {
                continue;
            }
            if node.leaf {
                for &prim in &self.prim_order[node.left as usize..(node.left + node.right) as usize]
                {
                    if self.triangle_hit(prim, ray, ray.tfar).is_some() {
                        return true;
                    }
                }
            } else {
                stack[top] = node.left;
                stack[top + 1] = node.right;
                top += 2;
            }
        }
        false
    }
}

/// Recursive median split along the widest centroid axis. Returns the new
/// node's index.
fn build_recursive(
    prim_aabbs: &[Aabb],
    centroids: &[Vec3],
    prim_order: &mut [u32],
    first: u32,
    count: u32,
    depth: u32,
    nodes: &mut Vec<BvhNode>,
) -> u32 {
    let mut aabb = Aabb::empty();
    for &prim in &prim_order[first as usize..(first + count) as usize] {
        aabb.expand_aabb(&prim_aabbs[prim as usize]);
    }

    if count <= MAX_LEAF_SIZE || depth >= MAX_DEPTH {
        nodes.push(BvhNode {
            aabb,
            left: first,
            right: count,
            leaf: true,
        });
        return nodes.len() as u32 - 1;
    }

    let mut centroid_bounds = Aabb::empty();
    for &prim in &prim_order[first as usize..(first + count) as usize] {
        centroid_bounds.expand_point(centroids[prim as usize]);
    }
    let extent = centroid_bounds.max - centroid_bounds.min;
    let axis = if extent.x >= extent.y && extent.x >= extent.z {
        0
    } else if extent.y >= extent.z {
        1
    } else {
        2
    };

    // All centroids coincident: splitting cannot make progress.
    if extent[axis] <= f32::EPSILON {
        nodes.push(BvhNode {
            aabb,
            left: first,
            right: count,
            leaf: true,
        });
        return nodes.len() as u32 - 1;
    }

    let range = &mut prim_order[first as usize..(first + count) as usize];
    range.sort_unstable_by(|&a, &b| {
        centroids[a as usize][axis].total_cmp(&centroids[b as usize][axis])
    });
    let mid = count / 2;

    // Reserve the slot so children can link back by index.
    let node_index = nodes.len() as u32;
    nodes.push(BvhNode {
        aabb,
        left: 0,
        right: 0,
        leaf: false,
    });

    let left = build_recursive(
        prim_aabbs,
        centroids,
        prim_order,
        first,
        mid,
        depth + 1,
        nodes,
    );
    let right = build_recursive(
        prim_aabbs,
        centroids,
        prim_order,
        first + mid,
        count - mid,
        depth + 1,
        nodes,
    );
    nodes[node_index as usize].left = left;
    nodes[node_index as usize].right = right;
    node_index
}

/// Moller-Trumbore. Returns `(t, geometric normal)` for hits strictly
/// inside `(tnear, tmax)`; the normal is the raw edge cross product.
#[inline]
fn intersect_triangle(
    origin: Vec3,
    dir: Vec3,
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
    tnear: f32,
    tmax: f32,
) -> Option<(f32, Vec3)> {
    const EPS: f32 = 1e-8;

    let e1 = v1 - v0;
    let e2 = v2 - v0;
    let pvec = dir.cross(e2);
    let det = e1.dot(pvec);
    // No backface culling: the integrator needs inside hits to detect
    // points buried in geometry.
    if det.abs() < EPS {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = origin - v0;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(e1);
    let v = dir.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(qvec) * inv_det;
    if t <= tnear || t >= tmax {
        return None;
    }
    Some((t, e1.cross(e2)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ground_quad() -> (Vec<Vec3>, Vec<[u32; 3]>) {
        let positions = vec![
            Vec3::new(-1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(-1.0, 0.0, 1.0),
        ];
        let triangles = vec![[0, 1, 2], [0, 2, 3]];
        (positions, triangles)
    }

    #[test]
    fn empty_scene_fails_initialization() {
        let err = BvhOracle::build(Vec::new(), Vec::new()).unwrap_err();
        assert!(matches!(err, Error::RayOracleInit(_)));
    }

    #[test]
    fn ray_down_hits_the_ground() {
        let (positions, triangles) = ground_quad();
        let oracle = BvhOracle::build(positions, triangles).unwrap();

        let hit = oracle
            .intersect(&Ray::new(Vec3::new(0.25, 2.0, 0.25), Vec3::NEG_Y))
            .expect("must hit");
        assert!((hit.t - 2.0).abs() < 1e-4);
        let n = hit.normal_geo.normalize();
        assert!((n.y.abs() - 1.0).abs() < 1e-4);
        assert!(hit.prim_id < 2);
    }

    #[test]
    fn escaping_ray_misses() {
        let (positions, triangles) = ground_quad();
        let oracle = BvhOracle::build(positions, triangles).unwrap();
        assert!(oracle
            .intersect(&Ray::new(Vec3::new(0.0, 2.0, 0.0), Vec3::Y))
            .is_none());
        assert!(!oracle.occluded(&Ray::new(Vec3::new(0.0, 2.0, 0.0), Vec3::Y)));
    }

    #[test]
    fn occlusion_matches_intersection() {
        let (positions, triangles) = ground_quad();
        let oracle = BvhOracle::build(positions, triangles).unwrap();
        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::NEG_Y);
        assert!(oracle.occluded(&ray));
        assert!(oracle.intersect(&ray).is_some());
    }

    #[test]
    fn tfar_window_limits_hits() {
        let (positions, triangles) = ground_quad();
        let oracle = BvhOracle::build(positions, triangles).unwrap();
        let mut ray = Ray::new(Vec3::new(0.0, 2.0, 0.0), Vec3::NEG_Y);
        ray.tfar = 1.5;
        assert!(oracle.intersect(&ray).is_none());
    }

    #[test]
    fn many_triangles_build_a_deep_tree() {
        // A strip of triangles along X forces several split levels.
        let mut positions = Vec::new();
        let mut triangles = Vec::new();
        for i in 0..64u32 {
            let x = i as f32;
            let base = positions.len() as u32;
            positions.push(Vec3::new(x, 0.0, 0.0));
            positions.push(Vec3::new(x + 1.0, 0.0, 0.0));
            positions.push(Vec3::new(x + 0.5, 0.0, 1.0));
            triangles.push([base, base + 1, base + 2]);
        }
        let oracle = BvhOracle::build(positions, triangles).unwrap();

        for i in [0u32, 17, 44, 63] {
            let hit = oracle
                .intersect(&Ray::new(
                    Vec3::new(i as f32 + 0.5, 1.0, 0.4),
                    Vec3::NEG_Y,
                ))
                .expect("strip triangle under the ray");
            assert_eq!(hit.prim_id, i);
        }
    }
}
