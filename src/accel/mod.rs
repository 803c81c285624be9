// src/accel/mod.rs
// Ray/hit types and the ray-traversal oracle interface the integrator uses.
// This file exists to keep the intersection library behind a trait; the
// in-tree BVH is the reference oracle.
// RELEVANT FILES:src/accel/bvh.rs,src/tracer.rs

use glam::Vec3;

pub mod bvh;
pub use bvh::BvhOracle;

/// A ray in the oracle's wire format: embree-style tnear/tfar window and a
/// traversal mask (unused by the reference oracle, carried for parity).
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub tnear: f32,
    pub direction: Vec3,
    pub tfar: f32,
    pub mask: u32,
}

impl Ray {
    /// Standard bake ray: `tnear = 0`, `tfar = inf`, all mask bits set.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            tnear: 0.0,
            direction,
            tfar: f32::INFINITY,
            mask: !0,
        }
    }
}

/// Closest intersection along a ray. `normal_geo` is the geometric normal,
/// unnormalized (edge cross product); callers normalize when needed.
#[derive(Debug, Clone, Copy)]
pub struct Hit {
    pub t: f32,
    pub prim_id: u32,
    pub normal_geo: Vec3,
}

/// Ray-scene intersection oracle. Implementations must be safe for
/// concurrent read-only queries; worker threads share one oracle.
pub trait RayOracle: Send + Sync {
    /// Closest hit in `(tnear, tfar)`, or None if the ray escapes.
    fn intersect(&self, ray: &Ray) -> Option<Hit>;

    /// Any-hit query for shadow rays.
    fn occluded(&self, ray: &Ray) -> bool {
        self.intersect(ray).is_some()
    }
}
