// src/raster/mod.rs
// Gutter-map rasterization: unwrapped mesh -> per-texel position/normal maps.
// This file exists to enumerate every atlas texel a triangle covers and turn
// it into a bake point the integrator can trace from.
// RELEVANT FILES:src/atlas/mod.rs,src/post/mod.rs,src/tracer.rs

use glam::{Vec2, Vec3};

use crate::atlas::UnwrappedMesh;
use crate::config::BakeConfig;
use crate::post::Dilator;

/// A per-texel surface sample: where to start tracing and which way the
/// hemisphere faces. `direction` is the interpolated surface normal and is
/// left unnormalized; the integrator normalizes on first use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BakePoint {
    pub position: Vec3,
    pub direction: Vec3,
    pub coord: (u16, u16),
}

/// The two geometry render targets: world-space position and normal per
/// atlas texel. A zero normal marks an uncovered (gutter) texel.
#[derive(Debug, Clone)]
pub struct GutterMap {
    pub size: u32,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
}

impl GutterMap {
    pub fn new(size: u32) -> Self {
        let n = (size * size) as usize;
        Self {
            size,
            positions: vec![Vec3::ZERO; n],
            normals: vec![Vec3::ZERO; n],
        }
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        (y * self.size + x) as usize
    }

    /// Covered means some triangle wrote a nonzero normal here.
    #[inline]
    pub fn is_covered(&self, x: u32, y: u32) -> bool {
        self.normals[self.index(x, y)] != Vec3::ZERO
    }

    /// Row-major sweep over all texels, emitting one bake point per
    /// covered texel.
    pub fn bake_points(&self) -> Vec<BakePoint> {
        let mut points = Vec::new();
        for y in 0..self.size {
            for x in 0..self.size {
                let i = self.index(x, y);
                let normal = self.normals[i];
                if normal == Vec3::ZERO {
                    continue;
                }
                points.push(BakePoint {
                    position: self.positions[i],
                    direction: normal,
                    coord: (x as u16, y as u16),
                });
            }
        }
        points
    }
}

/// CPU reference for the offline geometry pass: no culling, no depth, no
/// blending, optional conservative coverage. Overlapping writes resolve as
/// last-write-wins; the packer guarantees charts do not overlap.
pub struct GutterMapRasterizer {
    size: u32,
    conservative: bool,
}

impl GutterMapRasterizer {
    pub fn new(size: u32, conservative: bool) -> Self {
        Self { size, conservative }
    }

    pub fn from_config(config: &BakeConfig) -> Self {
        Self::new(config.lightmap_size, config.enable_conservative_raster)
    }

    /// Rasterize the unwrapped mesh into the two geometry targets.
    pub fn rasterize(&self, mesh: &UnwrappedMesh) -> GutterMap {
        let mut map = GutterMap::new(self.size);
        let scale = self.size as f32;

        for sub in &mesh.submeshes {
            let range = sub.base_index as usize..(sub.base_index + sub.index_count) as usize;
            for tri in mesh.indices[range].chunks_exact(3) {
                let v: Vec<_> = tri
                    .iter()
                    .map(|&i| &mesh.vertices[(i + sub.base_vertex) as usize])
                    .collect();
                // The vertex stage maps lightmap UV straight to the
                // viewport: uv*2-1 in clip space is uv*L in texels.
                let raster = [
                    Vec2::from_array(v[0].lightmap_uv) * scale,
                    Vec2::from_array(v[1].lightmap_uv) * scale,
                    Vec2::from_array(v[2].lightmap_uv) * scale,
                ];
                let world = [v[0].position(), v[1].position(), v[2].position()];
                let normals = [v[0].normal(), v[1].normal(), v[2].normal()];
                self.raster_triangle(&mut map, raster, world, normals);
            }
        }

        let covered = map.normals.iter().filter(|n| **n != Vec3::ZERO).count();
        log::debug!(
            "gutter map: {covered} / {} texels covered (conservative: {})",
            self.size * self.size,
            self.conservative
        );
        map
    }

    /// Full C2 stage: rasterize, extend coverage by one seed-dilation ring,
    /// and sweep out the bake points.
    pub fn rasterize_bake_points(&self, mesh: &UnwrappedMesh) -> Vec<BakePoint> {
        let map = self.rasterize(mesh);
        let map = Dilator::new().dilate_geometry(&map);
        map.bake_points()
    }

    fn raster_triangle(
        &self,
        map: &mut GutterMap,
        p: [Vec2; 3],
        world: [Vec3; 3],
        normals: [Vec3; 3],
    ) {
        let area = edge_function(p[0], p[1], p[2]);
        if area == 0.0 {
            return;
        }
        // Both windings rasterize (culling is off); fold the orientation
        // into the edge sign so the inside test reads the same either way.
        let sign = area.signum();
        let inv_area = 1.0 / area.abs();

        let min = p[0].min(p[1]).min(p[2]);
        let max = p[0].max(p[1]).max(p[2]);
        let pad = if self.conservative { 1.0 } else { 0.0 };
        let x0 = (min.x - 0.5 - pad).floor().max(0.0) as u32;
        let y0 = (min.y - 0.5 - pad).floor().max(0.0) as u32;
        let x1 = (max.x - 0.5 + pad).ceil().min((self.size - 1) as f32) as u32;
        let y1 = (max.y - 0.5 + pad).ceil().min((self.size - 1) as f32) as u32;

        // Conservative offsets: an edge function moves by at most half the
        // L1 norm of its gradient across a one-texel square, so relaxing
        // each edge by that much covers every partially-touched texel.
        let offsets = if self.conservative {
            [
                conservative_offset(p[1], p[2]),
                conservative_offset(p[2], p[0]),
                conservative_offset(p[0], p[1]),
            ]
        } else {
            [0.0; 3]
        };

        for y in y0..=y1 {
            for x in x0..=x1 {
                let c = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let e0 = edge_function(p[1], p[2], c) * sign;
                let e1 = edge_function(p[2], p[0], c) * sign;
                let e2 = edge_function(p[0], p[1], c) * sign;
                if e0 < -offsets[0] || e1 < -offsets[1] || e2 < -offsets[2] {
                    continue;
                }
                // Barycentric weights; for conservative-only texels these
                // extrapolate past the edge, matching what the hardware
                // path emits for attributes.
                let b0 = e0 * inv_area;
                let b1 = e1 * inv_area;
                let b2 = e2 * inv_area;
                let i = map.index(x, y);
                map.positions[i] = world[0] * b0 + world[1] * b1 + world[2] * b2;
                map.normals[i] = normals[0] * b0 + normals[1] * b1 + normals[2] * b2;
            }
        }
    }
}

/// Signed parallelogram area of (b - a) x (c - a).
#[inline]
fn edge_function(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (c.x - a.x) * (b.y - a.y) - (c.y - a.y) * (b.x - a.x)
}

#[inline]
fn conservative_offset(a: Vec2, b: Vec2) -> f32 {
    0.5 * ((b.y - a.y).abs() + (b.x - a.x).abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::{AtlasBuilder, PackOptions, TriShelfPacker};
    use crate::mesh::MeshData;

    fn unwrap_quad(size: u32, conservative: bool) -> (UnwrappedMesh, Vec<BakePoint>) {
        let mut mesh = MeshData::new();
        mesh.add_quad(
            Vec3::ZERO,
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::splat(0.7),
        );
        let packer = TriShelfPacker::default();
        let unwrapped = AtlasBuilder::new(
            &packer,
            PackOptions {
                padding: 6,
                resolution: size,
            },
        )
        .build(&mesh)
        .unwrap();
        let points = GutterMapRasterizer::new(size, conservative).rasterize_bake_points(&unwrapped);
        (unwrapped, points)
    }

    #[test]
    fn covered_texels_produce_bake_points_at_their_coord() {
        let (_, points) = unwrap_quad(128, true);
        assert!(!points.is_empty());
        let mut seen = std::collections::HashSet::new();
        for p in &points {
            assert!(p.direction.length() > 0.5);
            assert!(seen.insert(p.coord), "duplicate coord {:?}", p.coord);
            // The quad sits at y = 0 in world space.
            assert!(p.position.y.abs() < 1e-3);
        }
    }

    #[test]
    fn conservative_covers_at_least_as_much_as_center_sampling() {
        let (_, conservative) = unwrap_quad(128, true);
        let (_, plain) = unwrap_quad(128, false);
        assert!(
            conservative.len() >= plain.len(),
            "conservative {} < center {}",
            conservative.len(),
            plain.len()
        );
    }

    #[test]
    fn degenerate_triangle_rasterizes_nothing() {
        let mut map = GutterMap::new(16);
        let r = GutterMapRasterizer::new(16, true);
        let p = Vec2::new(4.0, 4.0);
        r.raster_triangle(&mut map, [p, p, p], [Vec3::ZERO; 3], [Vec3::Y; 3]);
        assert!(map.normals.iter().all(|n| *n == Vec3::ZERO));
    }
}
