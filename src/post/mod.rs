// src/post/mod.rs
// Seam dilation: extend valid texels one ring into the surrounding gutter.
// This file exists so bilinear lightmap lookups at chart borders never blend
// against the black background.
// RELEVANT FILES:src/raster/mod.rs,src/framebuffer.rs,src/pipeline.rs

use crate::framebuffer::Framebuffer;
use crate::raster::GutterMap;

/// Single-pass 3x3 dilation filter.
///
/// Invalid texels take the value of their first valid neighbor in row-major
/// scan order; valid texels pass through untouched. One invocation grows
/// the valid region by exactly one ring, so it is monotonic and idempotent
/// on fully-valid images. The CPU kernel is the reference; a fullscreen
/// fragment pass must match it texel for texel.
#[derive(Debug, Default)]
pub struct Dilator;

impl Dilator {
    pub fn new() -> Self {
        Self
    }

    /// Dilate a baked irradiance image. A texel is invalid when its RGB is
    /// all zero and its alpha is zero.
    pub fn dilate(&self, src: &Framebuffer) -> Framebuffer {
        let size = src.size();
        let mut dst = Framebuffer::new(size);
        for y in 0..size {
            for x in 0..size {
                let texel = src.texel(x, y);
                if irradiance_valid(&texel) {
                    dst.set_texel(x, y, texel);
                    continue;
                }
                if let Some((nx, ny)) =
                    first_valid_neighbor(size, x, y, |nx, ny| irradiance_valid(&src.texel(nx, ny)))
                {
                    dst.set_texel(x, y, src.texel(nx, ny));
                }
            }
        }
        dst
    }

    /// Dilate the geometry maps from the rasterizer in lockstep: validity
    /// is "the normal has any nonzero component", and position and normal
    /// are copied from the same neighbor so bake points stay consistent.
    pub fn dilate_geometry(&self, src: &GutterMap) -> GutterMap {
        let size = src.size;
        let mut dst = GutterMap::new(size);
        for y in 0..size {
            for x in 0..size {
                let i = src.index(x, y);
                if src.is_covered(x, y) {
                    dst.positions[i] = src.positions[i];
                    dst.normals[i] = src.normals[i];
                    continue;
                }
                if let Some((nx, ny)) =
                    first_valid_neighbor(size, x, y, |nx, ny| src.is_covered(nx, ny))
                {
                    let n = src.index(nx, ny);
                    dst.positions[i] = src.positions[n];
                    dst.normals[i] = src.normals[n];
                }
            }
        }
        dst
    }
}

/// Valid unless RGB and alpha are all exactly zero.
#[inline]
fn irradiance_valid(texel: &[f32; 4]) -> bool {
    texel[0] != 0.0 || texel[1] != 0.0 || texel[2] != 0.0 || texel[3] != 0.0
}

/// Scan the 3x3 neighborhood in row-major order and return the first
/// neighbor passing the predicate. The fixed order makes the filter
/// deterministic and lets a shader port reproduce it exactly.
#[inline]
fn first_valid_neighbor(
    size: u32,
    x: u32,
    y: u32,
    valid: impl Fn(u32, u32) -> bool,
) -> Option<(u32, u32)> {
    for dy in -1i32..=1 {
        for dx in -1i32..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let nx = x as i32 + dx;
            let ny = y as i32 + dy;
            if nx < 0 || ny < 0 || nx >= size as i32 || ny >= size as i32 {
                continue;
            }
            let (nx, ny) = (nx as u32, ny as u32);
            if valid(nx, ny) {
                return Some((nx, ny));
            }
        }
    }
    None
}
