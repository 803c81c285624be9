// tests/test_dilate.rs
// Seam dilation against real bake output: monotonic growth, idempotence on
// fully-valid images, and gutter texels taking a neighbor's value.
// RELEVANT FILES:src/post/mod.rs,src/framebuffer.rs

mod common;

use lightforge::post::Dilator;
use lightforge::{BakePipeline, Framebuffer};

fn valid(texel: &[f32; 4]) -> bool {
    texel.iter().any(|&c| c != 0.0)
}

fn valid_count(fb: &Framebuffer) -> usize {
    let size = fb.size();
    (0..size)
        .flat_map(|y| (0..size).map(move |x| fb.texel(x, y)))
        .filter(|t| valid(t))
        .count()
}

#[test]
fn dilation_is_monotonic_on_baked_output() {
    let mut config = common::test_config(128);
    config.spp = 4;
    let pipeline = BakePipeline::new(config).unwrap();
    let baked = pipeline.bake(&common::cornell_box(10.0)).unwrap();

    let dilated = Dilator::new().dilate(&baked);
    assert!(valid_count(&dilated) >= valid_count(&baked));

    // Valid texels pass through untouched.
    let size = baked.size();
    for y in 0..size {
        for x in 0..size {
            let texel = baked.texel(x, y);
            if valid(&texel) {
                assert_eq!(dilated.texel(x, y), texel);
            }
        }
    }
}

#[test]
fn dilation_is_idempotent_on_a_fully_valid_image() {
    let mut fb = Framebuffer::new(32);
    for y in 0..32 {
        for x in 0..32 {
            fb.set_texel(x, y, [0.1 + x as f32, 0.2 + y as f32, 0.3, 1.0]);
        }
    }
    let once = Dilator::new().dilate(&fb);
    let twice = Dilator::new().dilate(&once);
    assert_eq!(once, fb);
    assert_eq!(twice, once);
}

#[test]
fn gutter_texels_copy_a_valid_neighbor_after_the_seam_pass() {
    let mut config = common::test_config(128);
    config.spp = 4;
    let pipeline = BakePipeline::new(config).unwrap();
    // The pipeline output already includes the seam pass; dilate once more
    // and check that every newly filled texel equals one of its neighbors.
    let baked = pipeline.bake(&common::cornell_box(10.0)).unwrap();
    let grown = Dilator::new().dilate(&baked);

    let size = baked.size();
    for y in 0..size {
        for x in 0..size {
            let before = baked.texel(x, y);
            let after = grown.texel(x, y);
            if valid(&before) || !valid(&after) {
                continue;
            }
            let mut matches_neighbor = false;
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
                    let neighbor = baked.texel(nx as u32, ny as u32);
                    if valid(&neighbor) && neighbor == after {
                        matches_neighbor = true;
                    }
                }
            }
            assert!(
                matches_neighbor,
                "filled texel ({x},{y}) does not match any valid neighbor"
            );
        }
    }
}
