// tests/common/mod.rs
// Shared scene builders and unwrap helpers for the integration tests.

#![allow(dead_code)]

use glam::Vec3;
use lightforge::atlas::{AtlasBuilder, PackOptions, TriShelfPacker, UnwrappedMesh};
use lightforge::{BakeConfig, MeshData};

pub const WHITE: Vec3 = Vec3::new(0.73, 0.73, 0.73);
pub const RED: Vec3 = Vec3::new(0.65, 0.05, 0.05);
pub const GREEN: Vec3 = Vec3::new(0.12, 0.45, 0.15);

/// 10x10 ground quad at y = 0, normal +Y, albedo 0.7.
pub fn ground_quad() -> MeshData {
    let mut mesh = MeshData::new();
    mesh.add_quad(
        Vec3::ZERO,
        Vec3::new(0.0, 0.0, 10.0),
        Vec3::new(10.0, 0.0, 0.0),
        Vec3::splat(0.7),
    );
    mesh
}

/// Cornell-style enclosure with the front (z = s) left open: white floor,
/// ceiling and back wall, red left wall, green right wall. All normals
/// face the interior.
pub fn cornell_box(s: f32) -> MeshData {
    let mut mesh = MeshData::new();
    // Floor, normal +Y.
    mesh.add_quad(
        Vec3::ZERO,
        Vec3::new(0.0, 0.0, s),
        Vec3::new(s, 0.0, 0.0),
        WHITE,
    );
    // Ceiling, normal -Y.
    mesh.add_quad(
        Vec3::new(0.0, s, 0.0),
        Vec3::new(s, 0.0, 0.0),
        Vec3::new(0.0, 0.0, s),
        WHITE,
    );
    // Back wall at z = 0, normal +Z.
    mesh.add_quad(
        Vec3::ZERO,
        Vec3::new(s, 0.0, 0.0),
        Vec3::new(0.0, s, 0.0),
        WHITE,
    );
    // Left wall at x = 0, normal +X.
    mesh.add_quad(
        Vec3::ZERO,
        Vec3::new(0.0, s, 0.0),
        Vec3::new(0.0, 0.0, s),
        RED,
    );
    // Right wall at x = s, normal -X.
    mesh.add_quad(
        Vec3::new(s, 0.0, 0.0),
        Vec3::new(0.0, 0.0, s),
        Vec3::new(0.0, s, 0.0),
        GREEN,
    );
    mesh
}

/// Unit cube centered at `center` with outward normals; from the inside
/// every face shows its back.
pub fn solid_cube(center: Vec3, half: f32) -> MeshData {
    let mut mesh = MeshData::new();
    let min = center - Vec3::splat(half);
    let s = 2.0 * half;
    // Bottom, normal -Y (outward).
    mesh.add_quad(
        min,
        Vec3::new(s, 0.0, 0.0),
        Vec3::new(0.0, 0.0, s),
        WHITE,
    );
    // Top, normal +Y.
    mesh.add_quad(
        min + Vec3::new(0.0, s, 0.0),
        Vec3::new(0.0, 0.0, s),
        Vec3::new(s, 0.0, 0.0),
        WHITE,
    );
    // z = min, normal -Z.
    mesh.add_quad(
        min,
        Vec3::new(0.0, s, 0.0),
        Vec3::new(s, 0.0, 0.0),
        WHITE,
    );
    // z = max, normal +Z.
    mesh.add_quad(
        min + Vec3::new(0.0, 0.0, s),
        Vec3::new(s, 0.0, 0.0),
        Vec3::new(0.0, s, 0.0),
        WHITE,
    );
    // x = min, normal -X.
    mesh.add_quad(
        min,
        Vec3::new(0.0, 0.0, s),
        Vec3::new(0.0, s, 0.0),
        WHITE,
    );
    // x = max, normal +X.
    mesh.add_quad(
        min + Vec3::new(s, 0.0, 0.0),
        Vec3::new(0.0, s, 0.0),
        Vec3::new(0.0, 0.0, s),
        WHITE,
    );
    mesh
}

pub fn unwrap(mesh: &MeshData, config: &BakeConfig) -> UnwrappedMesh {
    let packer = TriShelfPacker::default();
    AtlasBuilder::new(
        &packer,
        PackOptions {
            padding: config.chart_padding,
            resolution: config.lightmap_size,
        },
    )
    .build(mesh)
    .expect("unwrap failed")
}

/// Small test configuration: modest atlas, deterministic seed.
pub fn test_config(size: u32) -> BakeConfig {
    BakeConfig {
        lightmap_size: size,
        spp: 8,
        bounces: 2,
        seed: 42,
        workers: 4,
        ..Default::default()
    }
}
