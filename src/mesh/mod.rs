//! Scene mesh input: vertex layout, material-homogeneous submeshes, and the
//! `MeshSource` trait the pipeline consumes.
//!
//! Loaders (OBJ, glTF, ...) live outside the core; anything that can hand
//! over vertex/index/submesh slices plugs in through `MeshSource`.
//! `MeshData` is the owned reference implementation used by the tests and
//! the demo bake.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Runtime vertex with full TBN attributes plus the lightmap UV channel
/// assigned by the atlas builder.
#[repr(C)]
#[derive(Clone, Copy, Debug, Zeroable, Pod)]
pub struct Vertex {
    /// World space position [x, y, z].
    pub position: [f32; 3],
    /// Material texture coordinates [u, v].
    pub uv: [f32; 2],
    /// Lightmap atlas coordinates [u, v], in [0, 1]. Zero until unwrap.
    pub lightmap_uv: [f32; 2],
    /// Surface normal [x, y, z].
    pub normal: [f32; 3],
    /// Tangent vector [x, y, z].
    pub tangent: [f32; 3],
    /// Bitangent vector [x, y, z].
    pub bitangent: [f32; 3],
}

impl Vertex {
    /// Build a vertex from position and normal, deriving a tangent frame.
    /// Texture coordinates are left at zero.
    pub fn from_position_normal(position: Vec3, normal: Vec3) -> Self {
        let reference = if normal.dot(Vec3::Y).abs() > 0.99 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let tangent = reference.cross(normal).normalize_or_zero();
        let bitangent = normal.cross(tangent);
        Self {
            position: position.to_array(),
            uv: [0.0, 0.0],
            lightmap_uv: [0.0, 0.0],
            normal: normal.to_array(),
            tangent: tangent.to_array(),
            bitangent: bitangent.to_array(),
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::from_array(self.normal)
    }
}

/// A material-homogeneous index range within a larger mesh.
#[derive(Clone, Copy, Debug)]
pub struct SubMesh {
    /// First index of the range.
    pub base_index: u32,
    /// Number of indices in the range (a multiple of 3).
    pub index_count: u32,
    /// Added to every index in the range when resolving vertices.
    pub base_vertex: u32,
    /// Flat diffuse albedo shared by every triangle of the submesh.
    pub albedo: Vec3,
}

/// Anything that can present a triangle mesh to the baker.
pub trait MeshSource {
    fn vertices(&self) -> &[Vertex];
    fn indices(&self) -> &[u32];
    fn submeshes(&self) -> &[SubMesh];
}

/// Owned mesh buffers; the reference `MeshSource`.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub submeshes: Vec<SubMesh>,
}

impl MeshData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a submesh from its own vertex/index arrays. Indices are kept
    /// local; the submesh records `base_vertex`/`base_index` offsets.
    pub fn add_submesh(&mut self, vertices: &[Vertex], indices: &[u32], albedo: Vec3) {
        debug_assert_eq!(indices.len() % 3, 0);
        let base_vertex = self.vertices.len() as u32;
        let base_index = self.indices.len() as u32;
        self.vertices.extend_from_slice(vertices);
        self.indices.extend_from_slice(indices);
        self.submeshes.push(SubMesh {
            base_index,
            index_count: indices.len() as u32,
            base_vertex,
            albedo,
        });
    }

    /// Append a quad submesh spanning `origin` and the two edge vectors.
    /// The winding follows `edge_u x edge_v`; the normal is derived from it.
    pub fn add_quad(&mut self, origin: Vec3, edge_u: Vec3, edge_v: Vec3, albedo: Vec3) {
        let normal = edge_u.cross(edge_v).normalize();
        let corners = [
            origin,
            origin + edge_u,
            origin + edge_u + edge_v,
            origin + edge_v,
        ];
        let vertices: Vec<Vertex> = corners
            .iter()
            .map(|&p| Vertex::from_position_normal(p, normal))
            .collect();
        self.add_submesh(&vertices, &[0, 1, 2, 0, 2, 3], albedo);
    }

    pub fn triangle_count(&self) -> u32 {
        (self.indices.len() / 3) as u32
    }
}

impl MeshSource for MeshData {
    fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    fn indices(&self) -> &[u32] {
        &self.indices
    }

    fn submeshes(&self) -> &[SubMesh] {
        &self.submeshes
    }
}
