// src/atlas/mod.rs
// Lightmap UV atlas construction: packer interface and unwrapped mesh assembly.
// This file exists to turn a source mesh into one with per-corner lightmap UVs.
// RELEVANT FILES:src/atlas/shelf_pack.rs,src/raster/mod.rs,src/mesh/mod.rs

use glam::{Vec2, Vec3};

use crate::error::{Error, Result};
use crate::mesh::{MeshSource, SubMesh, Vertex};

pub mod shelf_pack;
pub use shelf_pack::TriShelfPacker;

/// Options handed to the chart packer.
#[derive(Debug, Clone, Copy)]
pub struct PackOptions {
    /// Texels kept free between any two charts.
    pub padding: u32,
    /// Atlas side length in texels.
    pub resolution: u32,
}

/// One submesh submitted for packing. Vertex tables cover the whole source
/// mesh; `indices` is the submesh range with `index_offset` to resolve
/// against the tables.
pub struct PackInput<'a> {
    pub positions: &'a [Vec3],
    pub normals: &'a [Vec3],
    pub uvs: &'a [Vec2],
    pub indices: &'a [u32],
    pub index_offset: u32,
}

/// Packed vertex: a cross-reference into the source vertex table plus the
/// assigned atlas position in pixel space.
#[derive(Debug, Clone, Copy)]
pub struct PackedVertex {
    pub xref: u32,
    pub uv: Vec2,
}

/// Per-submesh packer output. Indices are local to `vertices`.
#[derive(Debug, Clone, Default)]
pub struct PackedMesh {
    pub vertices: Vec<PackedVertex>,
    pub indices: Vec<u32>,
}

/// Complete packer output, one mesh per submitted input, in order.
#[derive(Debug, Clone)]
pub struct PackedAtlas {
    pub width: u32,
    pub height: u32,
    pub meshes: Vec<PackedMesh>,
}

/// Packer rejection, attributed to the submesh that failed.
#[derive(Debug, Clone)]
pub struct PackError {
    pub submesh: usize,
    pub reason: String,
}

/// Computes charts, parameterizes, and packs them into a square atlas.
/// The reference implementation is `TriShelfPacker`; an xatlas-class
/// packer plugs in through this same interface.
pub trait ChartPacker {
    fn pack(
        &self,
        inputs: &[PackInput<'_>],
        options: &PackOptions,
    ) -> std::result::Result<PackedAtlas, PackError>;
}

/// The source mesh augmented with per-vertex lightmap UVs. Vertex arrays
/// may have grown (corners whose UVs differ across charts are duplicated
/// via xref); the triangle count is unchanged.
#[derive(Debug, Clone)]
pub struct UnwrappedMesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub submeshes: Vec<SubMesh>,
    pub atlas_size: u32,
}

/// Flat triangle view of an unwrapped mesh with submesh indirection
/// resolved: global positions, index triples, and one albedo per triangle.
#[derive(Debug, Clone)]
pub struct TriangleSoup {
    pub positions: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
    pub albedos: Vec<Vec3>,
}

impl UnwrappedMesh {
    pub fn triangle_count(&self) -> u32 {
        (self.indices.len() / 3) as u32
    }

    /// Resolve `base_vertex` offsets into a flat triangle list. Triangle
    /// order follows submesh order, so indices into `albedos` line up with
    /// the primitive ids the ray oracle reports.
    pub fn triangle_soup(&self) -> TriangleSoup {
        let positions = self.vertices.iter().map(Vertex::position).collect();
        let mut triangles = Vec::with_capacity(self.indices.len() / 3);
        let mut albedos = Vec::with_capacity(self.indices.len() / 3);
        for sub in &self.submeshes {
            let range = sub.base_index as usize..(sub.base_index + sub.index_count) as usize;
            for tri in self.indices[range].chunks_exact(3) {
                triangles.push([
                    tri[0] + sub.base_vertex,
                    tri[1] + sub.base_vertex,
                    tri[2] + sub.base_vertex,
                ]);
                albedos.push(sub.albedo);
            }
        }
        TriangleSoup {
            positions,
            triangles,
            albedos,
        }
    }
}

/// Assigns lightmap UVs by driving a `ChartPacker` over every submesh and
/// rebuilding the vertex arrays from the packer's xref tables.
pub struct AtlasBuilder<'a> {
    packer: &'a dyn ChartPacker,
    options: PackOptions,
}

impl<'a> AtlasBuilder<'a> {
    pub fn new(packer: &'a dyn ChartPacker, options: PackOptions) -> Self {
        Self { packer, options }
    }

    pub fn build(&self, mesh: &dyn MeshSource) -> Result<UnwrappedMesh> {
        let source_vertices = mesh.vertices();
        let source_indices = mesh.indices();
        let source_submeshes = mesh.submeshes();

        // Flat attribute tables shared by every pack input.
        let positions: Vec<Vec3> = source_vertices.iter().map(Vertex::position).collect();
        let normals: Vec<Vec3> = source_vertices.iter().map(Vertex::normal).collect();
        let uvs: Vec<Vec2> = source_vertices
            .iter()
            .map(|v| Vec2::from_array(v.uv))
            .collect();

        let inputs: Vec<PackInput<'_>> = source_submeshes
            .iter()
            .map(|sub| PackInput {
                positions: &positions,
                normals: &normals,
                uvs: &uvs,
                indices: &source_indices
                    [sub.base_index as usize..(sub.base_index + sub.index_count) as usize],
                index_offset: sub.base_vertex,
            })
            .collect();

        let atlas = self
            .packer
            .pack(&inputs, &self.options)
            .map_err(|e| Error::atlas(e.submesh, e.reason))?;

        if atlas.width != self.options.resolution || atlas.height != atlas.width {
            let r = self.options.resolution;
            return Err(Error::atlas(
                0,
                format!(
                    "packer produced a {}x{} atlas, expected {r}x{r}",
                    atlas.width, atlas.height
                ),
            ));
        }

        // Rebuild expanded vertex/index arrays. Pixel UVs become [0,1]
        // coordinates via the (L-1) divisor the rasterizer expects.
        let denom = (atlas.width - 1) as f32;
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        let mut submeshes = Vec::with_capacity(source_submeshes.len());

        for (mesh_idx, packed) in atlas.meshes.iter().enumerate() {
            let base_vertex = vertices.len() as u32;
            let base_index = indices.len() as u32;

            for pv in &packed.vertices {
                let mut v = source_vertices[pv.xref as usize];
                v.lightmap_uv = [pv.uv.x / denom, pv.uv.y / denom];
                debug_assert!(
                    v.lightmap_uv[0] <= denom / atlas.width as f32 + 1e-5
                        && v.lightmap_uv[1] <= denom / atlas.width as f32 + 1e-5,
                    "packed UV outside the atlas clamp rectangle"
                );
                vertices.push(v);
            }
            indices.extend_from_slice(&packed.indices);

            submeshes.push(SubMesh {
                base_index,
                index_count: packed.indices.len() as u32,
                base_vertex,
                albedo: source_submeshes[mesh_idx].albedo,
            });
        }

        log::debug!(
            "atlas unwrap: {} submeshes, {} -> {} vertices, {} triangles",
            submeshes.len(),
            source_vertices.len(),
            vertices.len(),
            indices.len() / 3
        );

        Ok(UnwrappedMesh {
            vertices,
            indices,
            submeshes,
            atlas_size: atlas.width,
        })
    }
}
