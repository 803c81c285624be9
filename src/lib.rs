//! Offline lightmap baker for triangle meshes.
//!
//! Given a scene mesh with flat per-submesh albedos, a directional sun and
//! a procedural sky, `lightforge` produces a square texture atlas whose
//! texels hold precomputed surface irradiance. A rasterized runtime pass
//! samples the atlas to show one-bounce-plus global illumination without
//! tracing rays per frame.
//!
//! The pipeline: [`atlas`] packs every triangle into a shared chart
//! layout; [`raster`] enumerates covered texels into bake points carrying
//! world position and normal; [`bake`] fans the points out to worker
//! threads where [`tracer`] integrates Monte-Carlo irradiance against a
//! shared [`accel::RayOracle`]; [`post`] dilates valid texels into the
//! gutters so bilinear filtering never bleeds black; [`store`] persists
//! the result and [`gpu`] uploads it.
//!
//! ```no_run
//! use glam::Vec3;
//! use lightforge::{BakeConfig, BakePipeline, MeshData};
//!
//! let mut scene = MeshData::new();
//! scene.add_quad(
//!     Vec3::ZERO,
//!     Vec3::new(0.0, 0.0, 10.0),
//!     Vec3::new(10.0, 0.0, 0.0),
//!     Vec3::splat(0.7),
//! );
//! let pipeline = BakePipeline::new(BakeConfig::preview())?;
//! let lightmap = pipeline.bake(&scene)?;
//! # Ok::<(), lightforge::Error>(())
//! ```

pub mod accel;
pub mod atlas;
pub mod bake;
pub mod config;
pub mod error;
pub mod framebuffer;
pub mod gpu;
pub mod mesh;
pub mod pipeline;
pub mod post;
pub mod raster;
pub mod sampler;
pub mod sky;
pub mod store;
pub mod tracer;

pub use accel::{BvhOracle, Hit, Ray, RayOracle};
pub use atlas::{AtlasBuilder, ChartPacker, PackOptions, TriShelfPacker, UnwrappedMesh};
pub use bake::{BakeJob, BakeScheduler};
pub use config::BakeConfig;
pub use error::{Error, Result};
pub use framebuffer::Framebuffer;
pub use mesh::{MeshData, MeshSource, SubMesh, Vertex};
pub use pipeline::BakePipeline;
pub use post::Dilator;
pub use raster::{BakePoint, GutterMapRasterizer};
pub use sampler::Sampler;
pub use sky::{GradientSky, SkyRadiance};
pub use tracer::PathTracer;
