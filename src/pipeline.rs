// src/pipeline.rs
// End-to-end bake orchestration: unwrap -> gutter map -> scheduled trace ->
// seam dilation -> store. Also owns the cache-or-bake decision.
// RELEVANT FILES:src/atlas/mod.rs,src/raster/mod.rs,src/bake/mod.rs,src/post/mod.rs

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::accel::BvhOracle;
use crate::atlas::{AtlasBuilder, PackOptions, TriShelfPacker};
use crate::bake::BakeScheduler;
use crate::config::BakeConfig;
use crate::error::Result;
use crate::framebuffer::Framebuffer;
use crate::mesh::MeshSource;
use crate::post::Dilator;
use crate::raster::GutterMapRasterizer;
use crate::sky::GradientSky;
use crate::store;

const PROGRESS_POLL: Duration = Duration::from_millis(50);

/// The offline bake pipeline with the reference collaborators wired in.
pub struct BakePipeline {
    config: BakeConfig,
}

impl BakePipeline {
    pub fn new(config: BakeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BakeConfig {
        &self.config
    }

    /// Bake without caching or progress reporting.
    pub fn bake(&self, mesh: &dyn MeshSource) -> Result<Framebuffer> {
        self.bake_with(mesh, None, |_, _| {})
    }

    /// Full pipeline run.
    ///
    /// When `cache` names a readable atlas of the configured size it is
    /// returned directly; an unreadable or missing cache logs a warning and
    /// falls through to a fresh bake, which is then persisted to the same
    /// path. `on_progress` is called with `(points_done, points_total)`
    /// while workers run.
    pub fn bake_with(
        &self,
        mesh: &dyn MeshSource,
        cache: Option<&Path>,
        mut on_progress: impl FnMut(usize, usize),
    ) -> Result<Framebuffer> {
        let config = &self.config;

        if let Some(path) = cache {
            if path.exists() {
                match store::load(path, config.lightmap_size) {
                    Ok(framebuffer) => {
                        log::info!("loaded cached lightmap from {}", path.display());
                        return Ok(framebuffer);
                    }
                    Err(e) => log::warn!("lightmap cache unusable ({e}); baking"),
                }
            }
        }

        let start = Instant::now();
        let packer = TriShelfPacker::default();
        let unwrapped = AtlasBuilder::new(
            &packer,
            PackOptions {
                padding: config.chart_padding,
                resolution: config.lightmap_size,
            },
        )
        .build(mesh)?;
        log::info!(
            "unwrap: {} triangles in {:.1} ms",
            unwrapped.triangle_count(),
            start.elapsed().as_secs_f32() * 1000.0
        );

        let start = Instant::now();
        let points = GutterMapRasterizer::from_config(config).rasterize_bake_points(&unwrapped);
        log::info!(
            "gutter map: {} bake points in {:.1} ms",
            points.len(),
            start.elapsed().as_secs_f32() * 1000.0
        );

        let soup = unwrapped.triangle_soup();
        let oracle = Arc::new(BvhOracle::build(soup.positions, soup.triangles)?);
        let sky = Arc::new(GradientSky::from_config(config));

        let start = Instant::now();
        let scheduler = BakeScheduler::from_config(config);
        let mut job = scheduler.bake(config, points, oracle, sky, soup.albedos);
        while !job.is_done() {
            on_progress(job.progress(), job.total());
            std::thread::sleep(PROGRESS_POLL);
        }
        on_progress(job.total(), job.total());

        let mut framebuffer = Framebuffer::new(config.lightmap_size);
        job.finish(&mut framebuffer)?;
        log::info!("trace: {:.2} s", start.elapsed().as_secs_f32());

        // Seam pass: one ring so runtime bilinear taps never read black.
        let framebuffer = Dilator::new().dilate(&framebuffer);

        if let Some(path) = cache {
            store::save(&framebuffer, path)?;
        }
        Ok(framebuffer)
    }
}
