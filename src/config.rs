// src/config.rs
// Bake configuration: atlas size, sampling counts, sun/sky parameters.
// Exists to gather every knob of the pipeline in one serializable struct.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Full configuration for a lightmap bake.
///
/// All fields have sensible defaults; `preview()` and `production()` give
/// the two sampling presets. The struct deserializes field-by-field so a
/// JSON config file only needs to name the options it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BakeConfig {
    /// Atlas side length in texels. Power of two, 64..=4096.
    pub lightmap_size: u32,
    /// Texels of padding between charts in the atlas.
    pub chart_padding: u32,
    /// Samples per bake point.
    pub spp: u32,
    /// Maximum path length per sample.
    pub bounces: u32,
    /// Positional bias along the surface normal at ray start, world units.
    pub offset: f32,
    /// Sun direction, pointing from the sun. Normalized on use.
    pub light_dir: Vec3,
    /// Sun illuminance in lux. Does not include the Lambert 1/pi factor.
    pub light_color: Vec3,
    /// Ground albedo handed to the sky model.
    pub ground_albedo: Vec3,
    /// Cover every texel a triangle partially touches.
    pub enable_conservative_raster: bool,
    /// Runtime sampling hint only; recorded for the consumer.
    pub enable_bilinear_filter: bool,
    /// Add sky radiance when a path escapes the scene.
    pub include_sky_bounces: bool,
    /// Global RNG seed; identical seeds give bit-identical bakes.
    pub seed: u64,
    /// Worker thread count. 0 picks the available parallelism.
    pub workers: usize,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            lightmap_size: 1024,
            chart_padding: 6,
            spp: 1,
            bounces: 2,
            offset: 0.1,
            light_dir: Vec3::new(0.0, -0.977, -0.5),
            light_color: Vec3::splat(10_000.0),
            ground_albedo: Vec3::splat(0.5),
            enable_conservative_raster: true,
            enable_bilinear_filter: true,
            include_sky_bounces: false,
            seed: 0,
            workers: 0,
        }
    }
}

impl BakeConfig {
    /// Fast settings for interactive iteration: 1 spp, 2 bounces.
    pub fn preview() -> Self {
        Self::default()
    }

    /// Final-quality settings: 1000 spp, 15 bounces.
    pub fn production() -> Self {
        Self {
            spp: 1000,
            bounces: 15,
            ..Self::default()
        }
    }

    /// Check ranges the rest of the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        let l = self.lightmap_size;
        if !l.is_power_of_two() || !(64..=4096).contains(&l) {
            return Err(Error::config(format!(
                "lightmap_size must be a power of two in 64..=4096, got {l}"
            )));
        }
        if self.light_dir.length_squared() == 0.0 {
            return Err(Error::config("light_dir must be nonzero"));
        }
        if !self.offset.is_finite() || self.offset < 0.0 {
            return Err(Error::config(format!(
                "offset must be finite and non-negative, got {}",
                self.offset
            )));
        }
        Ok(())
    }

    /// Effective worker thread count.
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}
