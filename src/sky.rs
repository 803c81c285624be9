// src/sky.rs
// Sky radiance interface plus a small procedural gradient model.
// The fitted sky-model library is an external collaborator; the core only
// ever asks for radiance along a direction.

use glam::Vec3;

use crate::config::BakeConfig;

/// Radiance arriving from direction `dir` (pointing away from the surface).
/// Shared read-only across bake workers.
pub trait SkyRadiance: Send + Sync {
    fn radiance(&self, dir: Vec3) -> Vec3;
}

/// Zenith/horizon gradient above the horizon, albedo-tinted bounce light
/// below it. Enough structure for escaped paths when `include_sky_bounces`
/// is on; a fitted model plugs in through the same trait.
#[derive(Debug, Clone)]
pub struct GradientSky {
    pub zenith: Vec3,
    pub horizon: Vec3,
    pub ground_albedo: Vec3,
}

impl Default for GradientSky {
    fn default() -> Self {
        Self {
            zenith: Vec3::new(0.25, 0.45, 1.0),
            horizon: Vec3::new(0.85, 0.9, 1.0),
            ground_albedo: Vec3::splat(0.5),
        }
    }
}

impl GradientSky {
    pub fn from_config(config: &BakeConfig) -> Self {
        Self {
            ground_albedo: config.ground_albedo,
            ..Self::default()
        }
    }
}

impl SkyRadiance for GradientSky {
    fn radiance(&self, dir: Vec3) -> Vec3 {
        let up = dir.normalize_or_zero().y;
        if up >= 0.0 {
            // sqrt biases the blend toward the horizon color near grazing
            // angles, the usual clear-sky falloff shape.
            self.horizon.lerp(self.zenith, up.sqrt())
        } else {
            self.horizon * self.ground_albedo
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zenith_and_horizon_bound_the_gradient() {
        let sky = GradientSky::default();
        assert_eq!(sky.radiance(Vec3::Y), sky.zenith);
        let horizon = sky.radiance(Vec3::X);
        assert_eq!(horizon, sky.horizon);
    }

    #[test]
    fn below_horizon_is_albedo_tinted() {
        let sky = GradientSky::default();
        let down = sky.radiance(Vec3::NEG_Y);
        assert_eq!(down, sky.horizon * sky.ground_albedo);
    }
}
