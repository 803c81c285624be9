// src/tracer.rs
// Monte-Carlo irradiance integrator: traces N cosine-sampled paths of up to
// M bounces from each bake point, accumulating sun light scaled by diffuse
// throughput.
// RELEVANT FILES:src/sampler.rs,src/accel/mod.rs,src/bake/mod.rs

use glam::Vec3;

use crate::accel::{Ray, RayOracle};
use crate::config::BakeConfig;
use crate::raster::BakePoint;
use crate::sampler::Sampler;
use crate::sky::SkyRadiance;

/// Relative sign bias applied after every bounce so the next segment does
/// not re-hit the surface it just left.
const SIGN_BIAS: f32 = 2e-7;

/// tnear for bounce and shadow rays. The relative bias above vanishes for
/// surfaces crossing the origin planes, so grazing segments also need a
/// minimum travel distance before a hit counts.
const SELF_HIT_TNEAR: f32 = 1e-4;

/// Result of integrating one bake point.
#[derive(Debug, Clone, Copy)]
pub struct TraceOutput {
    pub irradiance: Vec3,
    /// True when the point sits inside geometry (first bounce hit a back
    /// face) or nothing was sampled; the caller writes alpha 0.
    pub is_gutter: bool,
    /// Non-finite samples clamped to zero (release builds only; debug
    /// builds assert instead).
    pub nan_clamps: u32,
}

/// Path-traced irradiance integrator over a shared ray oracle.
///
/// One instance per worker; holds only borrowed shared state and the
/// per-bake constants, so construction is free.
pub struct PathTracer<'a> {
    oracle: &'a dyn RayOracle,
    sky: &'a dyn SkyRadiance,
    /// One albedo per scene triangle, indexed by the oracle's prim_id.
    albedos: &'a [Vec3],
    /// Normalized, pointing from the sun toward the scene.
    light_dir: Vec3,
    light_color: Vec3,
    offset: f32,
    include_sky_bounces: bool,
}

impl<'a> PathTracer<'a> {
    pub fn new(
        config: &BakeConfig,
        oracle: &'a dyn RayOracle,
        sky: &'a dyn SkyRadiance,
        albedos: &'a [Vec3],
    ) -> Self {
        Self {
            oracle,
            sky,
            albedos,
            light_dir: config.light_dir.normalize(),
            light_color: config.light_color,
            offset: config.offset,
            include_sky_bounces: config.include_sky_bounces,
        }
    }

    /// Integrate `spp` samples of up to `bounces` segments each.
    pub fn trace(
        &self,
        point: &BakePoint,
        spp: u32,
        bounces: u32,
        sampler: &mut Sampler,
    ) -> TraceOutput {
        if spp == 0 {
            // Nothing sampled: the texel stays black and invalid.
            return TraceOutput {
                irradiance: Vec3::ZERO,
                is_gutter: true,
                nan_clamps: 0,
            };
        }

        // The rasterizer hands over the raw interpolated normal; normalize
        // here, on first use.
        let n0 = point.direction.normalize();
        let p0 = point.position + n0 * self.offset;

        let mut sum = Vec3::ZERO;
        let mut is_gutter = false;
        let mut nan_clamps = 0u32;

        for _ in 0..spp {
            let mut radiance = Vec3::ZERO;
            let mut throughput = Vec3::ONE;
            let mut p = p0;
            let mut n = n0;

            for bounce in 0..bounces {
                // The first segment probes straight back onto the bake
                // surface, so the texel's own sun term, albedo, and
                // buried-point detection all go through the ordinary hit
                // path. Later segments sample the cosine lobe.
                let d = if bounce == 0 {
                    -n0
                } else {
                    sampler.hemisphere_direction(n)
                };

                let mut ray = Ray::new(p, d);
                ray.tnear = SELF_HIT_TNEAR;
                let Some(hit) = self.oracle.intersect(&ray) else {
                    // The path escaped. The reference integrator stops with
                    // the direct light gathered so far; the sky term is an
                    // opt-in knob.
                    if self.include_sky_bounces {
                        radiance += throughput * self.sky.radiance(d);
                    }
                    break;
                };

                let albedo = self.albedos[hit.prim_id as usize];
                p += d * hit.t;
                n = hit.normal_geo.normalize();

                if n.dot(d) > 0.0 {
                    // Inside of a surface. On the first segment that means
                    // the bake point itself is buried in geometry.
                    if bounce == 0 {
                        is_gutter = true;
                    }
                    break;
                }

                p += n.signum() * p.abs() * SIGN_BIAS;

                radiance += self.direct_light(p, n, albedo) * throughput;
                throughput *= albedo;
            }

            if radiance.is_finite() {
                sum += radiance;
            } else {
                debug_assert!(false, "non-finite path radiance at {:?}", point.coord);
                nan_clamps += 1;
            }
        }

        TraceOutput {
            irradiance: sum / spp as f32,
            is_gutter,
            nan_clamps,
        }
    }

    /// Sun contribution at a surface point: shadow ray toward the sun,
    /// Lambert with the explicit 1/pi (light_color is raw illuminance).
    fn direct_light(&self, p: Vec3, n: Vec3, albedo: Vec3) -> Vec3 {
        let to_light = -self.light_dir;
        let cos = n.dot(to_light);
        if cos <= 0.0 {
            return Vec3::ZERO;
        }
        let mut shadow = Ray::new(p, to_light);
        shadow.tnear = SELF_HIT_TNEAR;
        if self.oracle.occluded(&shadow) {
            return Vec3::ZERO;
        }
        self.light_color * albedo * std::f32::consts::FRAC_1_PI * cos
    }
}
