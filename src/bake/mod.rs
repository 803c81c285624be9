// src/bake/mod.rs
// Bake scheduling: partitions bake points into per-worker chunks, runs the
// integrator over a worker pool, and folds the results into the framebuffer.
// This file exists so the long-running bake is pollable and cancellable
// from the thread that owns the GPU and the UI.
// RELEVANT FILES:src/bake/pool.rs,src/tracer.rs,src/pipeline.rs

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::{mpsc, Arc};

use glam::Vec3;

use crate::accel::RayOracle;
use crate::config::BakeConfig;
use crate::error::{Error, Result};
use crate::framebuffer::Framebuffer;
use crate::raster::BakePoint;
use crate::sampler::Sampler;
use crate::sky::SkyRadiance;
use crate::tracer::PathTracer;

mod pool;
use pool::WorkerPool;

/// Everything a worker chunk needs, shared read-only across threads.
struct SharedScene {
    config: BakeConfig,
    points: Vec<BakePoint>,
    oracle: Arc<dyn RayOracle>,
    sky: Arc<dyn SkyRadiance>,
    albedos: Vec<Vec3>,
}

/// Finished chunk: the disjoint texel writes it produced. Workers never
/// touch the framebuffer; the owning thread applies these in `finish`.
struct ChunkDone {
    chunk: usize,
    writes: Vec<((u16, u16), [f32; 4])>,
    nan_clamps: u32,
    /// Points actually traced; fewer than the chunk length after a cancel.
    completed: usize,
}

/// Partitions bake points into contiguous chunks and dispatches them to a
/// worker pool. Progress is a relaxed atomic counter, read for UI only.
pub struct BakeScheduler {
    workers: usize,
}

impl BakeScheduler {
    pub fn new(workers: usize) -> Self {
        assert!(workers > 0);
        Self { workers }
    }

    pub fn from_config(config: &BakeConfig) -> Self {
        Self::new(config.worker_count())
    }

    /// Start the bake. The returned job owns the pool; poll `is_done` (or
    /// block in `finish`) from the calling thread.
    pub fn bake(
        &self,
        config: &BakeConfig,
        points: Vec<BakePoint>,
        oracle: Arc<dyn RayOracle>,
        sky: Arc<dyn SkyRadiance>,
        albedos: Vec<Vec3>,
    ) -> BakeJob {
        let total = points.len();
        let chunk_size = total.div_ceil(self.workers).max(1);

        let shared = Arc::new(SharedScene {
            config: config.clone(),
            points,
            oracle,
            sky,
            albedos,
        });

        let progress = Arc::new(AtomicUsize::new(0));
        let cancel = Arc::new(AtomicBool::new(false));
        let (sender, receiver) = mpsc::channel();

        let pool = WorkerPool::new(self.workers);
        let mut chunks = 0usize;
        for (chunk, start) in (0..total).step_by(chunk_size).enumerate() {
            let end = (start + chunk_size).min(total);
            let shared = Arc::clone(&shared);
            let progress = Arc::clone(&progress);
            let cancel = Arc::clone(&cancel);
            let sender = sender.clone();
            pool.execute(move || {
                let done = trace_chunk(&shared, chunk, start..end, &progress, &cancel);
                // The receiver only disappears if the job was dropped;
                // nothing left to report to in that case.
                let _ = sender.send(done);
            });
            chunks += 1;
        }
        drop(sender);

        log::info!(
            "bake started: {total} points in {chunks} chunks of <= {chunk_size} on {} workers",
            self.workers
        );

        BakeJob {
            _pool: pool,
            receiver,
            chunks,
            collected: Vec::new(),
            progress,
            total,
            cancel,
        }
    }
}

/// Integrate one contiguous range of bake points.
fn trace_chunk(
    shared: &SharedScene,
    chunk: usize,
    range: std::ops::Range<usize>,
    progress: &AtomicUsize,
    cancel: &AtomicBool,
) -> ChunkDone {
    let tracer = PathTracer::new(
        &shared.config,
        shared.oracle.as_ref(),
        shared.sky.as_ref(),
        &shared.albedos,
    );
    let spp = shared.config.spp;
    let bounces = shared.config.bounces;
    let seed = shared.config.seed;

    let mut writes = Vec::with_capacity(range.len());
    let mut nan_clamps = 0u32;

    for index in range {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let point = &shared.points[index];
        // Streams key off the texel, not the worker, so repartitioning
        // cannot change the image.
        let mut sampler = Sampler::for_texel(seed, point.coord);
        let out = tracer.trace(point, spp, bounces, &mut sampler);
        nan_clamps += out.nan_clamps;

        let alpha = if out.is_gutter { 0.0 } else { 1.0 };
        writes.push((
            point.coord,
            [out.irradiance.x, out.irradiance.y, out.irradiance.z, alpha],
        ));
        progress.fetch_add(1, Ordering::Relaxed);
    }

    let completed = writes.len();
    ChunkDone {
        chunk,
        writes,
        nan_clamps,
        completed,
    }
}

/// A bake in flight. Dropping the job cancels it and joins the workers.
pub struct BakeJob {
    _pool: WorkerPool,
    receiver: Receiver<ChunkDone>,
    chunks: usize,
    collected: Vec<ChunkDone>,
    progress: Arc<AtomicUsize>,
    total: usize,
    cancel: Arc<AtomicBool>,
}

impl BakeJob {
    /// Points traced so far. UI only; `finish` is the ordering barrier.
    pub fn progress(&self) -> usize {
        self.progress.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Ask the workers to stop at the next point boundary.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Non-blocking completion poll.
    pub fn is_done(&mut self) -> bool {
        loop {
            match self.receiver.try_recv() {
                Ok(done) => self.collected.push(done),
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => return true,
            }
        }
    }

    /// Join all chunks and write their texels into `framebuffer`. Errors
    /// with `Cancelled` (after applying the completed writes) if the bake
    /// was interrupted, or `ChunkFailed` if a worker died mid-chunk.
    pub fn finish(mut self, framebuffer: &mut Framebuffer) -> Result<()> {
        while self.collected.len() < self.chunks {
            match self.receiver.recv() {
                Ok(done) => self.collected.push(done),
                Err(_) => break,
            }
        }

        let received = self.collected.len();
        let mut nan_clamps = 0u32;
        let mut completed = 0usize;
        for done in &self.collected {
            for &((x, y), texel) in &done.writes {
                framebuffer.set_texel(x as u32, y as u32, texel);
            }
            nan_clamps += done.nan_clamps;
            completed += done.completed;
        }

        if nan_clamps > 0 {
            log::warn!("bake clamped {nan_clamps} non-finite samples to zero");
        }

        if received < self.chunks {
            let missing = self.chunks - received;
            return Err(Error::ChunkFailed {
                chunk: received,
                reason: format!("{missing} chunk(s) never reported back"),
            });
        }
        if self.cancel.load(Ordering::Relaxed) && completed < self.total {
            return Err(Error::Cancelled);
        }

        log::info!("bake finished: {completed} / {} points", self.total);
        Ok(())
    }
}

impl Drop for BakeJob {
    fn drop(&mut self) {
        // An abandoned job stops at the next point boundary instead of
        // burning through the remaining chunks while the pool joins.
        self.cancel.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accel::{Hit, Ray};

    /// Oracle over empty space: every ray escapes.
    struct NoHitOracle;

    impl RayOracle for NoHitOracle {
        fn intersect(&self, _ray: &Ray) -> Option<Hit> {
            None
        }
    }

    struct BlackSky;

    impl SkyRadiance for BlackSky {
        fn radiance(&self, _dir: Vec3) -> Vec3 {
            Vec3::ZERO
        }
    }

    fn point_grid(n: u16) -> Vec<BakePoint> {
        (0..n)
            .flat_map(|y| (0..n).map(move |x| (x, y)))
            .map(|coord| BakePoint {
                position: Vec3::new(coord.0 as f32, 0.0, coord.1 as f32),
                direction: Vec3::Y,
                coord,
            })
            .collect()
    }

    #[test]
    fn every_point_is_written_once() {
        let config = BakeConfig {
            spp: 4,
            bounces: 2,
            workers: 3,
            ..Default::default()
        };
        let points = point_grid(8);
        let scheduler = BakeScheduler::from_config(&config);
        let job = scheduler.bake(
            &config,
            points.clone(),
            Arc::new(NoHitOracle),
            Arc::new(BlackSky),
            Vec::new(),
        );

        let mut fb = Framebuffer::new(64);
        job.finish(&mut fb).unwrap();
        for p in &points {
            // Open-space points see no sun occluders but gather no bounce
            // light either; they are valid and black.
            assert_eq!(fb.texel(p.coord.0 as u32, p.coord.1 as u32)[3], 1.0);
        }
    }

    #[test]
    fn worker_count_does_not_change_the_image() {
        let points = point_grid(6);
        let mut images = Vec::new();
        for workers in [1usize, 2, 5] {
            let config = BakeConfig {
                spp: 8,
                bounces: 3,
                workers,
                seed: 42,
                ..Default::default()
            };
            let scheduler = BakeScheduler::from_config(&config);
            let job = scheduler.bake(
                &config,
                points.clone(),
                Arc::new(NoHitOracle),
                Arc::new(BlackSky),
                Vec::new(),
            );
            let mut fb = Framebuffer::new(64);
            job.finish(&mut fb).unwrap();
            images.push(fb);
        }
        assert_eq!(images[0], images[1]);
        assert_eq!(images[1], images[2]);
    }

    #[test]
    fn cancel_before_finish_reports_cancelled() {
        let config = BakeConfig {
            spp: 2048,
            bounces: 4,
            workers: 2,
            ..Default::default()
        };
        let points = point_grid(32);
        let scheduler = BakeScheduler::from_config(&config);
        let job = scheduler.bake(
            &config,
            points,
            Arc::new(NoHitOracle),
            Arc::new(BlackSky),
            Vec::new(),
        );
        job.cancel();
        let mut fb = Framebuffer::new(64);
        match job.finish(&mut fb) {
            Err(Error::Cancelled) | Ok(()) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
