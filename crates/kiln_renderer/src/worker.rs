//! Render worker loop.
//!
//! Each worker claims tiles from the shared pool until it is empty. A tile
//! is rendered one sample pass at a time so abort and pause take effect
//! within a single pass.

#[cfg(test)]
use crate::controller::Fault;
use crate::controller::SharedState;
use crate::framebuffer::{color_to_rgba, AccumulationBuffer, DisplayBuffer};
use crate::{trace, Ray, Tile, TilePool, World};
use kiln_core::{Camera, Color, RenderSettings};
use kiln_math::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Sleep between pause checks.
const PAUSE_POLL: Duration = Duration::from_millis(10);

/// Everything a worker reads or writes during one frame.
pub(crate) struct RenderJob<'a> {
    pub world: &'a World,
    pub camera: &'a Camera,
    pub settings: &'a RenderSettings,
    pub pool: &'a TilePool,
    pub accumulation: &'a AccumulationBuffer,
    pub display: &'a DisplayBuffer,
    pub shared: &'a SharedState,
}

/// Counts a worker as active for as long as it lives.
///
/// Created on the controller thread before spawning, so the count is
/// already correct when polling starts and is given back even if the
/// spawn fails or the worker panics.
pub(crate) struct ActiveGuard<'a>(&'a AtomicUsize);

impl<'a> ActiveGuard<'a> {
    pub(crate) fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

enum TileOutcome {
    /// All sample passes done; render time excluding pauses
    Finished(Duration),
    Aborted,
}

pub(crate) struct Worker<'a> {
    index: usize,
    job: &'a RenderJob<'a>,
}

impl<'a> Worker<'a> {
    pub(crate) fn new(index: usize, job: &'a RenderJob<'a>) -> Self {
        Self { index, job }
    }

    pub(crate) fn run(&self) {
        let job = self.job;
        let mut worker_rng = StdRng::seed_from_u64(splitmix64(wall_clock_seed() ^ self.index as u64));
        let mut tiles_done = 0usize;

        while let Some(tile) = job.pool.next_tile() {
            #[cfg(test)]
            if self.fault() == Some(Fault::PanicOnTile(tile.index())) {
                panic!("worker {} failed on tile {}", self.index, tile.index());
            }

            if job.shared.is_aborted() {
                tile.release();
                break;
            }

            // A fixed seed gives every tile its own stream so the image does
            // not depend on which worker claims which tile
            let mut tile_rng = job
                .settings
                .seed
                .map(|seed| StdRng::seed_from_u64(tile_seed(seed, tile)));
            let rng = tile_rng.as_mut().unwrap_or(&mut worker_rng);

            match self.render_tile(tile, rng) {
                TileOutcome::Finished(duration) => {
                    tile.complete();
                    job.shared.record_tile(duration);
                    tiles_done += 1;
                    log::trace!(
                        "Worker {} finished tile {} in {:.2?}",
                        self.index,
                        tile.index(),
                        duration
                    );
                }
                TileOutcome::Aborted => {
                    tile.release();
                    break;
                }
            }
        }

        log::debug!("Worker {} exiting after {} tiles", self.index, tiles_done);

        #[cfg(test)]
        if self.fault() == Some(Fault::PanicOnExit(self.index)) {
            panic!("worker {} failed on exit", self.index);
        }
    }

    #[cfg(test)]
    pub(crate) fn fault(&self) -> Option<Fault> {
        self.job.shared.fault()
    }

    fn render_tile(&self, tile: &Tile, rng: &mut StdRng) -> TileOutcome {
        let job = self.job;
        let settings = job.settings;
        let started = Instant::now();
        let mut paused = Duration::ZERO;

        for pass in 0..settings.samples {
            if !self.checkpoint(&mut paused) {
                return TileOutcome::Aborted;
            }

            let samples_taken = (pass + 1) as f64;
            for (x, y) in tile.pixels() {
                let offset = if settings.antialiasing {
                    Vec2::new(rng.gen(), rng.gen())
                } else {
                    Vec2::splat(0.5)
                };

                let ray = Ray::from(job.camera.get_ray(x, y, offset));
                let mut color = trace(&ray, job.world, settings.bounces, rng);
                if !color.is_finite() {
                    color = Color::ZERO;
                }

                let sum = job.accumulation.add(x, y, color);
                job.display.set(x, y, color_to_rgba(sum / samples_taken));
            }

            tile.finish_sample_pass();
        }

        TileOutcome::Finished(started.elapsed().saturating_sub(paused))
    }

    /// Block while paused, adding the wait to `paused`.
    /// Returns false when the render has been aborted.
    fn checkpoint(&self, paused: &mut Duration) -> bool {
        let shared = self.job.shared;
        if shared.is_paused() {
            let pause_start = Instant::now();
            while shared.is_paused() && !shared.is_aborted() {
                thread::sleep(PAUSE_POLL);
            }
            *paused += pause_start.elapsed();
        }
        !shared.is_aborted()
    }
}

/// SplitMix64 finalizer, used to spread small seeds over the full state.
fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Seed for a tile's generator, derived from the tile's position so it is
/// the same for every thread count and tile order.
fn tile_seed(seed: u64, tile: &Tile) -> u64 {
    let begin = tile.begin();
    splitmix64(seed ^ splitmix64(((begin.y as u64) << 32) | begin.x as u64))
}

fn wall_clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition;
    use kiln_core::TileOrder;

    #[test]
    fn test_splitmix_spreads_neighbours() {
        assert_ne!(splitmix64(0), splitmix64(1));
        assert_ne!(splitmix64(1) >> 32, splitmix64(2) >> 32);
    }

    #[test]
    fn test_tile_seed_depends_on_position_not_order() {
        let normal = partition(64, 64, 16, 16, TileOrder::Normal, 0).unwrap();
        let reversed = partition(64, 64, 16, 16, TileOrder::Reversed, 0).unwrap();

        let first = &normal[0];
        let same_place = reversed.iter().find(|t| t.begin() == first.begin()).unwrap();
        assert_ne!(first.index(), same_place.index());
        assert_eq!(tile_seed(9, first), tile_seed(9, same_place));
        assert_ne!(tile_seed(9, first), tile_seed(9, &normal[1]));
        assert_ne!(tile_seed(9, first), tile_seed(10, first));
    }

    #[test]
    fn test_active_guard_counts() {
        let counter = AtomicUsize::new(0);
        {
            let _a = ActiveGuard::new(&counter);
            let _b = ActiveGuard::new(&counter);
            assert_eq!(counter.load(Ordering::Acquire), 2);
        }
        assert_eq!(counter.load(Ordering::Acquire), 0);
    }
}
