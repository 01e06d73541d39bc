//! Render lifecycle: build, schedule workers, observe, resolve.
//!
//! `RenderController::render` runs one frame to completion on scoped worker
//! threads. A cloneable `RenderHandle` lets other threads watch progress,
//! pause, resume or abort while the render is running.

use crate::framebuffer::{AccumulationBuffer, DisplayBuffer, Frame};
use crate::tile::{partition, TilePool, TileSnapshot};
use crate::worker::{ActiveGuard, RenderJob, Worker};
use crate::{RenderError, RenderResult, World};
use kiln_core::{RenderSettings, Scene};
use std::io;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, ScopedJoinHandle};
use std::time::{Duration, Instant};

/// Default interval between progress polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lifecycle of a render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderState {
    #[default]
    Idle,
    /// Building acceleration structures
    Building,
    Rendering,
    Completed,
    Aborted,
}

/// Failures injected into a render by unit tests.
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fault {
    /// Refuse to spawn this worker
    Spawn(usize),
    /// Panic the worker that claims this tile
    PanicOnTile(usize),
    /// Panic this worker once the pool is drained
    PanicOnExit(usize),
}

/// State shared between the controller, its workers and any handles.
#[derive(Debug, Default)]
pub(crate) struct SharedState {
    /// Set while a `render` call owns the controller
    running: AtomicBool,
    abort: AtomicBool,
    pause: AtomicBool,
    pub(crate) active_threads: AtomicUsize,
    finished_tiles: AtomicUsize,
    total_tiles: AtomicUsize,
    /// Sum of finished tile render times, pauses excluded
    tile_nanos: AtomicU64,
    state: Mutex<RenderState>,
    /// Start of the current render and its final duration once over
    timing: Mutex<(Option<Instant>, Option<Duration>)>,
    /// Tiles of the most recent frame, kept for inspection after it ends
    tiles: RwLock<Option<Arc<TilePool>>>,
    /// Live preview, released once the workers have joined
    display: RwLock<Option<Arc<DisplayBuffer>>>,
    #[cfg(test)]
    fault: Mutex<Option<Fault>>,
}

impl SharedState {
    #[cfg(test)]
    pub(crate) fn fault(&self) -> Option<Fault> {
        *self.fault.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.pause.load(Ordering::Acquire)
    }

    pub(crate) fn record_tile(&self, duration: Duration) {
        self.tile_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::AcqRel);
        self.finished_tiles.fetch_add(1, Ordering::AcqRel);
    }

    fn set_state(&self, state: RenderState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn state(&self) -> RenderState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reset(&self, total_tiles: usize) {
        self.set_state(RenderState::Idle);
        self.abort.store(false, Ordering::Release);
        self.pause.store(false, Ordering::Release);
        self.active_threads.store(0, Ordering::Release);
        self.finished_tiles.store(0, Ordering::Release);
        self.total_tiles.store(total_tiles, Ordering::Release);
        self.tile_nanos.store(0, Ordering::Release);
        *self.timing.lock().unwrap_or_else(PoisonError::into_inner) = (None, None);
        *self.tiles.write().unwrap_or_else(PoisonError::into_inner) = None;
        *self.display.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn start_timer(&self) {
        *self.timing.lock().unwrap_or_else(PoisonError::into_inner) = (Some(Instant::now()), None);
    }

    /// Freeze the elapsed time and return it.
    fn stop_timer(&self) -> Duration {
        let mut timing = self.timing.lock().unwrap_or_else(PoisonError::into_inner);
        let duration = timing.0.map_or(Duration::ZERO, |start| start.elapsed());
        timing.1 = Some(duration);
        duration
    }

    fn elapsed(&self) -> Duration {
        match *self.timing.lock().unwrap_or_else(PoisonError::into_inner) {
            (_, Some(duration)) => duration,
            (Some(start), None) => start.elapsed(),
            (None, None) => Duration::ZERO,
        }
    }

    fn finished_tiles(&self) -> usize {
        self.finished_tiles.load(Ordering::Acquire)
    }

    fn total_tiles(&self) -> usize {
        self.total_tiles.load(Ordering::Acquire)
    }
}

/// Marks the controller busy for the duration of one `render` call.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(running: &'a AtomicBool) -> Option<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(running))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Observer and remote control for a running render.
#[derive(Debug, Clone)]
pub struct RenderHandle {
    shared: Arc<SharedState>,
}

impl RenderHandle {
    /// Ask every worker to stop. Workers finish their current sample pass
    /// and exit; the render then returns `RenderError::Aborted`.
    pub fn abort(&self) {
        self.shared.abort.store(true, Ordering::Release);
    }

    /// Suspend workers between sample passes.
    pub fn pause(&self) {
        self.shared.pause.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.shared.pause.store(false, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.shared.is_paused()
    }

    pub fn state(&self) -> RenderState {
        self.shared.state()
    }

    pub fn finished_tiles(&self) -> usize {
        self.shared.finished_tiles()
    }

    pub fn total_tiles(&self) -> usize {
        self.shared.total_tiles()
    }

    pub fn active_threads(&self) -> usize {
        self.shared.active_threads.load(Ordering::Acquire)
    }

    /// Per-tile progress of the current (or most recent) frame.
    pub fn tiles(&self) -> Vec<TileSnapshot> {
        self.shared
            .tiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or_else(Vec::new, |pool| pool.snapshots())
    }

    /// Wall-clock time since rendering started (frozen once it ends).
    pub fn elapsed(&self) -> Duration {
        self.shared.elapsed()
    }

    /// Mean time to render one tile, excluding pauses.
    pub fn average_tile_time(&self) -> Option<Duration> {
        let finished = self.finished_tiles();
        if finished == 0 {
            return None;
        }
        let nanos = self.shared.tile_nanos.load(Ordering::Acquire) / finished as u64;
        Some(Duration::from_nanos(nanos))
    }

    /// Average tile time times remaining tiles, spread over the active workers.
    pub fn estimated_remaining(&self) -> Option<Duration> {
        let average = self.average_tile_time()?;
        let remaining = self.total_tiles().saturating_sub(self.finished_tiles());
        let remaining = u32::try_from(remaining).unwrap_or(u32::MAX);
        let workers = u32::try_from(self.active_threads().max(1)).unwrap_or(u32::MAX);
        Some(average.saturating_mul(remaining) / workers)
    }

    /// Copy of the running preview while a frame is being rendered.
    pub fn preview(&self) -> Option<Vec<[u8; 4]>> {
        self.shared
            .display
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|display| display.to_rgba())
    }
}

/// Runs renders and owns the thread bookkeeping for them.
#[derive(Debug)]
pub struct RenderController {
    shared: Arc<SharedState>,
    poll_interval: Duration,
}

impl Default for RenderController {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderController {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SharedState::default()),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set how often the controller checks on its workers.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn handle(&self) -> RenderHandle {
        RenderHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn state(&self) -> RenderState {
        self.shared.state()
    }

    /// Render `scene` with its own settings.
    ///
    /// Blocks until every worker has joined. Frame buffers are released
    /// before returning on every path, including abort. A call made while
    /// another render is in progress returns `RenderError::Busy` and leaves
    /// the running one untouched.
    pub fn render(&self, scene: &Scene) -> RenderResult<Frame> {
        let shared = &*self.shared;
        let _running = RunningGuard::acquire(&shared.running).ok_or(RenderError::Busy)?;
        shared.reset(0);

        let settings = scene.settings.sanitized();
        scene.validate()?;

        shared.set_state(RenderState::Building);
        let build_start = Instant::now();
        let world = World::build(scene);
        log::info!(
            "Built world for '{}' in {:.2?}: {} spheres, {} triangles",
            scene.name,
            build_start.elapsed(),
            world.sphere_count(),
            world.triangle_count()
        );

        let mut camera = scene.camera;
        camera.initialize(settings.width, settings.height);

        let shuffle_seed = settings.seed.unwrap_or_else(rand::random);
        let tiles = partition(
            settings.width,
            settings.height,
            settings.tile_width,
            settings.tile_height,
            settings.tile_order,
            shuffle_seed,
        )
        .map_err(|e| self.setup_failed(e))?;
        let pool = Arc::new(TilePool::new(tiles));
        let total_tiles = pool.len();
        let threads = worker_count(&settings, total_tiles);

        let (accumulation, display) =
            allocate_buffers(&settings).map_err(|e| self.setup_failed(e))?;

        shared.total_tiles.store(total_tiles, Ordering::Release);
        *shared.tiles.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&pool));
        *shared.display.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&display));

        log::info!(
            "Rendering {}x{}: {} spp, {} bounces, {} threads, {} tiles",
            settings.width,
            settings.height,
            settings.samples,
            settings.bounces,
            threads,
            total_tiles
        );

        shared.set_state(RenderState::Rendering);
        shared.start_timer();

        let job = RenderJob {
            world: &world,
            camera: &camera,
            settings: &settings,
            pool: &pool,
            accumulation: &accumulation,
            display: &display,
            shared,
        };

        let run = thread::scope(|scope| -> RenderResult<()> {
            let mut handles = Vec::with_capacity(threads);

            for index in 0..threads {
                let worker = Worker::new(index, &job);
                let guard = ActiveGuard::new(&shared.active_threads);

                match spawn_worker(scope, index, worker, guard) {
                    Ok(handle) => handles.push(handle),
                    Err(source) => {
                        log::error!("Failed to spawn render worker {}: {}", index, source);
                        shared.abort.store(true, Ordering::Release);
                        join_workers(handles);
                        return Err(RenderError::ThreadSpawn { index, source });
                    }
                }
            }

            self.wait_for_workers(total_tiles);
            join_workers(handles);
            Ok(())
        });

        let duration = shared.stop_timer();
        *shared.display.write().unwrap_or_else(PoisonError::into_inner) = None;
        drop(display);

        if let Err(e) = run {
            shared.set_state(RenderState::Aborted);
            return Err(e);
        }

        let finished_tiles = shared.finished_tiles();
        if shared.is_aborted() {
            log::warn!(
                "Render aborted after {:.2?} with {}/{} tiles finished",
                duration,
                finished_tiles,
                total_tiles
            );
            shared.set_state(RenderState::Aborted);
            return Err(RenderError::Aborted {
                finished_tiles,
                total_tiles,
            });
        }

        if finished_tiles < total_tiles {
            shared.set_state(RenderState::Aborted);
            return Err(RenderError::Incomplete {
                finished_tiles,
                total_tiles,
            });
        }

        let frame = Frame::resolve(&accumulation, pool.tiles(), duration);
        shared.set_state(RenderState::Completed);
        log::info!(
            "Render finished in {:.2?} ({} samples)",
            duration,
            frame.samples
        );
        Ok(frame)
    }

    /// Report a failure found before any worker started.
    fn setup_failed(&self, error: RenderError) -> RenderError {
        log::error!("{}", error);
        self.shared.set_state(RenderState::Idle);
        error
    }

    /// Poll until every worker has exited or an abort is requested,
    /// logging progress at each whole 10%.
    fn wait_for_workers(&self, total_tiles: usize) {
        let shared = &*self.shared;
        let mut next_report = 10;

        while shared.active_threads.load(Ordering::Acquire) > 0 && !shared.is_aborted() {
            thread::sleep(self.poll_interval);

            let percent = shared.finished_tiles() * 100 / total_tiles.max(1);
            let step = percent / 10 * 10;
            if step >= next_report {
                log::info!(
                    "Render {}% complete ({}/{} tiles)",
                    step,
                    shared.finished_tiles(),
                    total_tiles
                );
                next_report = step + 10;
            }
        }
    }
}

/// Number of workers to launch: the configured count or every logical
/// core, but never more than there are tiles to claim.
fn worker_count(settings: &RenderSettings, tiles: usize) -> usize {
    let requested = settings.threads.unwrap_or_else(|| {
        thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    });

    if tiles < requested {
        log::warn!(
            "Reducing worker count from {} to {} to match the tile count",
            requested,
            tiles
        );
        return tiles.max(1);
    }
    requested
}

fn spawn_worker<'scope, 'env, 'job: 'scope>(
    scope: &'scope thread::Scope<'scope, 'env>,
    index: usize,
    worker: Worker<'job>,
    guard: ActiveGuard<'job>,
) -> io::Result<ScopedJoinHandle<'scope, ()>> {
    #[cfg(test)]
    if worker.fault() == Some(Fault::Spawn(index)) {
        return Err(io::Error::other("spawn refused"));
    }

    thread::Builder::new()
        .name(format!("kiln-worker-{index}"))
        .spawn_scoped(scope, move || {
            let _guard = guard;
            worker.run();
        })
}

fn allocate_buffers(
    settings: &RenderSettings,
) -> RenderResult<(AccumulationBuffer, Arc<DisplayBuffer>)> {
    let accumulation = AccumulationBuffer::new(settings.width, settings.height)?;
    let display = DisplayBuffer::new(settings.width, settings.height)?;
    Ok((accumulation, Arc::new(display)))
}

/// Join every worker. A failed join is logged; the tile accounting decides
/// whether the frame is still complete.
fn join_workers(handles: Vec<ScopedJoinHandle<'_, ()>>) {
    for handle in handles {
        let name = handle.thread().name().unwrap_or("kiln-worker").to_string();
        if handle.join().is_err() {
            log::warn!("Render worker {} panicked", name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::{Camera, Color, Material, Sphere, TileOrder};
    use kiln_math::Vec3;

    /// 16x16 frame cut into sixteen 4x4 tiles.
    fn small_scene(threads: usize) -> Scene {
        let mut scene = Scene::new("small");
        let grey = scene.add_material(Material::lambertian(Color::splat(0.5)));
        scene.add_sphere(Sphere::new(Vec3::ZERO, 1.0, grey));
        scene
            .with_camera(Camera::new().with_position(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y))
            .with_settings(
                RenderSettings::default()
                    .with_resolution(16, 16)
                    .with_quality(2, 2)
                    .with_tiles(4, 4, TileOrder::Normal)
                    .with_threads(threads)
                    .with_seed(7),
            )
    }

    fn controller_with_fault(fault: Fault) -> RenderController {
        let controller = RenderController::new().with_poll_interval(Duration::from_millis(1));
        *controller.shared.fault.lock().unwrap() = Some(fault);
        controller
    }

    #[test]
    fn test_worker_count_is_capped_by_tiles() {
        let settings = RenderSettings::default().with_threads(8);
        assert_eq!(worker_count(&settings, 3), 3);
        assert_eq!(worker_count(&settings, 100), 8);

        let detected = RenderSettings::default();
        assert!(worker_count(&detected, 10_000) >= 1);
    }

    #[test]
    fn test_handle_before_any_render() {
        let controller = RenderController::new();
        let handle = controller.handle();

        assert_eq!(handle.state(), RenderState::Idle);
        assert_eq!(handle.finished_tiles(), 0);
        assert!(handle.tiles().is_empty());
        assert!(handle.preview().is_none());
        assert!(handle.average_tile_time().is_none());
        assert!(handle.estimated_remaining().is_none());
        assert_eq!(handle.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_pause_and_resume_flags() {
        let controller = RenderController::new();
        let handle = controller.handle();
        handle.pause();
        assert!(handle.is_paused());
        handle.resume();
        assert!(!handle.is_paused());
    }

    #[test]
    fn test_estimates_from_recorded_tiles() {
        let controller = RenderController::new();
        let handle = controller.handle();
        controller.shared.reset(10);
        controller.shared.record_tile(Duration::from_millis(100));
        controller.shared.record_tile(Duration::from_millis(300));

        assert_eq!(handle.finished_tiles(), 2);
        assert_eq!(handle.average_tile_time(), Some(Duration::from_millis(200)));
        // 8 tiles left, no active workers counts as one
        assert_eq!(handle.estimated_remaining(), Some(Duration::from_millis(1600)));
    }

    #[test]
    fn test_spawn_failure_stops_started_workers() {
        let controller = controller_with_fault(Fault::Spawn(1));
        let handle = controller.handle();

        let result = controller.render(&small_scene(2));
        assert!(matches!(result, Err(RenderError::ThreadSpawn { index: 1, .. })));
        assert_eq!(handle.state(), RenderState::Aborted);
        assert_eq!(handle.active_threads(), 0);
        assert!(handle.preview().is_none());
    }

    #[test]
    fn test_panicked_worker_leaves_frame_incomplete() {
        let controller = controller_with_fault(Fault::PanicOnTile(5));
        let handle = controller.handle();

        let result = controller.render(&small_scene(2));
        match result {
            Err(RenderError::Incomplete {
                finished_tiles,
                total_tiles,
            }) => {
                assert_eq!(total_tiles, 16);
                assert_eq!(finished_tiles, 15);
            }
            other => panic!("expected an incomplete render, got {:?}", other.map(|f| f.samples)),
        }
        assert_eq!(handle.state(), RenderState::Aborted);
        assert_eq!(handle.active_threads(), 0);
        assert!(!handle.tiles()[5].is_complete);
    }

    #[test]
    fn test_join_failure_after_all_tiles_still_completes() {
        let controller = controller_with_fault(Fault::PanicOnExit(0));
        let handle = controller.handle();

        let frame = controller.render(&small_scene(2)).unwrap();
        assert_eq!(frame.samples, 16 * 16 * 2);
        assert_eq!(handle.state(), RenderState::Completed);
        assert!(handle.tiles().iter().all(|t| t.is_complete));
    }

    #[test]
    fn test_running_guard_is_exclusive() {
        let running = AtomicBool::new(false);
        let first = RunningGuard::acquire(&running);
        assert!(first.is_some());
        assert!(RunningGuard::acquire(&running).is_none());

        drop(first);
        assert!(RunningGuard::acquire(&running).is_some());
    }
}
