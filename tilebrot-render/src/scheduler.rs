use std::sync::mpsc::Sender;
use std::sync::Arc;

use tracing::{debug, info, trace};

use tilebrot_core::{evaluate, Fractal, Frame};

use crate::store::{Checkpoint, EngineEvent, InFlightGuard, ResultStore};
use crate::tile::{build_tile_grid, TileJob, TileRect};

/// State shared between the engine and every tile job.
pub(crate) struct Shared<F> {
    pub(crate) fractal: F,
    pub(crate) store: ResultStore,
    pub(crate) events: Sender<EngineEvent>,
}

/// Cuts frames into a fixed tile grid and runs one job per tile on a
/// dedicated worker pool.
pub struct TileScheduler {
    pool: rayon::ThreadPool,
    per_side: u32,
}

impl TileScheduler {
    /// `threads = None` sizes the pool to the available parallelism.
    pub fn new(per_side: u32, threads: Option<usize>) -> crate::Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.unwrap_or(0))
            .thread_name(|i| format!("tilebrot-worker-{i}"))
            .build()?;
        debug!(threads = pool.current_num_threads(), per_side, "Worker pool ready");
        Ok(Self { pool, per_side })
    }

    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// The tiles a frame of this size is split into.
    pub fn plan(&self, frame: &Frame) -> Vec<TileRect> {
        build_tile_grid(frame.width, frame.height, self.per_side)
    }

    /// Submit one job per tile, bound to `epoch`. The store must already be
    /// armed with `tiles.len()` active tasks.
    pub(crate) fn dispatch<F>(
        &self,
        shared: &Arc<Shared<F>>,
        frame: Frame,
        epoch: u64,
        tiles: Vec<TileRect>,
    ) where
        F: Fractal + Send + Sync + 'static,
    {
        debug!(
            epoch,
            jobs = tiles.len(),
            width = frame.width,
            height = frame.height,
            "Dispatching tiles"
        );
        for rect in tiles {
            let job = TileJob { rect, epoch, frame };
            let shared = Arc::clone(shared);
            self.pool.spawn(move || run_tile_job(&shared, job));
        }
    }
}

/// Fill one tile, checking the epoch before and after every evaluation.
///
/// A stale job returns without touching the grid, histogram or task counter.
pub(crate) fn run_tile_job<F: Fractal>(shared: &Shared<F>, job: TileJob) {
    let store = &shared.store;
    let _exit = InFlightGuard(store);
    let width = job.frame.width as usize;

    for (px, py) in job.rect.pixels() {
        let index = py as usize * width + px as usize;

        match store.checkpoint(job.epoch, index) {
            Checkpoint::Stale => {
                trace!(epoch = job.epoch, x = job.rect.x, y = job.rect.y, "Stale tile skipped");
                return;
            }
            Checkpoint::Done => continue,
            Checkpoint::Pending => {}
        }

        // Outside the lock: this is the expensive part.
        let value = evaluate(&shared.fractal, &job.frame, px, py);

        if !store.commit(job.epoch, index, value) {
            trace!(
                epoch = job.epoch,
                x = job.rect.x,
                y = job.rect.y,
                "Stale tile dropped its result"
            );
            return;
        }
    }

    let retired = store.finish_task(job.epoch, job.rect, &shared.events);
    if let Some(done) = retired.and_then(|r| r.completed) {
        info!(
            epoch = done.epoch,
            width = done.width,
            height = done.height,
            elapsed_ms = done.elapsed.as_millis(),
            "Frame complete"
        );
    }
}
