use std::sync::mpsc::Sender;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::RenderError;
use crate::normalize::{normalize, Histogram, NormalizationMap};
use crate::tile::TileRect;

// ---------------------------------------------------------------------------
// Buffers
// ---------------------------------------------------------------------------

/// Per-pixel grids for one resolution, row-major.
#[derive(Debug, Clone)]
pub struct FrameBuffers {
    pub width: u32,
    pub height: u32,
    /// One escape count per pixel.
    pub iterations: Vec<u32>,
    /// Pixels whose value is already final for the current epoch.
    pub computed: Vec<bool>,
}

impl FrameBuffers {
    /// Allocate zeroed grids, reporting out-of-memory instead of aborting.
    pub fn allocate(width: u32, height: u32) -> crate::Result<Self> {
        let len = width as usize * height as usize;
        let oom = |source| RenderError::Allocation {
            width,
            height,
            source,
        };

        let mut iterations = Vec::new();
        iterations.try_reserve_exact(len).map_err(oom)?;
        iterations.resize(len, 0);

        let mut computed = Vec::new();
        computed.try_reserve_exact(len).map_err(oom)?;
        computed.resize(len, false);

        Ok(Self {
            width,
            height,
            iterations,
            computed,
        })
    }

    #[inline]
    pub fn index(&self, px: u32, py: u32) -> usize {
        py as usize * self.width as usize + px as usize
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Fired once per epoch when its last tile job retires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameComplete {
    pub epoch: u64,
    pub width: u32,
    pub height: u32,
    /// Time since the epoch's jobs were dispatched.
    pub elapsed: Duration,
}

/// Progress reports sent to the host, in retirement order within an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// A tile of `epoch` holds its final values and can be repainted.
    TileDone {
        epoch: u64,
        rect: TileRect,
        remaining: usize,
        total: usize,
    },
    /// The last tile of the epoch has retired.
    FrameComplete(FrameComplete),
}

impl EngineEvent {
    pub fn epoch(&self) -> u64 {
        match self {
            Self::TileDone { epoch, .. } => *epoch,
            Self::FrameComplete(done) => done.epoch,
        }
    }
}

/// Counter state after a tile job of the current epoch retires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retired {
    /// Tile jobs of the epoch still outstanding.
    pub remaining: usize,
    /// Tile jobs the epoch was armed with.
    pub total: usize,
    /// Set when this was the epoch's last job.
    pub completed: Option<FrameComplete>,
}

/// A copy of the iteration grid together with the normalization map built
/// from the same epoch's histogram.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub epoch: u64,
    pub width: u32,
    pub height: u32,
    /// `true` when every tile job of `epoch` has finished.
    pub ready: bool,
    pub iterations: Vec<u32>,
    pub normalization: NormalizationMap,
}

impl FrameSnapshot {
    pub fn iteration_at(&self, px: u32, py: u32) -> u32 {
        self.iterations[py as usize * self.width as usize + px as usize]
    }

    /// Palette bucket of a pixel.
    pub fn bucket_at(&self, px: u32, py: u32) -> u32 {
        self.normalization
            .bucket(self.iteration_at(px, py))
            .unwrap_or(0)
    }

    /// Every pixel's palette bucket, row-major.
    pub fn buckets(&self) -> Vec<u32> {
        self.iterations
            .iter()
            .map(|&v| self.normalization.bucket(v).unwrap_or(0))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Outcome of the pre-compute checkpoint for one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// The job's epoch is no longer current.
    Stale,
    /// The pixel already holds its final value.
    Done,
    Pending,
}

/// Everything guarded by the store's single lock.
#[derive(Debug)]
struct StoreState {
    epoch: u64,
    buffers: FrameBuffers,
    histogram: Histogram,
    /// Outstanding tile jobs of the current epoch.
    active_tasks: usize,
    total_tasks: usize,
    /// Jobs handed to the pool and not yet exited, whatever their epoch.
    in_flight: usize,
    ready: bool,
    dispatched_at: Instant,
}

/// Shared grids, histogram, epoch and counters behind one mutex.
///
/// Every read or write of that state goes through [`ResultStore::lock`]; the
/// condition variable is signalled whenever readiness or the in-flight count
/// changes.
#[derive(Debug)]
pub struct ResultStore {
    state: Mutex<StoreState>,
    changed: Condvar,
}

impl ResultStore {
    pub fn new(buffers: FrameBuffers) -> Self {
        Self {
            state: Mutex::new(StoreState {
                epoch: 0,
                buffers,
                histogram: Histogram::new(),
                active_tasks: 0,
                total_tasks: 0,
                in_flight: 0,
                ready: false,
                dispatched_at: Instant::now(),
            }),
            changed: Condvar::new(),
        }
    }

    /// Critical sections never leave the state half-updated, so a panic in
    /// another holder is survivable.
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("result store lock was poisoned; recovering");
            poisoned.into_inner()
        })
    }

    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    pub fn is_ready(&self) -> bool {
        self.lock().ready
    }

    /// Start a new generation. Jobs of older epochs stop at their next checkpoint.
    pub fn advance_epoch(&self) -> u64 {
        let mut state = self.lock();
        state.epoch += 1;
        state.ready = false;
        state.active_tasks = 0;
        state.total_tasks = 0;
        debug!(epoch = state.epoch, "Epoch advanced");
        self.changed.notify_all();
        state.epoch
    }

    /// Swap in a freshly seeded frame for `epoch` and arm `tasks` tile jobs.
    ///
    /// `buffers` and `histogram` come from the coarse pass; the computed flags
    /// in `buffers` mark only its representative pixels.
    pub fn install(&self, epoch: u64, buffers: FrameBuffers, histogram: Histogram, tasks: usize) {
        let mut state = self.lock();
        debug_assert_eq!(state.epoch, epoch, "install raced with another epoch change");
        state.buffers = buffers;
        state.histogram = histogram;
        state.active_tasks = tasks;
        state.total_tasks = tasks;
        state.in_flight += tasks;
        state.ready = tasks == 0;
        state.dispatched_at = Instant::now();
        self.changed.notify_all();
    }

    /// First checkpoint of a pixel: is the job still current, and is there work left?
    pub fn checkpoint(&self, epoch: u64, index: usize) -> Checkpoint {
        let state = self.lock();
        if state.epoch != epoch {
            Checkpoint::Stale
        } else if state.buffers.computed[index] {
            Checkpoint::Done
        } else {
            Checkpoint::Pending
        }
    }

    /// Second checkpoint: record `value` if `epoch` is still current.
    pub fn commit(&self, epoch: u64, index: usize, value: u32) -> bool {
        let mut state = self.lock();
        if state.epoch != epoch {
            return false;
        }
        state.buffers.iterations[index] = value;
        *state.histogram.entry(value).or_insert(0) += 1;
        true
    }

    /// Retire the tile job for `rect` of `epoch`.
    ///
    /// Returns `None` for a job of an older epoch. Otherwise the tile's
    /// [`EngineEvent::TileDone`] is sent, followed by
    /// [`EngineEvent::FrameComplete`] when it was the last outstanding job.
    /// Both go out before the lock is released, so events reach the host in
    /// retirement order. Send errors mean the host stopped listening and are
    /// ignored.
    pub fn finish_task(
        &self,
        epoch: u64,
        rect: TileRect,
        events: &Sender<EngineEvent>,
    ) -> Option<Retired> {
        let mut state = self.lock();
        if state.epoch != epoch || state.active_tasks == 0 {
            return None;
        }
        state.active_tasks -= 1;
        let _ = events.send(EngineEvent::TileDone {
            epoch,
            rect,
            remaining: state.active_tasks,
            total: state.total_tasks,
        });

        let completed = if state.active_tasks == 0 {
            state.ready = true;
            self.changed.notify_all();
            let done = FrameComplete {
                epoch,
                width: state.buffers.width,
                height: state.buffers.height,
                elapsed: state.dispatched_at.elapsed(),
            };
            let _ = events.send(EngineEvent::FrameComplete(done));
            Some(done)
        } else {
            None
        };
        Some(Retired {
            remaining: state.active_tasks,
            total: state.total_tasks,
            completed,
        })
    }

    /// Called exactly once by every dispatched job as it exits, stale or not.
    pub fn job_exited(&self) {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        if state.in_flight == 0 {
            self.changed.notify_all();
        }
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Copy the grid and normalize the histogram in one critical section.
    pub fn snapshot(&self, palette: u32) -> FrameSnapshot {
        let state = self.lock();
        FrameSnapshot {
            epoch: state.epoch,
            width: state.buffers.width,
            height: state.buffers.height,
            ready: state.ready,
            iterations: state.buffers.iterations.clone(),
            normalization: normalize(&state.histogram, palette),
        }
    }

    /// Block until the current epoch is ready or `timeout` elapses.
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        let guard = self.lock();
        let (state, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |s| !s.ready)
            .unwrap_or_else(PoisonError::into_inner);
        state.ready
    }

    /// Block until no dispatched job is still running.
    pub fn wait_idle(&self) {
        let guard = self.lock();
        let _state = self
            .changed
            .wait_while(guard, |s| s.in_flight > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

/// Decrements the store's in-flight count when a job exits by any path.
pub(crate) struct InFlightGuard<'a>(pub(crate) &'a ResultStore);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.job_exited();
    }
}
