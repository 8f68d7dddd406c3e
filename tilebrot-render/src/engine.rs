use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use tilebrot_core::{Fractal, Frame, Viewport};

use crate::coarse::coarse_pass;
use crate::config::EngineConfig;
use crate::scheduler::{Shared, TileScheduler};
use crate::store::{EngineEvent, FrameBuffers, FrameSnapshot, ResultStore};

/// The progressive compute engine.
///
/// Each viewport or resolution change starts a new epoch: a synchronous
/// coarse pass seeds the grid, then one job per tile refines it on the
/// worker pool. Jobs from superseded epochs notice at their next checkpoint
/// and exit without writing.
///
/// The receiver returned by [`Engine::new`] carries one
/// [`EngineEvent::TileDone`] per retired tile of the current epoch, then one
/// [`EngineEvent::FrameComplete`]. A host repaints from
/// [`Engine::request_frame`] when an event arrives; readiness is also
/// available through [`Engine::is_ready`].
///
/// Host-side operations take `&mut self`, so epoch changes are serialized by
/// the borrow checker; only tile jobs run concurrently.
pub struct Engine<F: Fractal + Send + Sync + 'static> {
    shared: Arc<Shared<F>>,
    scheduler: TileScheduler,
    config: EngineConfig,
    frame: Frame,
}

impl<F: Fractal + Send + Sync + 'static> Engine<F> {
    /// Build an idle engine at epoch 0 with zeroed buffers for `frame`.
    ///
    /// Nothing is computed until the first viewport or resolution change.
    pub fn new(
        fractal: F,
        config: EngineConfig,
        frame: Frame,
    ) -> crate::Result<(Self, Receiver<EngineEvent>)> {
        config.validate()?;
        let scheduler = TileScheduler::new(config.tiles_per_side, config.worker_threads)?;
        let buffers = FrameBuffers::allocate(frame.width, frame.height)?;
        let (tx, rx) = mpsc::channel();

        let shared = Arc::new(Shared {
            fractal,
            store: ResultStore::new(buffers),
            events: tx,
        });
        info!(
            width = frame.width,
            height = frame.height,
            workers = scheduler.worker_count(),
            tiles = config.tile_count(),
            "Engine created"
        );

        Ok((
            Self {
                shared,
                scheduler,
                config,
                frame,
            },
            rx,
        ))
    }

    /// [`new`](Self::new) followed by the first computation (epoch 1).
    pub fn start(
        fractal: F,
        config: EngineConfig,
        frame: Frame,
    ) -> crate::Result<(Self, Receiver<EngineEvent>)> {
        let (mut engine, rx) = Self::new(fractal, config, frame)?;
        engine.recompute(frame)?;
        Ok((engine, rx))
    }

    /// The host selected a new region: recompute at the current resolution.
    pub fn viewport_changed(&mut self, viewport: Viewport) -> crate::Result<u64> {
        viewport.validate()?;
        let frame = Frame {
            viewport,
            ..self.frame
        };
        self.recompute(frame)
    }

    /// Zoom into a pixel selection of the current frame, snapped to its aspect
    /// ratio. Selections made before the current frame is ready are ignored
    /// and yield `Ok(None)`.
    pub fn zoom_to_selection(
        &mut self,
        left: u32,
        top: u32,
        width: u32,
        height: u32,
    ) -> crate::Result<Option<u64>> {
        if !self.is_ready() {
            debug!(epoch = self.epoch(), "Selection ignored while computing");
            return Ok(None);
        }
        let viewport = self.frame.select(left, top, width, height)?;
        self.viewport_changed(viewport).map(Some)
    }

    /// The output raster changed size: reallocate and recompute.
    pub fn resolution_changed(&mut self, width: u32, height: u32) -> crate::Result<u64> {
        let frame = Frame::new(self.frame.viewport, width, height)?;
        self.recompute(frame)
    }

    /// The best raster available right now, with a normalization map built
    /// from the same epoch.
    pub fn request_frame(&self) -> FrameSnapshot {
        self.shared.store.snapshot(self.config.color_buckets)
    }

    /// `true` once every tile job of the current epoch has finished.
    pub fn is_ready(&self) -> bool {
        self.shared.store.is_ready()
    }

    pub fn epoch(&self) -> u64 {
        self.shared.store.epoch()
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn fractal(&self) -> &F {
        &self.shared.fractal
    }

    /// Block until the current epoch is ready or `timeout` elapses.
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        self.shared.store.wait_ready(timeout)
    }

    /// Cancel outstanding work and wait until every dispatched job has exited.
    ///
    /// The engine stays usable: the next viewport or resolution change starts
    /// a fresh epoch.
    pub fn shutdown(&mut self) {
        let epoch = self.shared.store.advance_epoch();
        let pending = self.shared.store.in_flight();
        debug!(epoch, pending, "Shutting down; draining in-flight jobs");
        self.shared.store.wait_idle();
    }

    /// Start a new epoch for `frame`.
    ///
    /// Buffers are allocated before the epoch moves, so an allocation
    /// failure leaves the previous frame untouched.
    fn recompute(&mut self, frame: Frame) -> crate::Result<u64> {
        let started = Instant::now();
        let buffers = FrameBuffers::allocate(frame.width, frame.height)?;
        let store = &self.shared.store;

        let epoch = store.advance_epoch();

        let fill = coarse_pass(
            &self.shared.fractal,
            &frame,
            self.config.coarse_block_width,
            self.config.coarse_block_height,
            buffers,
        );
        let tiles = self.scheduler.plan(&frame);
        debug!(
            epoch,
            blocks = fill.blocks,
            coarse_ms = started.elapsed().as_millis(),
            "Coarse pass done"
        );

        store.install(epoch, fill.buffers, fill.histogram, tiles.len());
        self.frame = frame;
        self.scheduler.dispatch(&self.shared, frame, epoch, tiles);
        Ok(epoch)
    }
}

impl<F: Fractal + Send + Sync + 'static> Drop for Engine<F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
