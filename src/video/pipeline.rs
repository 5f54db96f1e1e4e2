// Continuous frame acquisition
//
// A producer thread pulls frames from the camera at hardware cadence and
// swaps each one into a single-slot mailbox. Readers take whatever is in the
// slot and never trigger a capture.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use super::camera::{Camera, CameraError, CaptureSettings};
use super::clock::{Clock, SystemClock};
use super::frame::Frame;
use crate::config::CameraConfig;

/// Pipeline lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum PipelineState {
    Stopped,
    Running,
    /// The producer exited on a camera error; `stop` clears it
    Faulted(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Pipeline is already running")]
    AlreadyRunning,

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Failed to spawn frame producer: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Camera was lost with a previous producer")]
    CameraLost,

    #[error("Frame producer panicked")]
    ProducerPanicked,
}

type FrameSlot = watch::Sender<Option<Arc<Frame>>>;

/// Cloneable read handle for consumers on other threads
#[derive(Debug, Clone)]
pub struct FrameReader {
    slot: watch::Receiver<Option<Arc<Frame>>>,
}

impl FrameReader {
    /// Most recent frame, or `None` before the first capture / after stop
    pub fn read(&self) -> Option<Arc<Frame>> {
        self.slot.borrow().clone()
    }
}

struct Producer<C> {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<C>,
}

pub struct FramePipeline<C: Camera> {
    /// Present while stopped; moved into the producer while running
    camera: Option<C>,
    settings: CaptureSettings,
    warmup: Duration,
    cooldown: Duration,
    clock: Arc<dyn Clock>,
    latest: Arc<FrameSlot>,
    state: Arc<watch::Sender<PipelineState>>,
    frames_captured: Arc<AtomicU64>,
    producer: Option<Producer<C>>,
}

impl<C: Camera> FramePipeline<C> {
    pub fn new(camera: C, config: &CameraConfig) -> Self {
        Self::with_clock(camera, config, Arc::new(SystemClock))
    }

    pub fn with_clock(camera: C, config: &CameraConfig, clock: Arc<dyn Clock>) -> Self {
        let (latest, _) = watch::channel(None);
        let (state, _) = watch::channel(PipelineState::Stopped);
        Self {
            camera: Some(camera),
            settings: CaptureSettings::from(config),
            warmup: config.warmup(),
            cooldown: config.cooldown(),
            clock,
            latest: Arc::new(latest),
            state: Arc::new(state),
            frames_captured: Arc::new(AtomicU64::new(0)),
            producer: None,
        }
    }

    /// Open the camera, launch the producer, then block for the warm-up delay
    ///
    /// Returns `AlreadyRunning` instead of starting twice. A faulted pipeline
    /// is reaped and restarted.
    pub fn start(&mut self) -> Result<&mut Self, PipelineError> {
        if self.is_running() {
            return Err(PipelineError::AlreadyRunning);
        }
        if self.producer.is_some() {
            debug!("Reaping faulted frame producer before restart");
            self.reap()?;
        }

        let mut camera = self.camera.take().ok_or(PipelineError::CameraLost)?;
        info!(
            "Starting frame pipeline {}x{} @ {}fps",
            self.settings.width, self.settings.height, self.settings.framerate
        );
        if let Err(e) = camera.open(&self.settings) {
            warn!("Camera open failed: {}", e);
            self.camera = Some(camera);
            self.state.send_replace(PipelineState::Faulted(e.to_string()));
            return Err(e.into());
        }

        let stop = Arc::new(AtomicBool::new(false));
        self.state.send_replace(PipelineState::Running);

        let handle = {
            let stop = Arc::clone(&stop);
            let latest = Arc::clone(&self.latest);
            let state = Arc::clone(&self.state);
            let counter = Arc::clone(&self.frames_captured);
            thread::Builder::new()
                .name("frame-producer".to_string())
                .spawn(move || run_producer(camera, stop, latest, state, counter))
        };
        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                self.state.send_replace(PipelineState::Faulted(e.to_string()));
                return Err(e.into());
            }
        };
        self.producer = Some(Producer { stop, handle });

        debug!("Waiting {:?} for camera warm-up", self.warmup);
        self.clock.sleep(self.warmup);
        Ok(self)
    }

    /// Signal the producer, wait for it to release the camera, then block for
    /// the cool-down delay
    ///
    /// No-op when already stopped.
    pub fn stop(&mut self) -> Result<(), PipelineError> {
        if self.producer.is_none() {
            // An open failure faults without ever spawning a producer
            if matches!(self.state(), PipelineState::Faulted(_)) {
                info!("Clearing camera fault");
                self.state.send_replace(PipelineState::Stopped);
            } else {
                debug!("Frame pipeline already stopped");
            }
            return Ok(());
        }

        info!("Stopping frame pipeline");
        self.reap()?;
        self.state.send_replace(PipelineState::Stopped);

        debug!("Waiting {:?} for camera cool-down", self.cooldown);
        self.clock.sleep(self.cooldown);
        info!("Frame pipeline stopped");
        Ok(())
    }

    /// Most recent frame without blocking
    pub fn read(&self) -> Option<Arc<Frame>> {
        self.latest.borrow().clone()
    }

    pub fn reader(&self) -> FrameReader {
        FrameReader {
            slot: self.latest.subscribe(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        *self.state.borrow() == PipelineState::Running
    }

    /// Receiver that observes every state change, including faults
    pub fn subscribe_state(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Frames captured since the pipeline was created
    pub fn frames_captured(&self) -> u64 {
        self.frames_captured.load(Ordering::Relaxed)
    }

    /// Request stop and join the producer, taking the camera back
    fn reap(&mut self) -> Result<(), PipelineError> {
        let Some(producer) = self.producer.take() else {
            return Ok(());
        };
        producer.stop.store(true, Ordering::Release);
        match producer.handle.join() {
            Ok(camera) => {
                self.camera = Some(camera);
                Ok(())
            }
            Err(_) => {
                error!("Frame producer panicked, camera handle lost");
                self.latest.send_replace(None);
                self.state
                    .send_replace(PipelineState::Faulted("frame producer panicked".to_string()));
                Err(PipelineError::ProducerPanicked)
            }
        }
    }
}

impl<C: Camera> Drop for FramePipeline<C> {
    fn drop(&mut self) {
        if self.producer.is_some() {
            debug!("FramePipeline dropped, stopping producer");
            if let Err(e) = self.reap() {
                warn!("Failed to stop frame producer on drop: {}", e);
            }
        }
    }
}

/// Producer loop: capture, publish, recycle, then check for stop
///
/// The camera is closed here and only here, then handed back through the
/// join handle.
fn run_producer<C: Camera>(
    mut camera: C,
    stop: Arc<AtomicBool>,
    latest: Arc<FrameSlot>,
    state: Arc<watch::Sender<PipelineState>>,
    counter: Arc<AtomicU64>,
) -> C {
    debug!("Frame producer started");

    let outcome = loop {
        match camera.next_frame() {
            Ok(frame) => {
                trace!(sequence = frame.sequence, "Frame captured");
                latest.send_replace(Some(Arc::new(frame)));
                counter.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => break Err(e),
        }
        camera.recycle();

        if stop.load(Ordering::Acquire) {
            break Ok(());
        }
    };

    camera.close();
    latest.send_replace(None);

    match outcome {
        Ok(()) => debug!("Frame producer exiting, camera released"),
        Err(e) => {
            error!("Frame capture failed, pipeline faulted: {}", e);
            state.send_replace(PipelineState::Faulted(e.to_string()));
        }
    }
    camera
}
