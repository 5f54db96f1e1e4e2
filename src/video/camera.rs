// Camera capability consumed by the frame pipeline
//
// A driver opens the device with a resolution and framerate, then yields
// frames one at a time at the hardware cadence until it is closed.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::frame::{Frame, PixelFormat};
use crate::config::CameraConfig;

/// Error types for camera access
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    OpenFailed(String),

    #[error("Camera disconnected")]
    Disconnected,

    #[error("Camera is not open")]
    NotOpen,
}

/// Resolution and framerate requested at open time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
}

impl From<&CameraConfig> for CaptureSettings {
    fn from(config: &CameraConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            framerate: config.framerate,
        }
    }
}

/// Camera driver
///
/// After `close` the stream is gone; capturing again requires another `open`.
pub trait Camera: Send + 'static {
    /// Open the device and begin continuous capture
    fn open(&mut self, settings: &CaptureSettings) -> Result<(), CameraError>;

    /// Block until the next frame is available
    fn next_frame(&mut self) -> Result<Frame, CameraError>;

    /// Hand the capture buffer back to the driver before the next frame
    fn recycle(&mut self) {}

    /// Release the capture stream and the device
    fn close(&mut self);
}

/// Test-pattern camera paced at the configured framerate
#[derive(Debug, Default)]
pub struct SimCamera {
    settings: Option<CaptureSettings>,
    sequence: u64,
    next_due: Option<Instant>,
}

impl SimCamera {
    pub fn new() -> Self {
        Self::default()
    }

    fn pattern(settings: &CaptureSettings, sequence: u64) -> Vec<u8> {
        // Diagonal gradient that scrolls one pixel per frame
        let (w, h) = (settings.width as usize, settings.height as usize);
        let shift = sequence as usize;
        let mut data = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            for x in 0..w {
                let v = ((x + y + shift) & 0xFF) as u8;
                data.extend_from_slice(&[v, v / 2, 255 - v]);
            }
        }
        data
    }
}

impl Camera for SimCamera {
    fn open(&mut self, settings: &CaptureSettings) -> Result<(), CameraError> {
        if settings.framerate == 0 {
            return Err(CameraError::OpenFailed("framerate must be non-zero".to_string()));
        }
        info!(
            "Opening simulated camera {}x{} @ {}fps",
            settings.width, settings.height, settings.framerate
        );
        self.settings = Some(*settings);
        self.sequence = 0;
        self.next_due = None;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, CameraError> {
        let settings = self.settings.ok_or(CameraError::NotOpen)?;
        let period = Duration::from_secs(1) / settings.framerate;

        let now = Instant::now();
        if let Some(due) = self.next_due {
            if due > now {
                std::thread::sleep(due - now);
            }
        }
        self.next_due = Some(Instant::now() + period);

        let frame = Frame::new(
            settings.width,
            settings.height,
            PixelFormat::Bgr24,
            self.sequence,
            Self::pattern(&settings, self.sequence),
        );
        self.sequence += 1;
        Ok(frame)
    }

    fn close(&mut self) {
        if self.settings.take().is_some() {
            debug!("Simulated camera closed after {} frames", self.sequence);
        }
    }
}
