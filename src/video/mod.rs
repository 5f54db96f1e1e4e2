// Video module: camera seam and the latest-frame pipeline

pub mod camera;
mod clock;
pub mod frame;
pub mod pipeline;

pub use camera::{Camera, CameraError, CaptureSettings, SimCamera};
pub use clock::{Clock, SystemClock};
pub use frame::{Frame, PixelFormat};
pub use pipeline::{FramePipeline, FrameReader, PipelineError, PipelineState};
