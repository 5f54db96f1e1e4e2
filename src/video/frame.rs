// Captured image frames

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Pixel layouts the pipeline knows how to hold
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Bgr24,
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgr24 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// One raw image as delivered by the camera
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Monotonic count assigned by the camera since it was opened
    pub sequence: u64,
    pub captured_at: Instant,
    /// Packed rows, `width * height * bytes_per_pixel` bytes
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, format: PixelFormat, sequence: u64, data: Vec<u8>) -> Self {
        debug_assert_eq!(
            data.len(),
            width as usize * height as usize * format.bytes_per_pixel()
        );
        Self {
            width,
            height,
            format,
            sequence,
            captured_at: Instant::now(),
            data,
        }
    }

    /// Copy of the frame flipped on both axes (camera mounted upside down)
    pub fn rotate_180(&self) -> Frame {
        let bpp = self.format.bytes_per_pixel();
        let data = self
            .data
            .chunks_exact(bpp)
            .rev()
            .flatten()
            .copied()
            .collect();
        Frame {
            width: self.width,
            height: self.height,
            format: self.format,
            sequence: self.sequence,
            captured_at: self.captured_at,
            data,
        }
    }
}
