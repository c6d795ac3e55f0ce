//! Raw video frames as produced by the capture pipeline.

use bytes::Bytes;

use hf_core::{Error, Resolution};

/// Bytes per pixel of the packed BGR24 layout.
pub const BGR24_BYTES_PER_PIXEL: usize = 3;

/// One packed BGR24 frame.
#[derive(Debug, Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Bytes,
}

impl Frame {
    /// Wrap a BGR24 buffer, checking that its length matches the geometry.
    pub fn new(width: u32, height: u32, data: Bytes) -> hf_core::Result<Self> {
        let expected = Self::byte_len(width, height);
        if width == 0 || height == 0 {
            return Err(Error::Validation(format!("frame has zero side: {width}x{height}")));
        }
        if data.len() != expected {
            return Err(Error::Validation(format!(
                "frame {width}x{height} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Buffer size of one BGR24 frame with the given geometry.
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * BGR24_BYTES_PER_PIXEL
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}
