//! Per-session codec parameters.

use serde::{Deserialize, Serialize};

use crate::compress::Compression;
use crate::error::{CapseoError, Result};
use crate::header::{MAX_DIMENSION, MAX_SCALE};
use crate::types::{Mode, PixelFormat};

/// Parameters a [`CodecHandle`](crate::CodecHandle) is initialized with.
///
/// For encoding, `width`/`height` describe the raw capture and must be
/// divisible by `2^(scale + 1)` so every halving and the 4:2:0 chroma
/// step land on whole pixels. For decoding they must be `0`; the stream
/// header supplies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub mode: Mode,
    pub width: u32,
    pub height: u32,
    /// Raw input layout when encoding, requested output when decoding.
    pub format: PixelFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor_format: Option<PixelFormat>,
    /// Nominal frame rate, stored in the header as a hint.
    pub fps: u32,
    /// Number of 2× halvings applied before encoding.
    pub scale: u32,
    pub compression: Compression,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self::encoder(400, 400)
    }
}

impl CodecConfig {
    /// BGRA capture at `width × height`, 25 fps, cursor enabled.
    pub fn encoder(width: u32, height: u32) -> Self {
        Self {
            mode: Mode::Encode,
            width,
            height,
            format: PixelFormat::Bgra,
            cursor_format: Some(PixelFormat::Argb),
            fps: 25,
            scale: 0,
            compression: Compression::default(),
        }
    }

    /// YUV 4:2:0 output, dimensions taken from the stream.
    pub fn decoder() -> Self {
        Self {
            mode: Mode::Decode,
            width: 0,
            height: 0,
            format: PixelFormat::Yuv420,
            cursor_format: Some(PixelFormat::Argb),
            fps: 0,
            scale: 0,
            compression: Compression::default(),
        }
    }

    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Dimensions of the encoded frames.
    pub fn encoded_size(&self) -> (u32, u32) {
        (self.width >> self.scale, self.height >> self.scale)
    }

    pub fn validate(&self) -> Result<()> {
        match self.mode {
            Mode::Encode => {
                if self.scale > MAX_SCALE {
                    return Err(CapseoError::invalid(format!(
                        "scale {} exceeds {MAX_SCALE}",
                        self.scale
                    )));
                }
                let step = 1u32 << (self.scale + 1);
                if self.width == 0
                    || self.height == 0
                    || self.width % step != 0
                    || self.height % step != 0
                {
                    return Err(CapseoError::invalid(format!(
                        "{}x{} is not divisible by {step} at scale {}",
                        self.width, self.height, self.scale
                    )));
                }
                let (w, h) = self.encoded_size();
                if w > MAX_DIMENSION || h > MAX_DIMENSION {
                    return Err(CapseoError::invalid(format!(
                        "encoded size {w}x{h} exceeds {MAX_DIMENSION}"
                    )));
                }
            }
            Mode::Decode => {
                if self.width != 0 || self.height != 0 {
                    return Err(CapseoError::invalid(
                        "decode dimensions come from the stream header and must be 0",
                    ));
                }
            }
        }
        Ok(())
    }
}
