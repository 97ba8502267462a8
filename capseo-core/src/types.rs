//! Shared types for the encode/decode pipeline.
//!
//! Formats carry the numeric tags written into stream headers, so the
//! conversions to and from `u32` are part of the wire contract.

use serde::{Deserialize, Serialize};

use crate::error::CapseoError;

// ── Mode ─────────────────────────────────────────────────────────

/// What a codec handle is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Encode,
    Decode,
}

// ── PixelFormat ──────────────────────────────────────────────────

/// Layout of raw (unencoded) frames and cursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Rgba,
    /// 4 bytes per pixel: Blue, Green, Red, Alpha. The usual capture layout.
    Bgra,
    /// `0xAARRGGBB` little-endian words, as cursor images are delivered.
    Argb,
    Abgr,
    /// Planar `[Y][U][V]`, chroma subsampled 2×2.
    Yuv420,
}

impl PixelFormat {
    pub const fn tag(self) -> u32 {
        match self {
            PixelFormat::Rgba => 0x1201,
            PixelFormat::Bgra => 0x1202,
            PixelFormat::Argb => 0x1203,
            PixelFormat::Abgr => 0x1204,
            PixelFormat::Yuv420 => 0x1210,
        }
    }

    /// Size in bytes of a `width × height` image in this format.
    pub const fn frame_len(self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            PixelFormat::Yuv420 => pixels * 3 / 2,
            _ => pixels * 4,
        }
    }
}

impl TryFrom<u32> for PixelFormat {
    type Error = CapseoError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0x1201 => Ok(PixelFormat::Rgba),
            0x1202 => Ok(PixelFormat::Bgra),
            0x1203 => Ok(PixelFormat::Argb),
            0x1204 => Ok(PixelFormat::Abgr),
            0x1210 => Ok(PixelFormat::Yuv420),
            _ => Err(CapseoError::UnknownVariant {
                type_name: "pixel format",
                value: value as u64,
            }),
        }
    }
}

// ── EncodedFormat ────────────────────────────────────────────────

/// Payload format tags stored in the stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodedFormat {
    QuickLzYuv420,
    HuffYuv,
    Mjpeg,
    ZstdYuv420,
    RawArgb,
    QuickLzArgb,
    ZstdArgb,
}

impl EncodedFormat {
    pub const fn tag(self) -> u32 {
        match self {
            EncodedFormat::QuickLzYuv420 => 0x1301,
            EncodedFormat::HuffYuv => 0x1302,
            EncodedFormat::Mjpeg => 0x1303,
            EncodedFormat::ZstdYuv420 => 0x1304,
            EncodedFormat::RawArgb => 0x1350,
            EncodedFormat::QuickLzArgb => 0x1351,
            EncodedFormat::ZstdArgb => 0x1352,
        }
    }

    /// `true` for tags describing video payloads.
    pub const fn is_video(self) -> bool {
        matches!(
            self,
            EncodedFormat::QuickLzYuv420
                | EncodedFormat::HuffYuv
                | EncodedFormat::Mjpeg
                | EncodedFormat::ZstdYuv420
        )
    }
}

impl TryFrom<u32> for EncodedFormat {
    type Error = CapseoError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0x1301 => Ok(EncodedFormat::QuickLzYuv420),
            0x1302 => Ok(EncodedFormat::HuffYuv),
            0x1303 => Ok(EncodedFormat::Mjpeg),
            0x1304 => Ok(EncodedFormat::ZstdYuv420),
            0x1350 => Ok(EncodedFormat::RawArgb),
            0x1351 => Ok(EncodedFormat::QuickLzArgb),
            0x1352 => Ok(EncodedFormat::ZstdArgb),
            _ => Err(CapseoError::UnknownVariant {
                type_name: "encoded format",
                value: value as u64,
            }),
        }
    }
}

// ── Cursor ───────────────────────────────────────────────────────

/// A cursor overlay: position on the unscaled screen plus its bitmap.
///
/// `pixels` holds `width * height` little-endian `0xAARRGGBB` words
/// (bytes B, G, R, A). An empty buffer means "no cursor".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Cursor {
    pub fn new(x: i32, y: i32, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            x,
            y,
            width,
            height,
            pixels,
        }
    }

    /// Bytes the bitmap must occupy.
    pub fn byte_len(&self) -> usize {
        PixelFormat::Argb.frame_len(self.width, self.height)
    }
}

// ── Frame ────────────────────────────────────────────────────────

/// A decoded frame: time-based ID plus a planar YUV 4:2:0 buffer.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    /// Microseconds since the encoder's base instant.
    pub id: u64,
    pub width: u32,
    pub height: u32,
    /// `[Y][U][V]`, `width * height * 3 / 2` bytes.
    pub data: Vec<u8>,
}

impl Frame {
    /// A zeroed frame of the given dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            id: 0,
            width,
            height,
            data: vec![0; PixelFormat::Yuv420.frame_len(width, height)],
        }
    }

    pub fn y_plane(&self) -> &[u8] {
        &self.data[..self.luma_len()]
    }

    pub fn u_plane(&self) -> &[u8] {
        let start = self.luma_len();
        &self.data[start..start + self.luma_len() / 4]
    }

    pub fn v_plane(&self) -> &[u8] {
        let start = self.luma_len() + self.luma_len() / 4;
        &self.data[start..start + self.luma_len() / 4]
    }

    fn luma_len(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_format_tags_roundtrip() {
        for fmt in [
            PixelFormat::Rgba,
            PixelFormat::Bgra,
            PixelFormat::Argb,
            PixelFormat::Abgr,
            PixelFormat::Yuv420,
        ] {
            assert_eq!(PixelFormat::try_from(fmt.tag()).unwrap(), fmt);
        }
        assert!(PixelFormat::try_from(0xdead).is_err());
    }

    #[test]
    fn encoded_format_classification() {
        assert!(EncodedFormat::QuickLzYuv420.is_video());
        assert!(!EncodedFormat::QuickLzArgb.is_video());
        assert_eq!(
            EncodedFormat::try_from(0x1351).unwrap(),
            EncodedFormat::QuickLzArgb
        );
    }

    #[test]
    fn frame_planes() {
        let mut frame = Frame::new(4, 2);
        assert_eq!(frame.data.len(), 12);
        frame.data[8] = 1;
        frame.data[10] = 2;
        assert_eq!(frame.y_plane().len(), 8);
        assert_eq!(frame.u_plane(), &[1, 0]);
        assert_eq!(frame.v_plane(), &[2, 0]);
    }
}
