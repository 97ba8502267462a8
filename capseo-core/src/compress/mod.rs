//! Byte compressors behind a common two-call contract.
//!
//! | Backend    | Format tags (video / cursor) | Notes                          |
//! |------------|------------------------------|--------------------------------|
//! | `QuickLz`  | `0x1301` / `0x1351`          | native control-word LZ format  |
//! | `Zstd`     | `0x1304` / `0x1352`          | drop-in alternative via `zstd` |
//! | `Stored`   | n/a / `0x1350`               | uncompressed cursor bitmaps    |
//!
//! None of the backends know anything about pixels. Decompression is told
//! the exact output size up front; the formats carry no length of their own.

pub mod quicklz;

use serde::{Deserialize, Serialize};

use crate::error::{CapseoError, Result};
use crate::types::EncodedFormat;

pub use quicklz::QuickLzEncoder;

/// Bytes reserved past `width * height * 4` in the encode scratch buffer.
pub const COMPRESSOR_TAIL_MARGIN: usize = 36_000;

/// zstd level used when a stream's header only tells us "zstd".
pub const DEFAULT_ZSTD_LEVEL: i32 = 1;

// ── Compressor ───────────────────────────────────────────────────

/// A byte compressor.
pub trait Compressor: Send {
    /// Compress `src`, appending to `dst`. Returns the bytes appended.
    fn compress(&mut self, src: &[u8], dst: &mut Vec<u8>) -> Result<usize>;

    /// Decompress `src` into `dst`, which is sized to the expected output.
    /// Returns the number of bytes produced.
    fn decompress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize>;
}

/// The native control-word codec.
#[derive(Default)]
pub struct QuickLz {
    encoder: QuickLzEncoder,
}

impl Compressor for QuickLz {
    fn compress(&mut self, src: &[u8], dst: &mut Vec<u8>) -> Result<usize> {
        Ok(self.encoder.compress_into(src, dst))
    }

    fn decompress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        quicklz::decompress_into(src, dst)?;
        Ok(dst.len())
    }
}

/// zstd at a fixed level.
pub struct Zstd {
    level: i32,
}

impl Zstd {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Compressor for Zstd {
    fn compress(&mut self, src: &[u8], dst: &mut Vec<u8>) -> Result<usize> {
        let compressed = zstd::encode_all(src, self.level)
            .map_err(|e| CapseoError::Internal(format!("zstd encode failed: {e}")))?;
        dst.extend_from_slice(&compressed);
        Ok(compressed.len())
    }

    /// Never writes or allocates past `dst`; a payload that inflates
    /// beyond it is corrupt.
    fn decompress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        zstd::bulk::decompress_to_buffer(src, dst)
            .map_err(|_| CapseoError::Corrupt("zstd payload does not fit the frame"))
    }
}

/// Pass-through, for payloads stored uncompressed.
pub struct Stored;

impl Compressor for Stored {
    fn compress(&mut self, src: &[u8], dst: &mut Vec<u8>) -> Result<usize> {
        dst.extend_from_slice(src);
        Ok(src.len())
    }

    fn decompress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let produced = src.len().min(dst.len());
        dst[..produced].copy_from_slice(&src[..produced]);
        Ok(src.len())
    }
}

// ── Compression (backend selector) ───────────────────────────────

/// Which backend an encoder uses. Persisted in the stream header as the
/// pair of format tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Quick,
    Zstd {
        level: i32,
    },
}

impl Compression {
    pub fn video_format(self) -> EncodedFormat {
        match self {
            Compression::Quick => EncodedFormat::QuickLzYuv420,
            Compression::Zstd { .. } => EncodedFormat::ZstdYuv420,
        }
    }

    pub fn cursor_format(self) -> EncodedFormat {
        match self {
            Compression::Quick => EncodedFormat::QuickLzArgb,
            Compression::Zstd { .. } => EncodedFormat::ZstdArgb,
        }
    }

    /// Backend for a video format tag read from a stream header.
    pub fn for_video(format: EncodedFormat) -> Result<Self> {
        match format {
            EncodedFormat::QuickLzYuv420 => Ok(Compression::Quick),
            EncodedFormat::ZstdYuv420 => Ok(Compression::Zstd {
                level: DEFAULT_ZSTD_LEVEL,
            }),
            EncodedFormat::HuffYuv | EncodedFormat::Mjpeg => Err(CapseoError::NotImplemented(
                "video payload format is not supported by this decoder",
            )),
            other => Err(CapseoError::invalid(format!(
                "{other:?} is not a video format"
            ))),
        }
    }

    pub fn compressor(self) -> Box<dyn Compressor> {
        match self {
            Compression::Quick => Box::new(QuickLz::default()),
            Compression::Zstd { level } => Box::new(Zstd::new(level)),
        }
    }
}

/// Decompressor for a cursor format tag read from a stream header.
pub fn cursor_decompressor(format: EncodedFormat) -> Result<Box<dyn Compressor>> {
    match format {
        EncodedFormat::QuickLzArgb => Ok(Box::new(QuickLz::default())),
        EncodedFormat::ZstdArgb => Ok(Box::new(Zstd::new(DEFAULT_ZSTD_LEVEL))),
        EncodedFormat::RawArgb => Ok(Box::new(Stored)),
        other => Err(CapseoError::invalid(format!(
            "{other:?} is not a cursor format"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        let mut data = Vec::new();
        for row in 0..64u32 {
            data.extend(std::iter::repeat_n((row * 3) as u8, 200));
            data.extend_from_slice(&row.to_le_bytes());
        }
        data
    }

    #[test]
    fn every_backend_roundtrips() {
        let data = sample();
        let backends: Vec<Box<dyn Compressor>> = vec![
            Compression::Quick.compressor(),
            Compression::Zstd { level: 3 }.compressor(),
            Box::new(Stored),
        ];
        for mut backend in backends {
            let mut packed = Vec::new();
            let written = backend.compress(&data, &mut packed).unwrap();
            assert_eq!(written, packed.len());

            let mut out = vec![0u8; data.len()];
            let produced = backend.decompress(&packed, &mut out).unwrap();
            assert_eq!(produced, data.len());
            assert_eq!(out, data);
        }
    }

    #[test]
    fn compress_appends() {
        let mut backend = QuickLz::default();
        let mut dst = vec![1, 2, 3];
        let written = backend.compress(b"hello world", &mut dst).unwrap();
        assert_eq!(dst.len(), 3 + written);
        assert_eq!(&dst[..3], &[1, 2, 3]);
    }

    #[test]
    fn zstd_reports_short_output() {
        let mut backend = Zstd::new(1);
        let mut packed = Vec::new();
        backend.compress(&[7u8; 40], &mut packed).unwrap();
        let mut big = vec![0u8; 100];
        assert_eq!(backend.decompress(&packed, &mut big).unwrap(), 40);
        assert!(big[..40].iter().all(|&b| b == 7));
    }

    #[test]
    fn zstd_bomb_is_rejected_not_inflated() {
        let mut backend = Zstd::new(1);
        let mut packed = Vec::new();
        backend.compress(&vec![0u8; 16 << 20], &mut packed).unwrap();
        assert!(packed.len() < 64 * 1024);

        // An 8x8 YUV frame is 96 bytes; the payload inflates to 16 MiB.
        let mut frame = vec![0u8; 96];
        let err = backend.decompress(&packed, &mut frame).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InternalInconsistency);
    }

    #[test]
    fn format_tags_select_backends() {
        assert_eq!(
            Compression::for_video(EncodedFormat::QuickLzYuv420).unwrap(),
            Compression::Quick
        );
        assert!(matches!(
            Compression::for_video(EncodedFormat::ZstdYuv420).unwrap(),
            Compression::Zstd { .. }
        ));
        let err = Compression::for_video(EncodedFormat::Mjpeg).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotImplemented);
        assert!(Compression::for_video(EncodedFormat::QuickLzArgb).is_err());
        assert!(cursor_decompressor(EncodedFormat::RawArgb).is_ok());
        assert!(cursor_decompressor(EncodedFormat::HuffYuv).is_err());
    }

    #[test]
    fn tags_follow_backend() {
        assert_eq!(Compression::Quick.video_format().tag(), 0x1301);
        assert_eq!(Compression::Quick.cursor_format().tag(), 0x1351);
        assert_eq!(Compression::Zstd { level: 5 }.video_format().tag(), 0x1304);
    }
}
