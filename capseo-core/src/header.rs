//! Wire headers: the stream header and the per-frame record header.
//!
//! Both are encoded field by field in big-endian order.
//!
//! **Stream header** (28 bytes):
//! ```text
//! magic:          [u8; 4]  "CPS" + revision
//! width:          u32      encoded (post-scale) width
//! height:         u32      encoded (post-scale) height
//! scale:          u32      halvings applied before encoding
//! fps:            u32      nominal rate hint
//! video_format:   u32      payload format tag
//! cursor_format:  u32      cursor format tag, 0 if none
//! ```
//!
//! **Frame header** (24 bytes):
//! ```text
//! frame_id:       u64
//! video_length:   i32
//! cursor_length:  i32      0 = cursor unchanged
//! cursor_x:       i16
//! cursor_y:       i16
//! cursor_width:   i16
//! cursor_height:  i16
//! ```

use bytes::{Buf, BufMut};

use crate::error::{CapseoError, Result};
use crate::types::EncodedFormat;

pub const MAGIC: [u8; 3] = *b"CPS";

/// Plain records.
pub const REVISION_PLAIN: u8 = 0x01;
/// Every record is followed by a 4-byte checksum.
pub const REVISION_CHECKSUMMED: u8 = 0x02;

/// Largest accepted encoded edge, in pixels.
pub const MAX_DIMENSION: u32 = 16_384;
/// Largest accepted scale exponent.
pub const MAX_SCALE: u32 = 8;

// ── StreamHeader ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    pub revision: u8,
    pub width: u32,
    pub height: u32,
    pub scale: u32,
    pub fps: u32,
    pub video_format: u32,
    /// `0` when the stream never carries a cursor.
    pub cursor_format: u32,
}

impl StreamHeader {
    pub const SIZE: usize = 28;

    /// `true` when records carry a trailing checksum.
    pub fn has_checksums(&self) -> bool {
        self.revision == REVISION_CHECKSUMMED
    }

    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_slice(&MAGIC);
        dst.put_u8(self.revision);
        dst.put_u32(self.width);
        dst.put_u32(self.height);
        dst.put_u32(self.scale);
        dst.put_u32(self.fps);
        dst.put_u32(self.video_format);
        dst.put_u32(self.cursor_format);
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        self.encode(&mut &mut out[..]);
        out
    }

    /// Parse and validate a header.
    ///
    /// Magic is checked before the revision, and both before any field is
    /// trusted. Dimensions and format tags are validated so callers may
    /// size buffers from the result.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::SIZE {
            return Err(CapseoError::InvalidLength {
                what: "stream header",
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        }
        if bytes[..3] != MAGIC {
            return Err(CapseoError::InvalidMagic);
        }
        let revision = bytes[3];
        if revision != REVISION_PLAIN && revision != REVISION_CHECKSUMMED {
            return Err(CapseoError::UnsupportedRevision(revision));
        }

        let mut src = &bytes[4..];
        let header = Self {
            revision,
            width: src.get_u32(),
            height: src.get_u32(),
            scale: src.get_u32(),
            fps: src.get_u32(),
            video_format: src.get_u32(),
            cursor_format: src.get_u32(),
        };
        header.validate()?;
        Ok(header)
    }

    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CapseoError::invalid("stream header has zero dimensions"));
        }
        if self.width > MAX_DIMENSION || self.height > MAX_DIMENSION {
            return Err(CapseoError::invalid(format!(
                "stream dimensions {}x{} exceed {MAX_DIMENSION}",
                self.width, self.height
            )));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(CapseoError::invalid(format!(
                "stream dimensions {}x{} are not even",
                self.width, self.height
            )));
        }
        if self.scale > MAX_SCALE {
            return Err(CapseoError::invalid(format!(
                "stream scale {} exceeds {MAX_SCALE}",
                self.scale
            )));
        }

        let video = EncodedFormat::try_from(self.video_format)?;
        if !video.is_video() {
            return Err(CapseoError::invalid(format!(
                "{video:?} is not a video format"
            )));
        }
        if self.cursor_format != 0 {
            let cursor = EncodedFormat::try_from(self.cursor_format)?;
            if cursor.is_video() {
                return Err(CapseoError::invalid(format!(
                    "{cursor:?} is not a cursor format"
                )));
            }
        }
        Ok(())
    }

    pub fn video(&self) -> Result<EncodedFormat> {
        EncodedFormat::try_from(self.video_format)
    }

    pub fn cursor(&self) -> Result<Option<EncodedFormat>> {
        match self.cursor_format {
            0 => Ok(None),
            tag => EncodedFormat::try_from(tag).map(Some),
        }
    }
}

// ── FrameHeader ──────────────────────────────────────────────────

/// Cursor fields of a frame header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorHeader {
    pub length: i32,
    pub x: i16,
    pub y: i16,
    pub width: i16,
    pub height: i16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameHeader {
    pub frame_id: u64,
    pub video_length: i32,
    pub cursor: CursorHeader,
}

impl FrameHeader {
    pub const SIZE: usize = 24;

    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u64(self.frame_id);
        dst.put_i32(self.video_length);
        dst.put_i32(self.cursor.length);
        dst.put_i16(self.cursor.x);
        dst.put_i16(self.cursor.y);
        dst.put_i16(self.cursor.width);
        dst.put_i16(self.cursor.height);
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        self.encode(&mut &mut out[..]);
        out
    }

    /// Parse the header at the start of `record` and check that the
    /// payload lengths it announces fit inside the record.
    pub fn decode(record: &[u8]) -> Result<Self> {
        if record.len() < Self::SIZE {
            return Err(CapseoError::InvalidLength {
                what: "frame header",
                expected: Self::SIZE,
                actual: record.len(),
            });
        }

        let mut src = &record[..Self::SIZE];
        let header = Self {
            frame_id: src.get_u64(),
            video_length: src.get_i32(),
            cursor: CursorHeader {
                length: src.get_i32(),
                x: src.get_i16(),
                y: src.get_i16(),
                width: src.get_i16(),
                height: src.get_i16(),
            },
        };

        if header.video_length < 0 || header.cursor.length < 0 {
            return Err(CapseoError::invalid("negative payload length in frame header"));
        }
        let announced = Self::SIZE + header.video_length as usize + header.cursor.length as usize;
        if announced > record.len() {
            return Err(CapseoError::InvalidLength {
                what: "frame record",
                expected: announced,
                actual: record.len(),
            });
        }
        Ok(header)
    }

    /// Total record length the header describes.
    pub fn record_len(&self) -> usize {
        Self::SIZE + self.video_length.max(0) as usize + self.cursor.length.max(0) as usize
    }
}
