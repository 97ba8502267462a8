//! Length-prefixed record envelope as a `tokio_util` codec.
//!
//! ```text
//! u32  record length (big-endian)
//! u8[] frame record
//! u32  checksum        (revision 2 streams only)
//! ```
//!
//! [`StreamReader`](crate::StreamReader) drives the decoder synchronously;
//! async callers can wrap any transport in `FramedRead`/`FramedWrite`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::compress::COMPRESSOR_TAIL_MARGIN;
use crate::compress::quicklz::max_compressed_len;
use crate::cursor::MAX_CURSOR_EDGE;
use crate::error::{CapseoError, Result};
use crate::header::{FrameHeader, StreamHeader};
use crate::types::PixelFormat;

pub const LENGTH_PREFIX_SIZE: usize = 4;
pub const CHECKSUM_SIZE: usize = 4;

/// First four bytes of the record's blake3 digest, big-endian.
pub fn record_checksum(record: &[u8]) -> u32 {
    let digest = blake3::hash(record);
    let bytes = digest.as_bytes();
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Upper bound on a record for `width × height` encoded frames carrying
/// a cursor of up to `MAX_CURSOR_EDGE` on each side.
///
/// Each payload is allowed its worst-case expansion plus the tail margin,
/// which also absorbs zstd's frame overhead.
pub fn max_record_len(width: u32, height: u32) -> usize {
    FrameHeader::SIZE
        + max_compressed_len(PixelFormat::Yuv420.frame_len(width, height))
        + max_compressed_len(PixelFormat::Argb.frame_len(MAX_CURSOR_EDGE, MAX_CURSOR_EDGE))
        + 2 * COMPRESSOR_TAIL_MARGIN
}

#[derive(Debug, Clone, Copy)]
pub struct RecordCodec {
    max_record_len: usize,
    checksum: bool,
}

impl RecordCodec {
    pub fn new(max_record_len: usize, checksum: bool) -> Self {
        Self {
            max_record_len,
            checksum,
        }
    }

    /// Codec matching a stream's dimensions and revision.
    pub fn for_header(header: &StreamHeader) -> Self {
        Self::new(
            max_record_len(header.width, header.height),
            header.has_checksums(),
        )
    }

    fn trailer_len(&self) -> usize {
        if self.checksum { CHECKSUM_SIZE } else { 0 }
    }
}

impl Decoder for RecordCodec {
    type Item = Bytes;
    type Error = CapseoError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if len < FrameHeader::SIZE || len > self.max_record_len {
            return Err(CapseoError::invalid(format!(
                "record length {len} outside {}..={}",
                FrameHeader::SIZE,
                self.max_record_len
            )));
        }

        let total = LENGTH_PREFIX_SIZE + len + self.trailer_len();
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_SIZE);
        let record = src.split_to(len).freeze();
        if self.checksum {
            let expected = src.get_u32();
            let actual = record_checksum(&record);
            if expected != actual {
                warn!(expected, actual, len, "record checksum mismatch");
                return Err(CapseoError::ChecksumMismatch);
            }
        }
        Ok(Some(record))
    }
}

impl Encoder<&[u8]> for RecordCodec {
    type Error = CapseoError;

    fn encode(&mut self, record: &[u8], dst: &mut BytesMut) -> Result<()> {
        if record.len() > self.max_record_len {
            return Err(CapseoError::invalid(format!(
                "record of {} bytes exceeds {}",
                record.len(),
                self.max_record_len
            )));
        }

        dst.reserve(LENGTH_PREFIX_SIZE + record.len() + self.trailer_len());
        dst.put_u32(record.len() as u32);
        dst.extend_from_slice(record);
        if self.checksum {
            dst.put_u32(record_checksum(record));
        }
        Ok(())
    }
}
