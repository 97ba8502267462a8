//! Stream container: a stream header followed by length-prefixed frame
//! records, over any blocking `Write`/`Read`.
//!
//! The reader keeps two decoded frames and alternates between them, so the
//! frame before the current one stays available without a copy. Records
//! decode into a spare buffer first; a failed decode leaves both intact.

use std::io::{self, Read, Write};

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;
use zeroize::Zeroize;

use crate::codec::RecordCodec;
use crate::config::CodecConfig;
use crate::error::{CapseoError, Result};
use crate::frame::CodecHandle;
use crate::header::{REVISION_CHECKSUMMED, StreamHeader};
use crate::types::{Cursor, Frame, Mode};

/// Bytes requested from the reader per refill.
const READ_CHUNK: usize = 64 * 1024;

/// Options for newly created streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamOptions {
    /// Append a checksum to every record (revision 2).
    pub checksum: bool,
}

// ── StreamWriter ─────────────────────────────────────────────────

pub struct StreamWriter<W: Write> {
    writer: W,
    codec: CodecHandle,
    framing: RecordCodec,
    header: StreamHeader,
    out: BytesMut,
    /// Raw frame buffer handed out by `frame_buffer_mut`.
    scratch: Vec<u8>,
    processed: u64,
}

impl<W: Write> StreamWriter<W> {
    /// Start an encoding session and write the stream header.
    pub fn create(mut writer: W, config: CodecConfig, options: StreamOptions) -> Result<Self> {
        if config.mode != Mode::Encode {
            return Err(CapseoError::invalid("stream writers need an encode config"));
        }
        let codec = CodecHandle::initialize(config)?;

        let mut header = codec.stream_header();
        if options.checksum {
            header.revision = REVISION_CHECKSUMMED;
        }
        writer.write_all(&header.to_bytes())?;
        debug!(
            width = header.width,
            height = header.height,
            scale = header.scale,
            revision = header.revision,
            "stream created"
        );

        Ok(Self {
            writer,
            framing: RecordCodec::for_header(&header),
            header,
            out: BytesMut::new(),
            scratch: vec![0; config.format.frame_len(config.width, config.height)],
            codec,
            processed: 0,
        })
    }

    pub fn header(&self) -> &StreamHeader {
        &self.header
    }

    pub fn processed_frames(&self) -> u64 {
        self.processed
    }

    pub fn create_frame_id(&mut self) -> u64 {
        self.codec.create_frame_id()
    }

    /// Encode `raw` and append the record. `raw` may be modified in place.
    pub fn encode_frame(
        &mut self,
        raw: &mut [u8],
        frame_id: u64,
        cursor: Option<&Cursor>,
    ) -> Result<()> {
        let record = self.codec.encode_frame(raw, frame_id, cursor)?;
        Self::write_record(&mut self.framing, &mut self.out, &mut self.writer, record)?;
        self.processed += 1;
        Ok(())
    }

    /// The stream's own raw frame buffer, sized for the configured input.
    ///
    /// Its contents are scaled in place by each encode, so it must be
    /// refilled before every [`encode_buffered_frame`](Self::encode_buffered_frame).
    pub fn frame_buffer_mut(&mut self) -> &mut [u8] {
        &mut self.scratch
    }

    /// Encode whatever was written into [`frame_buffer_mut`](Self::frame_buffer_mut).
    pub fn encode_buffered_frame(&mut self, frame_id: u64, cursor: Option<&Cursor>) -> Result<()> {
        let record = self.codec.encode_frame(&mut self.scratch, frame_id, cursor)?;
        Self::write_record(&mut self.framing, &mut self.out, &mut self.writer, record)?;
        self.processed += 1;
        Ok(())
    }

    fn write_record(
        framing: &mut RecordCodec,
        out: &mut BytesMut,
        writer: &mut W,
        record: &[u8],
    ) -> Result<()> {
        out.clear();
        framing.encode(record, out)?;
        writer.write_all(&out[..])?;
        Ok(())
    }

    /// Flush, release the codec, and hand back the sink.
    pub fn finish(self) -> Result<W> {
        let Self {
            mut writer,
            codec,
            mut scratch,
            processed,
            ..
        } = self;
        writer.flush()?;
        scratch.zeroize();
        codec.finalize();
        debug!(frames = processed, "stream finished");
        Ok(writer)
    }
}

// ── StreamReader ─────────────────────────────────────────────────

pub struct StreamReader<R: Read> {
    reader: R,
    codec: CodecHandle,
    framing: RecordCodec,
    header: StreamHeader,
    buf: BytesMut,
    frames: [Frame; 2],
    pending: Frame,
    processed: u64,
}

impl<R: Read> StreamReader<R> {
    /// Read and validate the stream header, then set up a decoder for it.
    pub fn open(mut reader: R, config: CodecConfig) -> Result<Self> {
        if config.mode != Mode::Decode {
            return Err(CapseoError::invalid("stream readers need a decode config"));
        }
        let mut codec = CodecHandle::initialize(config)?;

        let mut raw = [0u8; StreamHeader::SIZE];
        reader.read_exact(&mut raw)?;
        let header = StreamHeader::decode(&raw)?;
        codec.apply_stream_header(&header)?;
        debug!(revision = header.revision, "stream opened");

        Ok(Self {
            reader,
            codec,
            framing: RecordCodec::for_header(&header),
            header,
            buf: BytesMut::with_capacity(READ_CHUNK),
            frames: [
                Frame::new(header.width, header.height),
                Frame::new(header.width, header.height),
            ],
            pending: Frame::new(header.width, header.height),
            processed: 0,
        })
    }

    pub fn header(&self) -> &StreamHeader {
        &self.header
    }

    pub fn processed_frames(&self) -> u64 {
        self.processed
    }

    /// Decode the next frame.
    ///
    /// Returns [`CapseoError::StreamEnd`] when input ends exactly between
    /// records; input ending inside a record is an I/O error.
    pub fn decode_frame(&mut self, want_cursor: bool) -> Result<&Frame> {
        let record = self.next_record()?;
        self.codec
            .decode_frame(&record, want_cursor, &mut self.pending)?;
        let slot = (self.processed % 2) as usize;
        std::mem::swap(&mut self.frames[slot], &mut self.pending);
        self.processed += 1;
        Ok(&self.frames[slot])
    }

    /// The frame decoded before the most recent one, if any.
    pub fn previous_frame(&self) -> Option<&Frame> {
        (self.processed >= 2).then(|| &self.frames[(self.processed % 2) as usize])
    }

    /// Next raw frame record, without decoding it.
    pub fn next_record(&mut self) -> Result<bytes::Bytes> {
        loop {
            if let Some(record) = self.framing.decode(&mut self.buf)? {
                return Ok(record);
            }
            if self.fill()? == 0 {
                if self.buf.is_empty() {
                    return Err(CapseoError::StreamEnd);
                }
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("stream ended {} bytes into a record", self.buf.len()),
                )
                .into());
            }
        }
    }

    fn fill(&mut self) -> Result<usize> {
        let start = self.buf.len();
        self.buf.resize(start + READ_CHUNK, 0);
        let read = loop {
            match self.reader.read(&mut self.buf[start..]) {
                Ok(n) => break Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => break Err(e),
            }
        };
        let n = match read {
            Ok(n) => n,
            Err(e) => {
                self.buf.truncate(start);
                return Err(e.into());
            }
        };
        self.buf.truncate(start + n);
        Ok(n)
    }

    /// End the session and hand back the source.
    pub fn into_inner(self) -> R {
        let Self {
            reader,
            codec,
            mut frames,
            mut pending,
            ..
        } = self;
        for frame in frames.iter_mut().chain([&mut pending]) {
            frame.data.zeroize();
        }
        codec.finalize();
        reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_stream(frames: u8, options: StreamOptions) -> Vec<u8> {
        let mut writer =
            StreamWriter::create(Vec::new(), CodecConfig::encoder(8, 8), options).unwrap();
        for i in 0..frames {
            let id = writer.create_frame_id();
            writer.frame_buffer_mut().fill(i * 20);
            writer.encode_buffered_frame(id, None).unwrap();
        }
        assert_eq!(writer.processed_frames(), frames as u64);
        writer.finish().unwrap()
    }

    #[test]
    fn frames_alternate_between_slots() {
        let bytes = write_stream(3, StreamOptions::default());
        let mut reader = StreamReader::open(&bytes[..], CodecConfig::decoder()).unwrap();
        assert!(reader.previous_frame().is_none());

        let first = reader.decode_frame(false).unwrap().clone();
        assert!(reader.previous_frame().is_none());
        let second = reader.decode_frame(false).unwrap().clone();
        assert_eq!(reader.previous_frame().unwrap().id, first.id);
        reader.decode_frame(false).unwrap();
        assert_eq!(reader.previous_frame().unwrap().id, second.id);
        assert!(second.id > first.id);

        assert!(reader.decode_frame(false).unwrap_err().is_stream_end());
        assert_eq!(reader.processed_frames(), 3);
    }

    #[test]
    fn failed_decode_keeps_previous_frames() {
        let mut writer =
            StreamWriter::create(Vec::new(), CodecConfig::encoder(8, 8), StreamOptions::default())
                .unwrap();
        for fill in [0, 0] {
            let id = writer.create_frame_id();
            writer.frame_buffer_mut().fill(fill);
            writer.encode_buffered_frame(id, None).unwrap();
        }
        let id = writer.create_frame_id();
        writer.frame_buffer_mut().fill(255);
        let cursor = Cursor::new(1, 1, 2, 2, vec![255; 16]);
        writer.encode_buffered_frame(id, Some(&cursor)).unwrap();
        let mut bytes = writer.finish().unwrap();

        // Walk the length prefixes to the third record and zero its cursor width.
        let mut off = StreamHeader::SIZE;
        for _ in 0..2 {
            let len = u32::from_be_bytes(bytes[off..off + 4].try_into().unwrap()) as usize;
            off += 4 + len;
        }
        bytes[off + 4 + 20..off + 4 + 22].copy_from_slice(&0i16.to_be_bytes());

        let mut reader = StreamReader::open(&bytes[..], CodecConfig::decoder()).unwrap();
        let first = reader.decode_frame(true).unwrap().clone();
        let second = reader.decode_frame(true).unwrap().clone();
        assert!(reader.decode_frame(true).is_err());

        assert_eq!(reader.processed_frames(), 2);
        let previous = reader.previous_frame().unwrap();
        assert_eq!(previous.id, first.id);
        assert_eq!(previous.data, first.data);
        assert_ne!(previous.id, second.id);
    }

    #[test]
    fn truncated_record_is_io_error() {
        let bytes = write_stream(1, StreamOptions::default());
        let cut = &bytes[..bytes.len() - 3];
        let mut reader = StreamReader::open(cut, CodecConfig::decoder()).unwrap();
        let err = reader.decode_frame(false).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::SystemIo);
    }

    #[test]
    fn checksummed_stream_uses_revision_two() {
        let bytes = write_stream(2, StreamOptions { checksum: true });
        assert_eq!(bytes[3], REVISION_CHECKSUMMED);
        let mut reader = StreamReader::open(&bytes[..], CodecConfig::decoder()).unwrap();
        assert!(reader.header().has_checksums());
        reader.decode_frame(false).unwrap();
        reader.decode_frame(false).unwrap();
        assert!(reader.decode_frame(false).unwrap_err().is_stream_end());
    }

    #[test]
    fn mode_mismatch_is_rejected() {
        assert!(
            StreamWriter::create(Vec::new(), CodecConfig::decoder(), StreamOptions::default())
                .is_err()
        );
        let bytes = write_stream(0, StreamOptions::default());
        assert!(StreamReader::open(&bytes[..], CodecConfig::encoder(8, 8)).is_err());
    }

    #[test]
    fn short_header_is_io_error() {
        let bytes = write_stream(0, StreamOptions::default());
        let err = StreamReader::open(&bytes[..10], CodecConfig::decoder())
            .err()
            .unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::SystemIo);
    }
}
