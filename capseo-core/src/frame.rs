//! Frame codec: raw capture + cursor → frame record, and back.
//!
//! A [`CodecHandle`] owns every scratch buffer a session needs, so the
//! per-frame calls never allocate on the encode side. Records are laid
//! out as a [`FrameHeader`] followed by the compressed video payload and,
//! when the cursor changed, the compressed cursor bitmap.

use std::time::Instant;

use tracing::{debug, trace};
use zeroize::Zeroize;

use crate::color;
use crate::compress::{self, COMPRESSOR_TAIL_MARGIN, Compression, Compressor};
use crate::config::CodecConfig;
use crate::cursor::{CursorCompositor, MAX_CURSOR_EDGE, ScaledCursor};
use crate::error::{CapseoError, Result};
use crate::header::{CursorHeader, FrameHeader, REVISION_PLAIN, StreamHeader};
use crate::types::{Cursor, EncodedFormat, Frame, Mode, PixelFormat};

pub struct CodecHandle {
    config: CodecConfig,
    /// Encoded (post-scale) dimensions. Zero on a decoder until the stream
    /// header has been applied.
    width: u32,
    height: u32,
    scale: u32,
    video_format: EncodedFormat,
    cursor_format: Option<EncodedFormat>,
    video: Box<dyn Compressor>,
    cursor: Option<Box<dyn Compressor>>,
    compositor: CursorCompositor,
    /// YUV 4:2:0 conversion output.
    yuv: Vec<u8>,
    /// Record assembly buffer.
    encoded: Vec<u8>,
    base: Instant,
    last_frame_id: Option<u64>,
    header_applied: bool,
}

impl CodecHandle {
    /// Validate `config` and allocate the session's buffers.
    ///
    /// A decoder only gets its buffers once
    /// [`apply_stream_header`](Self::apply_stream_header) tells it the
    /// stream's dimensions.
    pub fn initialize(config: CodecConfig) -> Result<Self> {
        config.validate()?;

        let compression = config.compression;
        let mut handle = Self {
            config,
            width: 0,
            height: 0,
            scale: config.scale,
            video_format: compression.video_format(),
            cursor_format: None,
            video: compression.compressor(),
            cursor: None,
            compositor: CursorCompositor::new(0, 0, 0),
            yuv: Vec::new(),
            encoded: Vec::new(),
            base: Instant::now(),
            last_frame_id: None,
            header_applied: false,
        };

        if config.mode == Mode::Encode {
            let (width, height) = config.encoded_size();
            handle.width = width;
            handle.height = height;
            if config.cursor_format.is_some() {
                handle.cursor_format = Some(compression.cursor_format());
                handle.cursor = Some(compression.compressor());
            }
            handle.yuv = vec![0; PixelFormat::Yuv420.frame_len(width, height)];
            handle.encoded = Vec::with_capacity(
                PixelFormat::Bgra.frame_len(config.width, config.height) + COMPRESSOR_TAIL_MARGIN,
            );
            debug!(
                width = config.width,
                height = config.height,
                scale = config.scale,
                ?compression,
                "encoder initialized"
            );
        }
        Ok(handle)
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Encoded frame dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// The cursor a reuse record would draw, already at frame scale.
    pub fn last_cursor(&self) -> Option<&ScaledCursor> {
        self.compositor.cached()
    }

    /// Header describing the streams this encoder produces.
    pub fn stream_header(&self) -> StreamHeader {
        StreamHeader {
            revision: REVISION_PLAIN,
            width: self.width,
            height: self.height,
            scale: self.scale,
            fps: self.config.fps,
            video_format: self.video_format.tag(),
            cursor_format: self.cursor_format.map_or(0, EncodedFormat::tag),
        }
    }

    /// Take dimensions, scale and payload formats from a stream header.
    pub fn apply_stream_header(&mut self, header: &StreamHeader) -> Result<()> {
        if self.config.mode != Mode::Decode {
            return Err(CapseoError::invalid(
                "stream headers can only be applied to a decoder",
            ));
        }

        let video_format = header.video()?;
        let cursor_format = header.cursor()?;
        self.video = Compression::for_video(video_format)?.compressor();
        self.cursor = cursor_format.map(compress::cursor_decompressor).transpose()?;
        self.video_format = video_format;
        self.cursor_format = cursor_format;

        self.width = header.width;
        self.height = header.height;
        self.scale = header.scale;
        self.compositor =
            CursorCompositor::new(header.width as usize, header.height as usize, header.scale);
        self.header_applied = true;

        debug!(
            width = header.width,
            height = header.height,
            scale = header.scale,
            fps = header.fps,
            video = ?video_format,
            cursor = ?cursor_format,
            "stream header applied"
        );
        Ok(())
    }

    /// Microseconds since the handle was created, strictly increasing
    /// across calls.
    pub fn create_frame_id(&mut self) -> u64 {
        let elapsed = self.base.elapsed().as_micros() as u64;
        let id = match self.last_frame_id {
            Some(last) if elapsed <= last => last + 1,
            _ => elapsed,
        };
        self.last_frame_id = Some(id);
        id
    }

    /// Encode one raw frame and, optionally, a cursor into a frame record.
    ///
    /// BGRA input is halved in place `scale` times, so `raw` holds scaled
    /// pixels afterwards. A cursor with an empty bitmap, or `None`, is
    /// recorded as "unchanged". The returned record stays valid until the
    /// next call.
    pub fn encode_frame(
        &mut self,
        raw: &mut [u8],
        frame_id: u64,
        cursor: Option<&Cursor>,
    ) -> Result<&[u8]> {
        if self.config.mode != Mode::Encode {
            return Err(CapseoError::invalid("handle was not initialized for encoding"));
        }

        let format = self.config.format;
        match format {
            PixelFormat::Bgra => {}
            PixelFormat::Yuv420 if self.scale != 0 => {
                return Err(CapseoError::NotImplemented("scaling YUV 4:2:0 input"));
            }
            PixelFormat::Yuv420 => {}
            other => {
                return Err(CapseoError::invalid(format!(
                    "unsupported input pixel format {other:?}"
                )));
            }
        }

        let expected = format.frame_len(self.config.width, self.config.height);
        if raw.len() != expected {
            return Err(CapseoError::InvalidLength {
                what: "raw frame",
                expected,
                actual: raw.len(),
            });
        }

        let yuv: &[u8] = if format == PixelFormat::Bgra {
            let (mut width, mut height) = (self.config.width as usize, self.config.height as usize);
            for _ in 0..self.scale {
                color::downscale_by_2(raw, width, height);
                width /= 2;
                height /= 2;
            }
            color::bgra_to_yuv420(raw, width, height, &mut self.yuv);
            &self.yuv
        } else {
            raw
        };

        self.encoded.clear();
        self.encoded.resize(FrameHeader::SIZE, 0);
        let video_len = self.video.compress(yuv, &mut self.encoded)?;

        let mut cursor_header = CursorHeader::default();
        if let Some(cursor) = cursor.filter(|c| !c.pixels.is_empty()) {
            let Some(codec) = self.cursor.as_mut() else {
                return Err(CapseoError::invalid("stream was created without a cursor format"));
            };
            if !cursor_size_fits(cursor.width as i64, cursor.height as i64) {
                return Err(CapseoError::invalid(format!(
                    "cursor size {}x{} exceeds {MAX_CURSOR_EDGE}",
                    cursor.width, cursor.height
                )));
            }
            if cursor.pixels.len() != cursor.byte_len() {
                return Err(CapseoError::InvalidLength {
                    what: "cursor bitmap",
                    expected: cursor.byte_len(),
                    actual: cursor.pixels.len(),
                });
            }
            let cursor_len = codec.compress(&cursor.pixels, &mut self.encoded)?;
            cursor_header = CursorHeader {
                length: wire_len(cursor_len)?,
                x: wire_i16(cursor.x as i64, "cursor x")?,
                y: wire_i16(cursor.y as i64, "cursor y")?,
                width: wire_i16(cursor.width as i64, "cursor width")?,
                height: wire_i16(cursor.height as i64, "cursor height")?,
            };
        }

        let header = FrameHeader {
            frame_id,
            video_length: wire_len(video_len)?,
            cursor: cursor_header,
        };
        header.encode(&mut &mut self.encoded[..FrameHeader::SIZE]);

        trace!(
            frame_id,
            video_len,
            cursor_len = cursor_header.length,
            "frame encoded"
        );
        Ok(&self.encoded)
    }

    /// Decode one frame record into `out`.
    ///
    /// The cursor state is updated whether or not `want_cursor` is set;
    /// the flag only controls blending into the returned frame.
    pub fn decode_frame(&mut self, record: &[u8], want_cursor: bool, out: &mut Frame) -> Result<()> {
        if self.config.mode != Mode::Decode {
            return Err(CapseoError::invalid("handle was not initialized for decoding"));
        }
        if !self.header_applied {
            return Err(CapseoError::invalid("no stream header applied yet"));
        }
        if self.config.format != PixelFormat::Yuv420 {
            return Err(CapseoError::NotImplemented("decoding to a format other than YUV 4:2:0"));
        }

        let header = FrameHeader::decode(record)?;
        if header.record_len() != record.len() {
            return Err(CapseoError::Internal(format!(
                "record holds {} bytes past its payloads",
                record.len() - header.record_len()
            )));
        }
        let video_end = FrameHeader::SIZE + header.video_length as usize;
        let video = &record[FrameHeader::SIZE..video_end];
        let cursor = &record[video_end..];

        let frame_len = PixelFormat::Yuv420.frame_len(self.width, self.height);
        out.width = self.width;
        out.height = self.height;
        out.data.resize(frame_len, 0);

        let produced = self.video.decompress(video, &mut out.data)?;
        if produced != frame_len {
            return Err(CapseoError::Internal(format!(
                "video payload decoded to {produced} bytes, expected {frame_len}"
            )));
        }

        // A zero cursor length reuses the cached bitmap.
        let fresh = match header.cursor.length {
            0 => None,
            _ => Some(self.decode_cursor(&header.cursor, cursor)?),
        };
        match (want_cursor, fresh) {
            (true, fresh) => self.compositor.draw_cursor(&mut out.data, fresh)?,
            (false, Some(bitmap)) => self.compositor.update(bitmap)?,
            (false, None) => {}
        }
        out.id = header.frame_id;

        trace!(
            frame_id = header.frame_id,
            video_len = header.video_length,
            cursor_len = header.cursor.length,
            "frame decoded"
        );
        Ok(())
    }

    fn decode_cursor(&mut self, header: &CursorHeader, payload: &[u8]) -> Result<Cursor> {
        let Some(codec) = self.cursor.as_mut() else {
            return Err(CapseoError::Internal(
                "cursor payload in a stream without a cursor format".into(),
            ));
        };
        if !cursor_size_fits(header.width as i64, header.height as i64) {
            return Err(CapseoError::invalid(format!(
                "cursor size {}x{} out of range",
                header.width, header.height
            )));
        }

        let mut cursor = Cursor::new(
            header.x as i32,
            header.y as i32,
            header.width as u32,
            header.height as u32,
            Vec::new(),
        );
        cursor.pixels = vec![0; cursor.byte_len()];
        let produced = codec.decompress(payload, &mut cursor.pixels)?;
        if produced != cursor.pixels.len() {
            return Err(CapseoError::Internal(format!(
                "cursor payload decoded to {produced} bytes, expected {}",
                cursor.pixels.len()
            )));
        }
        Ok(cursor)
    }

    /// End the session. Scratch buffers are zeroed before release.
    pub fn finalize(self) {
        debug!(mode = ?self.config.mode, "codec finalized");
    }
}

impl Drop for CodecHandle {
    fn drop(&mut self) {
        self.yuv.zeroize();
        self.encoded.zeroize();
    }
}

/// Both edges within `1..=MAX_CURSOR_EDGE`, on encode and decode alike.
fn cursor_size_fits(width: i64, height: i64) -> bool {
    let edge = 1..=i64::from(MAX_CURSOR_EDGE);
    edge.contains(&width) && edge.contains(&height)
}

fn wire_len(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| CapseoError::invalid(format!("payload of {len} bytes is too large")))
}

fn wire_i16(value: i64, what: &str) -> Result<i16> {
    i16::try_from(value).map_err(|_| CapseoError::invalid(format!("{what} {value} does not fit 16 bits")))
}
