//! # capseo-core
//!
//! Lossless screen-capture video codec.
//!
//! This crate contains:
//! - **Compressor**: the control-word LZ format plus a `zstd` backend behind [`Compressor`]
//! - **Colour**: BGRA → YUV 4:2:0 conversion and in-place 2× downscaling
//! - **Cursor**: [`CursorCompositor`], blending cursor bitmaps into decoded luma
//! - **Frame codec**: [`CodecHandle`], raw frame + cursor ⇄ frame record
//! - **Stream**: [`StreamWriter`] / [`StreamReader`] over blocking I/O
//! - **Record codec**: [`RecordCodec`], the length-prefixed envelope for `tokio_util` framing
//! - **Error**: [`CapseoError`], typed and `thiserror`-based, with coarse [`ErrorKind`]s

pub mod codec;
pub mod color;
pub mod compress;
pub mod config;
pub mod cursor;
pub mod error;
pub mod frame;
pub mod header;
pub mod stream;
pub mod types;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::RecordCodec;
pub use compress::{Compression, Compressor};
pub use config::CodecConfig;
pub use cursor::CursorCompositor;
pub use error::{CapseoError, ErrorKind, Result, error_string};
pub use frame::CodecHandle;
pub use header::{CursorHeader, FrameHeader, StreamHeader};
pub use stream::{StreamOptions, StreamReader, StreamWriter};
pub use types::{Cursor, EncodedFormat, Frame, Mode, PixelFormat};
