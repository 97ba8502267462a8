//! Cursor compositing into decoded YUV frames.
//!
//! Cursor bitmaps arrive at screen resolution. When a stream was encoded
//! with a scale exponent the bitmap is shrunk once, on arrival, and the
//! shrunken copy is cached for every following frame whose record says
//! the cursor did not change.
//!
//! Only the luma plane is blended. Chroma stays untouched, so coloured
//! cursors show up as their brightness only.

use zeroize::Zeroize;

use crate::color;
use crate::error::{CapseoError, Result};
use crate::types::Cursor;

/// Largest cursor edge accepted from a stream.
pub const MAX_CURSOR_EDGE: u32 = 1024;

/// A cursor already scaled to frame resolution.
#[derive(Debug, Clone)]
pub struct ScaledCursor {
    /// Destination column of the bitmap's first pixel.
    pub x: i32,
    /// Destination row of the bitmap's first row.
    pub y: i32,
    pub width: usize,
    pub height: usize,
    /// `width * height` ARGB words (bytes B, G, R, A).
    pub pixels: Vec<u8>,
}

/// Holds the last cursor seen on a decode session and draws it.
pub struct CursorCompositor {
    frame_width: usize,
    frame_height: usize,
    scale: u32,
    cached: Option<ScaledCursor>,
}

impl CursorCompositor {
    pub fn new(frame_width: usize, frame_height: usize, scale: u32) -> Self {
        Self {
            frame_width,
            frame_height,
            scale,
            cached: None,
        }
    }

    /// The cursor that a reuse draw would composite.
    pub fn cached(&self) -> Option<&ScaledCursor> {
        self.cached.as_ref()
    }

    /// Store a new cursor, shrinking its bitmap by the session's scale.
    pub fn update(&mut self, cursor: Cursor) -> Result<()> {
        if cursor.pixels.len() != cursor.byte_len() {
            return Err(CapseoError::InvalidLength {
                what: "cursor bitmap",
                expected: cursor.byte_len(),
                actual: cursor.pixels.len(),
            });
        }

        let mut pixels = cursor.pixels;
        let (mut width, mut height) = (cursor.width as usize, cursor.height as usize);
        for _ in 0..self.scale {
            color::downscale_argb_by_2(&mut pixels, width, height);
            width /= 2;
            height /= 2;
        }
        pixels.truncate(width * height * 4);

        let divisor = 1i32 << self.scale;
        if let Some(mut old) = self.cached.take() {
            old.pixels.zeroize();
        }
        self.cached = Some(ScaledCursor {
            x: cursor.x / divisor,
            y: cursor.y / divisor,
            width,
            height,
            pixels,
        });
        Ok(())
    }

    /// Blend the cached cursor into `frame` (a YUV 4:2:0 buffer, of which
    /// only the Y plane is touched). No-op when no cursor has been seen.
    ///
    /// Bitmap rows are laid toward lower frame rows, matching frames read
    /// back bottom-up. Pixels falling outside the frame are clipped.
    /// A frame shorter than the Y plane is rejected.
    pub fn composite(&self, frame: &mut [u8]) -> Result<()> {
        let luma_len = self.frame_width * self.frame_height;
        let actual = frame.len();
        let Some(y_plane) = frame.get_mut(..luma_len) else {
            return Err(CapseoError::InvalidLength {
                what: "frame",
                expected: luma_len,
                actual,
            });
        };
        let Some(cursor) = &self.cached else {
            return Ok(());
        };

        for row in 0..cursor.height {
            let dy = cursor.y as i64 - row as i64;
            if dy < 0 || dy >= self.frame_height as i64 {
                continue;
            }
            for col in 0..cursor.width {
                let dx = cursor.x as i64 + col as i64;
                if dx < 0 || dx >= self.frame_width as i64 {
                    continue;
                }

                let p = (row * cursor.width + col) * 4;
                let px = &cursor.pixels[p..p + 4];
                if px[3] == 0 {
                    continue;
                }

                // 255 after inversion means fully transparent.
                let inv = 255 - px[3] as u32;
                let cursor_luma = color::luma(px[2], px[1], px[0]) as u32;
                let dst = &mut y_plane[dy as usize * self.frame_width + dx as usize];
                *dst = ((*dst as u32 * inv + cursor_luma * (255 - inv)) / 255) as u8;
            }
        }
        Ok(())
    }

    /// Composite a cursor into `frame`.
    ///
    /// `Some(cursor)` replaces the cached cursor first (scaling it);
    /// `None` is the reuse path and draws the cached bitmap unchanged.
    pub fn draw_cursor(&mut self, frame: &mut [u8], cursor: Option<Cursor>) -> Result<()> {
        if let Some(cursor) = cursor {
            self.update(cursor)?;
        }
        self.composite(frame)
    }
}

impl Drop for CursorCompositor {
    fn drop(&mut self) {
        if let Some(cursor) = self.cached.as_mut() {
            cursor.pixels.zeroize();
        }
    }
}
