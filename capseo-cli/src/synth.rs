//! Synthetic colour-sweep stream, for exercising encoders and players
//! without a capture source.
//!
//! Every frame is a solid colour moving from (R 0, G 1, B 0.5) toward
//! (R 1, G 0, B 0.5) over the run, with an arrow cursor drifting across.

use std::io::Write;

use capseo_core::{CodecConfig, Cursor, Result, StreamOptions, StreamWriter};
use tracing::{debug, info};

use crate::config::SynthConfig;

const CURSOR_EDGE: u32 = 16;

/// Encode `synth.frames` sweep frames into `sink`, returning the sink.
pub fn write_sweep<W: Write>(
    sink: W,
    codec: CodecConfig,
    options: StreamOptions,
    synth: &SynthConfig,
) -> Result<W> {
    let mut writer = StreamWriter::create(sink, codec, options)?;
    let arrow = arrow_bitmap();
    let frame_interval = 1_000_000 / u64::from(codec.fps.max(1));

    for n in 0..synth.frames {
        fill_sweep(writer.frame_buffer_mut(), n, synth.frames);

        let id = if synth.realtime {
            writer.create_frame_id()
        } else {
            u64::from(n) * frame_interval
        };

        let cursor = (synth.cursor_every > 0 && n % synth.cursor_every == 0).then(|| {
            let (x, y) = cursor_position(n, codec.width, codec.height);
            Cursor::new(x, y, CURSOR_EDGE, CURSOR_EDGE, arrow.clone())
        });
        writer.encode_buffered_frame(id, cursor.as_ref())?;

        if (n + 1) % 100 == 0 {
            debug!(frames = n + 1, "sweep progress");
        }
    }

    info!(frames = writer.processed_frames(), "sweep written");
    writer.finish()
}

fn fill_sweep(buffer: &mut [u8], n: u32, total: u32) {
    let t = f64::from(n + 1) / f64::from(total.max(1));
    let red = (t.min(1.0) * 255.0) as u8;
    let green = ((1.0 - t).max(0.0) * 255.0) as u8;
    let pixel = [128, green, red, 255];
    for chunk in buffer.chunks_exact_mut(4) {
        chunk.copy_from_slice(&pixel);
    }
}

/// Diagonal cursor path, wrapping at the frame edges for any frame number.
fn cursor_position(n: u32, width: u32, height: u32) -> (i32, i32) {
    let n = u64::from(n);
    let x = n * 3 % u64::from(width.max(1));
    let y = u64::from(height.saturating_sub(1)) - n * 2 % u64::from(height.max(1));
    (x as i32, y as i32)
}

/// White arrow with a black edge on a transparent background.
fn arrow_bitmap() -> Vec<u8> {
    let mut pixels = vec![0u8; (CURSOR_EDGE * CURSOR_EDGE * 4) as usize];
    for row in 0..CURSOR_EDGE {
        for col in 0..=row.min(CURSOR_EDGE - 1) {
            let p = ((row * CURSOR_EDGE + col) * 4) as usize;
            let shade = if col == 0 || col == row { 0 } else { 255 };
            pixels[p..p + 4].copy_from_slice(&[shade, shade, shade, 255]);
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use capseo_core::{FrameHeader, StreamReader};

    fn small_synth(frames: u32) -> SynthConfig {
        SynthConfig {
            frames,
            cursor_every: 4,
            ..SynthConfig::default()
        }
    }

    #[test]
    fn cursor_path_wraps_for_long_runs() {
        assert_eq!(cursor_position(0, 400, 400), (0, 399));
        assert_eq!(cursor_position(200, 400, 400), (200, 399));
        for n in [u32::MAX / 3 + 1, u32::MAX / 2 + 1, u32::MAX] {
            let (x, y) = cursor_position(n, 400, 300);
            assert!((0..400).contains(&x));
            assert!((0..300).contains(&y));
        }
        assert_eq!(cursor_position(u32::MAX, 400, 300).0, 285);
    }

    #[test]
    fn sweep_writes_every_frame() {
        let bytes = write_sweep(
            Vec::new(),
            CodecConfig::encoder(32, 32),
            StreamOptions::default(),
            &small_synth(9),
        )
        .unwrap();

        let mut reader = StreamReader::open(&bytes[..], CodecConfig::decoder()).unwrap();
        let mut cursors = 0;
        for n in 0..9u64 {
            let record = reader.next_record().unwrap();
            let header = FrameHeader::decode(&record).unwrap();
            assert_eq!(header.frame_id, n * 40_000);
            if header.cursor.length > 0 {
                cursors += 1;
            }
        }
        assert_eq!(cursors, 3);
        assert!(reader.next_record().unwrap_err().is_stream_end());
    }

    #[test]
    fn sweep_moves_from_green_to_red() {
        let mut first = vec![0u8; 8];
        let mut last = vec![0u8; 8];
        fill_sweep(&mut first, 0, 10);
        fill_sweep(&mut last, 9, 10);
        assert!(first[1] > first[2]);
        assert_eq!(&last[..4], &[128, 0, 255, 255]);
    }

    #[test]
    fn arrow_has_opaque_and_clear_pixels() {
        let arrow = arrow_bitmap();
        assert_eq!(arrow[3], 255);
        assert_eq!(arrow[(CURSOR_EDGE as usize - 1) * 4 + 3], 0);
    }
}
