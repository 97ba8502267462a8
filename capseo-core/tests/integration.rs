//! Integration tests: whole streams written and read back through the
//! public API, in memory and on disk.

use std::fs::File;
use std::io::{BufReader, BufWriter};

use capseo_core::color;
use capseo_core::{
    CodecConfig, Compression, Cursor, ErrorKind, FrameHeader, RecordCodec, StreamHeader,
    StreamOptions, StreamReader, StreamWriter,
};
use futures::StreamExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::codec::FramedRead;

// ── Helpers ──────────────────────────────────────────────────────

fn solid_bgra(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
    px.iter().copied().cycle().take((w * h * 4) as usize).collect()
}

/// Colour sweep frame `n`: every pixel shifts hue with the frame number.
fn sweep_frame(w: u32, h: u32, n: u32) -> Vec<u8> {
    let mut raw = Vec::with_capacity((w * h * 4) as usize);
    for y in 0..h {
        for x in 0..w {
            raw.extend_from_slice(&[
                (x + n) as u8,
                (y + 2 * n) as u8,
                (x ^ y).wrapping_add(n) as u8,
                255,
            ]);
        }
    }
    raw
}

fn write_frames(config: CodecConfig, options: StreamOptions, frames: &[Vec<u8>]) -> Vec<u8> {
    let mut writer = StreamWriter::create(Vec::new(), config, options).unwrap();
    for frame in frames {
        let id = writer.create_frame_id();
        let mut raw = frame.clone();
        writer.encode_frame(&mut raw, id, None).unwrap();
    }
    writer.finish().unwrap()
}

fn expected_yuv(raw: &[u8], w: u32, h: u32) -> Vec<u8> {
    let mut yuv = vec![0u8; (w * h * 3 / 2) as usize];
    color::bgra_to_yuv420(raw, w as usize, h as usize, &mut yuv);
    yuv
}

// ── Header ───────────────────────────────────────────────────────

#[test]
fn test_header_roundtrip() {
    let bytes = write_frames(
        CodecConfig::encoder(400, 400),
        StreamOptions::default(),
        &[],
    );
    assert_eq!(bytes.len(), StreamHeader::SIZE);
    assert_eq!(&bytes[..4], b"CPS\x01");

    let header = StreamHeader::decode(&bytes).unwrap();
    assert_eq!((header.width, header.height), (400, 400));
    assert_eq!(header.fps, 25);
    assert_eq!(header.scale, 0);
    assert_eq!(header.video_format, 0x1301);
    assert_eq!(header.cursor_format, 0x1351);
}

#[test]
fn test_bad_magic_and_revision() {
    let mut bytes = write_frames(CodecConfig::encoder(16, 16), StreamOptions::default(), &[]);
    bytes[0] = b'X';
    let err = StreamReader::open(&bytes[..], CodecConfig::decoder()).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidHeader);

    let mut bytes = write_frames(CodecConfig::encoder(16, 16), StreamOptions::default(), &[]);
    bytes[3] = 0x03;
    let err = StreamReader::open(&bytes[..], CodecConfig::decoder()).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::NotImplemented);
}

// ── Frames ───────────────────────────────────────────────────────

#[test]
fn test_solid_blue_stream() {
    let bytes = write_frames(
        CodecConfig::encoder(64, 32),
        StreamOptions::default(),
        &[solid_bgra(64, 32, [255, 0, 0, 255])],
    );
    let mut reader = StreamReader::open(&bytes[..], CodecConfig::decoder()).unwrap();
    let frame = reader.decode_frame(true).unwrap();
    assert!(frame.y_plane().iter().all(|&y| y == 40));
    assert!(frame.u_plane().iter().all(|&u| u == 239));
    assert!(frame.v_plane().iter().all(|&v| v == 110));
    assert!(reader.decode_frame(true).unwrap_err().is_stream_end());
}

#[test]
fn test_scale_shrinks_payload() {
    for (scale, edge) in [(1, 200u32), (2, 100)] {
        let config = CodecConfig::encoder(400, 400).with_scale(scale);
        let bytes = write_frames(config, StreamOptions::default(), &[sweep_frame(400, 400, 3)]);

        let mut reader = StreamReader::open(&bytes[..], CodecConfig::decoder()).unwrap();
        assert_eq!((reader.header().width, reader.header().height), (edge, edge));
        let frame = reader.decode_frame(false).unwrap();
        assert_eq!((frame.width, frame.height), (edge, edge));
        assert_eq!(frame.data.len(), (edge * edge * 3 / 2) as usize);
    }
}

#[test]
fn test_random_frames_decode_exactly() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let frames: Vec<Vec<u8>> = (0..4)
        .map(|_| {
            let mut raw = vec![0u8; 48 * 32 * 4];
            rng.fill(&mut raw[..]);
            raw
        })
        .collect();
    let bytes = write_frames(CodecConfig::encoder(48, 32), StreamOptions::default(), &frames);

    let mut reader = StreamReader::open(&bytes[..], CodecConfig::decoder()).unwrap();
    for raw in &frames {
        let frame = reader.decode_frame(false).unwrap();
        assert_eq!(frame.data, expected_yuv(raw, 48, 32));
    }
    assert_eq!(reader.processed_frames(), 4);
}

#[test]
fn test_colour_sweep_ids_increase() {
    let frames: Vec<Vec<u8>> = (0..40).map(|n| sweep_frame(80, 60, n)).collect();
    let bytes = write_frames(CodecConfig::encoder(80, 60), StreamOptions::default(), &frames);

    let mut reader = StreamReader::open(&bytes[..], CodecConfig::decoder()).unwrap();
    let mut last = None;
    for raw in &frames {
        let frame = reader.decode_frame(false).unwrap();
        assert_eq!(frame.data, expected_yuv(raw, 80, 60));
        if let Some(prev) = last {
            assert!(frame.id > prev);
        }
        last = Some(frame.id);
    }
    assert!(reader.decode_frame(false).unwrap_err().is_stream_end());
}

// ── Cursor ───────────────────────────────────────────────────────

#[test]
fn test_cursor_reuse_across_records() {
    let config = CodecConfig::encoder(400, 400).with_scale(1);
    let mut writer = StreamWriter::create(Vec::new(), config, StreamOptions::default()).unwrap();
    let cursor = Cursor::new(100, 100, 32, 32, vec![255; 32 * 32 * 4]);

    for n in 0..3 {
        let id = writer.create_frame_id();
        writer
            .frame_buffer_mut()
            .copy_from_slice(&solid_bgra(400, 400, [0, 0, 0, 255]));
        let cursor = (n == 0).then_some(&cursor);
        writer.encode_buffered_frame(id, cursor).unwrap();
    }
    let bytes = writer.finish().unwrap();

    let mut reader = StreamReader::open(&bytes[..], CodecConfig::decoder()).unwrap();
    for n in 0..3 {
        let record = reader.next_record().unwrap();
        let header = FrameHeader::decode(&record).unwrap();
        assert_eq!(header.cursor.length > 0, n == 0);
    }

    let mut reader = StreamReader::open(&bytes[..], CodecConfig::decoder()).unwrap();
    for _ in 0..3 {
        let frame = reader.decode_frame(true).unwrap();
        let y = frame.y_plane();
        // 16×16 after scaling, drawn at (50, 50) toward lower rows.
        assert_eq!(y[50 * 200 + 50], 235);
        assert_eq!(y[35 * 200 + 65], 235);
        assert_eq!(y[34 * 200 + 50], 16);
        assert_eq!(y[50 * 200 + 66], 16);
    }
}

// ── Integrity ────────────────────────────────────────────────────

#[test]
fn test_checksum_detects_corruption() {
    let frames = vec![sweep_frame(32, 32, 0), sweep_frame(32, 32, 1)];
    let mut bytes = write_frames(
        CodecConfig::encoder(32, 32),
        StreamOptions { checksum: true },
        &frames,
    );
    assert_eq!(bytes[3], 0x02);

    let mut reader = StreamReader::open(&bytes[..], CodecConfig::decoder()).unwrap();
    reader.decode_frame(false).unwrap();
    reader.decode_frame(false).unwrap();

    // Flip a byte inside the first frame header.
    bytes[StreamHeader::SIZE + 4 + 2] ^= 0x01;
    let mut reader = StreamReader::open(&bytes[..], CodecConfig::decoder()).unwrap();
    let err = reader.decode_frame(false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalInconsistency);
}

#[test]
fn test_truncated_stream() {
    let bytes = write_frames(
        CodecConfig::encoder(32, 32),
        StreamOptions::default(),
        &[sweep_frame(32, 32, 0)],
    );
    let mut reader =
        StreamReader::open(&bytes[..bytes.len() - 1], CodecConfig::decoder()).unwrap();
    let err = reader.decode_frame(false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SystemIo);
}

// ── Backends ─────────────────────────────────────────────────────

#[test]
fn test_zstd_stream() {
    let config = CodecConfig::encoder(64, 64).with_compression(Compression::Zstd { level: 3 });
    let frames: Vec<Vec<u8>> = (0..3).map(|n| sweep_frame(64, 64, n)).collect();
    let bytes = write_frames(config, StreamOptions::default(), &frames);
    assert_eq!(StreamHeader::decode(&bytes[..StreamHeader::SIZE]).unwrap().video_format, 0x1304);

    let mut reader = StreamReader::open(&bytes[..], CodecConfig::decoder()).unwrap();
    for raw in &frames {
        assert_eq!(reader.decode_frame(false).unwrap().data, expected_yuv(raw, 64, 64));
    }
}

// ── Transports ───────────────────────────────────────────────────

#[tokio::test]
async fn test_framed_read_over_records() {
    let frames: Vec<Vec<u8>> = (0..5).map(|n| sweep_frame(32, 16, n)).collect();
    let bytes = write_frames(
        CodecConfig::encoder(32, 16),
        StreamOptions { checksum: true },
        &frames,
    );
    let header = StreamHeader::decode(&bytes[..StreamHeader::SIZE]).unwrap();

    let mut framed = FramedRead::new(&bytes[StreamHeader::SIZE..], RecordCodec::for_header(&header));
    let mut ids = Vec::new();
    while let Some(record) = framed.next().await {
        let record = record.unwrap();
        ids.push(FrameHeader::decode(&record).unwrap().frame_id);
    }
    assert_eq!(ids.len(), 5);
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_file_backed_stream() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.cps");
    let frames: Vec<Vec<u8>> = (0..6).map(|n| sweep_frame(40, 40, n)).collect();

    let file = BufWriter::new(File::create(&path).unwrap());
    let mut writer =
        StreamWriter::create(file, CodecConfig::encoder(40, 40), StreamOptions::default()).unwrap();
    for raw in &frames {
        let id = writer.create_frame_id();
        writer.frame_buffer_mut().copy_from_slice(raw);
        writer.encode_buffered_frame(id, None).unwrap();
    }
    writer.finish().unwrap();

    let file = BufReader::new(File::open(&path).unwrap());
    let mut reader = StreamReader::open(file, CodecConfig::decoder()).unwrap();
    let mut decoded = 0;
    loop {
        match reader.decode_frame(false) {
            Ok(frame) => {
                assert_eq!(frame.data, expected_yuv(&frames[decoded], 40, 40));
                decoded += 1;
            }
            Err(e) if e.is_stream_end() => break,
            Err(e) => panic!("decode failed: {e}"),
        }
    }
    assert_eq!(decoded, frames.len());
    assert_eq!(reader.previous_frame().unwrap().data, expected_yuv(&frames[4], 40, 40));
}
