//! Stream inspection: header fields plus statistics gathered from a pass
//! over every record.

use std::fmt;
use std::io::Read;

use capseo_core::{
    CapseoError, CodecConfig, EncodedFormat, FrameHeader, Result, StreamHeader, StreamReader,
};

const MIB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone)]
pub struct StreamSummary {
    pub header: StreamHeader,
    pub frames: u64,
    /// Records carrying a new cursor bitmap.
    pub cursor_updates: u64,
    /// Sum of record sizes, envelope excluded.
    pub record_bytes: u64,
    pub first_id: Option<u64>,
    pub last_id: Option<u64>,
}

impl StreamSummary {
    /// Time between the first and the last frame, in seconds.
    pub fn duration_secs(&self) -> f64 {
        match (self.first_id, self.last_id) {
            (Some(first), Some(last)) => last.saturating_sub(first) as f64 / 1_000_000.0,
            _ => 0.0,
        }
    }

    pub fn average_fps(&self) -> f64 {
        let duration = self.duration_secs();
        if duration > 0.0 {
            (self.frames - 1) as f64 / duration
        } else {
            0.0
        }
    }

    pub fn mib_per_sec(&self) -> f64 {
        let duration = self.duration_secs();
        if duration > 0.0 {
            self.record_bytes as f64 / MIB / duration
        } else {
            0.0
        }
    }
}

/// Read a whole stream without decoding its payloads.
pub fn summarize<R: Read>(source: R) -> Result<StreamSummary> {
    let mut reader = StreamReader::open(source, CodecConfig::decoder())?;
    let mut summary = StreamSummary {
        header: *reader.header(),
        frames: 0,
        cursor_updates: 0,
        record_bytes: 0,
        first_id: None,
        last_id: None,
    };

    loop {
        let record = match reader.next_record() {
            Ok(record) => record,
            Err(CapseoError::StreamEnd) => break,
            Err(e) => return Err(e),
        };
        let header = FrameHeader::decode(&record)?;
        summary.frames += 1;
        summary.record_bytes += record.len() as u64;
        if header.cursor.length > 0 {
            summary.cursor_updates += 1;
        }
        summary.first_id.get_or_insert(header.frame_id);
        summary.last_id = Some(header.frame_id);
    }
    Ok(summary)
}

fn format_name(tag: u32) -> String {
    match EncodedFormat::try_from(tag) {
        Ok(format) => format!("{tag:#06x} ({format:?})"),
        Err(_) if tag == 0 => "none".into(),
        Err(_) => format!("{tag:#06x} (unknown)"),
    }
}

impl fmt::Display for StreamSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = &self.header;
        writeln!(f, "revision:        {:#04x}", h.revision)?;
        writeln!(
            f,
            "dimensions:      {}x{} (scale {}, captured {}x{})",
            h.width,
            h.height,
            h.scale,
            h.width << h.scale,
            h.height << h.scale
        )?;
        writeln!(f, "fps hint:        {}", h.fps)?;
        writeln!(f, "video format:    {}", format_name(h.video_format))?;
        writeln!(f, "cursor format:   {}", format_name(h.cursor_format))?;
        writeln!(f, "frames:          {}", self.frames)?;
        writeln!(f, "cursor updates:  {}", self.cursor_updates)?;
        writeln!(f, "duration:        {:.2} s", self.duration_secs())?;
        writeln!(f, "average fps:     {:.2}", self.average_fps())?;
        write!(f, "data rate:       {:.3} MiB/s", self.mib_per_sec())
    }
}
