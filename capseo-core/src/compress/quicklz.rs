//! Control-word LZ77 codec (QuickLZ-style).
//!
//! ## Bitstream
//!
//! Output interleaves control bytes and payload. Each control byte
//! carries eight flags, read high bit first: `1` means the next unit is a
//! back-reference or RLE run, `0` means a literal byte.
//!
//! ```text
//! 0ooooooo                         offset ≤ 127,    length 3
//! 100ooooo oooooooo                offset ≤ 8191,   length 3
//! 101LLLoo oooooooo                offset ≤ 1023,   length 4..11
//! 110LLLLL oooooooo oooooooo       offset ≤ 65535,  length 4..35
//! 1110LLLL LLLLLLLo oooooooo oooooooo
//!                                  offset ≤ 131071, length 4..2051
//! 1111nnnn nnnnnnnn bbbbbbbb       byte b repeated 4 * (n + 1) times
//! ```
//!
//! The stream has no end marker: the decoder must be told how many
//! bytes to produce. The last bytes (where fewer than five remain) are
//! always literals, and the final control byte is padded with a single
//! `1` flag so batched literal decoding stops at the right place.

use crate::error::{CapseoError, Result};

/// Slots in the match-finder hash table.
pub const HASH_SLOTS: usize = 4096;

const MAX_OFFSET: usize = 131_071;
/// Extra match bytes beyond the first four that the longest form encodes.
const MAX_EXTENSION: usize = (1 << 11) - 1;
/// Source span one RLE unit may cover.
const RLE_SPAN: usize = 0x0fff << 2;

/// Literal batch size and the flag bits it consumes, indexed by the top
/// nibble of the control value.
const LITERAL_BATCH: [u32; 8] = [4, 3, 2, 2, 1, 1, 1, 1];

/// Worst-case compressed size for `len` input bytes.
pub const fn max_compressed_len(len: usize) -> usize {
    len + len / 8 + 2
}

// ── Encoder ──────────────────────────────────────────────────────

/// Encoder state: the match-finder hash table.
///
/// Slots hold offsets into the buffer currently being compressed and are
/// reset on every call, so one instance can be reused across frames.
pub struct QuickLzEncoder {
    table: Box<[Option<usize>; HASH_SLOTS]>,
}

impl QuickLzEncoder {
    pub fn new() -> Self {
        Self {
            table: Box::new([None; HASH_SLOTS]),
        }
    }

    /// Compress `src`, appending to `dst`. Returns the number of bytes
    /// appended.
    pub fn compress_into(&mut self, src: &[u8], dst: &mut Vec<u8>) -> usize {
        let start = dst.len();
        dst.reserve(max_compressed_len(src.len()));
        self.table.fill(None);

        let n = src.len();
        let mut flags = FlagWriter::begin(dst);
        let mut pos = 0;

        while pos + 4 < n {
            if src[pos..pos + 4] == src[pos + 1..pos + 5] {
                // Five identical bytes: emit a run of whole words.
                let value = src[pos];
                pos += 4;
                let origin = pos;
                while pos < origin + RLE_SPAN - 4
                    && pos + 4 < n
                    && src[pos..pos + 4] == src[origin - 4..origin]
                {
                    pos += 4;
                }
                let run = (pos - origin) / 4;
                dst.push(0xf0 | (run >> 8) as u8);
                dst.push(run as u8);
                dst.push(value);
                flags.push(dst, true);
                continue;
            }

            let fetch = u32::from_be_bytes([src[pos], src[pos + 1], src[pos + 2], src[pos + 3]]);
            let hash = (((fetch >> 20) ^ (fetch >> 8)) & 0x0fff) as usize;
            let candidate = self.table[hash].replace(pos).filter(|&o| {
                let offset = pos - o;
                offset <= MAX_OFFSET && offset > 3 && src[o..o + 3] == src[pos..pos + 3]
            });

            let Some(o) = candidate else {
                dst.push(src[pos]);
                pos += 1;
                flags.push(dst, false);
                continue;
            };
            let offset = pos - o;

            if src[o + 3] != src[pos + 3] {
                // Three-byte match.
                if offset <= 127 {
                    dst.push(offset as u8);
                } else if offset <= 8191 {
                    dst.push(0x80 | (offset >> 8) as u8);
                    dst.push(offset as u8);
                } else {
                    dst.push(src[pos]);
                    pos += 1;
                    flags.push(dst, false);
                    continue;
                }
                pos += 3;
                flags.push(dst, true);
                continue;
            }

            let mut len = 0;
            while len < MAX_EXTENSION && pos + len + 8 < n && src[o + len + 4] == src[pos + len + 4]
            {
                len += 1;
            }
            pos += len + 4;

            if len <= 7 && offset <= 1023 {
                dst.push(0xa0 | (len << 2) as u8 | (offset >> 8) as u8);
                dst.push(offset as u8);
            } else if len <= 31 && offset <= 65535 {
                dst.push(0xc0 | len as u8);
                dst.push((offset >> 8) as u8);
                dst.push(offset as u8);
            } else {
                dst.push(0xe0 | (len >> 7) as u8);
                dst.push((len << 1) as u8 | (offset >> 16) as u8);
                dst.push((offset >> 8) as u8);
                dst.push(offset as u8);
            }
            flags.push(dst, true);
        }

        while pos < n {
            dst.push(src[pos]);
            pos += 1;
            flags.push(dst, false);
        }

        flags.finish(dst);
        dst.len() - start
    }
}

impl Default for QuickLzEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Accumulates flags and patches them into reserved control-byte slots.
struct FlagWriter {
    slot: usize,
    value: u32,
    remaining: u32,
}

impl FlagWriter {
    fn begin(dst: &mut Vec<u8>) -> Self {
        let slot = dst.len();
        dst.push(0);
        Self {
            slot,
            value: 0,
            remaining: 8,
        }
    }

    /// Record the flag of the unit whose payload was just written.
    fn push(&mut self, dst: &mut Vec<u8>, is_match: bool) {
        self.value = (self.value << 1) | is_match as u32;
        self.remaining -= 1;
        if self.remaining == 0 {
            dst[self.slot] = self.value as u8;
            self.slot = dst.len();
            dst.push(0);
            self.value = 0;
            self.remaining = 8;
        }
    }

    fn finish(self, dst: &mut [u8]) {
        let padded = (self.value << self.remaining) | (1 << (self.remaining - 1));
        dst[self.slot] = padded as u8;
    }
}

// ── Decoder ──────────────────────────────────────────────────────

/// Decompress `src` until `dst` is full.
///
/// Returns the number of input bytes consumed. Malformed input yields
/// [`CapseoError::Corrupt`], never a panic.
pub fn decompress_into(src: &[u8], dst: &mut [u8]) -> Result<usize> {
    let n = dst.len();
    let mut input = Input { src, pos: 0 };
    let mut op = 0;

    let mut cword = input.byte()? as u32;
    let mut counter: u32 = 8;

    while op + 4 < n {
        if counter == 0 {
            cword = input.byte()? as u32;
            counter = 8;
        }

        if cword & 0x80 == 0 {
            let index = ((cword >> 4) & 0x07) as usize;
            let take = LITERAL_BATCH[index];
            let literals = input.take(take as usize)?;
            dst[op..op + literals.len()].copy_from_slice(literals);
            op += literals.len();
            counter = counter
                .checked_sub(take)
                .ok_or(CapseoError::Corrupt("literal batch overruns control word"))?;
            cword = (cword << take) | ((1 << take) - 1);
            continue;
        }

        cword = (cword << 1) | 1;
        counter -= 1;

        let b0 = input.byte()? as usize;
        let (offset, len) = if b0 & 0x80 == 0 {
            (b0, 3)
        } else if b0 & 0x60 == 0 {
            let b1 = input.byte()? as usize;
            (((b0 & 0x1f) << 8) | b1, 3)
        } else if b0 & 0x40 == 0 {
            let b1 = input.byte()? as usize;
            (((b0 & 0x03) << 8) | b1, ((b0 >> 2) & 0x07) + 4)
        } else if b0 & 0x20 == 0 {
            let b1 = input.byte()? as usize;
            let b2 = input.byte()? as usize;
            ((b1 << 8) | b2, (b0 & 0x1f) + 4)
        } else if b0 & 0x10 == 0 {
            let b1 = input.byte()? as usize;
            let b2 = input.byte()? as usize;
            let b3 = input.byte()? as usize;
            (
                ((b1 & 0x01) << 16) | (b2 << 8) | b3,
                (((b0 & 0x0f) << 7) | (b1 >> 1)) + 4,
            )
        } else {
            let b1 = input.byte()? as usize;
            let value = input.byte()?;
            let total = ((((b0 & 0x0f) << 8) | b1) + 1) * 4;
            if op + total > n {
                return Err(CapseoError::Corrupt("run overruns output"));
            }
            dst[op..op + total].fill(value);
            op += total;
            continue;
        };

        copy_match(dst, op, offset, len)?;
        op += len;
    }

    while op < n {
        if counter == 0 {
            // Control byte of an all-literal tail; its flags are implied.
            input.byte()?;
            counter = 8;
        }
        dst[op] = input.byte()?;
        op += 1;
        counter -= 1;
    }

    Ok(input.pos)
}

/// Copy `len` bytes from `offset` bytes back. Overlapping ranges are
/// copied byte by byte so short offsets replicate a pattern.
fn copy_match(dst: &mut [u8], op: usize, offset: usize, len: usize) -> Result<()> {
    if offset == 0 || offset > op {
        return Err(CapseoError::Corrupt("back-reference before start of output"));
    }
    if op + len > dst.len() {
        return Err(CapseoError::Corrupt("back-reference overruns output"));
    }
    let from = op - offset;
    if offset >= len {
        dst.copy_within(from..from + len, op);
    } else {
        for i in 0..len {
            dst[op + i] = dst[from + i];
        }
    }
    Ok(())
}

struct Input<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Input<'a> {
    fn byte(&mut self) -> Result<u8> {
        let b = *self
            .src
            .get(self.pos)
            .ok_or(CapseoError::Corrupt("payload truncated"))?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let bytes = self
            .src
            .get(self.pos..self.pos + len)
            .ok_or(CapseoError::Corrupt("payload truncated"))?;
        self.pos += len;
        Ok(bytes)
    }
}

// ── Convenience ──────────────────────────────────────────────────

/// Compress a buffer with a fresh encoder.
pub fn compress(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    QuickLzEncoder::new().compress_into(src, &mut out);
    out
}

/// Decompress a buffer whose original length is known out of band.
pub fn decompress(src: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut out = vec![0; expected_len];
    decompress_into(src, &mut out)?;
    Ok(out)
}
