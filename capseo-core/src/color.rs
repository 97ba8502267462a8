//! BGRA → YUV 4:2:0 conversion and in-place 2× downscaling.
//!
//! Fixed-point BT.601 coefficients with 8 fractional bits. Chroma is
//! computed once per 2×2 block from the block's summed components, which
//! is why its shift is two bits wider than the luma shift.

const FRACTION_BITS: u32 = 8;

/// `round(c * 256)` of the BT.601 studio-swing coefficients.
const fn fixed(c: f64) -> i32 {
    (c * (1 << FRACTION_BITS) as f64 + 0.5) as i32
}

const Y_R: i32 = fixed(0.257);
const Y_G: i32 = fixed(0.504);
const Y_B: i32 = fixed(0.098);

const U_R: i32 = fixed(0.148);
const U_G: i32 = fixed(0.291);
const U_B: i32 = fixed(0.439);

const V_R: i32 = fixed(0.439);
const V_G: i32 = fixed(0.368);
const V_B: i32 = fixed(0.071);

// BGRA byte positions.
const B: usize = 0;
const G: usize = 1;
const R: usize = 2;

/// Luma of one pixel.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    (((Y_R * r as i32 + Y_G * g as i32 + Y_B * b as i32) >> FRACTION_BITS) + 16) as u8
}

/// Cb from component sums over a 2×2 block.
#[inline]
fn chroma_u(r: i32, g: i32, b: i32) -> u8 {
    ((-U_R * r - U_G * g + U_B * b) >> (FRACTION_BITS + 2)).wrapping_add(128) as u8
}

/// Cr from component sums over a 2×2 block.
#[inline]
fn chroma_v(r: i32, g: i32, b: i32) -> u8 {
    ((V_R * r - V_G * g - V_B * b) >> (FRACTION_BITS + 2)).wrapping_add(128) as u8
}

/// Convert a tightly packed BGRA image into planar YUV 4:2:0.
///
/// `src` must hold at least `width * height * 4` bytes and `dst` exactly
/// `width * height * 3 / 2`. Both dimensions must be even.
pub fn bgra_to_yuv420(src: &[u8], width: usize, height: usize, dst: &mut [u8]) {
    let luma_len = width * height;
    let (y_plane, chroma) = dst.split_at_mut(luma_len);
    let (u_plane, v_plane) = chroma.split_at_mut(luma_len / 4);
    let stride = width * 4;
    let half_width = width / 2;

    for y in (0..height).step_by(2) {
        for x in (0..width).step_by(2) {
            let mut sum = [0i32; 3];
            for (dy, dx) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
                let p = (y + dy) * stride + (x + dx) * 4;
                let px = &src[p..p + 4];
                y_plane[(y + dy) * width + x + dx] = luma(px[R], px[G], px[B]);
                sum[0] += px[R] as i32;
                sum[1] += px[G] as i32;
                sum[2] += px[B] as i32;
            }

            let c = (y / 2) * half_width + x / 2;
            u_plane[c] = chroma_u(sum[0], sum[1], sum[2]);
            v_plane[c] = chroma_v(sum[0], sum[1], sum[2]);
        }
    }
}

/// Halve a BGRA image in place.
///
/// Each output pixel averages the colour channels of a 2×2 source block;
/// the fourth byte is left as whatever was stored there. The result
/// occupies the first `(width/2) * (height/2) * 4` bytes.
pub fn downscale_by_2(buffer: &mut [u8], width: usize, height: usize) {
    downscale_in_place(buffer, width, height, 3);
}

/// Halve an ARGB cursor bitmap in place, averaging all four channels so
/// the alpha mask shrinks with the image.
pub fn downscale_argb_by_2(buffer: &mut [u8], width: usize, height: usize) {
    downscale_in_place(buffer, width, height, 4);
}

fn downscale_in_place(buffer: &mut [u8], width: usize, height: usize, channels: usize) {
    let stride = width * 4;
    let out_width = width / 2;

    // The write cursor never passes the read cursor, so one buffer suffices.
    for by in 0..height / 2 {
        for bx in 0..out_width {
            let top = 2 * by * stride + 2 * bx * 4;
            let bottom = top + stride;
            let out = (by * out_width + bx) * 4;
            for c in 0..channels {
                let total = buffer[top + c] as u32
                    + buffer[top + 4 + c] as u32
                    + buffer[bottom + c] as u32
                    + buffer[bottom + 4 + c] as u32;
                buffer[out + c] = (total / 4) as u8;
            }
        }
    }
}
