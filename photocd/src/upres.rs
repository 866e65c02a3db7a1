//! 2× plane up-resolution, with optional residual addition, and the chroma
//! interpolation driver.

use crate::UpResMethod;
use crate::bands::{band_ranges, run_bands};

/// Up-resolve `base` (of `width/2 × height/2`) into `dest`
/// (`width × height`).
///
/// With `has_deltas`, `dest` arrives pre-filled with signed residual bytes
/// which are added to each interpolated value; the result is clamped to
/// 0..=255 either way. This is how a decoded delta layer and the
/// up-resolved layer below it merge in a single pass.
pub(crate) fn up_res(
    base: &[u8],
    dest: &mut [u8],
    width: usize,
    height: usize,
    method: UpResMethod,
    has_deltas: bool,
) {
    debug_assert_eq!(base.len(), (width / 2) * (height / 2));
    debug_assert_eq!(dest.len(), width * height);

    if method == UpResMethod::Nearest {
        // Pixel-doubling lookup, kept for correctness testing only.
        for row in 0..height {
            for column in 0..width {
                let index = column + row * width;
                let mut sum = i32::from(base[(column >> 1) + (row >> 1) * (width >> 1)]);
                if has_deltas {
                    sum += i32::from(dest[index] as i8);
                    sum = sum.clamp(0, 255);
                }
                dest[index] = sum as u8;
            }
        }
        return;
    }

    // Band boundaries stay even so every band owns whole source rows.
    let ranges = band_ranges(height, 2);
    let mut jobs = Vec::with_capacity(ranges.len());
    let mut rest = dest;
    for (start, end) in ranges {
        let (chunk, tail) = rest.split_at_mut((end - start) * width);
        jobs.push((start, end, chunk));
        rest = tail;
    }

    run_bands(jobs, |(start, end, chunk)| {
        bilinear_band(base, chunk, width, height, has_deltas, start, end);
    });
}

/// The "Kodak standard" bilinear interpolator over one output band.
///
/// Each source cell expands into a 2×2 output block: the cell itself, two
/// two-pixel averages, and a four-pixel average. The four-pixel (1,1)
/// variant matters; averaging only the diagonal produces a visible
/// chequerboard on smooth gradients.
fn bilinear_band(
    base: &[u8],
    chunk: &mut [u8],
    width: usize,
    height: usize,
    has_deltas: bool,
    start_row: usize,
    end_row: usize,
) {
    let base_width = width >> 1;
    let base_height = height >> 1;

    let mut store = |chunk: &mut [u8], index: usize, value: i32| {
        let mut sum = value;
        if has_deltas {
            sum += i32::from(chunk[index] as i8);
        }
        chunk[index] = sum.clamp(0, 255) as u8;
    };

    for row in start_row >> 1..end_row >> 1 {
        let row_plus = (row + 1).min(base_height - 1);
        let out_row = row * 2 - start_row;
        for column in 0..base_width {
            let column_plus = (column + 1).min(base_width - 1);
            let pix = i32::from(base[column + row * base_width]);
            let pix01 = i32::from(base[column_plus + row * base_width]);
            let pix10 = i32::from(base[column + row_plus * base_width]);
            let pix11 = i32::from(base[column_plus + row_plus * base_width]);

            let out = (column << 1) + out_row * width;
            store(chunk, out, pix);
            store(chunk, out + 1, (pix + pix01 + 1) >> 1);
            store(chunk, out + width, (pix + pix10 + 1) >> 1);
            store(chunk, out + width + 1, (pix + pix01 + pix10 + pix11 + 2) >> 2);
        }
    }
}

/// Bring a chroma plane up to luma resolution, doubling once or twice.
///
/// Residuals never apply here; chroma deltas were already merged during
/// layer assembly.
pub(crate) fn interpolate_chroma(
    chroma: &[u8],
    luma_width: usize,
    luma_height: usize,
    passes: u32,
    method: UpResMethod,
) -> Vec<u8> {
    let method = method.min(UpResMethod::Bilinear);
    debug_assert!(passes == 1 || passes == 2);

    let mut result = vec![0u8; luma_width * luma_height];
    if passes == 2 {
        let mut intermediate = vec![0u8; (luma_width >> 1) * (luma_height >> 1)];
        up_res(chroma, &mut intermediate, luma_width >> 1, luma_height >> 1, method, false);
        up_res(&intermediate, &mut result, luma_width, luma_height, method, false);
    } else {
        up_res(chroma, &mut result, luma_width, luma_height, method, false);
    }
    result
}
