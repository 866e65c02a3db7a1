//! The "micro CMM": the integer PhotoYCC → RGB pipeline.
//!
//! A full color management engine is overkill for the one conversion chain
//! a Photo CD needs, so the pipeline is a handful of lookup tables and a
//! single 3×3 integer matrix: YCC to Photo CD RGB, gamma decode to CCIR 709
//! linear light, optional D65→D50 chromatic adaptation, and sRGB
//! recompression. All intermediates live in the 0..=1388 index domain
//! where 1024 is nominal white; see [`crate::tables`].

use crate::bands::{band_ranges, run_bands};
use crate::{ColorSpace, WhitePoint};
use crate::tables::{CCIR709_TO_SRGB, F32_OUTPUT, LUT_MAX, TO_LINEAR_LIGHT, U8_OUTPUT, U16_OUTPUT};

/// Neutral chroma values of the PhotoYCC encoding.
const C1_NEUTRAL: i32 = 156;
const C2_NEUTRAL: i32 = 137;

/// A pixel format the pipeline can deliver, keyed by its output table.
pub(crate) trait OutputSample: Copy + Send + Sync {
    /// The opaque alpha value of the format.
    const ALPHA: Self;
    /// Final lookup from the pipeline index domain.
    fn from_index(index: i32) -> Self;
}

impl OutputSample for u8 {
    const ALPHA: Self = 0xff;
    #[inline]
    fn from_index(index: i32) -> Self {
        U8_OUTPUT[index as usize]
    }
}

impl OutputSample for u16 {
    const ALPHA: Self = 0xffff;
    #[inline]
    fn from_index(index: i32) -> Self {
        U16_OUTPUT[index as usize]
    }
}

impl OutputSample for f32 {
    const ALPHA: Self = 1.0;
    #[inline]
    fn from_index(index: i32) -> Self {
        F32_OUTPUT[index as usize]
    }
}

/// The assembled planes feeding one conversion pass.
pub(crate) struct ColorPlanes<'a> {
    pub(crate) luma: &'a [u8],
    /// Chroma planes; `None` in monochrome mode.
    pub(crate) chroma1: Option<&'a [u8]>,
    pub(crate) chroma2: Option<&'a [u8]>,
    /// Luma plane dimensions.
    pub(crate) width: usize,
    pub(crate) height: usize,
    /// log2 of the chroma subsampling still in effect (0 after chroma
    /// interpolation, 1 while chroma sits at half resolution).
    pub(crate) res_shift: u32,
}

/// Output routing: target color space, white point, rotation back to the
/// upright orientation, and the element stride between adjacent pixels.
#[derive(Clone, Copy)]
pub(crate) struct OutputOptions {
    pub(crate) color_space: ColorSpace,
    pub(crate) white: WhitePoint,
    pub(crate) rotation: u32,
    pub(crate) stride: usize,
}

struct Band<'a, T> {
    start_row: usize,
    red: &'a mut [T],
    green: &'a mut [T],
    blue: &'a mut [T],
    alpha: Option<&'a mut [T]>,
}

/// Convert the planes into the caller's buffers, rotated upright.
///
/// Each buffer must hold `width × height × stride` elements, where width
/// and height are the post-rotation dimensions.
pub(crate) fn populate<T: OutputSample>(
    planes: &ColorPlanes<'_>,
    options: &OutputOptions,
    red: &mut [T],
    green: &mut [T],
    blue: &mut [T],
    alpha: Option<&mut [T]>,
) {
    let (out_width, out_height) = if options.rotation % 2 == 1 {
        (planes.height, planes.width)
    } else {
        (planes.width, planes.height)
    };
    let row_len = out_width * options.stride;
    assert!(red.len() >= row_len * out_height, "red buffer too small");
    assert!(green.len() >= row_len * out_height, "green buffer too small");
    assert!(blue.len() >= row_len * out_height, "blue buffer too small");
    if let Some(alpha) = &alpha {
        assert!(alpha.len() >= row_len * out_height, "alpha buffer too small");
    }

    // Carve the output buffers into per-band row ranges; bands touch
    // disjoint destination rows no matter how the image is rotated.
    let mut jobs = Vec::new();
    let mut rest = (red, green, blue, alpha);
    for (start, end) in band_ranges(out_height, 1) {
        let split = (end - start) * row_len;
        let (red, red_rest) = rest.0.split_at_mut(split);
        let (green, green_rest) = rest.1.split_at_mut(split);
        let (blue, blue_rest) = rest.2.split_at_mut(split);
        let (alpha, alpha_rest) = match rest.3 {
            Some(buffer) => {
                let (head, tail) = buffer.split_at_mut(split);
                (Some(head), Some(tail))
            }
            None => (None, None),
        };
        jobs.push(Band { start_row: start, red, green, blue, alpha });
        rest = (red_rest, green_rest, blue_rest, alpha_rest);
    }

    run_bands(jobs, |band| convert_band(planes, options, out_width, band));
}

fn convert_band<T: OutputSample>(
    planes: &ColorPlanes<'_>,
    options: &OutputOptions,
    out_width: usize,
    band: Band<'_, T>,
) {
    let rows = band.red.len() / (out_width * options.stride);
    let chroma_width = planes.width >> planes.res_shift;
    let mut alpha = band.alpha;

    for local_row in 0..rows {
        let out_row = band.start_row + local_row;
        for out_col in 0..out_width {
            // Walk the output upright and gather from the stored
            // orientation, so each band writes contiguous memory.
            let (row, col) = match options.rotation {
                1 => (out_col, planes.width - 1 - out_row),
                2 => (planes.height - 1 - out_row, planes.width - 1 - out_col),
                3 => (planes.height - 1 - out_col, out_row),
                _ => (out_row, out_col),
            };
            let luma = i32::from(planes.luma[col + row * planes.width]);
            let chroma_index =
                (col >> planes.res_shift) + (row >> planes.res_shift) * chroma_width;

            let (r, g, b) = convert_pixel(
                luma,
                planes.chroma1.map(|c| i32::from(c[chroma_index])),
                planes.chroma2.map(|c| i32::from(c[chroma_index])),
                options.color_space,
                options.white,
            );

            let dest = (local_row * out_width + out_col) * options.stride;
            band.red[dest] = T::from_index(r);
            band.green[dest] = T::from_index(g);
            band.blue[dest] = T::from_index(b);
            if let Some(alpha) = alpha.as_deref_mut() {
                alpha[dest] = T::ALPHA;
            }
        }
    }
}

#[inline]
fn clip(value: i32) -> i32 {
    value.clamp(0, LUT_MAX)
}

/// One pixel through the pipeline. Returns indices into the output LUTs.
#[inline]
fn convert_pixel(
    luma: i32,
    chroma1: Option<i32>,
    chroma2: Option<i32>,
    color_space: ColorSpace,
    white: WhitePoint,
) -> (i32, i32, i32) {
    if color_space == ColorSpace::Ycc {
        // The raw PhotoYCC components themselves; 188 is encoded nominal
        // white. Without chroma, luma lands on all three channels.
        let y = clip((luma << 10) / 188);
        let c1 = chroma1.map_or(y, |c| clip((c << 10) / 188));
        let c2 = chroma2.map_or(y, |c| clip((c << 10) / 188));
        return (y, c1, c2);
    }

    // Integer YCC to Photo CD RGB. The scale factors keep every
    // intermediate product inside 32 bits and land nominal white on 1024.
    let li = luma * 5573;
    let c1 = chroma1.map_or(0, |c| (c - C1_NEUTRAL) * 9085);
    let c2 = chroma2.map_or(0, |c| (c - C2_NEUTRAL) * 7461);
    let mut r = clip((li + c2) >> 10);
    let mut g = clip((li >> 10) - c1 / 5278 - c2 / 2012);
    let mut b = clip((li + c1) >> 10);

    if matches!(color_space, ColorSpace::LinearCcir709 | ColorSpace::Srgb) {
        r = i32::from(TO_LINEAR_LIGHT[r as usize]);
        g = i32::from(TO_LINEAR_LIGHT[g as usize]);
        b = i32::from(TO_LINEAR_LIGHT[b as usize]);
        // White balance applies to the processed spaces only, never raw.
        if white == WhitePoint::D50 {
            let (rt, gt, bt) = (r, g, b);
            r = (5930 * rt - 143 * gt + 393 * bt) >> 13;
            g = (-176 * rt + 6268 * gt + 131 * bt) >> 13;
            b = (76 * rt - 128 * gt + 8256 * bt) >> 13;
        }
    }

    if color_space == ColorSpace::Srgb {
        r = i32::from(CCIR709_TO_SRGB[clip(r) as usize]);
        g = i32::from(CCIR709_TO_SRGB[clip(g) as usize]);
        b = i32::from(CCIR709_TO_SRGB[clip(b) as usize]);
    } else {
        r = clip(r);
        g = clip(g);
        b = clip(b);
    }
    (r, g, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_chroma_is_achromatic_in_raw_pcd() {
        for luma in [0, 64, 188, 255] {
            let (r, g, b) = convert_pixel(
                luma,
                Some(C1_NEUTRAL),
                Some(C2_NEUTRAL),
                ColorSpace::RawPcd,
                WhitePoint::D65,
            );
            assert_eq!(r, g);
            assert_eq!(g, b);
        }
    }

    #[test]
    fn monochrome_matches_neutral_chroma() {
        for space in [ColorSpace::RawPcd, ColorSpace::LinearCcir709, ColorSpace::Srgb] {
            for luma in [0, 17, 150, 255] {
                let with_neutral = convert_pixel(
                    luma,
                    Some(C1_NEUTRAL),
                    Some(C2_NEUTRAL),
                    space,
                    WhitePoint::D65,
                );
                let without = convert_pixel(luma, None, None, space, WhitePoint::D65);
                assert_eq!(with_neutral, without);
            }
        }
    }

    #[test]
    fn ycc_is_linear_in_its_inputs() {
        let (y1, c1a, _) =
            convert_pixel(47, Some(80), Some(10), ColorSpace::Ycc, WhitePoint::D65);
        let (y2, c1b, _) =
            convert_pixel(94, Some(160), Some(20), ColorSpace::Ycc, WhitePoint::D65);
        // Doubling the inputs doubles the outputs, up to integer rounding.
        assert!((2 * y1 - y2).abs() <= 1);
        assert!((2 * c1a - c1b).abs() <= 1);
    }

    #[test]
    fn monochrome_ycc_puts_luma_everywhere() {
        let (r, g, b) = convert_pixel(120, None, None, ColorSpace::Ycc, WhitePoint::D65);
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert_eq!(r, (120 << 10) / 188);
    }

    #[test]
    fn indices_stay_in_the_lut_domain() {
        for space in [
            ColorSpace::RawPcd,
            ColorSpace::LinearCcir709,
            ColorSpace::Srgb,
            ColorSpace::Ycc,
        ] {
            for white in [WhitePoint::D65, WhitePoint::D50] {
                for luma in [0, 255] {
                    for chroma in [0, 128, 255] {
                        let (r, g, b) = convert_pixel(
                            luma,
                            Some(chroma),
                            Some(chroma),
                            space,
                            white,
                        );
                        for value in [r, g, b] {
                            assert!((0..=LUT_MAX).contains(&value));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn d50_shifts_the_processed_spaces_only() {
        let d65 = convert_pixel(200, Some(100), Some(200), ColorSpace::RawPcd, WhitePoint::D65);
        let d50 = convert_pixel(200, Some(100), Some(200), ColorSpace::RawPcd, WhitePoint::D50);
        assert_eq!(d65, d50);

        let d65 = convert_pixel(200, Some(100), Some(200), ColorSpace::Srgb, WhitePoint::D65);
        let d50 = convert_pixel(200, Some(100), Some(200), ColorSpace::Srgb, WhitePoint::D50);
        assert_ne!(d65, d50);
    }
}
