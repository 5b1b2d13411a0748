//! Image normalisation: colour page raster → binary, denoised grayscale.
//!
//! Steps, in order:
//!
//! 1. drop any alpha channel (colour channels kept as-is, no compositing);
//! 2. convert to single-channel 8-bit grayscale;
//! 3. binarise with a global Otsu threshold: pixels strictly above the level
//!    become 255, the rest 0;
//! 4. non-local-means denoising with filter strength 3, a 7×7 template and a
//!    21×21 search window.
//!
//! On a binary image any two patches that differ in even one pixel have a
//! weight of effectively zero at strength 3, so step 4 leaves Otsu output
//! unchanged. [`nl_means_denoise`] detects that case up front and skips the
//! per-pixel search; the general path is kept for non-binary inputs.

use crate::error::NormalizeError;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use std::borrow::Cow;
use tracing::debug;

/// Non-local-means parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NlMeansParams {
    /// Filter strength. Larger values smooth more.
    pub h: f32,
    /// Side of the square comparison patch. Odd.
    pub template_window: u32,
    /// Side of the square search area. Odd.
    pub search_window: u32,
}

impl Default for NlMeansParams {
    fn default() -> Self {
        Self {
            h: 3.0,
            template_window: 7,
            search_window: 21,
        }
    }
}

/// Weights below this are treated as zero.
const MIN_WEIGHT: f32 = 1e-3;

/// Normalise one rendered page for recognition.
pub fn normalize_page(page: &DynamicImage) -> Result<GrayImage, NormalizeError> {
    let (width, height) = (page.width(), page.height());
    if width == 0 || height == 0 {
        return Err(NormalizeError::EmptyImage { width, height });
    }

    let opaque: Cow<'_, DynamicImage> = if page.color().has_alpha() {
        debug!("Dropping alpha channel ({:?})", page.color());
        Cow::Owned(DynamicImage::ImageRgb8(page.to_rgb8()))
    } else {
        Cow::Borrowed(page)
    };

    let gray = image::imageops::grayscale(&*opaque);
    let level = otsu_level(&gray);
    debug!("Otsu level {} for {}x{} page", level, width, height);

    let binary = threshold(&gray, level, ThresholdType::Binary);
    Ok(nl_means_denoise(&binary, NlMeansParams::default()))
}

/// Non-local-means denoising of a grayscale image.
///
/// Each output pixel is the weighted mean of the pixels in its search window,
/// weighted by `exp(-d / h²)` where `d` is the mean squared difference between
/// the two surrounding template patches. Borders are clamped.
pub fn nl_means_denoise(src: &GrayImage, params: NlMeansParams) -> GrayImage {
    let lut = weight_table(params.h);
    let (w, h) = src.dimensions();
    if w == 0 || h == 0 {
        return src.clone();
    }

    let tr = params.template_window / 2;
    let area = u64::from((2 * tr + 1) * (2 * tr + 1));

    if is_fixed_point(src, &lut, area) {
        return src.clone();
    }

    let sr = (params.search_window / 2) as i64;
    let tr = tr as i64;
    let pad = sr + tr;
    let (w, h) = (w as i64, h as i64);
    let pw = w + 2 * pad;

    // Clamped copy so every offset lookup stays in bounds.
    let padded: Vec<u8> = (0..h + 2 * pad)
        .flat_map(move |py| {
            let y = (py - pad).clamp(0, h - 1) as u32;
            (0..pw).map(move |px| {
                let x = (px - pad).clamp(0, w - 1) as u32;
                src.get_pixel(x, y).0[0]
            })
        })
        .collect();
    let at = |x: i64, y: i64| padded[((y + pad) * pw + (x + pad)) as usize];

    // Squared-difference region covers every patch pixel of every centre.
    let rw = w + 2 * tr;
    let rh = h + 2 * tr;
    let iw = (rw + 1) as usize;
    let mut integral = vec![0u64; iw * (rh + 1) as usize];

    let n = (w * h) as usize;
    let mut weight_sum = vec![0f32; n];
    let mut acc = vec![0f32; n];

    for dy in -sr..=sr {
        for dx in -sr..=sr {
            for ry in 0..rh {
                let y = ry - tr;
                let mut row = 0u64;
                for rx in 0..rw {
                    let x = rx - tr;
                    let d = i64::from(at(x, y)) - i64::from(at(x + dx, y + dy));
                    row += (d * d) as u64;
                    let i = (ry as usize + 1) * iw + rx as usize + 1;
                    integral[i] = integral[i - iw] + row;
                }
            }

            let side = (2 * tr + 1) as usize;
            for y in 0..h as usize {
                for x in 0..w as usize {
                    let a = integral[y * iw + x];
                    let b = integral[y * iw + x + side];
                    let c = integral[(y + side) * iw + x];
                    let d = integral[(y + side) * iw + x + side];
                    let dist = ((a + d) - (b + c)) / area;
                    let weight = lut[dist as usize];
                    if weight > 0.0 {
                        let i = y * w as usize + x;
                        weight_sum[i] += weight;
                        acc[i] += weight * f32::from(at(x as i64 + dx, y as i64 + dy));
                    }
                }
            }
        }
    }

    GrayImage::from_fn(w as u32, h as u32, |x, y| {
        let i = y as usize * w as usize + x as usize;
        // The zero offset always contributes weight 1.
        Luma([(acc[i] / weight_sum[i]).round().clamp(0.0, 255.0) as u8])
    })
}

/// `exp(-d / h²)` for every mean squared patch distance `d` in 0..=255².
fn weight_table(h: f32) -> Vec<f32> {
    let h2 = (h * h).max(f32::EPSILON);
    (0..=255u32 * 255)
        .map(|d| {
            let w = (-(d as f32) / h2).exp();
            if w < MIN_WEIGHT {
                0.0
            } else {
                w
            }
        })
        .collect()
}

/// True when denoising cannot change the image: it is constant, or it has
/// exactly two levels whose closest possible non-identical patches already
/// get zero weight.
fn is_fixed_point(src: &GrayImage, lut: &[f32], area: u64) -> bool {
    let mut levels: [Option<u8>; 2] = [None, None];
    for p in src.pixels() {
        let v = p.0[0];
        match levels {
            [None, _] => levels[0] = Some(v),
            [Some(a), _] if a == v => {}
            [Some(_), None] => levels[1] = Some(v),
            [Some(_), Some(b)] if b == v => {}
            _ => return false,
        }
    }
    match levels {
        [Some(a), Some(b)] => {
            let diff = u64::from(a.abs_diff(b));
            lut[(diff * diff / area) as usize] == 0.0
        }
        _ => true,
    }
}
