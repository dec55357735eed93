use image::{DynamicImage, GrayImage};
use imageproc::contrast::{stretch_contrast, threshold};
use logging_timer::time;

use crate::image_utils::size_image_to_fit;

/// Longest side allowed before the page is downscaled.
pub const MAX_WORKING_SIDE: u32 = 3000;

/// Percentage of pixels discarded from each histogram tail before stretching.
pub const AUTOCONTRAST_CUTOFF_PERCENT: u32 = 2;

/// Luma values strictly below this become foreground (black).
pub const BINARIZE_CUTOFF: u8 = 100;

/// Normalises a decoded page into a two-level mask where marks are `0` and
/// background is `255`.
pub fn preprocess_image(img: &DynamicImage) -> GrayImage {
    preprocess_gray(&img.to_luma8())
}

#[time]
pub fn preprocess_gray(img: &GrayImage) -> GrayImage {
    let img = size_image_to_fit(img, MAX_WORKING_SIDE);
    let img = autocontrast(&img, AUTOCONTRAST_CUTOFF_PERCENT);
    binarize(&img, BINARIZE_CUTOFF)
}

/// Stretches the histogram so that the darkest and lightest surviving values
/// span the full range, after dropping `cutoff_percent` of pixels from each
/// tail.
pub fn autocontrast(img: &GrayImage, cutoff_percent: u32) -> GrayImage {
    match autocontrast_bounds(img, cutoff_percent) {
        Some((lo, hi)) => stretch_contrast(img, lo, hi),
        None => img.clone(),
    }
}

/// The `(lo, hi)` range to stretch, or `None` when the clipped histogram is
/// empty or a single value.
fn autocontrast_bounds(img: &GrayImage, cutoff_percent: u32) -> Option<(u8, u8)> {
    let mut histogram = [0u64; 256];
    for pixel in img.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    let cut = total * cutoff_percent as u64 / 100;

    clip_tail(&mut histogram, cut, 0..=255);
    clip_tail(&mut histogram, cut, (0..=255).rev());

    let lo = histogram.iter().position(|&count| count > 0)?;
    let hi = histogram.iter().rposition(|&count| count > 0)?;
    if hi <= lo {
        return None;
    }
    Some((lo as u8, hi as u8))
}

fn clip_tail(histogram: &mut [u64; 256], mut cut: u64, order: impl Iterator<Item = usize>) {
    for i in order {
        if cut == 0 {
            break;
        }
        let removed = cut.min(histogram[i]);
        histogram[i] -= removed;
        cut -= removed;
    }
}

/// Values below `cutoff` become `0`, everything else `255`.
pub fn binarize(img: &GrayImage, cutoff: u8) -> GrayImage {
    match cutoff {
        0 => GrayImage::from_pixel(img.width(), img.height(), image::Luma([u8::MAX])),
        // `threshold` keeps values strictly above its argument
        _ => threshold(img, cutoff - 1),
    }
}
