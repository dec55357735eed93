use image::GrayImage;
use imageproc::rect::Rect;

use crate::geometry::ScaleFactors;

/// Smallest sampling half-width, so heavily downscaled pages still cover
/// more than a handful of pixels per bubble.
pub const MIN_BUBBLE_RADIUS_PX: u32 = 4;

/// Converts a template bubble radius into working-image pixels. Fractional
/// pixels are truncated.
pub fn bubble_radius_px(reference_radius: f32, scale: &ScaleFactors) -> u32 {
    let scaled = reference_radius * scale.length_scale();
    (scaled.max(0.0) as u32).max(MIN_BUBBLE_RADIUS_PX)
}

/// The pixel window sampled for a bubble: `[cx - r, cx + r)` on each axis,
/// clipped to the image. `None` when nothing is left after clipping.
pub fn sample_window(mask: &GrayImage, center_x: i32, center_y: i32, radius_px: u32) -> Option<Rect> {
    let radius = radius_px as i64;
    let (cx, cy) = (center_x as i64, center_y as i64);
    let x_min = (cx - radius).max(0);
    let x_max = (cx + radius).min(mask.width() as i64);
    let y_min = (cy - radius).max(0);
    let y_max = (cy + radius).min(mask.height() as i64);

    if x_min >= x_max || y_min >= y_max {
        return None;
    }

    Some(Rect::at(x_min as i32, y_min as i32).of_size((x_max - x_min) as u32, (y_max - y_min) as u32))
}

/// Mean darkness of a bubble window in `[0, 1]`: `0` for pure background,
/// `1` for a completely filled window. Windows that fall entirely outside
/// the image score `0`.
pub fn sample_darkness(mask: &GrayImage, center_x: i32, center_y: i32, radius_px: u32) -> f64 {
    let window = match sample_window(mask, center_x, center_y, radius_px) {
        Some(window) => window,
        None => return 0.0,
    };

    let mut total: u64 = 0;
    for y in window.top()..=window.bottom() {
        for x in window.left()..=window.right() {
            total += (u8::MAX - mask.get_pixel(x as u32, y as u32).0[0]) as u64;
        }
    }

    let area = window.width() as u64 * window.height() as u64;
    total as f64 / (area as f64 * u8::MAX as f64)
}

#[cfg(test)]
mod tests {
    use imageproc::drawing::draw_filled_rect_mut;

    use super::*;
    use crate::image_utils::{BLACK, WHITE};

    fn page_with_square(x: i32, y: i32, size: u32) -> GrayImage {
        let mut mask = GrayImage::from_pixel(100, 100, WHITE);
        draw_filled_rect_mut(&mut mask, Rect::at(x, y).of_size(size, size), BLACK);
        mask
    }

    #[test]
    fn blank_window_is_zero() {
        let mask = GrayImage::from_pixel(100, 100, WHITE);
        assert_eq!(sample_darkness(&mask, 50, 50, 5), 0.0);
    }

    #[test]
    fn filled_window_is_one() {
        let mask = page_with_square(40, 40, 20);
        assert_eq!(sample_darkness(&mask, 50, 50, 5), 1.0);
    }

    #[test]
    fn partially_filled_window() {
        // left half of the 10x10 window is black
        let mask = page_with_square(0, 0, 50);
        assert_eq!(sample_darkness(&mask, 50, 30, 5), 0.5);
    }

    #[test]
    fn window_is_clipped_to_bounds() {
        let mask = GrayImage::from_pixel(100, 100, BLACK);
        let window = sample_window(&mask, 2, 98, 5).unwrap();
        assert_eq!(
            (window.left(), window.top(), window.width(), window.height()),
            (0, 93, 7, 7)
        );
        assert_eq!(sample_darkness(&mask, 2, 98, 5), 1.0);
    }

    #[test]
    fn window_outside_image_scores_zero() {
        let mask = GrayImage::from_pixel(100, 100, BLACK);
        assert_eq!(sample_window(&mask, -50, 50, 5), None);
        assert_eq!(sample_darkness(&mask, -50, 50, 5), 0.0);
        assert_eq!(sample_darkness(&mask, 50, 500, 5), 0.0);
        assert_eq!(sample_darkness(&GrayImage::new(0, 0), 0, 0, 5), 0.0);
    }

    #[test]
    fn radius_uses_larger_axis_and_floor() {
        let scale = ScaleFactors { x: 0.5, y: 2.0 };
        assert_eq!(bubble_radius_px(19.0, &scale), 38);
        let tiny = ScaleFactors { x: 0.1, y: 0.1 };
        assert_eq!(bubble_radius_px(19.0, &tiny), MIN_BUBBLE_RADIUS_PX);
    }

    #[test]
    fn radius_truncates_fractional_pixels() {
        let half = ScaleFactors { x: 0.5, y: 0.5 };
        assert_eq!(bubble_radius_px(13.0, &half), 6);
        let scale = ScaleFactors { x: 1.0, y: 1.45 };
        assert_eq!(bubble_radius_px(10.0, &scale), 14);
    }

    #[test]
    fn darkness_keeps_full_precision() {
        // one dark pixel in a 10x10 window
        let mut mask = GrayImage::from_pixel(100, 100, WHITE);
        mask.put_pixel(50, 50, BLACK);
        assert_eq!(sample_darkness(&mask, 50, 50, 5), 0.01);
    }
}
