use image::{imageops::FilterType, DynamicImage, GrayImage, Luma, Rgb, RgbImage};

pub const WHITE: Luma<u8> = Luma([u8::MAX]);
pub const BLACK: Luma<u8> = Luma([u8::MIN]);

pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
pub const PINK: Rgb<u8> = Rgb([255, 0, 255]);
pub const DARK_GREEN: Rgb<u8> = Rgb([0, 128, 0]);

/// Shrinks an image so that its longest side is at most `max_side`,
/// preserving aspect ratio. Images already small enough are returned as-is.
pub fn size_image_to_fit(img: &GrayImage, max_side: u32) -> GrayImage {
    let longest = img.width().max(img.height());
    if longest <= max_side {
        return img.clone();
    }

    let ratio = max_side as f32 / longest as f32;
    let width = ((img.width() as f32 * ratio) as u32).max(1);
    let height = ((img.height() as f32 * ratio) as u32).max(1);
    image::imageops::resize(img, width, height, FilterType::Lanczos3)
}

/// Converts a grayscale image into RGB so it can be annotated in colour.
pub fn gray_to_rgb(img: &GrayImage) -> RgbImage {
    DynamicImage::ImageLuma8(img.clone()).into_rgb8()
}

/// True when every pixel has the same intensity.
pub fn is_uniform(img: &GrayImage) -> bool {
    let mut pixels = img.pixels();
    match pixels.next() {
        Some(first) => pixels.all(|p| p == first),
        None => true,
    }
}
