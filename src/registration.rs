use image::GrayImage;
use imageproc::{
    contours::{find_contours, BorderType, Contour},
    contrast::otsu_level,
    geometric_transformations::{warp_into, Interpolation, Projection},
    point::Point,
};
use log::{debug, warn};
use logging_timer::time;
use serde::{ser::SerializeStruct, Deserialize, Serialize};

use crate::{
    geometry::{polygon_area, polygon_centroid, ScaleFactors},
    image_utils::{is_uniform, WHITE},
    template::{ReferencePoint, RegistrationMarks, Template},
    types::Size,
};

/// Half-width of the square searched around each expected mark, in
/// reference pixels.
pub const MARK_SEARCH_MARGIN: f32 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentFailure {
    MarksNotFound,
    TemplateWithoutMarks,
}

/// Outcome of registration for one page. `marks` are in the coordinates of
/// the image that was searched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlignmentResult {
    Aligned { marks: RegistrationMarks },
    Failed { reason: AlignmentFailure },
    Skipped,
}

impl AlignmentResult {
    pub fn is_aligned(&self) -> bool {
        matches!(self, AlignmentResult::Aligned { .. })
    }
}

impl Serialize for AlignmentResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("AlignmentResult", 2)?;
        state.serialize_field("aligned", &self.is_aligned())?;
        match self {
            AlignmentResult::Aligned { marks } => state.serialize_field("marks", marks)?,
            AlignmentResult::Failed { reason } => state.serialize_field("reason", reason)?,
            AlignmentResult::Skipped => state.skip_field("reason")?,
        }
        state.end()
    }
}

/// Marks are printed dark; everything at or below Otsu's level is ink.
fn binarize_ink(img: &GrayImage) -> GrayImage {
    let level = otsu_level(img);
    let mut binary = img.clone();
    for pixel in binary.pixels_mut() {
        pixel.0[0] = if pixel.0[0] <= level { u8::MAX } else { u8::MIN };
    }
    binary
}

fn contour_polygon(contour: &Contour<i32>) -> Vec<(f32, f32)> {
    contour
        .points
        .iter()
        .map(|p| (p.x as f32, p.y as f32))
        .collect()
}

/// Finds the centroid of the largest ink blob within `margin` pixels of
/// `expected`, in full-image coordinates.
fn locate_mark(binary: &GrayImage, expected: (i32, i32), margin: i32) -> Option<Point<f32>> {
    let (ex, ey) = expected;
    let x1 = ex.saturating_sub(margin).max(0);
    let y1 = ey.saturating_sub(margin).max(0);
    let x2 = ex.saturating_add(margin).min(binary.width() as i32);
    let y2 = ey.saturating_add(margin).min(binary.height() as i32);
    if x1 >= x2 || y1 >= y2 {
        return None;
    }

    let window = image::imageops::crop_imm(
        binary,
        x1 as u32,
        y1 as u32,
        (x2 - x1) as u32,
        (y2 - y1) as u32,
    )
    .to_image();

    find_contours::<i32>(&window)
        .iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .map(contour_polygon)
        .max_by(|a, b| polygon_area(a).abs().total_cmp(&polygon_area(b).abs()))
        .and_then(|polygon| polygon_centroid(&polygon))
        .map(|centroid| Point::new(centroid.x + x1 as f32, centroid.y + y1 as f32))
}

/// Locates all four registration marks, or `None` if any is missing.
#[time]
pub fn find_registration_marks(img: &GrayImage, template: &Template) -> Option<RegistrationMarks> {
    let expected_marks = template.registration_marks?;
    if template.reference_size.is_empty() || is_uniform(img) {
        return None;
    }

    let scale = template.scale_factors(Size {
        width: img.width(),
        height: img.height(),
    });
    let margin = (MARK_SEARCH_MARGIN * scale.length_scale()).round() as i32;
    let binary = binarize_ink(img);

    let locate = |name: &str, point: ReferencePoint| -> Option<ReferencePoint> {
        let expected = scale.scale_to_pixel(point);
        match locate_mark(&binary, expected, margin) {
            Some(found) => {
                debug!("mark {} expected at {:?}, found at ({}, {})", name, expected, found.x, found.y);
                Some((found.x, found.y))
            }
            None => {
                debug!("mark {} not found near {:?}", name, expected);
                None
            }
        }
    };

    Some(RegistrationMarks {
        p1: locate("p1", expected_marks.p1)?,
        p2: locate("p2", expected_marks.p2)?,
        p3: locate("p3", expected_marks.p3)?,
        p4: locate("p4", expected_marks.p4)?,
    })
}

/// Warps the page so that p1, p2, p3 and p4 land on the top-left, top-right,
/// bottom-left and bottom-right corners of a `reference_size` image. Template
/// coordinates are therefore measured in the frame spanned by the marks. If
/// any mark is missing the original image is returned untouched.
#[time]
pub fn align_with_registration_marks(
    img: &GrayImage,
    template: &Template,
) -> (GrayImage, AlignmentResult) {
    let size = template.reference_size;
    if template.registration_marks.is_none() || size.is_empty() {
        return (
            img.clone(),
            AlignmentResult::Failed {
                reason: AlignmentFailure::TemplateWithoutMarks,
            },
        );
    }

    let not_found = AlignmentResult::Failed {
        reason: AlignmentFailure::MarksNotFound,
    };

    let detected = match find_registration_marks(img, template) {
        Some(marks) => marks,
        None => {
            warn!("registration marks not found; using unaligned image");
            return (img.clone(), not_found);
        }
    };

    let (width, height) = (size.width as f32, size.height as f32);
    let corners = [(0.0, 0.0), (width, 0.0), (0.0, height), (width, height)];
    let projection = match Projection::from_control_points(detected.in_order(), corners) {
        Some(projection) => projection,
        None => {
            warn!("registration marks are degenerate: {:?}", detected);
            return (img.clone(), not_found);
        }
    };

    let mut aligned = GrayImage::from_pixel(size.width, size.height, WHITE);
    warp_into(img, &projection, Interpolation::Bilinear, WHITE, &mut aligned);

    (aligned, AlignmentResult::Aligned { marks: detected })
}

/// Expected mark positions scaled into an image of `size`.
pub fn expected_mark_positions(template: &Template, size: Size<u32>) -> Option<[ReferencePoint; 4]> {
    let marks = template.registration_marks?;
    let scale = ScaleFactors::between(template.reference_size, size);
    Some(marks.in_order().map(|point| scale.scale_point(point)))
}
