use imageproc::point::Point;

use crate::types::Size;

/// Per-axis factors between a template's reference frame and a working image.
/// The axes are independent so that scans with different horizontal and
/// vertical DPI still line up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
    pub x: f32,
    pub y: f32,
}

impl ScaleFactors {
    pub fn between(reference: Size<u32>, actual: Size<u32>) -> Self {
        Self {
            x: actual.width as f32 / reference.width as f32,
            y: actual.height as f32 / reference.height as f32,
        }
    }

    /// Lengths (radii, search margins) use the larger factor so that the
    /// more compressed axis is never under-covered.
    pub fn length_scale(&self) -> f32 {
        self.x.max(self.y)
    }

    pub fn scale_point(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (x * self.x, y * self.y)
    }

    /// Scales a reference point and rounds it to the nearest pixel.
    pub fn scale_to_pixel(&self, point: (f32, f32)) -> (i32, i32) {
        let (x, y) = self.scale_point(point);
        (x.round() as i32, y.round() as i32)
    }
}

/// Signed area of a closed polygon (shoelace formula). Positive when the
/// vertices run clockwise in image coordinates (y down).
pub fn polygon_area(points: &[(f32, f32)]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice_area: f32 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|((x0, y0), (x1, y1))| x0 * y1 - x1 * y0)
        .sum();
    twice_area / 2.0
}

/// Centroid of a closed polygon from its first-order moments, or `None` if
/// the polygon has no area.
pub fn polygon_centroid(points: &[(f32, f32)]) -> Option<Point<f32>> {
    let area = polygon_area(points);
    if area.abs() < f32::EPSILON {
        return None;
    }

    let (mut cx, mut cy) = (0.0f32, 0.0f32);
    for ((x0, y0), (x1, y1)) in points.iter().zip(points.iter().cycle().skip(1)) {
        let cross = x0 * y1 - x1 * y0;
        cx += (x0 + x1) * cross;
        cy += (y0 + y1) * cross;
    }

    Some(Point::new(cx / (6.0 * area), cy / (6.0 * area)))
}

pub fn distance_from_point_to_point(p1: &Point<f32>, p2: &Point<f32>) -> f32 {
    ((p1.x - p2.x).powf(2.0) + (p1.y - p2.y).powf(2.0)).sqrt()
}
