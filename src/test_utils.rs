use image::GrayImage;
use imageproc::{
    drawing::{draw_filled_circle_mut, draw_filled_rect_mut},
    rect::Rect,
};

use crate::{
    image_utils::{BLACK, WHITE},
    template::{grid_questions, RegistrationMarks, Template},
    types::{OptionLabel, Size, TemplateName},
};

/// Side of the square registration marks, in reference pixels.
pub const MARK_SIDE: f32 = 14.0;

/// A small two-block, six-question sheet with marks near the corners.
pub fn mini_template() -> Template {
    Template {
        name: TemplateName::from("mini"),
        version: None,
        option_set: ["A", "B", "C", "D", "E"]
            .into_iter()
            .map(OptionLabel::from)
            .collect(),
        reference_size: Size {
            width: 400,
            height: 300,
        },
        registration_marks: Some(RegistrationMarks {
            p1: (20.0, 20.0),
            p2: (380.0, 20.0),
            p3: (20.0, 280.0),
            p4: (380.0, 280.0),
        }),
        bubble_radius: 8.0,
        questions: grid_questions(
            &[100.0, 150.0, 200.0],
            &[
                vec![60.0, 90.0, 120.0, 150.0, 180.0],
                vec![230.0, 260.0, 290.0, 320.0, 350.0],
            ],
        ),
    }
}

/// The mini sheet read without registration: bubbles are printed at their
/// plain page coordinates.
pub fn mini_template_without_marks() -> Template {
    Template {
        registration_marks: None,
        ..mini_template()
    }
}

/// How a synthetic scan is laid onto its canvas.
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    pub canvas: Size<u32>,
    pub scale: f32,
    pub offset: (f32, f32),
}

impl Placement {
    pub fn exact(template: &Template) -> Self {
        Self::scaled(template, 1.0)
    }

    pub fn scaled(template: &Template, scale: f32) -> Self {
        Self {
            canvas: Size {
                width: (template.reference_size.width as f32 * scale).round() as u32,
                height: (template.reference_size.height as f32 * scale).round() as u32,
            },
            scale,
            offset: (0.0, 0.0),
        }
    }

    fn map(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (x * self.scale + self.offset.0, y * self.scale + self.offset.1)
    }
}

/// Renders a sheet with the given filled option index per question (`None`
/// leaves the question blank). `marks` selects which of p1..p4 are printed.
pub fn render_sheet(
    template: &Template,
    filled: &[Option<usize>],
    placement: Placement,
    marks: [bool; 4],
) -> GrayImage {
    let mut img = GrayImage::from_pixel(placement.canvas.width, placement.canvas.height, WHITE);

    if let Some(registration_marks) = template.registration_marks {
        let side = (MARK_SIDE * placement.scale).round() as u32;
        for (point, printed) in registration_marks.in_order().into_iter().zip(marks) {
            if !printed {
                continue;
            }
            let (cx, cy) = placement.map(point);
            let left = (cx - side as f32 / 2.0).round() as i32;
            let top = (cy - side as f32 / 2.0).round() as i32;
            draw_filled_rect_mut(&mut img, Rect::at(left, top).of_size(side, side), BLACK);
        }
    }

    let radius = (template.bubble_radius * placement.scale).round() as i32;
    for (question, choice) in template.questions.iter().zip(filled) {
        if let Some(option_index) = choice {
            let point = (question.x_positions[*option_index], question.y);
            let (cx, cy) = placement.map(printed_position(template, point));
            draw_filled_circle_mut(&mut img, (cx.round() as i32, cy.round() as i32), radius, BLACK);
        }
    }

    img
}

/// Where a template coordinate ends up on paper. With registration marks the
/// reference rectangle is stretched onto the marks, so `(0, 0)` is printed on
/// p1 and `(width, height)` on p4.
fn printed_position(template: &Template, (x, y): (f32, f32)) -> (f32, f32) {
    let marks = match template.registration_marks {
        Some(marks) => marks,
        None => return (x, y),
    };
    let u = x / template.reference_size.width as f32;
    let v = y / template.reference_size.height as f32;
    (
        marks.p1.0 + u * (marks.p2.0 - marks.p1.0) + v * (marks.p3.0 - marks.p1.0),
        marks.p1.1 + u * (marks.p2.1 - marks.p1.1) + v * (marks.p3.1 - marks.p1.1),
    )
}

pub const ALL_MARKS: [bool; 4] = [true; 4];
