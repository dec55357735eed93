use std::path::{Path, PathBuf};

use image::{GrayImage, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::{
    decision::Answer,
    image_utils::{gray_to_rgb, BLUE, DARK_GREEN, GREEN, PINK, RED},
    interpret::ScoredQuestion,
    registration::{expected_mark_positions, AlignmentResult, MARK_SEARCH_MARGIN},
    template::{RegistrationMarks, Template},
    types::Size,
};

const DETECTED_MARK_RADIUS: i32 = 4;

/// Creates a path for a debug image.
pub fn debug_image_path(base: &Path, label: &str) -> PathBuf {
    let mut result = PathBuf::from(base);
    result.set_file_name(format!(
        "{}_debug_{}.png",
        base.file_stem().unwrap_or_default().to_string_lossy(),
        label
    ));
    result
}

/// Renders the working image with every sampled bubble and each question's
/// decision drawn on top.
pub fn draw_page_debug_image(
    mask: &GrayImage,
    scored_questions: &[ScoredQuestion],
    bubble_radius_px: u32,
) -> RgbImage {
    let mut canvas = gray_to_rgb(mask);
    draw_scored_bubbles_debug_image_mut(&mut canvas, scored_questions, bubble_radius_px);
    canvas
}

/// Renders the image that was searched for registration marks, with each
/// search window and, when alignment succeeded, the detected marks.
pub fn draw_alignment_debug_image(
    img: &GrayImage,
    template: &Template,
    alignment: &AlignmentResult,
) -> RgbImage {
    let mut canvas = gray_to_rgb(img);
    draw_registration_marks_debug_image_mut(&mut canvas, template);
    if let AlignmentResult::Aligned { marks } = alignment {
        draw_detected_marks_debug_image_mut(&mut canvas, marks);
    }
    canvas
}

/// Draws the search window and expected center of each registration mark.
pub fn draw_registration_marks_debug_image_mut(canvas: &mut RgbImage, template: &Template) {
    let size = Size {
        width: canvas.width(),
        height: canvas.height(),
    };
    let positions = match expected_mark_positions(template, size) {
        Some(positions) => positions,
        None => return,
    };
    let margin = (MARK_SEARCH_MARGIN * template.scale_factors(size).length_scale()).round() as i32;

    for (x, y) in positions {
        let (x, y) = (x.round() as i32, y.round() as i32);
        draw_cross_mut(canvas, PINK, x, y);
        if margin > 0 {
            draw_hollow_rect_mut(
                canvas,
                Rect::at(x.saturating_sub(margin), y.saturating_sub(margin))
                    .of_size(2 * margin as u32, 2 * margin as u32),
                PINK,
            );
        }
    }
}

/// Marks where each registration mark was actually found.
pub fn draw_detected_marks_debug_image_mut(canvas: &mut RgbImage, marks: &RegistrationMarks) {
    for (x, y) in marks.in_order() {
        let center = (x.round() as i32, y.round() as i32);
        draw_hollow_circle_mut(canvas, center, DETECTED_MARK_RADIUS, RED);
        draw_cross_mut(canvas, RED, center.0, center.1);
    }
}

/// Outlines every sampled bubble and rings the darkest option of each
/// question: red when it was accepted as the answer, blue when the question
/// was left unanswered.
pub fn draw_scored_bubbles_debug_image_mut(
    canvas: &mut RgbImage,
    scored_questions: &[ScoredQuestion],
    bubble_radius_px: u32,
) {
    let radius = bubble_radius_px as i32;
    for question in scored_questions {
        for bubble in &question.bubbles {
            draw_hollow_circle_mut(canvas, bubble.center, radius, GREEN);
        }

        let top = question.decision.top_option.as_ref().and_then(|option| {
            question
                .bubbles
                .iter()
                .find(|bubble| &bubble.option == option)
        });
        if let Some(top) = top {
            let color = match question.decision.answer {
                Answer::Marked(_) => RED,
                Answer::Unanswered => BLUE,
            };
            draw_hollow_circle_mut(canvas, top.center, radius + 2, color);
            draw_hollow_circle_mut(canvas, top.center, radius + 3, color);
            if question.decision.answer.is_marked() {
                draw_cross_mut(canvas, DARK_GREEN, top.center.0, top.center.1);
            }
        }
    }
}
