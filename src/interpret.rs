use std::collections::BTreeMap;
use std::fmt::Display;

use image::{DynamicImage, GrayImage, RgbImage};
use log::{debug, warn};
use logging_timer::time;
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    debug::{draw_alignment_debug_image, draw_page_debug_image},
    decision::{decide, Answer, Decision, DecisionThresholds},
    preprocess::preprocess_gray,
    registration::{align_with_registration_marks, AlignmentResult},
    sampler::{bubble_radius_px, sample_darkness},
    template::Template,
    types::{OptionLabel, Size},
};

/// Question id to verdict, ordered by id.
pub type AnswerMap = BTreeMap<u32, Answer>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InterpretOptions {
    /// Correct skew and offset using the template's registration marks.
    pub align: bool,
    /// Render an annotated copy of the working image.
    pub debug: bool,
    pub thresholds: DecisionThresholds,
}

impl Default for InterpretOptions {
    fn default() -> Self {
        Self {
            align: true,
            debug: false,
            thresholds: DecisionThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterpretPageError {
    EmptyImage { width: u32, height: u32 },
    InvalidReferenceSize(Size<u32>),
}

impl Display for InterpretPageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterpretPageError::EmptyImage { width, height } => {
                write!(f, "image has no pixels ({}x{})", width, height)
            }
            InterpretPageError::InvalidReferenceSize(size) => write!(
                f,
                "template reference size {}x{} has a zero dimension",
                size.width, size.height
            ),
        }
    }
}

impl std::error::Error for InterpretPageError {}

/// One sampled bubble in working-image pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredBubble {
    pub option: OptionLabel,
    pub center: (i32, i32),
    pub darkness: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredQuestion {
    pub id: u32,
    pub bubbles: Vec<ScoredBubble>,
    pub decision: Decision,
}

#[derive(Debug, Clone)]
pub struct InterpretedPage {
    pub answers: AnswerMap,
    pub alignment: AlignmentResult,
    pub scored_questions: Vec<ScoredQuestion>,
    /// Sampling radius used on the working image.
    pub bubble_radius_px: u32,
    pub debug_image: Option<RgbImage>,
    /// The searched image with expected and detected registration marks.
    pub alignment_debug_image: Option<RgbImage>,
}

impl InterpretedPage {
    pub fn answered_count(&self) -> usize {
        self.answers.values().filter(|answer| answer.is_marked()).count()
    }
}

/// Samples every bubble of every question and decides each one.
#[time]
pub fn score_questions(
    mask: &GrayImage,
    template: &Template,
    thresholds: &DecisionThresholds,
) -> (Vec<ScoredQuestion>, u32) {
    let scale = template.scale_factors(Size {
        width: mask.width(),
        height: mask.height(),
    });
    let radius_px = bubble_radius_px(template.bubble_radius, &scale);

    let scored_questions = template
        .questions
        .iter()
        .map(|question| {
            let bubbles = template
                .option_set
                .iter()
                .zip(&question.x_positions)
                .map(|(option, x)| {
                    let center = scale.scale_to_pixel((*x, question.y));
                    ScoredBubble {
                        option: option.clone(),
                        center,
                        darkness: sample_darkness(mask, center.0, center.1, radius_px),
                    }
                })
                .collect::<Vec<_>>();

            if bubbles.is_empty() {
                warn!("question {} has no bubbles to sample", question.id);
            }

            let scores = bubbles
                .iter()
                .map(|bubble| (bubble.option.clone(), bubble.darkness))
                .collect::<Vec<_>>();
            let decision = decide(&scores, thresholds);
            debug!(
                "question {}: {} (top {:.3}, margin {:.3}, threshold {:.2})",
                question.id, decision.answer, decision.top_darkness, decision.margin, decision.threshold
            );

            ScoredQuestion {
                id: question.id,
                bubbles,
                decision,
            }
        })
        .collect();

    (scored_questions, radius_px)
}

/// Builds the answer map, guaranteeing an entry for every id in
/// `1..=question_count`.
pub fn collect_answers(scored_questions: &[ScoredQuestion], question_count: u32) -> AnswerMap {
    let mut answers = scored_questions
        .iter()
        .map(|question| (question.id, question.decision.answer.clone()))
        .collect::<AnswerMap>();
    for id in 1..=question_count {
        answers.entry(id).or_insert(Answer::Unanswered);
    }
    answers
}

/// Reads one page: align, binarize, sample and decide.
#[time]
pub fn interpret_page(
    img: &DynamicImage,
    template: &Template,
    options: &InterpretOptions,
) -> Result<InterpretedPage, InterpretPageError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(InterpretPageError::EmptyImage {
            width: img.width(),
            height: img.height(),
        });
    }
    if template.reference_size.is_empty() {
        return Err(InterpretPageError::InvalidReferenceSize(
            template.reference_size,
        ));
    }

    let gray = img.to_luma8();
    let (working, alignment, alignment_debug_image) = if options.align {
        let (working, alignment) = align_with_registration_marks(&gray, template);
        let overlay = options
            .debug
            .then(|| draw_alignment_debug_image(&gray, template, &alignment));
        (working, alignment, overlay)
    } else {
        (gray, AlignmentResult::Skipped, None)
    };

    let mask = preprocess_gray(&working);
    let (scored_questions, radius_px) = score_questions(&mask, template, &options.thresholds);
    let answers = collect_answers(&scored_questions, template.question_count());

    let debug_image = if options.debug {
        Some(draw_page_debug_image(&mask, &scored_questions, radius_px))
    } else {
        None
    };

    let page = InterpretedPage {
        answers,
        alignment,
        scored_questions,
        bubble_radius_px: radius_px,
        debug_image,
        alignment_debug_image,
    };
    debug!(
        "interpreted page with template {}: {}/{} answered",
        template.name,
        page.answered_count(),
        page.answers.len()
    );
    Ok(page)
}

/// Reads independent pages in parallel. Results are in input order.
#[time]
pub fn interpret_pages(
    images: &[DynamicImage],
    template: &Template,
    options: &InterpretOptions,
) -> Vec<Result<InterpretedPage, InterpretPageError>> {
    images
        .par_iter()
        .map(|img| interpret_page(img, template, options))
        .collect()
}
