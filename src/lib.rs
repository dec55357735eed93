//! Template-based optical mark recognition for multiple-choice answer
//! sheets.
//!
//! A page is read in four steps: the scan is registered against the
//! template's corner marks, binarized, every bubble is sampled for darkness,
//! and each question is decided with an adaptive threshold. See
//! [`interpret::interpret_page`].

pub mod debug;
pub mod decision;
pub mod geometry;
pub mod image_utils;
pub mod interpret;
pub mod preprocess;
pub mod registration;
pub mod sampler;
pub mod template;
pub mod types;

#[cfg(test)]
mod test_utils;

pub use decision::{Answer, DecisionThresholds};
pub use interpret::{
    interpret_page, interpret_pages, AnswerMap, InterpretOptions, InterpretPageError,
    InterpretedPage,
};
pub use registration::{AlignmentFailure, AlignmentResult};
pub use template::{template_for_name, Template};
