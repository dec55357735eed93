use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::types::OptionLabel;

/// Margin above which the winner is considered decisive.
pub const DECISIVE_MARGIN: f64 = 0.2;
/// Margin above which the winner is considered clear, if not decisive.
pub const CLEAR_MARGIN: f64 = 0.1;
/// Minimum darkness for a decisive winner.
pub const DECISIVE_THRESHOLD: f64 = 0.2;
/// Minimum darkness for a clear winner.
pub const CLEAR_THRESHOLD: f64 = 0.3;
/// Minimum darkness when the top two options are close.
pub const AMBIGUOUS_THRESHOLD: f64 = 0.4;

/// Empirically calibrated constants for the adaptive threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionThresholds {
    pub decisive_margin: f64,
    pub clear_margin: f64,
    pub decisive_threshold: f64,
    pub clear_threshold: f64,
    pub ambiguous_threshold: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            decisive_margin: DECISIVE_MARGIN,
            clear_margin: CLEAR_MARGIN,
            decisive_threshold: DECISIVE_THRESHOLD,
            clear_threshold: CLEAR_THRESHOLD,
            ambiguous_threshold: AMBIGUOUS_THRESHOLD,
        }
    }
}

impl DecisionThresholds {
    /// Picks the darkness a winner must exceed given its lead over the
    /// runner-up. Band edges belong to the stricter band.
    pub fn select_threshold(&self, margin: f64) -> f64 {
        if margin > self.decisive_margin {
            self.decisive_threshold
        } else if margin > self.clear_margin {
            self.clear_threshold
        } else {
            self.ambiguous_threshold
        }
    }
}

/// The verdict for a single question.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Answer {
    Marked(OptionLabel),
    Unanswered,
}

pub const UNANSWERED: &str = "unanswered";

impl Answer {
    pub fn is_marked(&self) -> bool {
        matches!(self, Answer::Marked(_))
    }
}

impl Display for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Answer::Marked(label) => write!(f, "{}", label),
            Answer::Unanswered => write!(f, "{}", UNANSWERED),
        }
    }
}

impl Serialize for Answer {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Answer::Marked(label) => serializer.serialize_str(label.as_str()),
            Answer::Unanswered => serializer.serialize_str(UNANSWERED),
        }
    }
}

impl<'de> Deserialize<'de> for Answer {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            UNANSWERED => Answer::Unanswered,
            _ => Answer::Marked(OptionLabel::from(s)),
        })
    }
}

/// A decided question along with the numbers that led to the verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub answer: Answer,
    /// The darkest option, whether or not it cleared the threshold.
    pub top_option: Option<OptionLabel>,
    pub top_darkness: f64,
    pub second_darkness: f64,
    pub margin: f64,
    pub threshold: f64,
}

impl Decision {
    fn unanswered() -> Self {
        Self {
            answer: Answer::Unanswered,
            top_option: None,
            top_darkness: 0.0,
            second_darkness: 0.0,
            margin: 0.0,
            threshold: 0.0,
        }
    }
}

/// Decides which option, if any, was marked. `scores` must be in option-set
/// order; when several options share the top darkness the earliest wins.
/// Non-finite scores are treated as background.
pub fn decide(scores: &[(OptionLabel, f64)], thresholds: &DecisionThresholds) -> Decision {
    if scores.is_empty() {
        return Decision::unanswered();
    }

    let mut ranked = scores
        .iter()
        .map(|(label, darkness)| (label, sanitize(*darkness)))
        .collect::<Vec<_>>();
    // stable, so ties keep option-set order
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    let (top_label, top_darkness) = ranked[0];
    let second_darkness = ranked.get(1).map_or(0.0, |(_, darkness)| *darkness);
    let margin = top_darkness - second_darkness;
    let threshold = thresholds.select_threshold(margin);

    let answer = if top_darkness > threshold {
        Answer::Marked(top_label.clone())
    } else {
        Answer::Unanswered
    };

    Decision {
        answer,
        top_option: Some(top_label.clone()),
        top_darkness,
        second_darkness,
        margin,
        threshold,
    }
}

fn sanitize(darkness: f64) -> f64 {
    if darkness.is_finite() {
        darkness
    } else {
        0.0
    }
}
