use std::fmt::Display;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    geometry::{polygon_area, ScaleFactors},
    types::{OptionLabel, Size, TemplateName},
};

/// A point in template reference coordinates, `(x, y)`.
pub type ReferencePoint = (f32, f32);

pub const DEFAULT_TEMPLATE_NAME: &str = "enem90_v5";

/// The four fiducial marks printed on the sheet. `p1` is top-left, `p2`
/// top-right, `p3` bottom-left and `p4` bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegistrationMarks {
    pub p1: ReferencePoint,
    pub p2: ReferencePoint,
    pub p3: ReferencePoint,
    pub p4: ReferencePoint,
}

impl RegistrationMarks {
    /// Marks in `p1..p4` order.
    pub fn in_order(&self) -> [ReferencePoint; 4] {
        [self.p1, self.p2, self.p3, self.p4]
    }

    /// The marks as a closed polygon walked around the perimeter.
    fn perimeter(&self) -> [ReferencePoint; 4] {
        [self.p1, self.p2, self.p4, self.p3]
    }

    fn is_degenerate(&self) -> bool {
        let ordered = self.p1.0 < self.p2.0
            && self.p3.0 < self.p4.0
            && self.p1.1 < self.p3.1
            && self.p2.1 < self.p4.1;
        !ordered || polygon_area(&self.perimeter()).abs() < f32::EPSILON
    }
}

/// One row of bubbles: the question id, the shared center y and one center x
/// per option, in option-set order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: u32,
    pub y: f32,
    pub x_positions: Vec<f32>,
}

/// Geometric description of one physical answer-sheet layout. All
/// coordinates are in pixels at `reference_size`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: TemplateName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(alias = "options")]
    pub option_set: Vec<OptionLabel>,
    pub reference_size: Size<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_marks: Option<RegistrationMarks>,
    pub bubble_radius: f32,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateError {
    EmptyOptionSet,
    EmptyQuestionSet,
    ZeroReferenceSize(Size<u32>),
    NonPositiveBubbleRadius(f32),
    OptionCountMismatch {
        question_id: u32,
        expected: usize,
        actual: usize,
    },
    NonContiguousQuestionIds {
        expected: u32,
        actual: u32,
    },
    DegenerateRegistrationMarks(RegistrationMarks),
}

impl Display for TemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateError::EmptyOptionSet => write!(f, "template has no options"),
            TemplateError::EmptyQuestionSet => write!(f, "template has no questions"),
            TemplateError::ZeroReferenceSize(size) => write!(
                f,
                "reference size {}x{} has a zero dimension",
                size.width, size.height
            ),
            TemplateError::NonPositiveBubbleRadius(radius) => {
                write!(f, "bubble radius must be positive, got {}", radius)
            }
            TemplateError::OptionCountMismatch {
                question_id,
                expected,
                actual,
            } => write!(
                f,
                "question {} has {} bubble positions, expected {}",
                question_id, actual, expected
            ),
            TemplateError::NonContiguousQuestionIds { expected, actual } => write!(
                f,
                "question ids must run 1..N in order: expected {}, found {}",
                expected, actual
            ),
            TemplateError::DegenerateRegistrationMarks(marks) => write!(
                f,
                "registration marks do not form a top-left/top-right/bottom-left/bottom-right quadrilateral: {:?}",
                marks
            ),
        }
    }
}

impl std::error::Error for TemplateError {}

#[derive(Debug)]
pub enum LoadTemplateError {
    Io(io::Error),
    Parse(serde_json::Error),
    Invalid(TemplateError),
}

impl Display for LoadTemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadTemplateError::Io(e) => write!(f, "unable to read template: {}", e),
            LoadTemplateError::Parse(e) => write!(f, "unable to parse template: {}", e),
            LoadTemplateError::Invalid(e) => write!(f, "invalid template: {}", e),
        }
    }
}

impl std::error::Error for LoadTemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadTemplateError::Io(e) => Some(e),
            LoadTemplateError::Parse(e) => Some(e),
            LoadTemplateError::Invalid(e) => Some(e),
        }
    }
}

impl From<io::Error> for LoadTemplateError {
    fn from(e: io::Error) -> Self {
        LoadTemplateError::Io(e)
    }
}

impl From<serde_json::Error> for LoadTemplateError {
    fn from(e: serde_json::Error) -> Self {
        LoadTemplateError::Parse(e)
    }
}

impl From<TemplateError> for LoadTemplateError {
    fn from(e: TemplateError) -> Self {
        LoadTemplateError::Invalid(e)
    }
}

impl Template {
    /// Parses a template from JSON and validates it.
    pub fn from_json(json: &str) -> Result<Self, LoadTemplateError> {
        let template: Template = serde_json::from_str(json)?;
        template.validate()?;
        Ok(template)
    }

    /// Reads a JSON template from disk and validates it.
    pub fn from_path(path: &Path) -> Result<Self, LoadTemplateError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), TemplateError> {
        if self.option_set.is_empty() {
            return Err(TemplateError::EmptyOptionSet);
        }
        if self.questions.is_empty() {
            return Err(TemplateError::EmptyQuestionSet);
        }
        if self.reference_size.is_empty() {
            return Err(TemplateError::ZeroReferenceSize(self.reference_size));
        }
        if !(self.bubble_radius > 0.0) {
            return Err(TemplateError::NonPositiveBubbleRadius(self.bubble_radius));
        }

        for (index, question) in self.questions.iter().enumerate() {
            let expected_id = index as u32 + 1;
            if question.id != expected_id {
                return Err(TemplateError::NonContiguousQuestionIds {
                    expected: expected_id,
                    actual: question.id,
                });
            }
            if question.x_positions.len() != self.option_set.len() {
                return Err(TemplateError::OptionCountMismatch {
                    question_id: question.id,
                    expected: self.option_set.len(),
                    actual: question.x_positions.len(),
                });
            }
        }

        if let Some(marks) = self.registration_marks {
            if marks.is_degenerate() {
                return Err(TemplateError::DegenerateRegistrationMarks(marks));
            }
        }

        Ok(())
    }

    /// Number of questions; answer maps always cover ids `1..=question_count`.
    pub fn question_count(&self) -> u32 {
        self.questions.len() as u32
    }

    /// Per-axis factors mapping reference coordinates onto an image of the
    /// given size.
    pub fn scale_factors(&self, image_size: Size<u32>) -> ScaleFactors {
        ScaleFactors::between(self.reference_size, image_size)
    }
}

/// Builds questions for a sheet laid out as side-by-side blocks of rows.
/// Questions are numbered down each block before moving to the next one.
pub fn grid_questions(row_y: &[f32], block_x: &[Vec<f32>]) -> Vec<Question> {
    block_x
        .iter()
        .flat_map(|x_positions| row_y.iter().map(move |y| (*y, x_positions)))
        .enumerate()
        .map(|(i, (y, x_positions))| Question {
            id: i as u32 + 1,
            y,
            x_positions: x_positions.clone(),
        })
        .collect()
}

fn enem_options() -> Vec<OptionLabel> {
    ["A", "B", "C", "D", "E"]
        .into_iter()
        .map(OptionLabel::from)
        .collect()
}

/// 90-question ENEM card rendered at 150 DPI (layout v4.1).
pub fn enem90_template() -> Template {
    let row_y = [
        1212.0, 1240.0, 1269.0, 1300.0, 1330.0, 1358.0, 1389.0, 1419.0, 1449.0, 1478.0, 1507.0,
        1536.0, 1567.0, 1596.0, 1625.0,
    ];
    let block_x = vec![
        vec![157.0, 186.0, 218.0, 249.0, 278.0],
        vec![348.0, 377.0, 407.0, 437.0, 467.0],
        vec![537.0, 567.0, 597.0, 628.0, 658.0],
        vec![727.0, 756.0, 786.0, 817.0, 848.0],
        vec![918.0, 947.0, 977.0, 1008.0, 1037.0],
        vec![1106.0, 1135.0, 1165.0, 1196.0, 1227.0],
    ];

    Template {
        name: TemplateName::from("enem90"),
        version: Some("4.1".to_string()),
        option_set: enem_options(),
        reference_size: Size {
            width: 1240,
            height: 1756,
        },
        registration_marks: Some(RegistrationMarks {
            p1: (15.0, 15.0),
            p2: (1225.0, 15.0),
            p3: (15.0, 1735.0),
            p4: (1225.0, 1735.0),
        }),
        bubble_radius: 13.0,
        questions: grid_questions(&row_y, &block_x),
    }
}

/// 90-question ENEM card rendered at 300 DPI (layout v5.0). The marks frame
/// the answer region rather than the page.
pub fn enem90_v5_template() -> Template {
    let row_y = [
        2436.0, 2490.0, 2550.0, 2610.0, 2672.0, 2730.0, 2790.0, 2852.0, 2910.0, 2971.0, 3030.0,
        3090.0, 3152.0, 3210.0, 3270.0,
    ];
    let block_x = vec![
        vec![180.0, 240.0, 300.0, 362.0, 422.0],
        vec![562.0, 622.0, 684.0, 746.0, 806.0],
        vec![946.0, 1006.0, 1066.0, 1128.0, 1189.0],
        vec![1330.0, 1389.0, 1450.0, 1512.0, 1572.0],
        vec![1714.0, 1773.0, 1834.0, 1896.0, 1957.0],
        vec![2097.0, 2156.0, 2218.0, 2280.0, 2339.0],
    ];

    Template {
        name: TemplateName::from("enem90_v5"),
        version: Some("5.0".to_string()),
        option_set: enem_options(),
        reference_size: Size {
            width: 2481,
            height: 3509,
        },
        registration_marks: Some(RegistrationMarks {
            p1: (50.0, 2400.0),
            p2: (2400.0, 2400.0),
            p3: (50.0, 3400.0),
            p4: (2400.0, 3400.0),
        }),
        bubble_radius: 19.0,
        questions: grid_questions(&row_y, &block_x),
    }
}

pub fn available_template_names() -> Vec<&'static str> {
    vec!["enem90", "enem90_v5"]
}

/// Looks up a builtin template by case-insensitive name, falling back to the
/// default layout when the name is missing or unknown.
pub fn template_for_name(name: Option<&str>) -> Template {
    match name.map(|n| n.to_lowercase()).as_deref() {
        Some("enem90") => enem90_template(),
        Some("enem90_v5") | None => enem90_v5_template(),
        Some(unknown) => {
            log::warn!(
                "unknown template {:?}, using {}",
                unknown,
                DEFAULT_TEMPLATE_NAME
            );
            enem90_v5_template()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn builtin_templates_are_valid() {
        for name in available_template_names() {
            let template = template_for_name(Some(name));
            assert_eq!(template.name.as_str(), name);
            assert_eq!(template.validate(), Ok(()));
            assert_eq!(template.question_count(), 90);
        }
    }

    #[test]
    fn grid_questions_number_down_each_block() {
        let questions = grid_questions(
            &[10.0, 20.0, 30.0],
            &[vec![1.0, 2.0], vec![5.0, 6.0]],
        );
        assert_eq!(questions.len(), 6);
        assert_eq!(questions[2].id, 3);
        assert_eq!(questions[2].y, 30.0);
        assert_eq!(questions[2].x_positions, vec![1.0, 2.0]);
        assert_eq!(questions[3].id, 4);
        assert_eq!(questions[3].y, 10.0);
        assert_eq!(questions[3].x_positions, vec![5.0, 6.0]);
    }

    #[test]
    fn v5_layout_matches_known_bubbles() {
        let template = enem90_v5_template();
        let q16 = &template.questions[15];
        assert_eq!(q16.id, 16);
        assert_eq!(q16.y, 2436.0);
        assert_eq!(q16.x_positions[0], 562.0);
        let q90 = &template.questions[89];
        assert_eq!(q90.y, 3270.0);
        assert_eq!(q90.x_positions[4], 2339.0);
    }

    #[test]
    fn unknown_names_fall_back_to_default() {
        assert_eq!(template_for_name(None).name.as_str(), DEFAULT_TEMPLATE_NAME);
        assert_eq!(
            template_for_name(Some("nope")).name.as_str(),
            DEFAULT_TEMPLATE_NAME
        );
        assert_eq!(template_for_name(Some("ENEM90")).name.as_str(), "enem90");
    }

    #[test]
    fn rejects_option_count_mismatch() {
        let mut template = enem90_template();
        template.questions[4].x_positions.pop();
        assert_eq!(
            template.validate(),
            Err(TemplateError::OptionCountMismatch {
                question_id: 5,
                expected: 5,
                actual: 4
            })
        );
    }

    #[test]
    fn rejects_gaps_in_question_ids() {
        let mut template = enem90_template();
        template.questions.remove(10);
        assert_eq!(
            template.validate(),
            Err(TemplateError::NonContiguousQuestionIds {
                expected: 11,
                actual: 12
            })
        );
    }

    #[test]
    fn rejects_degenerate_marks() {
        let mut template = enem90_template();
        let marks = RegistrationMarks {
            p1: (10.0, 10.0),
            p2: (10.0, 10.0),
            p3: (10.0, 10.0),
            p4: (10.0, 10.0),
        };
        template.registration_marks = Some(marks);
        assert_eq!(
            template.validate(),
            Err(TemplateError::DegenerateRegistrationMarks(marks))
        );

        // swapped corners
        let mut template = enem90_template();
        let marks = RegistrationMarks {
            p1: (1225.0, 15.0),
            p2: (15.0, 15.0),
            p3: (15.0, 1735.0),
            p4: (1225.0, 1735.0),
        };
        template.registration_marks = Some(marks);
        assert!(template.validate().is_err());
    }

    #[test]
    fn rejects_zero_reference_size() {
        let mut template = enem90_template();
        template.reference_size.height = 0;
        assert!(matches!(
            template.validate(),
            Err(TemplateError::ZeroReferenceSize(_))
        ));
    }

    #[test]
    fn loads_json_with_legacy_options_key() {
        let json = r#"{
            "name": "mini",
            "options": ["A", "B"],
            "reference_size": {"width": 100, "height": 50},
            "registration_marks": {"p1": [5, 5], "p2": [95, 5], "p3": [5, 45], "p4": [95, 45]},
            "bubble_radius": 4,
            "questions": [
                {"id": 1, "y": 20, "x_positions": [30, 60]},
                {"id": 2, "y": 30, "x_positions": [30, 60]}
            ]
        }"#;
        let template = Template::from_json(json).unwrap();
        assert_eq!(template.option_set, vec![OptionLabel::from("A"), OptionLabel::from("B")]);
        assert_eq!(template.registration_marks.unwrap().p4, (95.0, 45.0));
        assert_eq!(template.version, None);
    }

    #[test]
    fn from_path_reads_and_validates() {
        let template = enem90_template();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&template).unwrap().as_bytes())
            .unwrap();
        assert_eq!(Template::from_path(file.path()).unwrap(), template);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        bad.write_all(b"{\"name\": 1}").unwrap();
        assert!(matches!(
            Template::from_path(bad.path()),
            Err(LoadTemplateError::Parse(_))
        ));

        assert!(matches!(
            Template::from_path(Path::new("/definitely/not/here.json")),
            Err(LoadTemplateError::Io(_))
        ));
    }
}
