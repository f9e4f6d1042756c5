//! Grades optical-mark answer sheets: finds and rectifies the sheet, measures
//! how filled each bubble of a fixed rows × choices grid is, decides one
//! answer per row, and scores the answers per subject against a key.

pub mod answer_key;
pub mod bubbles;
pub mod decision;
pub mod document;
pub mod geometry;
pub mod grade;
pub mod image_utils;
pub mod overlay;
pub mod report;
pub mod scoring;
pub mod types;

pub use answer_key::{load_answer_key, AnswerKey, DemoKeySource, KeySource};
pub use decision::Answer;
pub use grade::{grade, grade_rectified, GradeError, GradeOptions, GradingResult};
pub use types::{ChoiceLabel, QuestionNumber};
