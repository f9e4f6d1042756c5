use std::collections::BTreeMap;

use image::RgbImage;
use log::{debug, info};
use logging_timer::time;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    answer_key::AnswerKey,
    bubbles::{binarize, extract, BinarizeOptions, Grid},
    decision::{Answer, DecisionRule, QuestionDecision},
    document::{normalize, BoundaryOptions, RectifiedSheet},
    overlay::{render, OverlayStyle},
    scoring::{score, SubjectLayout, SubjectScores},
    types::{QuestionNumber, MAX_CHOICES, MAX_QUESTIONS},
};

/// Configuration for one grading run. Every field has a default, so a
/// partial JSON object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GradeOptions {
    /// Number of questions reported, numbered from 1.
    pub questions: u32,
    /// Number of answer rows on the sheet, one question per row.
    pub rows: u32,
    pub choices: u32,
    pub threshold: f64,
    pub margin: f64,
    pub subject_count: u32,
    pub per_subject: u32,
    pub threshold_window: u32,
    pub threshold_offset: i32,
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    pub max_candidates: usize,
    pub approx_epsilon_ratio: f64,
}

impl Default for GradeOptions {
    fn default() -> Self {
        let boundary = BoundaryOptions::default();
        let binarize = BinarizeOptions::default();
        let rule = DecisionRule::default();
        let layout = SubjectLayout::default();
        Self {
            questions: 100,
            rows: 25,
            choices: 4,
            threshold: rule.threshold,
            margin: rule.margin,
            subject_count: layout.subject_count,
            per_subject: layout.per_subject,
            threshold_window: binarize.window,
            threshold_offset: binarize.offset,
            blur_sigma: boundary.blur_sigma,
            canny_low: boundary.canny_low,
            canny_high: boundary.canny_high,
            max_candidates: boundary.max_candidates,
            approx_epsilon_ratio: boundary.approx_epsilon_ratio,
        }
    }
}

impl GradeOptions {
    pub fn validate(&self) -> Result<(), GradeError> {
        let invalid =
            |reason: String| -> Result<(), GradeError> { Err(GradeError::InvalidOptions(reason)) };

        if self.questions == 0 || self.questions > MAX_QUESTIONS {
            return invalid(format!("questions must be between 1 and {}", MAX_QUESTIONS));
        }
        if self.rows == 0 || self.rows > MAX_QUESTIONS {
            return invalid(format!("rows must be between 1 and {}", MAX_QUESTIONS));
        }
        if self.choices == 0 || self.choices > MAX_CHOICES {
            return invalid(format!("choices must be between 1 and {}", MAX_CHOICES));
        }
        if !(self.threshold.is_finite() && (0.0..1.0).contains(&self.threshold)) {
            return invalid(format!("threshold {} is not in [0, 1)", self.threshold));
        }
        if !(self.margin.is_finite() && (0.0..1.0).contains(&self.margin)) {
            return invalid(format!("margin {} is not in [0, 1)", self.margin));
        }
        if self.subject_count == 0 || self.per_subject == 0 {
            return invalid("subjects must have at least one question each".into());
        }
        match self.subject_count.checked_mul(self.per_subject) {
            Some(scored) if scored <= MAX_QUESTIONS => {}
            _ => {
                return invalid(format!(
                    "{} subjects of {} questions exceed {} scored questions",
                    self.subject_count, self.per_subject, MAX_QUESTIONS
                ))
            }
        }
        if self.threshold_window < 3 || self.threshold_window % 2 == 0 {
            return invalid(format!(
                "threshold window {} must be odd and at least 3",
                self.threshold_window
            ));
        }
        if !(self.blur_sigma.is_finite() && self.blur_sigma > 0.0) {
            return invalid(format!("blur sigma {} must be positive", self.blur_sigma));
        }
        if !(self.canny_low.is_finite() && self.canny_high.is_finite())
            || self.canny_low > self.canny_high
        {
            return invalid("canny thresholds must be finite with low <= high".into());
        }
        if !(self.approx_epsilon_ratio.is_finite() && self.approx_epsilon_ratio >= 0.0) {
            return invalid("approximation ratio must be non-negative".into());
        }
        Ok(())
    }

    pub fn boundary_options(&self) -> BoundaryOptions {
        BoundaryOptions {
            blur_sigma: self.blur_sigma,
            canny_low: self.canny_low,
            canny_high: self.canny_high,
            max_candidates: self.max_candidates,
            approx_epsilon_ratio: self.approx_epsilon_ratio,
        }
    }

    pub fn binarize_options(&self) -> BinarizeOptions {
        BinarizeOptions {
            blur_sigma: self.blur_sigma,
            window: self.threshold_window,
            offset: self.threshold_offset,
        }
    }

    pub fn decision_rule(&self) -> DecisionRule {
        DecisionRule {
            threshold: self.threshold,
            margin: self.margin,
        }
    }

    pub fn subject_layout(&self) -> SubjectLayout {
        SubjectLayout {
            subject_count: self.subject_count,
            per_subject: self.per_subject,
        }
    }
}

#[derive(Debug, Error)]
pub enum GradeError {
    #[error("invalid grading options: {0}")]
    InvalidOptions(String),
    #[error("sheet image is empty ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
}

/// Everything one grading run produces.
#[derive(Clone, Debug)]
pub struct GradingResult {
    /// One answer for every question from 1 to `questions`.
    pub answers: BTreeMap<QuestionNumber, Answer>,
    pub subject_scores: SubjectScores,
    pub total_score: u32,
    /// Per-row decisions, one for each grid row.
    pub decisions: Vec<QuestionDecision>,
    /// The rectified sheet with selections and unanswered rows marked.
    pub overlay: RgbImage,
    pub rectified: bool,
}

/// Grades a sheet photo or scan against `key`.
///
/// The sheet boundary is located and the image rectified to it; if no
/// boundary is found the whole image is graded as is.
#[time]
pub fn grade(
    img: &RgbImage,
    key: &AnswerKey,
    options: &GradeOptions,
) -> Result<GradingResult, GradeError> {
    options.validate()?;
    check_not_empty(img)?;

    let sheet = normalize(img, &options.boundary_options());
    grade_rectified(&sheet, key, options)
}

/// Grades a sheet that is already in top-down orientation.
#[time]
pub fn grade_rectified(
    sheet: &RectifiedSheet,
    key: &AnswerKey,
    options: &GradeOptions,
) -> Result<GradingResult, GradeError> {
    options.validate()?;
    check_not_empty(&sheet.image)?;

    let mask = binarize(sheet, &options.binarize_options());
    let grid: Grid = extract(&mask, options.rows, options.choices);
    let decisions = options.decision_rule().decide(&grid);

    let answers = (1..=options.questions)
        .map(|question| {
            let answer = decisions
                .get(question as usize - 1)
                .map_or(Answer::Unanswered, |decision| decision.answer);
            (question, answer)
        })
        .collect::<BTreeMap<_, _>>();
    debug!(
        "{} of {} questions answered",
        answers.values().filter(|a| **a != Answer::Unanswered).count(),
        options.questions
    );

    let (subject_scores, total_score) = score(&answers, key, &options.subject_layout());
    let overlay = render(&sheet.image, &grid, &decisions, &OverlayStyle::default());
    info!(
        "graded {}x{} sheet (rectified: {}): total score {}",
        sheet.image.width(),
        sheet.image.height(),
        sheet.was_rectified(),
        total_score
    );

    Ok(GradingResult {
        answers,
        subject_scores,
        total_score,
        decisions,
        overlay,
        rectified: sheet.was_rectified(),
    })
}

fn check_not_empty(img: &RgbImage) -> Result<(), GradeError> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(GradeError::EmptyImage { width, height });
    }
    Ok(())
}
