use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    bubbles::{Grid, RowScores},
    types::{ChoiceLabel, QuestionNumber},
};

/// The decided answer to one question.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Answer {
    Selected(ChoiceLabel),
    Unanswered,
}

impl Answer {
    pub fn label(&self) -> Option<ChoiceLabel> {
        match self {
            Answer::Selected(label) => Some(*label),
            Answer::Unanswered => None,
        }
    }
}

impl Display for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Answer::Selected(label) => write!(f, "{}", label),
            Answer::Unanswered => Ok(()),
        }
    }
}

// Answers are written as their label, or an empty string when unanswered.
impl Serialize for Answer {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Answer {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s.trim().is_empty() {
            return Ok(Answer::Unanswered);
        }
        ChoiceLabel::parse(&s)
            .map(Answer::Selected)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid answer: {:?}", s)))
    }
}

/// A mark is accepted only when it is both dark enough and clearly darker
/// than the runner-up.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DecisionRule {
    /// Fill fraction the best choice must exceed.
    pub threshold: f64,
    /// Lead the best choice must have over the runner-up.
    pub margin: f64,
}

impl Default for DecisionRule {
    fn default() -> Self {
        Self {
            threshold: 0.4,
            margin: 0.08,
        }
    }
}

/// The outcome for one question, with the scores it was decided from.
#[derive(Clone, Debug, PartialEq)]
pub struct QuestionDecision {
    pub question: QuestionNumber,
    pub scores: RowScores,
    pub answer: Answer,
    pub best: Option<(ChoiceLabel, f64)>,
    pub runner_up: f64,
}

impl QuestionDecision {
    pub fn is_answered(&self) -> bool {
        self.answer != Answer::Unanswered
    }
}

impl DecisionRule {
    pub fn decide_row(&self, question: QuestionNumber, scores: &RowScores) -> QuestionDecision {
        let ranked = scores.ranked();
        let best = ranked.first().copied();
        let runner_up = ranked.get(1).map_or(0.0, |(_, score)| *score);

        let answer = match best {
            Some((label, score)) if score > self.threshold && score - runner_up > self.margin => {
                Answer::Selected(label)
            }
            _ => Answer::Unanswered,
        };

        QuestionDecision {
            question,
            scores: scores.clone(),
            answer,
            best,
            runner_up,
        }
    }

    /// Decides every row of the grid, top to bottom.
    pub fn decide(&self, grid: &Grid) -> Vec<QuestionDecision> {
        grid.iter_rows()
            .map(|(question, scores)| self.decide_row(question, scores))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn decide(scores: &[f64]) -> Answer {
        DecisionRule::default()
            .decide_row(1, &RowScores::new(scores.to_vec()))
            .answer
    }

    fn label(s: &str) -> Answer {
        Answer::Selected(ChoiceLabel::parse(s).unwrap())
    }

    #[test]
    fn clear_mark_is_selected() {
        assert_eq!(decide(&[0.41, 0.30, 0.0, 0.0]), label("A"));
        assert_eq!(decide(&[0.0, 0.05, 0.9, 0.1]), label("C"));
    }

    #[test]
    fn near_tie_is_unanswered() {
        assert_eq!(decide(&[0.41, 0.35, 0.0, 0.0]), Answer::Unanswered);
    }

    #[test]
    fn faint_mark_is_unanswered() {
        assert_eq!(decide(&[0.39, 0.1, 0.0, 0.0]), Answer::Unanswered);
    }

    #[test]
    fn blank_row_is_unanswered() {
        assert_eq!(decide(&[0.0, 0.0, 0.0, 0.0]), Answer::Unanswered);
    }

    #[test]
    fn gap_equal_to_margin_is_unanswered() {
        let rule = DecisionRule {
            threshold: 0.25,
            margin: 0.25,
        };
        let decision = rule.decide_row(1, &RowScores::new(vec![0.5, 0.25]));
        assert_eq!(decision.answer, Answer::Unanswered);
    }

    #[test]
    fn single_choice_compares_against_zero() {
        let decision = DecisionRule::default().decide_row(7, &RowScores::new(vec![0.5]));
        assert_eq!(decision.answer, label("A"));
        assert_eq!(decision.runner_up, 0.0);
        assert_eq!(decision.question, 7);
    }

    #[test]
    fn decision_keeps_its_scores() {
        let decision = DecisionRule::default().decide_row(3, &RowScores::new(vec![0.1, 0.6]));
        assert_eq!(decision.best, Some((ChoiceLabel::parse("B").unwrap(), 0.6)));
        assert_eq!(decision.runner_up, 0.1);
        assert!(decision.is_answered());
    }

    #[test]
    fn answer_serializes_as_label_or_empty() {
        assert_eq!(serde_json::to_string(&label("D")).unwrap(), "\"D\"");
        assert_eq!(serde_json::to_string(&Answer::Unanswered).unwrap(), "\"\"");
        let parsed: Answer = serde_json::from_str("\"\"").unwrap();
        assert_eq!(parsed, Answer::Unanswered);
    }

    proptest! {
        #[test]
        fn selected_answer_clears_both_rules(scores in prop::collection::vec(0.0f64..=1.0, 1..8)) {
            let rule = DecisionRule::default();
            let decision = rule.decide_row(1, &RowScores::new(scores.clone()));
            let mut sorted = scores.clone();
            sorted.sort_by(|a, b| b.total_cmp(a));
            let runner_up = sorted.get(1).copied().unwrap_or(0.0);

            match decision.answer {
                Answer::Selected(label) => {
                    let score = scores[label.index() as usize];
                    prop_assert_eq!(score, sorted[0]);
                    prop_assert!(score > rule.threshold);
                    prop_assert!(score - runner_up > rule.margin);
                }
                Answer::Unanswered => {
                    prop_assert!(sorted[0] <= rule.threshold || sorted[0] - runner_up <= rule.margin);
                }
            }
        }
    }
}
