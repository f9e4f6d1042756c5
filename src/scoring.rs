use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use log::debug;
use serde::ser::SerializeMap;
use serde::Serialize;

use crate::{
    answer_key::AnswerKey,
    decision::Answer,
    types::{QuestionNumber, SubjectId},
};

/// Splits the question range into equal, contiguous subject blocks.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SubjectLayout {
    pub subject_count: u32,
    pub per_subject: u32,
}

impl Default for SubjectLayout {
    fn default() -> Self {
        Self {
            subject_count: 5,
            per_subject: 20,
        }
    }
}

impl SubjectLayout {
    /// The last question that is scored, saturating at `u32::MAX`.
    pub fn scored_questions(&self) -> QuestionNumber {
        self.subject_count.saturating_mul(self.per_subject)
    }

    /// Each subject with its inclusive range of question numbers. Blocks
    /// that would run past `u32::MAX` are left out.
    pub fn blocks(&self) -> impl Iterator<Item = (SubjectId, RangeInclusive<QuestionNumber>)> {
        let per_subject = self.per_subject;
        (0..self.subject_count).map_while(move |s| {
            let start = s.checked_mul(per_subject)?.checked_add(1)?;
            let end = (s + 1).checked_mul(per_subject)?;
            Some((SubjectId::numbered(s + 1), start..=end))
        })
    }
}

/// Correct-answer counts per subject, in subject order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubjectScores(Vec<(SubjectId, u32)>);

impl SubjectScores {
    pub fn get(&self, subject: &SubjectId) -> Option<u32> {
        self.0
            .iter()
            .find(|(id, _)| id == subject)
            .map(|(_, correct)| *correct)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(SubjectId, u32)> {
        self.0.iter()
    }

    pub fn total(&self) -> u32 {
        self.0.iter().map(|(_, correct)| correct).sum()
    }
}

// Written as a JSON object keyed by subject, keeping subject order.
impl Serialize for SubjectScores {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (subject, correct) in &self.0 {
            map.serialize_entry(subject, correct)?;
        }
        map.end()
    }
}

/// Counts, per subject, the questions whose decided answer matches the key.
/// Questions without a key entry never count, and questions past the last
/// subject are not scored.
pub fn score(
    answers: &BTreeMap<QuestionNumber, Answer>,
    key: &AnswerKey,
    layout: &SubjectLayout,
) -> (SubjectScores, u32) {
    debug!(
        "scoring questions 1..={} in {} subjects",
        layout.scored_questions(),
        layout.subject_count
    );
    let scores = layout
        .blocks()
        .map(|(subject, questions)| {
            let correct = questions
                .filter(|question| match (key.get(*question), answers.get(question)) {
                    (Some(expected), Some(Answer::Selected(actual))) => expected == *actual,
                    _ => false,
                })
                .count() as u32;
            (subject, correct)
        })
        .collect::<Vec<_>>();

    let scores = SubjectScores(scores);
    let total = scores.total();
    (scores, total)
}
