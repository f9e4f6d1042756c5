use std::collections::BTreeMap;
use std::path::Path;

use log::{info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::types::{ChoiceLabel, QuestionNumber};

#[derive(Debug, Error)]
pub enum AnswerKeyError {
    #[error("unable to read answer key {0}: {1}")]
    Io(String, #[source] std::io::Error),
    #[error("answer key is not a JSON object of question numbers to labels: {0}")]
    Json(#[from] serde_json::Error),
}

/// The expected label for each question. Questions without an entry have no
/// correct answer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AnswerKey(BTreeMap<QuestionNumber, ChoiceLabel>);

impl AnswerKey {
    pub fn from_entries(entries: impl IntoIterator<Item = (QuestionNumber, ChoiceLabel)>) -> Self {
        Self(entries.into_iter().collect())
    }

    /// Parses a JSON object such as `{"1": "A", "2": "c"}`. Labels are single
    /// letters in either case. Entries that are not a positive question
    /// number with a single-letter label are skipped; `null` and empty labels
    /// leave the question without an entry.
    pub fn from_json_str(json: &str) -> Result<Self, AnswerKeyError> {
        let raw: BTreeMap<String, Value> = serde_json::from_str(json)?;

        let mut entries = BTreeMap::new();
        for (question, label) in raw {
            let number = match question.trim().parse::<QuestionNumber>() {
                Ok(n) if n > 0 => n,
                _ => {
                    warn!("skipping answer key entry {:?}: not a question number", question);
                    continue;
                }
            };
            let label = match label {
                Value::Null => continue,
                Value::String(label) if label.trim().is_empty() => continue,
                Value::String(label) => label,
                other => {
                    warn!("skipping question {}: label {} is not a string", number, other);
                    continue;
                }
            };
            match ChoiceLabel::parse(&label) {
                Some(label) => {
                    entries.insert(number, label);
                }
                None => warn!("skipping question {}: invalid label {:?}", number, label),
            }
        }

        Ok(Self(entries))
    }

    pub fn from_path(path: &Path) -> Result<Self, AnswerKeyError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| AnswerKeyError::Io(path.display().to_string(), e))?;
        Self::from_json_str(&json)
    }

    pub fn get(&self, question: QuestionNumber) -> Option<ChoiceLabel> {
        self.0.get(&question).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuestionNumber, ChoiceLabel)> + '_ {
        self.0.iter().map(|(q, l)| (*q, *l))
    }
}

/// Supplies a key when the caller has none or theirs cannot be read.
pub trait KeySource {
    fn answer_key(&self, questions: QuestionNumber) -> AnswerKey;
}

/// A reproducible pseudo-random key over `A`..`D`, for demos.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DemoKeySource {
    pub seed: u64,
}

impl Default for DemoKeySource {
    fn default() -> Self {
        Self { seed: 42 }
    }
}

impl KeySource for DemoKeySource {
    fn answer_key(&self, questions: QuestionNumber) -> AnswerKey {
        let mut rng = StdRng::seed_from_u64(self.seed);
        AnswerKey::from_entries((1..=questions).filter_map(|question| {
            ChoiceLabel::from_index(rng.random_range(0..4)).map(|label| (question, label))
        }))
    }
}

/// Reads the key at `path`, or falls back to `fallback` when there is no
/// path or the file cannot be read or parsed.
pub fn load_answer_key(
    path: Option<&Path>,
    fallback: &dyn KeySource,
    questions: QuestionNumber,
) -> AnswerKey {
    let Some(path) = path else {
        info!("no answer key given; using fallback key");
        return fallback.answer_key(questions);
    };

    match AnswerKey::from_path(path) {
        Ok(key) => {
            if key.is_empty() {
                warn!("answer key {} has no usable entries", path.display());
            } else {
                info!("loaded {} answers from {}", key.len(), path.display());
            }
            key
        }
        Err(e) => {
            warn!("{}; using fallback key", e);
            fallback.answer_key(questions)
        }
    }
}
