use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Questions are numbered from 1, top to bottom.
pub type QuestionNumber = u32;

/// The largest number of choices a row may have, one per letter `A`..`Z`.
pub const MAX_CHOICES: u32 = 26;

/// The largest number of questions, rows or scored questions a grading run
/// may be configured with.
pub const MAX_QUESTIONS: u32 = 10_000;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Size<T> {
    pub width: T,
    pub height: T,
}

/// One of the fixed, ordered choice labels `A`, `B`, `C`, ... of a row.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChoiceLabel(u8);

impl ChoiceLabel {
    /// The label for the zero-based column `index`, if it is a letter.
    pub fn from_index(index: u32) -> Option<Self> {
        if index < MAX_CHOICES {
            Some(Self(b'A' + index as u8))
        } else {
            None
        }
    }

    /// Parses a single letter, ignoring case and surrounding whitespace.
    pub fn parse(s: &str) -> Option<Self> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => {
                Some(Self(c.to_ascii_uppercase() as u8))
            }
            _ => None,
        }
    }

    /// Zero-based column of this label.
    pub fn index(&self) -> u32 {
        u32::from(self.0 - b'A')
    }

    pub fn as_char(&self) -> char {
        self.0 as char
    }
}

impl Display for ChoiceLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl Serialize for ChoiceLabel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ChoiceLabel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ChoiceLabel::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid choice label: {:?}", s)))
    }
}

// Defines a new type that wraps a String for use as an ID.
macro_rules! idtype {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            #[allow(dead_code)]
            pub fn from(s: String) -> Self {
                Self(s)
            }

            #[allow(dead_code)]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

idtype!(SubjectId);

impl SubjectId {
    /// `subject_1`, `subject_2`, ... for the one-based subject `number`.
    pub fn numbered(number: u32) -> Self {
        Self(format!("subject_{}", number))
    }
}
