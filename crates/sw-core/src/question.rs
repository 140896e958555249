//! Validated user question.

use std::fmt;

/// Rejected caller input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidInputError {
    #[error("Question cannot be empty")]
    EmptyQuestion,
}

/// A non-empty, trimmed question.
///
/// The only way to obtain a `Question` is [`Question::new`], so every
/// value in circulation already satisfies the non-empty invariant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Question(String);

impl Question {
    /// Validate and trim raw input.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, InvalidInputError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(InvalidInputError::EmptyQuestion);
        }

        let question = Self(trimmed.to_string());
        debug_assert!(!question.0.is_empty());
        debug_assert_eq!(question.0.trim(), question.0);
        Ok(question)
    }

    /// The trimmed question text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Question {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Question {
    type Error = InvalidInputError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_blank_input() {
        assert_eq!(Question::new(""), Err(InvalidInputError::EmptyQuestion));
        assert_eq!(Question::new("   "), Err(InvalidInputError::EmptyQuestion));
        assert_eq!(Question::new("\n\t "), Err(InvalidInputError::EmptyQuestion));
    }

    #[test]
    fn test_trims_input() {
        let question = Question::new("  How do I boil an egg?\n").unwrap();
        assert_eq!(question.as_str(), "How do I boil an egg?");
        assert_eq!(question.to_string(), "How do I boil an egg?");
    }
}
