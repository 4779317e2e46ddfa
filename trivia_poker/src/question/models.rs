use serde::{Deserialize, Serialize};

use super::errors::{QuestionError, QuestionResult};

pub type QuestionId = i64;

pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 5;

/// A question bound to a round. Immutable once dealt.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Question {
    pub id: QuestionId,
    pub prompt: String,
    /// Revealed in order, one per hint stage.
    pub hints: [String; 2],
    pub correct_answer: f64,
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
}

fn default_difficulty() -> u8 {
    MIN_DIFFICULTY
}

impl Question {
    pub fn validate(&self) -> QuestionResult<()> {
        let invalid = |reason: &str| QuestionError::InvalidQuestion {
            id: self.id,
            reason: reason.to_string(),
        };

        if self.prompt.trim().is_empty() {
            return Err(invalid("empty prompt"));
        }
        if self.hints.iter().any(|h| h.trim().is_empty()) {
            return Err(invalid("empty hint"));
        }
        if !self.correct_answer.is_finite() {
            return Err(invalid("answer is not a finite number"));
        }
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&self.difficulty) {
            return Err(invalid("difficulty out of range"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question() -> Question {
        Question {
            id: 1,
            prompt: "How many bones are in the adult human body?".to_string(),
            hints: ["More than 200".to_string(), "Fewer than 210".to_string()],
            correct_answer: 206.0,
            difficulty: 2,
        }
    }

    #[test]
    fn test_valid_question() {
        assert!(question().validate().is_ok());
    }

    #[test]
    fn test_rejects_blank_hint() {
        let mut q = question();
        q.hints[1] = "  ".to_string();
        assert!(matches!(
            q.validate(),
            Err(QuestionError::InvalidQuestion { id: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_nan_answer() {
        let mut q = question();
        q.correct_answer = f64::NAN;
        assert!(q.validate().is_err());
    }

    #[test]
    fn test_difficulty_defaults_when_missing() {
        let json = r#"{"id":3,"prompt":"p","hints":["a","b"],"correct_answer":1.5}"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.difficulty, MIN_DIFFICULTY);
    }
}
