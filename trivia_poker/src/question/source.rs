//! Question source implementations.

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use sqlx::{PgPool, Row};
use std::path::Path;
use std::sync::Arc;

use super::{
    errors::{QuestionError, QuestionResult},
    models::{Question, QuestionId},
};

/// Supplies questions on demand.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Draw a question, avoiding `exclude` when any other question exists.
    async fn draw(&self, exclude: Option<QuestionId>) -> QuestionResult<Question>;
}

/// Fixed in-memory question bank.
#[derive(Clone, Debug, Default)]
pub struct StaticQuestionSource {
    questions: Arc<Vec<Question>>,
}

impl StaticQuestionSource {
    /// Build a bank, rejecting it if any question is malformed.
    pub fn new(questions: Vec<Question>) -> QuestionResult<Self> {
        for question in &questions {
            question.validate()?;
        }
        Ok(Self {
            questions: Arc::new(questions),
        })
    }

    /// Parse a JSON array of questions.
    pub fn from_json(json: &str) -> QuestionResult<Self> {
        let questions: Vec<Question> = serde_json::from_str(json)?;
        Self::new(questions)
    }

    pub fn from_file(path: impl AsRef<Path>) -> QuestionResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

#[async_trait]
impl QuestionSource for StaticQuestionSource {
    async fn draw(&self, exclude: Option<QuestionId>) -> QuestionResult<Question> {
        let candidates: Vec<&Question> = self
            .questions
            .iter()
            .filter(|q| Some(q.id) != exclude)
            .collect();

        let mut rng = rand::rng();
        let picked = if candidates.is_empty() {
            self.questions.choose(&mut rng)
        } else {
            candidates.choose(&mut rng).copied()
        };

        picked.cloned().ok_or(QuestionError::NoQuestionAvailable)
    }
}

/// Draws from the `questions` table.
#[derive(Clone)]
pub struct PgQuestionSource {
    pool: Arc<PgPool>,
}

impl PgQuestionSource {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn fetch_random(&self, exclude: Option<QuestionId>) -> QuestionResult<Option<Question>> {
        let row = sqlx::query(
            r#"
            SELECT id, prompt, hint1, hint2, correct_answer, difficulty
            FROM questions
            WHERE approved AND ($1::BIGINT IS NULL OR id <> $1)
            ORDER BY RANDOM()
            LIMIT 1
            "#,
        )
        .bind(exclude)
        .fetch_optional(self.pool.as_ref())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let difficulty: i16 = row.get("difficulty");
        let question = Question {
            id: row.get("id"),
            prompt: row.get("prompt"),
            hints: [row.get("hint1"), row.get("hint2")],
            correct_answer: row.get("correct_answer"),
            difficulty: u8::try_from(difficulty).unwrap_or(0),
        };
        question.validate()?;
        Ok(Some(question))
    }
}

#[async_trait]
impl QuestionSource for PgQuestionSource {
    async fn draw(&self, exclude: Option<QuestionId>) -> QuestionResult<Question> {
        if let Some(question) = self.fetch_random(exclude).await? {
            return Ok(question);
        }
        // Only the excluded question is left, reuse it.
        if exclude.is_some() {
            if let Some(question) = self.fetch_random(None).await? {
                return Ok(question);
            }
        }
        Err(QuestionError::NoQuestionAvailable)
    }
}
