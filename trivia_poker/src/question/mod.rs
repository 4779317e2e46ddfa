//! Question source: supplies the question a round is played on.
//!
//! The engine never picks questions itself. The room coordinator asks a
//! [`QuestionSource`] for one whenever a round is about to be dealt and
//! hands the record to the engine.

pub mod errors;
pub mod models;
pub mod source;

pub use errors::{QuestionError, QuestionResult};
pub use models::{Question, QuestionId};
pub use source::{PgQuestionSource, QuestionSource, StaticQuestionSource};
