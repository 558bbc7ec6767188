use thiserror::Error;
use uuid::Uuid;

use crate::models::Skill;

/// Failures surfaced to the caller of the engine.
///
/// Evaluator and transcription failures never appear here: the scoring
/// pipeline absorbs them via its fallback paths so that finalize always
/// produces a result for a live session.
#[derive(Debug, Error)]
pub enum ExamError {
    #[error("exam session {0} not found")]
    SessionNotFound(Uuid),

    #[error("question {0} not found")]
    QuestionNotFound(Uuid),

    #[error("session {0} is already completed or expired")]
    SessionNotActive(Uuid),

    /// Distinct from `SessionNotActive`: raising this also transitions the
    /// session to EXPIRED as a side effect.
    #[error("session {0} deadline has passed")]
    SessionExpired(Uuid),

    #[error("the {0} module was already completed in the current cycle")]
    SkillAlreadyCompleted(Skill),

    #[error("storage failure: {0}")]
    Store(#[from] anyhow::Error),
}

pub type ExamResult<T> = Result<T, ExamError>;
