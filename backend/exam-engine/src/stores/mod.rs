//! Collaborator interfaces consumed by the engine.
//!
//! Persistence technology is a deployment concern; the engine only sees these
//! async traits. The in-memory implementations in [`memory`] back the test
//! suite and small demos.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Answer, CefrLevel, ExamSession, LevelRecord, Question, Skill};

pub mod memory;

pub use memory::{
    InMemoryAnswerStore, InMemoryAudioStore, InMemoryLevelStore, InMemoryQuestionCatalog,
    InMemorySessionStore,
};

/// Read access to the question pool. Admin editing of the pool happens
/// elsewhere; the engine only draws and resolves questions.
#[async_trait]
pub trait QuestionCatalog: Send + Sync {
    /// Returns up to `limit` active questions matching skill and difficulty.
    /// Selection order is implementation-defined; the session lifecycle
    /// manager shuffles the result before attaching it to a session.
    async fn by_skill_and_difficulty(
        &self,
        skill: Skill,
        difficulty: CefrLevel,
        limit: usize,
    ) -> Result<Vec<Question>>;

    async fn by_id(&self, id: Uuid) -> Result<Option<Question>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: ExamSession) -> Result<()>;
    async fn update(&self, session: &ExamSession) -> Result<()>;
    async fn by_id(&self, id: Uuid) -> Result<Option<ExamSession>>;
    async fn active_for_student(&self, student_id: Uuid) -> Result<Option<ExamSession>>;
    async fn by_student(&self, student_id: Uuid) -> Result<Vec<ExamSession>>;
}

/// The answer ledger: one row per (session, question), upsertable.
#[async_trait]
pub trait AnswerStore: Send + Sync {
    async fn upsert(&self, answer: Answer) -> Result<Answer>;
    async fn by_session_and_question(
        &self,
        session_id: Uuid,
        question_id: Uuid,
    ) -> Result<Option<Answer>>;
    /// Answers in first-submission order.
    async fn by_session(&self, session_id: Uuid) -> Result<Vec<Answer>>;
}

#[async_trait]
pub trait LevelStore: Send + Sync {
    async fn get_or_create(&self, student_id: Uuid) -> Result<LevelRecord>;
    async fn save(&self, record: &LevelRecord) -> Result<()>;
}

/// Resolves stored audio references for the speech transcriber.
#[async_trait]
pub trait AudioStore: Send + Sync {
    async fn fetch(&self, reference: &str) -> Result<Option<Vec<u8>>>;
}
