//! In-memory store implementations. Each map is guarded by its own RwLock so
//! individual store operations are atomic; compound sequences in the services
//! follow last-write-wins.

use anyhow::Result;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Answer, CefrLevel, ExamSession, LevelRecord, Question, SessionStatus, Skill};

use super::{AnswerStore, AudioStore, LevelStore, QuestionCatalog, SessionStore};

#[derive(Default)]
pub struct InMemoryQuestionCatalog {
    questions: RwLock<HashMap<Uuid, Question>>,
}

impl InMemoryQuestionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, question: Question) {
        self.questions.write().await.insert(question.id, question);
    }
}

#[async_trait]
impl QuestionCatalog for InMemoryQuestionCatalog {
    async fn by_skill_and_difficulty(
        &self,
        skill: Skill,
        difficulty: CefrLevel,
        limit: usize,
    ) -> Result<Vec<Question>> {
        let questions = self.questions.read().await;
        let mut matches: Vec<Question> = questions
            .values()
            .filter(|q| q.active && q.skill == skill && q.difficulty == difficulty)
            .cloned()
            .collect();
        // Random draw, like ORDER BY RANDOM() LIMIT n in a SQL-backed catalog
        matches.shuffle(&mut rand::rng());
        matches.truncate(limit);
        Ok(matches)
    }

    async fn by_id(&self, id: Uuid) -> Result<Option<Question>> {
        Ok(self.questions.read().await.get(&id).cloned())
    }
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, ExamSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session: ExamSession) -> Result<()> {
        self.sessions.write().await.insert(session.id, session);
        Ok(())
    }

    async fn update(&self, session: &ExamSession) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn by_id(&self, id: Uuid) -> Result<Option<ExamSession>> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn active_for_student(&self, student_id: Uuid) -> Result<Option<ExamSession>> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .find(|s| s.student_id == student_id && s.status == SessionStatus::InProgress)
            .cloned())
    }

    async fn by_student(&self, student_id: Uuid) -> Result<Vec<ExamSession>> {
        let mut sessions: Vec<ExamSession> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.student_id == student_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.started_at);
        Ok(sessions)
    }
}

#[derive(Default)]
pub struct InMemoryAnswerStore {
    // Vec preserves first-submission order per session
    answers: RwLock<HashMap<Uuid, Vec<Answer>>>,
}

impl InMemoryAnswerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnswerStore for InMemoryAnswerStore {
    async fn upsert(&self, answer: Answer) -> Result<Answer> {
        let mut answers = self.answers.write().await;
        let rows = answers.entry(answer.session_id).or_default();
        match rows.iter_mut().find(|a| a.question_id == answer.question_id) {
            Some(existing) => *existing = answer.clone(),
            None => rows.push(answer.clone()),
        }
        Ok(answer)
    }

    async fn by_session_and_question(
        &self,
        session_id: Uuid,
        question_id: Uuid,
    ) -> Result<Option<Answer>> {
        Ok(self
            .answers
            .read()
            .await
            .get(&session_id)
            .and_then(|rows| rows.iter().find(|a| a.question_id == question_id))
            .cloned())
    }

    async fn by_session(&self, session_id: Uuid) -> Result<Vec<Answer>> {
        Ok(self
            .answers
            .read()
            .await
            .get(&session_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryLevelStore {
    records: RwLock<HashMap<Uuid, LevelRecord>>,
}

impl InMemoryLevelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LevelStore for InMemoryLevelStore {
    async fn get_or_create(&self, student_id: Uuid) -> Result<LevelRecord> {
        let mut records = self.records.write().await;
        Ok(records
            .entry(student_id)
            .or_insert_with(|| LevelRecord::new(student_id))
            .clone())
    }

    async fn save(&self, record: &LevelRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.student_id, record.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAudioStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryAudioStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, reference: impl Into<String>, bytes: Vec<u8>) {
        self.blobs.write().await.insert(reference.into(), bytes);
    }
}

#[async_trait]
impl AudioStore for InMemoryAudioStore {
    async fn fetch(&self, reference: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().await.get(reference).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn answer(session_id: Uuid, question_id: Uuid, content: &str) -> Answer {
        Answer {
            session_id,
            question_id,
            selected_option_id: None,
            content: Some(content.to_string()),
            audio_reference: None,
            is_correct: None,
            listen_count: 0,
            submitted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn answer_upsert_replaces_instead_of_duplicating() {
        let store = InMemoryAnswerStore::new();
        let (sid, qid) = (Uuid::new_v4(), Uuid::new_v4());

        store.upsert(answer(sid, qid, "first")).await.unwrap();
        store.upsert(answer(sid, qid, "second")).await.unwrap();

        let rows = store.by_session(sid).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn answers_keep_first_submission_order() {
        let store = InMemoryAnswerStore::new();
        let sid = Uuid::new_v4();
        let (q1, q2) = (Uuid::new_v4(), Uuid::new_v4());

        store.upsert(answer(sid, q1, "one")).await.unwrap();
        store.upsert(answer(sid, q2, "two")).await.unwrap();
        store.upsert(answer(sid, q1, "one again")).await.unwrap();

        let rows = store.by_session(sid).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].question_id, q1);
        assert_eq!(rows[1].question_id, q2);
    }

    #[tokio::test]
    async fn level_record_is_created_on_first_access() {
        let store = InMemoryLevelStore::new();
        let student = Uuid::new_v4();

        let record = store.get_or_create(student).await.unwrap();
        assert_eq!(record.overall, crate::models::CefrLevel::A1);
        assert!(record.reading.is_none());
    }
}
