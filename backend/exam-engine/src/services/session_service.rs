//! Exam session lifecycle: creation, idempotent resume, lazy expiry, answer
//! intake under the deadline.

use chrono::{Duration, Utc};
use rand::seq::SliceRandom;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{ExamError, ExamResult};
use crate::metrics::{ANSWERS_SUBMITTED_TOTAL, SESSIONS_ACTIVE, SESSIONS_TOTAL};
use crate::models::{
    Answer, CefrLevel, ExamSession, LevelRecord, QuestionView, SessionStatus, Skill,
    StartExamResponse, SubmitAnswerRequest,
};
use crate::stores::{AnswerStore, QuestionCatalog, SessionStore};

use super::level_service::LevelService;

pub struct SessionService {
    config: Config,
    sessions: Arc<dyn SessionStore>,
    answers: Arc<dyn AnswerStore>,
    catalog: Arc<dyn QuestionCatalog>,
    levels: LevelService,
}

impl SessionService {
    pub fn new(
        config: Config,
        sessions: Arc<dyn SessionStore>,
        answers: Arc<dyn AnswerStore>,
        catalog: Arc<dyn QuestionCatalog>,
        levels: LevelService,
    ) -> Self {
        Self {
            config,
            sessions,
            answers,
            catalog,
            levels,
        }
    }

    /// Starts a new exam session or resumes the student's live one.
    ///
    /// Order matters: the cycle gate runs first, then a stale active session
    /// is expired, then resume or creation. Resuming returns the question set
    /// drawn at creation, unchanged.
    pub async fn start_or_resume(
        &self,
        student_id: Uuid,
        skill: Skill,
        difficulty: CefrLevel,
    ) -> ExamResult<StartExamResponse> {
        self.levels.begin_skill_attempt(student_id, skill).await?;

        let now = Utc::now();
        if let Some(mut active) = self.sessions.active_for_student(student_id).await? {
            if active.deadline_passed(now) {
                self.expire(&mut active).await?;
            } else {
                tracing::info!("Resuming session {} for student {}", active.id, student_id);
                let questions = self.questions_for(&active).await?;
                return Ok(StartExamResponse {
                    session: active,
                    questions,
                    resumed: true,
                });
            }
        }

        let mut drawn = self
            .catalog
            .by_skill_and_difficulty(skill, difficulty, self.config.questions_per_session)
            .await?;
        drawn.shuffle(&mut rand::rng());

        let session = ExamSession {
            id: Uuid::new_v4(),
            student_id,
            skill,
            difficulty,
            started_at: now,
            deadline: now + Duration::minutes(self.config.exam_duration_minutes),
            last_activity: now,
            status: SessionStatus::InProgress,
            overall_score: 0.0,
            detected_level: None,
            feedback: None,
            completed_at: None,
            question_ids: drawn.iter().map(|q| q.id).collect(),
        };
        self.sessions.insert(session.clone()).await?;

        SESSIONS_TOTAL.with_label_values(&["created"]).inc();
        SESSIONS_ACTIVE.inc();
        tracing::info!(
            "Session {} created for student {} ({} {} questions, deadline {})",
            session.id,
            student_id,
            drawn.len(),
            skill,
            session.deadline
        );

        Ok(StartExamResponse {
            questions: drawn.iter().map(QuestionView::from).collect(),
            session,
            resumed: false,
        })
    }

    /// Upserts the answer for (session, question). Resubmission overwrites
    /// the payload fields; the listen counter survives.
    pub async fn submit_answer(
        &self,
        session_id: Uuid,
        question_id: Uuid,
        request: SubmitAnswerRequest,
    ) -> ExamResult<Answer> {
        let mut session = self.active_session_for_write(session_id).await?;

        self.catalog
            .by_id(question_id)
            .await?
            .ok_or(ExamError::QuestionNotFound(question_id))?;

        let now = Utc::now();
        let listen_count = self
            .answers
            .by_session_and_question(session_id, question_id)
            .await?
            .map(|a| a.listen_count)
            .unwrap_or(0);

        let answer = Answer {
            session_id,
            question_id,
            selected_option_id: request.selected_option_id,
            content: request.text_response.clone(),
            audio_reference: request.audio_reference.clone(),
            is_correct: None,
            listen_count,
            submitted_at: now,
        };
        let stored = self.answers.upsert(answer).await?;

        session.last_activity = now;
        self.sessions.update(&session).await?;

        ANSWERS_SUBMITTED_TOTAL.with_label_values(&[request.kind()]).inc();
        tracing::debug!("Answer stored: session={}, question={}", session_id, question_id);

        Ok(stored)
    }

    /// Bumps the replay counter for a listening prompt. Same gating as an
    /// answer submission.
    pub async fn register_listen(&self, session_id: Uuid, question_id: Uuid) -> ExamResult<u32> {
        let mut session = self.active_session_for_write(session_id).await?;

        let now = Utc::now();
        let mut answer = self
            .answers
            .by_session_and_question(session_id, question_id)
            .await?
            .unwrap_or(Answer {
                session_id,
                question_id,
                selected_option_id: None,
                content: None,
                audio_reference: None,
                is_correct: None,
                listen_count: 0,
                submitted_at: now,
            });
        answer.listen_count += 1;
        let count = answer.listen_count;
        self.answers.upsert(answer).await?;

        session.last_activity = now;
        self.sessions.update(&session).await?;

        Ok(count)
    }

    /// Explicit external abandon signal.
    pub async fn abandon(&self, session_id: Uuid) -> ExamResult<ExamSession> {
        let mut session = self.active_session_for_write(session_id).await?;
        session.status = SessionStatus::Abandoned;
        session.last_activity = Utc::now();
        self.sessions.update(&session).await?;

        SESSIONS_TOTAL.with_label_values(&["abandoned"]).inc();
        SESSIONS_ACTIVE.dec();
        tracing::info!("Session {} abandoned", session_id);
        Ok(session)
    }

    /// Session detail with lazy expiry: a session past its deadline is
    /// reported expired on this very access.
    pub async fn session_detail(&self, session_id: Uuid) -> ExamResult<ExamSession> {
        let mut session = self
            .sessions
            .by_id(session_id)
            .await?
            .ok_or(ExamError::SessionNotFound(session_id))?;

        if session.status == SessionStatus::InProgress && session.deadline_passed(Utc::now()) {
            self.expire(&mut session).await?;
        }
        Ok(session)
    }

    pub async fn session_history(&self, student_id: Uuid) -> ExamResult<Vec<ExamSession>> {
        let mut history = self.sessions.by_student(student_id).await?;
        let now = Utc::now();
        for session in history.iter_mut() {
            if session.status == SessionStatus::InProgress && session.deadline_passed(now) {
                self.expire(session).await?;
            }
        }
        Ok(history)
    }

    pub async fn level_record(&self, student_id: Uuid) -> ExamResult<LevelRecord> {
        self.levels.profile(student_id).await
    }

    /// Loads the session and enforces write preconditions: it must exist, be
    /// IN_PROGRESS, and still be inside its deadline. A passed deadline
    /// transitions the session to EXPIRED before the error is raised.
    async fn active_session_for_write(&self, session_id: Uuid) -> ExamResult<ExamSession> {
        let mut session = self
            .sessions
            .by_id(session_id)
            .await?
            .ok_or(ExamError::SessionNotFound(session_id))?;

        if session.status != SessionStatus::InProgress {
            return Err(ExamError::SessionNotActive(session_id));
        }
        if session.deadline_passed(Utc::now()) {
            self.expire(&mut session).await?;
            return Err(ExamError::SessionExpired(session_id));
        }
        Ok(session)
    }

    async fn expire(&self, session: &mut ExamSession) -> ExamResult<()> {
        session.status = SessionStatus::Expired;
        self.sessions.update(session).await?;

        SESSIONS_TOTAL.with_label_values(&["expired"]).inc();
        SESSIONS_ACTIVE.dec();
        tracing::info!("Session {} expired (deadline {})", session.id, session.deadline);
        Ok(())
    }

    async fn questions_for(&self, session: &ExamSession) -> ExamResult<Vec<QuestionView>> {
        let mut questions = Vec::with_capacity(session.question_ids.len());
        for id in &session.question_ids {
            match self.catalog.by_id(*id).await? {
                Some(question) => questions.push(QuestionView::from(&question)),
                None => {
                    tracing::warn!("Question {} from session {} no longer in catalog", id, session.id)
                }
            }
        }
        Ok(questions)
    }
}
