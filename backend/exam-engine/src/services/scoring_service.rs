//! The scoring engine: grades stored answers on finalize, aggregates per-skill
//! scores, derives the overall score and level, and feeds level progression.

use chrono::Utc;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ExamError, ExamResult};
use crate::metrics::{ANSWERS_GRADED_TOTAL, SCORE_OVERRIDES_TOTAL, SESSIONS_ACTIVE, SESSIONS_TOTAL};
use crate::models::{
    Answer, CefrLevel, ExamSession, Question, QuestionType, SessionStatus, Skill,
};
use crate::stores::{AnswerStore, AudioStore, QuestionCatalog, SessionStore};
use crate::utils::text;

use super::evaluation::{EvaluationRequest, TextEvaluator};
use super::level_service::LevelService;
use super::transcription::SpeechTranscriber;

/// Open-text answers at or above this score count as correct.
const PASSING_SCORE: f64 = 60.0;

/// Skill bucket used when a session produced nothing scoreable and no
/// fallback name was supplied, and when an override finds no answered
/// question to borrow a skill from.
const GENERAL_SKILL: &str = "GENERAL";

/// Per-skill running means, keyed by skill name so the fallback bucket can
/// coexist with real skills.
#[derive(Debug, Default)]
struct SkillScores {
    scores: BTreeMap<String, (f64, u32)>,
}

impl SkillScores {
    /// True running mean per skill: each contribution is weighted equally no
    /// matter how many answers share the skill.
    fn add(&mut self, skill: &str, score: f64) {
        let entry = self.scores.entry(skill.to_string()).or_insert((0.0, 0));
        entry.1 += 1;
        entry.0 += (score - entry.0) / entry.1 as f64;
    }

    fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    fn overall(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.scores.values().map(|(mean, _)| mean).sum();
        round1(sum / self.scores.len() as f64)
    }

    fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.scores.iter().map(|(k, (mean, _))| (k.as_str(), *mean))
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

struct GradedAnswer {
    score: f64,
    correct: bool,
    commentary: Option<String>,
    transcript: Option<String>,
}

pub struct ScoringService {
    sessions: Arc<dyn SessionStore>,
    answers: Arc<dyn AnswerStore>,
    catalog: Arc<dyn QuestionCatalog>,
    audio: Arc<dyn AudioStore>,
    evaluator: Arc<dyn TextEvaluator>,
    transcriber: Arc<dyn SpeechTranscriber>,
    levels: LevelService,
}

impl ScoringService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        answers: Arc<dyn AnswerStore>,
        catalog: Arc<dyn QuestionCatalog>,
        audio: Arc<dyn AudioStore>,
        evaluator: Arc<dyn TextEvaluator>,
        transcriber: Arc<dyn SpeechTranscriber>,
        levels: LevelService,
    ) -> Self {
        Self {
            sessions,
            answers,
            catalog,
            audio,
            evaluator,
            transcriber,
            levels,
        }
    }

    /// Grades every stored answer, aggregates scores, stamps the session and
    /// updates level progression. Once past the lifecycle checks this always
    /// produces a result: evaluator and transcription trouble degrade to
    /// their fallbacks instead of aborting.
    pub async fn finalize(
        &self,
        session_id: Uuid,
        fallback_skill: Option<&str>,
    ) -> ExamResult<ExamSession> {
        let mut session = self
            .sessions
            .by_id(session_id)
            .await?
            .ok_or(ExamError::SessionNotFound(session_id))?;

        match session.status {
            SessionStatus::InProgress => {
                if session.deadline_passed(Utc::now()) {
                    self.expire(&mut session).await?;
                    return Err(ExamError::SessionExpired(session_id));
                }
            }
            SessionStatus::Expired => return Err(ExamError::SessionExpired(session_id)),
            _ => return Err(ExamError::SessionNotActive(session_id)),
        }

        let stored = self.answers.by_session(session_id).await?;
        tracing::info!("Finalizing session {} with {} answers", session_id, stored.len());

        let mut skill_scores = SkillScores::default();
        let mut commentary = Vec::new();
        let mut transcripts = Vec::new();

        for mut answer in stored {
            let Some(question) = self.catalog.by_id(answer.question_id).await? else {
                tracing::warn!(
                    "Question {} missing from catalog, skipping answer",
                    answer.question_id
                );
                continue;
            };

            let graded = self.grade(&mut answer, &question).await?;

            answer.is_correct = Some(graded.correct);
            self.answers.upsert(answer).await?;

            ANSWERS_GRADED_TOTAL
                .with_label_values(&[if graded.correct { "true" } else { "false" }])
                .inc();

            skill_scores.add(question.skill.as_str(), graded.score);
            if let Some(note) = graded.commentary {
                commentary.push(note);
            }
            if let Some(transcript) = graded.transcript {
                transcripts.push(transcript);
            }
        }

        // A session must never end up scoreless
        if skill_scores.is_empty() {
            let bucket = fallback_skill.unwrap_or(GENERAL_SKILL);
            tracing::info!(
                "Session {} produced no scoreable answers, recording zero under {}",
                session_id,
                bucket
            );
            skill_scores.add(bucket, 0.0);
        }

        let overall = skill_scores.overall();
        let detected = CefrLevel::from_score(overall);
        let now = Utc::now();

        session.overall_score = overall;
        session.detected_level = Some(detected);
        session.status = SessionStatus::Completed;
        session.completed_at = Some(now);
        session.last_activity = now;
        session.feedback = Some(compose_feedback(detected, &commentary, &transcripts));
        self.sessions.update(&session).await?;

        SESSIONS_TOTAL.with_label_values(&["completed"]).inc();
        SESSIONS_ACTIVE.dec();

        for (skill_name, score) in skill_scores.iter() {
            match Skill::from_str(skill_name) {
                Ok(skill) => {
                    self.levels
                        .record_skill_result(session.student_id, skill, CefrLevel::from_score(score))
                        .await?;
                }
                // The fallback bucket has no skill field; refresh the summary only
                Err(_) => {
                    self.levels.update_overall_level(session.student_id).await?;
                }
            }
        }

        tracing::info!(
            "Session {} completed: score={}, level={}",
            session_id,
            overall,
            detected
        );
        Ok(session)
    }

    /// Manual score correction. Session existence is the only precondition.
    pub async fn override_score(&self, session_id: Uuid, new_score: f64) -> ExamResult<ExamSession> {
        let mut session = self
            .sessions
            .by_id(session_id)
            .await?
            .ok_or(ExamError::SessionNotFound(session_id))?;

        let score = round1(new_score.clamp(0.0, 100.0));
        let detected = CefrLevel::from_score(score);
        session.overall_score = score;
        session.detected_level = Some(detected);
        self.sessions.update(&session).await?;

        SCORE_OVERRIDES_TOTAL.inc();

        // The affected skill comes from the first answered question
        let first_skill = match self.answers.by_session(session_id).await?.first() {
            Some(answer) => self
                .catalog
                .by_id(answer.question_id)
                .await?
                .map(|q| q.skill),
            None => None,
        };

        match first_skill {
            Some(skill) => {
                self.levels
                    .record_skill_result(session.student_id, skill, detected)
                    .await?;
            }
            None => {
                tracing::info!(
                    "Override on session {} has no answered question, updating {} summary only",
                    session_id,
                    GENERAL_SKILL
                );
                self.levels.update_overall_level(session.student_id).await?;
            }
        }

        tracing::info!(
            "Score override on session {}: score={}, level={}",
            session_id,
            score,
            detected
        );
        Ok(session)
    }

    /// Grades a single answer according to its question type. Speaking
    /// answers are transcribed first and the transcript is written back into
    /// the answer's text content.
    async fn grade(&self, answer: &mut Answer, question: &Question) -> ExamResult<GradedAnswer> {
        // Objective grading whenever an answer key exists
        if question.question_type == QuestionType::MultipleChoice {
            let correct = match (answer.selected_option_id, question.correct_option()) {
                (Some(selected), Some(key)) => selected == key.id,
                _ => false,
            };
            return Ok(GradedAnswer {
                score: if correct { 100.0 } else { 0.0 },
                correct,
                commentary: None,
                transcript: None,
            });
        }

        if let Some(key) = question.correct_option() {
            // Fill-in: normalized exact match against the canonical text
            let submitted = answer.content.as_deref().unwrap_or_default();
            let correct = text::normalize(submitted) == text::normalize(&key.content);
            return Ok(GradedAnswer {
                score: if correct { 100.0 } else { 0.0 },
                correct,
                commentary: None,
                transcript: None,
            });
        }

        // Open-ended: transcribe speaking answers, then evaluate the text
        let mut transcript = None;
        let evaluated_text = if question.skill == Skill::Speaking {
            match self.resolve_audio(answer).await {
                Some(audio) => {
                    // The hybrid transcriber absorbs provider failures
                    let transcribed = match self.transcriber.transcribe(&audio).await {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!("Transcription unavailable for session {}: {}", answer.session_id, e);
                            String::new()
                        }
                    };
                    answer.content = Some(transcribed.clone());
                    transcript = Some(transcribed.clone());
                    transcribed
                }
                None => String::new(),
            }
        } else {
            answer.content.clone().unwrap_or_default()
        };

        if evaluated_text.is_empty() {
            return Ok(GradedAnswer {
                score: 0.0,
                correct: false,
                commentary: None,
                transcript,
            });
        }

        let request = EvaluationRequest {
            text: evaluated_text,
            topic: question.prompt.clone(),
            level: question.difficulty,
            keywords: question.keyword_list(),
        };

        // The hybrid evaluator resolves remote failures internally; an error
        // from a custom evaluator still must not abort finalize
        let (score, commentary) = match self.evaluator.evaluate(&request).await {
            Ok(evaluation) => (evaluation.score.clamp(0.0, 100.0), Some(evaluation.feedback)),
            Err(e) => {
                tracing::warn!("Evaluation failed for session {}: {}", answer.session_id, e);
                (0.0, None)
            }
        };

        Ok(GradedAnswer {
            score,
            correct: score >= PASSING_SCORE,
            commentary,
            transcript,
        })
    }

    /// Resolves the stored audio reference; any trouble reads as "no audio"
    /// so grading proceeds with an empty text.
    async fn resolve_audio(&self, answer: &Answer) -> Option<Vec<u8>> {
        let reference = answer.audio_reference.as_deref()?;
        match self.audio.fetch(reference).await {
            Ok(Some(bytes)) => Some(bytes),
            Ok(None) => {
                tracing::warn!("Audio reference {} not found", reference);
                None
            }
            Err(e) => {
                tracing::warn!("Audio store failure for {}: {}", reference, e);
                None
            }
        }
    }

    async fn expire(&self, session: &mut ExamSession) -> ExamResult<()> {
        session.status = SessionStatus::Expired;
        self.sessions.update(session).await?;

        SESSIONS_TOTAL.with_label_values(&["expired"]).inc();
        SESSIONS_ACTIVE.dec();
        tracing::info!("Session {} expired (deadline {})", session.id, session.deadline);
        Ok(())
    }
}

fn compose_feedback(level: CefrLevel, commentary: &[String], transcripts: &[String]) -> String {
    let mut feedback = format!("Detected level: {}. {}", level, level.band_summary());

    if !commentary.is_empty() {
        feedback.push_str("\n\nExaminer notes:");
        for note in commentary {
            feedback.push_str("\n- ");
            feedback.push_str(note);
        }
    }

    if !transcripts.is_empty() {
        feedback.push_str("\n\nTranscribed speech:");
        for transcript in transcripts {
            feedback.push_str("\n\"");
            feedback.push_str(transcript);
            feedback.push('"');
        }
    }

    feedback
}
