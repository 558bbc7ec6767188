#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use uuid::Uuid;

use linguaground_engine::models::{CefrLevel, Question, QuestionOption, QuestionType, Skill};
use linguaground_engine::services::evaluation::{
    Evaluation, EvaluationRequest, EvaluationSource, EvaluatorError, HybridTextEvaluator,
    TextEvaluator,
};
use linguaground_engine::services::transcription::{
    HybridTranscriber, SpeechTranscriber, TranscriberError,
};
use linguaground_engine::stores::{
    InMemoryAnswerStore, InMemoryAudioStore, InMemoryLevelStore, InMemoryQuestionCatalog,
    InMemorySessionStore, SessionStore,
};
use linguaground_engine::{Config, EngineStores, ExamEngine};

pub struct TestApp {
    pub engine: ExamEngine,
    pub catalog: Arc<InMemoryQuestionCatalog>,
    pub sessions: Arc<InMemorySessionStore>,
    pub answers: Arc<InMemoryAnswerStore>,
    pub audio: Arc<InMemoryAudioStore>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "linguaground_engine=debug".into()),
        )
        .try_init();
}

/// Engine wired to in-memory stores with the deterministic fallback evaluator
/// and canned-transcript transcriber (no remote capabilities configured).
pub fn create_test_app() -> TestApp {
    create_test_app_with(
        Arc::new(HybridTextEvaluator::new(None)),
        Arc::new(HybridTranscriber::new(None)),
    )
}

pub fn create_test_app_with(
    evaluator: Arc<dyn TextEvaluator>,
    transcriber: Arc<dyn SpeechTranscriber>,
) -> TestApp {
    init_tracing();

    let catalog = Arc::new(InMemoryQuestionCatalog::new());
    let sessions = Arc::new(InMemorySessionStore::new());
    let answers = Arc::new(InMemoryAnswerStore::new());
    let levels = Arc::new(InMemoryLevelStore::new());
    let audio = Arc::new(InMemoryAudioStore::new());

    let stores = EngineStores {
        sessions: sessions.clone(),
        answers: answers.clone(),
        catalog: catalog.clone(),
        levels: levels.clone(),
        audio: audio.clone(),
    };

    let engine = ExamEngine::new(Config::default(), stores, evaluator, transcriber);

    TestApp {
        engine,
        catalog,
        sessions,
        answers,
        audio,
    }
}

/// Rewrites the stored deadline into the past so the next access observes an
/// expired session.
pub async fn force_deadline_past(app: &TestApp, session_id: Uuid) {
    let mut session = app
        .sessions
        .by_id(session_id)
        .await
        .unwrap()
        .expect("session must exist");
    session.deadline = Utc::now() - chrono::Duration::minutes(1);
    app.sessions.update(&session).await.unwrap();
}

pub fn multiple_choice_question(
    skill: Skill,
    difficulty: CefrLevel,
    prompt: &str,
    correct: &str,
    wrong: &[&str],
) -> Question {
    let mut options = vec![QuestionOption {
        id: Uuid::new_v4(),
        content: correct.to_string(),
        is_correct: true,
    }];
    options.extend(wrong.iter().map(|w| QuestionOption {
        id: Uuid::new_v4(),
        content: w.to_string(),
        is_correct: false,
    }));

    Question {
        id: Uuid::new_v4(),
        prompt: prompt.to_string(),
        question_type: QuestionType::MultipleChoice,
        difficulty,
        skill,
        keywords: None,
        active: true,
        options,
    }
}

pub fn fill_in_question(
    skill: Skill,
    difficulty: CefrLevel,
    prompt: &str,
    canonical: &str,
) -> Question {
    Question {
        id: Uuid::new_v4(),
        prompt: prompt.to_string(),
        question_type: QuestionType::FillIn,
        difficulty,
        skill,
        keywords: None,
        active: true,
        options: vec![QuestionOption {
            id: Uuid::new_v4(),
            content: canonical.to_string(),
            is_correct: true,
        }],
    }
}

pub fn open_question(
    question_type: QuestionType,
    skill: Skill,
    difficulty: CefrLevel,
    prompt: &str,
    keywords: Option<&str>,
) -> Question {
    Question {
        id: Uuid::new_v4(),
        prompt: prompt.to_string(),
        question_type,
        difficulty,
        skill,
        keywords: keywords.map(str::to_string),
        active: true,
        options: vec![],
    }
}

pub async fn seed_question(app: &TestApp, question: Question) -> Question {
    app.catalog.insert(question.clone()).await;
    question
}

/// Evaluator double returning a scripted sequence of scores (the last one
/// repeats once the sequence is exhausted).
pub struct ScriptedEvaluator {
    scores: Mutex<VecDeque<f64>>,
    last: f64,
}

impl ScriptedEvaluator {
    pub fn fixed(score: f64) -> Self {
        Self {
            scores: Mutex::new(VecDeque::new()),
            last: score,
        }
    }

    pub fn sequence(scores: &[f64]) -> Self {
        let last = *scores.last().expect("sequence must not be empty");
        Self {
            scores: Mutex::new(scores.iter().copied().collect()),
            last,
        }
    }
}

#[async_trait]
impl TextEvaluator for ScriptedEvaluator {
    async fn evaluate(&self, _: &EvaluationRequest) -> Result<Evaluation, EvaluatorError> {
        let score = self.scores.lock().unwrap().pop_front().unwrap_or(self.last);
        Ok(Evaluation {
            score,
            feedback: format!("Scripted examiner feedback (score {score})."),
            suggestions: vec![],
            source: EvaluationSource::Remote,
        })
    }
}

/// Transcriber double returning a fixed transcript.
pub struct ScriptedTranscriber(pub &'static str);

#[async_trait]
impl SpeechTranscriber for ScriptedTranscriber {
    async fn transcribe(&self, _: &[u8]) -> Result<String, TranscriberError> {
        Ok(self.0.to_string())
    }
}
