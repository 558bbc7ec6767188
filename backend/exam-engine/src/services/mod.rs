use std::sync::Arc;

use crate::config::Config;
use crate::stores::{AnswerStore, AudioStore, LevelStore, QuestionCatalog, SessionStore};

pub mod evaluation;
pub mod level_service;
pub mod scoring_service;
pub mod session_service;
pub mod transcription;

pub use evaluation::{HybridTextEvaluator, RuleBasedEvaluator, TextEvaluator};
pub use level_service::LevelService;
pub use scoring_service::ScoringService;
pub use session_service::SessionService;
pub use transcription::{HybridTranscriber, SpeechTranscriber};

/// Store handles handed to the engine. Production wires its own persistence;
/// tests use the in-memory implementations.
#[derive(Clone)]
pub struct EngineStores {
    pub sessions: Arc<dyn SessionStore>,
    pub answers: Arc<dyn AnswerStore>,
    pub catalog: Arc<dyn QuestionCatalog>,
    pub levels: Arc<dyn LevelStore>,
    pub audio: Arc<dyn AudioStore>,
}

/// The assembled engine: what the (external) route layer talks to.
pub struct ExamEngine {
    pub sessions: SessionService,
    pub scoring: ScoringService,
    pub levels: LevelService,
}

impl ExamEngine {
    /// Wires the services with explicitly injected evaluator and transcriber
    /// implementations.
    pub fn new(
        config: Config,
        stores: EngineStores,
        evaluator: Arc<dyn TextEvaluator>,
        transcriber: Arc<dyn SpeechTranscriber>,
    ) -> Self {
        let levels = LevelService::new(stores.levels.clone());

        let sessions = SessionService::new(
            config,
            stores.sessions.clone(),
            stores.answers.clone(),
            stores.catalog.clone(),
            levels.clone(),
        );

        let scoring = ScoringService::new(
            stores.sessions,
            stores.answers,
            stores.catalog,
            stores.audio,
            evaluator,
            transcriber,
            levels.clone(),
        );

        Self {
            sessions,
            scoring,
            levels,
        }
    }

    /// Builds the hybrid evaluator and transcriber from configuration:
    /// remote capabilities when configured, deterministic fallbacks always.
    pub fn from_config(config: Config, stores: EngineStores) -> Self {
        let evaluator: Arc<dyn TextEvaluator> =
            Arc::new(HybridTextEvaluator::from_config(&config.evaluator));
        let transcriber: Arc<dyn SpeechTranscriber> =
            Arc::new(HybridTranscriber::from_config(&config.transcriber));
        Self::new(config, stores, evaluator, transcriber)
    }
}
