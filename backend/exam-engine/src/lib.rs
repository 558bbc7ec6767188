//! Exam session and scoring engine for timed, multi-skill language
//! proficiency exams.
//!
//! The engine owns session lifecycle (timing, resumption, lazy expiry),
//! answer intake, and a layered scoring strategy: exact matching for
//! objective questions and a hybrid remote-first/deterministic-fallback
//! evaluation for open text and transcribed speech. Persistence, HTTP
//! routing and authentication live outside the crate behind the traits in
//! [`stores`].

pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod services;
pub mod stores;
pub mod utils;

pub use config::Config;
pub use error::{ExamError, ExamResult};
pub use services::{EngineStores, ExamEngine};
