use serde::Deserialize;
use std::env;

/// Engine configuration, loaded from `config/{APP_ENV}.toml` with
/// `APP__`-prefixed environment overrides and per-field ENV fallbacks.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Exam duration from session start to deadline.
    pub exam_duration_minutes: i64,
    /// Maximum number of questions drawn per session.
    pub questions_per_session: usize,
    pub evaluator: EvaluatorConfig,
    pub transcriber: TranscriberConfig,
}

/// Remote generative evaluator endpoint. When `url` or `api_key` is missing
/// the capability is absent and scoring uses the deterministic fallback only.
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluatorConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl EvaluatorConfig {
    pub fn is_configured(&self) -> bool {
        self.url.is_some() && self.api_key.is_some()
    }
}

/// Speech-to-text provider endpoint. Absent `url` means transcription is
/// unavailable and speaking answers fall back to the canned transcript.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriberConfig {
    pub url: Option<String>,
    pub timeout_secs: u64,
}

impl TranscriberConfig {
    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exam_duration_minutes: 20,
            questions_per_session: 10,
            evaluator: EvaluatorConfig {
                url: None,
                api_key: None,
                model: "gpt-4o-mini".to_string(),
                timeout_secs: 8,
            },
            transcriber: TranscriberConfig {
                url: None,
                timeout_secs: 15,
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let config_builder = config::Config::builder()
            .add_source(
                config::File::with_name(&format!("config/{}", env)).required(false), // Allow missing config file, fallback to ENV
            )
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let settings = config_builder.build()?;
        let defaults = Config::default();

        let exam_duration_minutes = settings
            .get_int("exam.duration_minutes")
            .ok()
            .or_else(|| env_int("EXAM_DURATION_MINUTES"))
            .unwrap_or(defaults.exam_duration_minutes);

        let questions_per_session = settings
            .get_int("exam.questions_per_session")
            .ok()
            .or_else(|| env_int("EXAM_QUESTIONS_PER_SESSION"))
            .map(|n| n.max(1) as usize)
            .unwrap_or(defaults.questions_per_session);

        let evaluator = EvaluatorConfig {
            url: settings
                .get_string("evaluator.url")
                .ok()
                .or_else(|| env::var("EVALUATOR_URL").ok()),
            api_key: settings
                .get_string("evaluator.api_key")
                .ok()
                .or_else(|| env::var("EVALUATOR_API_KEY").ok()),
            model: settings
                .get_string("evaluator.model")
                .ok()
                .or_else(|| env::var("EVALUATOR_MODEL").ok())
                .unwrap_or(defaults.evaluator.model),
            timeout_secs: settings
                .get_int("evaluator.timeout_secs")
                .ok()
                .or_else(|| env_int("EVALUATOR_TIMEOUT_SECS"))
                .map(|n| n.max(1) as u64)
                .unwrap_or(defaults.evaluator.timeout_secs),
        };

        let transcriber = TranscriberConfig {
            url: settings
                .get_string("transcriber.url")
                .ok()
                .or_else(|| env::var("TRANSCRIBER_URL").ok()),
            timeout_secs: settings
                .get_int("transcriber.timeout_secs")
                .ok()
                .or_else(|| env_int("TRANSCRIBER_TIMEOUT_SECS"))
                .map(|n| n.max(1) as u64)
                .unwrap_or(defaults.transcriber.timeout_secs),
        };

        Ok(Config {
            exam_duration_minutes,
            questions_per_session,
            evaluator,
            transcriber,
        })
    }
}

fn env_int(key: &str) -> Option<i64> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "EXAM_DURATION_MINUTES",
            "EXAM_QUESTIONS_PER_SESSION",
            "EVALUATOR_URL",
            "EVALUATOR_API_KEY",
            "EVALUATOR_MODEL",
            "EVALUATOR_TIMEOUT_SECS",
            "TRANSCRIBER_URL",
            "TRANSCRIBER_TIMEOUT_SECS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn load_falls_back_to_defaults() {
        clear_env();
        let config = Config::load().unwrap();
        assert_eq!(config.exam_duration_minutes, 20);
        assert_eq!(config.questions_per_session, 10);
        assert!(!config.evaluator.is_configured());
        assert!(!config.transcriber.is_configured());
    }

    #[test]
    #[serial]
    fn env_vars_override_defaults() {
        clear_env();
        std::env::set_var("EXAM_DURATION_MINUTES", "45");
        std::env::set_var("EVALUATOR_URL", "http://localhost:9000/v1/chat/completions");
        std::env::set_var("EVALUATOR_API_KEY", "test-key");

        let config = Config::load().unwrap();
        assert_eq!(config.exam_duration_minutes, 45);
        assert!(config.evaluator.is_configured());

        clear_env();
    }
}
