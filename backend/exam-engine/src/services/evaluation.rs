//! Open-text evaluation: remote generative examiner first, deterministic
//! linguistic formula as the fail-safe.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::config::EvaluatorConfig;
use crate::metrics::EVALUATIONS_TOTAL;
use crate::models::CefrLevel;
use crate::utils::retry::{retry_async_with_config, RetryConfig};
use crate::utils::text;

/// Linking/marker words whose complete absence caps a fallback score at 65.
const ADVANCED_VOCABULARY: [&str; 18] = [
    "however",
    "therefore",
    "furthermore",
    "although",
    "despite",
    "because",
    "since",
    "unless",
    "usually",
    "generally",
    "significant",
    "essential",
    "opportunity",
    "experience",
    "challenging",
    "rewarding",
    "consequently",
    "whereas",
];

const WEIGHT_LENGTH: f64 = 0.30;
const WEIGHT_DIVERSITY: f64 = 0.20;
const WEIGHT_COMPLEXITY: f64 = 0.20;
const WEIGHT_RELEVANCE: f64 = 0.30;

const OFF_TOPIC_CAP: f64 = 35.0;
const PLAIN_VOCABULARY_CAP: f64 = 65.0;

/// Keyword-match tiers: 0 matches (off-topic), 1, 2, then 3+.
const RELEVANCE_TIERS: [f64; 4] = [25.0, 55.0, 80.0, 100.0];

#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub text: String,
    /// The question prompt, quoted to the remote examiner as the task topic.
    pub topic: String,
    /// Rubric level; always the exam difficulty, never inferred from other
    /// fields.
    pub level: CefrLevel,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationSource {
    Remote,
    Fallback,
}

impl EvaluationSource {
    pub fn as_label(self) -> &'static str {
        match self {
            EvaluationSource::Remote => "remote",
            EvaluationSource::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub score: f64,
    pub feedback: String,
    pub suggestions: Vec<String>,
    pub source: EvaluationSource,
}

#[derive(Debug, Error)]
pub enum EvaluatorError {
    /// The evaluator could not be reached (network error, timeout, non-2xx).
    /// Distinct from a low score by construction.
    #[error("evaluator unavailable: {0}")]
    Unavailable(String),

    /// The evaluator answered but its output could not be parsed.
    #[error("evaluator returned unusable output: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait TextEvaluator: Send + Sync {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<Evaluation, EvaluatorError>;
}

// ---------------------------------------------------------------------------
// Remote evaluator
// ---------------------------------------------------------------------------

/// Strict JSON contract demanded from the remote examiner.
#[derive(Debug, Deserialize)]
struct RemoteEvaluationResponse {
    score: f64,
    feedback: String,
    #[serde(default)]
    suggestions: Vec<String>,
    #[serde(default)]
    grammar_errors: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

/// Calls an OpenAI-compatible chat endpoint with a rubric-constrained prompt.
pub struct RemoteTextEvaluator {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    retry: RetryConfig,
}

impl RemoteTextEvaluator {
    /// Returns `None` when the endpoint is not configured; the capability is
    /// then absent and the hybrid evaluator runs fallback-only.
    pub fn from_config(config: &EvaluatorConfig) -> Option<Self> {
        let url = config.url.clone()?;
        let api_key = config.api_key.clone()?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .ok()?;
        Some(Self {
            client,
            url,
            api_key,
            model: config.model.clone(),
            retry: RetryConfig::remote_call(),
        })
    }

    fn rubric_prompt(request: &EvaluationRequest) -> String {
        let keyword_hint = if request.keywords.is_empty() {
            String::new()
        } else {
            format!(
                "\nThe response is expected to touch on: {}.",
                request.keywords.join(", ")
            )
        };

        format!(
            "Act as a strict English examiner (IELTS/TOEFL style).\n\
             Evaluate this response written by a student targeting {level} level.\n\
             Topic: {topic}{keyword_hint}\n\
             Student's response: \"{text}\"\n\
             \n\
             SCORING RULES:\n\
             1. If the text consists only of simple sentences (subject+verb+object), the MAXIMUM score is 65.\n\
             2. To get above 70, the student MUST use conjunctions (because, but, so, however).\n\
             3. To get above 85, the student MUST use complex grammar (relative clauses, conditionals, advanced vocabulary).\n\
             4. Deduct points if the response is too short for the task.\n\
             \n\
             Provide output in VALID JSON:\n\
             {{\"score\": <integer 0-100>, \"feedback\": \"strict but constructive feedback in English\", \
             \"suggestions\": [\"suggestion\"], \"grammar_errors\": [\"error\"]}}\n\
             Do not use markdown blocks.",
            level = request.level,
            topic = request.topic,
            text = request.text,
        )
    }

    async fn post_chat(&self, prompt: String) -> Result<String, EvaluatorError> {
        let payload = serde_json::json!({
            "model": self.model,
            "messages": [ChatMessage { role: "user", content: prompt }],
            "response_format": { "type": "json_object" },
            "temperature": 0.2,
        });

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| EvaluatorError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EvaluatorError::Unavailable(format!(
                "evaluator returned status {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EvaluatorError::Malformed(e.to_string()))?;

        body.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| EvaluatorError::Malformed("missing message content".to_string()))
    }
}

/// Strips markdown code fences some models wrap around JSON output.
fn strip_code_fences(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[async_trait]
impl TextEvaluator for RemoteTextEvaluator {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<Evaluation, EvaluatorError> {
        let prompt = Self::rubric_prompt(request);

        let content = retry_async_with_config(self.retry.clone(), || {
            self.post_chat(prompt.clone())
        })
        .await?;

        let parsed: RemoteEvaluationResponse = serde_json::from_str(strip_code_fences(&content))
            .map_err(|e| EvaluatorError::Malformed(e.to_string()))?;

        let mut feedback = parsed.feedback;
        if !parsed.grammar_errors.is_empty() {
            feedback.push_str(&format!(
                " Grammar issues noted: {}.",
                parsed.grammar_errors.join("; ")
            ));
        }

        Ok(Evaluation {
            score: parsed.score.clamp(0.0, 100.0),
            feedback,
            suggestions: parsed.suggestions,
            source: EvaluationSource::Remote,
        })
    }
}

// ---------------------------------------------------------------------------
// Deterministic fallback
// ---------------------------------------------------------------------------

/// Rule-based scoring that runs whenever the remote examiner is absent or
/// fails: four weighted sub-scores plus two hard caps.
#[derive(Default)]
pub struct RuleBasedEvaluator;

impl RuleBasedEvaluator {
    pub fn new() -> Self {
        Self
    }

    fn length_score(word_count: usize) -> f64 {
        (word_count as f64 / 60.0 * 100.0).min(100.0)
    }

    fn diversity_score(words: &[String]) -> f64 {
        if words.is_empty() {
            return 0.0;
        }
        let unique: std::collections::HashSet<&str> =
            words.iter().map(String::as_str).collect();
        let ratio = unique.len() as f64 / words.len() as f64;
        (ratio / 0.6 * 100.0).min(100.0)
    }

    fn complexity_score(text: &str) -> f64 {
        match text::flesch_reading_ease(text) {
            Some(ease) => (100.0 - ease).clamp(0.0, 100.0),
            None => 50.0,
        }
    }

    /// Tiered keyword relevance. Zero matches against a non-empty keyword
    /// list flags the response as off-topic.
    fn relevance_score(text_lower: &str, keywords: &[String]) -> (f64, bool) {
        if keywords.is_empty() {
            return (100.0, false);
        }
        let matches = keywords
            .iter()
            .filter(|k| text_lower.contains(k.as_str()))
            .count();
        let tier = RELEVANCE_TIERS[matches.min(RELEVANCE_TIERS.len() - 1)];
        (tier, matches == 0)
    }

    pub fn evaluate_text(&self, request: &EvaluationRequest) -> Evaluation {
        let words = text::words(&request.text);
        let text_lower = request.text.to_lowercase();

        let length = Self::length_score(words.len());
        let diversity = Self::diversity_score(&words);
        let complexity = Self::complexity_score(&request.text);
        let (relevance, off_topic) = Self::relevance_score(&text_lower, &request.keywords);

        let weighted = length * WEIGHT_LENGTH
            + diversity * WEIGHT_DIVERSITY
            + complexity * WEIGHT_COMPLEXITY
            + relevance * WEIGHT_RELEVANCE;

        let has_advanced_vocabulary = ADVANCED_VOCABULARY
            .iter()
            .any(|marker| text_lower.contains(marker));

        let mut score = weighted.clamp(0.0, 100.0);
        let mut feedback = String::from("Automated analysis performed. ");

        if off_topic {
            score = score.min(OFF_TOPIC_CAP);
            feedback.push_str(
                "The response does not mention any of the expected topic terms, \
                 so it was treated as off-topic and capped. ",
            );
        } else if !has_advanced_vocabulary && score > PLAIN_VOCABULARY_CAP {
            score = PLAIN_VOCABULARY_CAP;
            feedback.push_str(
                "No advanced linking words were found, which limits the score. ",
            );
        }

        if score > 70.0 {
            feedback.push_str("Your vocabulary diversity and sentence structure are quite good.");
        } else if score > 50.0 {
            feedback.push_str(
                "Average text. You can improve by using conjunctions (however, because).",
            );
        } else {
            feedback
                .push_str("Your text is a bit short or simple. Try constructing longer sentences.");
        }

        Evaluation {
            score,
            feedback,
            suggestions: vec![
                "Try to use more academic vocabulary.".to_string(),
                "Extend your sentences with conjunctions.".to_string(),
            ],
            source: EvaluationSource::Fallback,
        }
    }
}

#[async_trait]
impl TextEvaluator for RuleBasedEvaluator {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<Evaluation, EvaluatorError> {
        Ok(self.evaluate_text(request))
    }
}

// ---------------------------------------------------------------------------
// Hybrid
// ---------------------------------------------------------------------------

/// Remote-first evaluation with the rule-based formula as fail-safe. Never
/// returns an error: evaluator unavailability is resolved internally.
pub struct HybridTextEvaluator {
    remote: Option<Arc<dyn TextEvaluator>>,
    fallback: RuleBasedEvaluator,
}

impl HybridTextEvaluator {
    pub fn new(remote: Option<Arc<dyn TextEvaluator>>) -> Self {
        Self {
            remote,
            fallback: RuleBasedEvaluator::new(),
        }
    }

    pub fn from_config(config: &EvaluatorConfig) -> Self {
        let remote = RemoteTextEvaluator::from_config(config)
            .map(|e| Arc::new(e) as Arc<dyn TextEvaluator>);
        if remote.is_none() {
            tracing::info!("Remote evaluator not configured; using rule-based analysis only");
        }
        Self::new(remote)
    }

    pub fn remote_available(&self) -> bool {
        self.remote.is_some()
    }
}

#[async_trait]
impl TextEvaluator for HybridTextEvaluator {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<Evaluation, EvaluatorError> {
        // Nothing to grade in a couple of characters
        if request.text.trim().len() < 5 {
            return Ok(Evaluation {
                score: 10.0,
                feedback: "Text is too short to evaluate.".to_string(),
                suggestions: vec!["Write a longer response.".to_string()],
                source: EvaluationSource::Fallback,
            });
        }

        if let Some(remote) = &self.remote {
            match remote.evaluate(request).await {
                Ok(mut evaluation) => {
                    evaluation.score = evaluation.score.clamp(0.0, 100.0);
                    EVALUATIONS_TOTAL
                        .with_label_values(&[EvaluationSource::Remote.as_label()])
                        .inc();
                    return Ok(evaluation);
                }
                Err(e) => {
                    tracing::warn!("Remote evaluation failed ({}), using rule-based analysis", e);
                }
            }
        }

        let evaluation = self.fallback.evaluate_text(request);
        EVALUATIONS_TOTAL
            .with_label_values(&[EvaluationSource::Fallback.as_label()])
            .inc();
        Ok(evaluation)
    }
}
