use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, IntCounter,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // Session lifecycle
    pub static ref SESSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "exam_sessions_total",
        "Total number of exam sessions by lifecycle event",
        &["status"]
    )
    .unwrap();

    pub static ref SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "exam_sessions_active",
        "Number of currently active exam sessions"
    )
    .unwrap();

    // Answers
    pub static ref ANSWERS_SUBMITTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "exam_answers_submitted_total",
        "Total number of answers submitted",
        &["kind"]
    )
    .unwrap();

    pub static ref ANSWERS_GRADED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "exam_answers_graded_total",
        "Total number of answers graded at finalize",
        &["correct"]
    )
    .unwrap();

    // External capabilities
    pub static ref EVALUATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "exam_evaluations_total",
        "Total number of open-text evaluations by source",
        &["source"]
    )
    .unwrap();

    pub static ref TRANSCRIPTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "exam_transcriptions_total",
        "Total number of speech transcriptions by source",
        &["source"]
    )
    .unwrap();

    // Admin
    pub static ref SCORE_OVERRIDES_TOTAL: IntCounter = register_int_counter!(
        "exam_score_overrides_total",
        "Total number of admin score overrides"
    )
    .unwrap();
}

/// Renders the default registry in Prometheus text exposition format. The
/// (external) route layer serves this from its metrics endpoint.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
