use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One answer per (session, question) pair. Resubmission overwrites.
///
/// `content` carries free text for writing/fill-in answers and is reused for
/// the transcript of speaking answers. `is_correct` stays `None` until the
/// scoring engine grades the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub session_id: Uuid,
    pub question_id: Uuid,
    pub selected_option_id: Option<Uuid>,
    pub content: Option<String>,
    pub audio_reference: Option<String>,
    pub is_correct: Option<bool>,
    pub listen_count: u32,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitAnswerRequest {
    pub selected_option_id: Option<Uuid>,
    pub text_response: Option<String>,
    /// Reference into the audio store for speaking answers; the blob itself
    /// never passes through the engine.
    pub audio_reference: Option<String>,
}

impl SubmitAnswerRequest {
    /// Coarse submission kind, used only for metrics labels.
    pub fn kind(&self) -> &'static str {
        if self.selected_option_id.is_some() {
            "choice"
        } else if self.audio_reference.is_some() {
            "audio"
        } else {
            "text"
        }
    }
}
