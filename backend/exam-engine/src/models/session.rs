use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::level::{CefrLevel, Skill};
use super::question::QuestionView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Abandoned,
    Expired,
}

impl SessionStatus {
    /// Terminal states never transition again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::InProgress)
    }
}

/// One timed exam attempt by one student.
///
/// The drawn question set is stored on the session so that resuming returns
/// the identical set in the identical order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamSession {
    pub id: Uuid,
    pub student_id: Uuid,
    pub skill: Skill,
    pub difficulty: CefrLevel,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub status: SessionStatus,
    pub overall_score: f64,
    pub detected_level: Option<CefrLevel>,
    pub feedback: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub question_ids: Vec<Uuid>,
}

impl ExamSession {
    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline
    }
}

/// Result of `start_or_resume`: the session plus its question set with the
/// answer key stripped.
#[derive(Debug, Serialize)]
pub struct StartExamResponse {
    pub session: ExamSession,
    pub questions: Vec<QuestionView>,
    pub resumed: bool,
}
