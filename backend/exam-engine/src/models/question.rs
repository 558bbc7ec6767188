use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::level::{CefrLevel, Skill};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    Writing,
    Speaking,
    FillIn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: Uuid,
    pub content: String,
    pub is_correct: bool,
}

/// A catalog question. Options flagged `is_correct` double as the answer key
/// for multiple choice and as the canonical text for fill-in matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub prompt: String,
    pub question_type: QuestionType,
    pub difficulty: CefrLevel,
    pub skill: Skill,
    /// Comma-delimited hint terms used by the text evaluator.
    pub keywords: Option<String>,
    pub active: bool,
    pub options: Vec<QuestionOption>,
}

impl Question {
    pub fn correct_option(&self) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.is_correct)
    }

    /// Parses the comma-delimited keyword hints into lowercase terms.
    pub fn keyword_list(&self) -> Vec<String> {
        self.keywords
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect()
    }
}

/// Client-facing option representation. Deliberately has no correctness flag
/// so the answer key cannot leak before grading.
#[derive(Debug, Clone, Serialize)]
pub struct OptionView {
    pub id: Uuid,
    pub content: String,
}

/// Client-facing question representation returned on session start/resume.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: Uuid,
    pub prompt: String,
    pub question_type: QuestionType,
    pub difficulty: CefrLevel,
    pub skill: Skill,
    pub options: Vec<OptionView>,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id,
            prompt: question.prompt.clone(),
            question_type: question.question_type,
            difficulty: question.difficulty,
            skill: question.skill,
            options: question
                .options
                .iter()
                .map(|o| OptionView {
                    id: o.id,
                    content: o.content.clone(),
                })
                .collect(),
        }
    }
}
