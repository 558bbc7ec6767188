pub mod answer;
pub mod level;
pub mod question;
pub mod session;

pub use answer::{Answer, SubmitAnswerRequest};
pub use level::{CefrLevel, LevelRecord, Skill};
pub use question::{OptionView, Question, QuestionOption, QuestionType, QuestionView};
pub use session::{ExamSession, SessionStatus, StartExamResponse};
