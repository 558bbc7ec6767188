//! Level progression across exam cycles: one attempt per skill per cycle,
//! overall level derived from the four skill levels.

use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ExamError, ExamResult};
use crate::models::{CefrLevel, LevelRecord, Skill};
use crate::stores::LevelStore;

#[derive(Clone)]
pub struct LevelService {
    levels: Arc<dyn LevelStore>,
}

impl LevelService {
    pub fn new(levels: Arc<dyn LevelStore>) -> Self {
        Self { levels }
    }

    /// Gate for starting an exam in `skill`. Resets the cycle first when all
    /// four skills are already complete; rejects a repeat attempt otherwise.
    pub async fn begin_skill_attempt(&self, student_id: Uuid, skill: Skill) -> ExamResult<()> {
        let mut record = self.levels.get_or_create(student_id).await?;

        if record.cycle_complete() {
            tracing::info!("Student {} completed a full cycle, resetting skill levels", student_id);
            record.reset_cycle();
            self.levels.save(&record).await?;
        } else if record.skill_level(skill).is_some() {
            return Err(ExamError::SkillAlreadyCompleted(skill));
        }

        Ok(())
    }

    /// Records a completed skill result and recomputes the overall level.
    pub async fn record_skill_result(
        &self,
        student_id: Uuid,
        skill: Skill,
        level: CefrLevel,
    ) -> ExamResult<LevelRecord> {
        let mut record = self.levels.get_or_create(student_id).await?;
        record.set_skill_level(skill, level);
        record.overall = Self::overall_from(&record);
        self.levels.save(&record).await?;

        tracing::info!(
            "Student {} {} level set to {}, overall now {}",
            student_id,
            skill,
            level,
            record.overall
        );
        Ok(record)
    }

    /// Recomputes the overall level from the current skill fields without
    /// touching them (used after score overrides with no skill context).
    pub async fn update_overall_level(&self, student_id: Uuid) -> ExamResult<CefrLevel> {
        let mut record = self.levels.get_or_create(student_id).await?;
        record.overall = Self::overall_from(&record);
        self.levels.save(&record).await?;
        Ok(record.overall)
    }

    pub async fn profile(&self, student_id: Uuid) -> ExamResult<LevelRecord> {
        Ok(self.levels.get_or_create(student_id).await?)
    }

    /// Average of the four skill point values (absent skills count as A1),
    /// mapped back through the score bands.
    fn overall_from(record: &LevelRecord) -> CefrLevel {
        let total: f64 = Skill::ALL
            .iter()
            .map(|s| record.skill_level(*s).unwrap_or(CefrLevel::A1).points())
            .sum();
        CefrLevel::from_score(total / Skill::ALL.len() as f64)
    }
}
