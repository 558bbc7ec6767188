use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// CEFR proficiency tier. Ordered so that `A1 < A2 < ... < C2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CefrLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl CefrLevel {
    /// Maps a 0-100 score onto a level band.
    pub fn from_score(score: f64) -> Self {
        if score < 30.0 {
            CefrLevel::A1
        } else if score < 50.0 {
            CefrLevel::A2
        } else if score < 70.0 {
            CefrLevel::B1
        } else if score < 85.0 {
            CefrLevel::B2
        } else {
            CefrLevel::C1
        }
    }

    /// Point value used when averaging skill levels into an overall level.
    pub fn points(self) -> f64 {
        match self {
            CefrLevel::A1 => 20.0,
            CefrLevel::A2 => 40.0,
            CefrLevel::B1 => 60.0,
            CefrLevel::B2 => 80.0,
            CefrLevel::C1 | CefrLevel::C2 => 100.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CefrLevel::A1 => "A1",
            CefrLevel::A2 => "A2",
            CefrLevel::B1 => "B1",
            CefrLevel::B2 => "B2",
            CefrLevel::C1 => "C1",
            CefrLevel::C2 => "C2",
        }
    }

    /// One-sentence description of the band, used when composing feedback.
    pub fn band_summary(self) -> &'static str {
        match self {
            CefrLevel::A1 => "You can handle very basic phrases and everyday expressions.",
            CefrLevel::A2 => "You can communicate in simple, routine situations.",
            CefrLevel::B1 => "You can deal with most situations and produce connected text on familiar topics.",
            CefrLevel::B2 => "You can interact fluently and produce clear, detailed text on a wide range of topics.",
            CefrLevel::C1 | CefrLevel::C2 => {
                "You can use the language flexibly and effectively, with well-structured, detailed text."
            }
        }
    }
}

impl fmt::Display for CefrLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CefrLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A1" => Ok(CefrLevel::A1),
            "A2" => Ok(CefrLevel::A2),
            "B1" => Ok(CefrLevel::B1),
            "B2" => Ok(CefrLevel::B2),
            "C1" => Ok(CefrLevel::C1),
            "C2" => Ok(CefrLevel::C2),
            other => Err(format!("unknown CEFR level: {other}")),
        }
    }
}

/// The four examined skill categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Skill {
    Reading,
    Writing,
    Listening,
    Speaking,
}

impl Skill {
    pub const ALL: [Skill; 4] = [Skill::Reading, Skill::Writing, Skill::Listening, Skill::Speaking];

    pub fn as_str(self) -> &'static str {
        match self {
            Skill::Reading => "READING",
            Skill::Writing => "WRITING",
            Skill::Listening => "LISTENING",
            Skill::Speaking => "SPEAKING",
        }
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Skill {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "READING" => Ok(Skill::Reading),
            "WRITING" => Ok(Skill::Writing),
            "LISTENING" => Ok(Skill::Listening),
            "SPEAKING" => Ok(Skill::Speaking),
            other => Err(format!("unknown skill category: {other}")),
        }
    }
}

/// Per-student level progression across one exam cycle.
///
/// A skill field is `Some` once the student has completed an exam session in
/// that skill during the current cycle. When all four are set the cycle is
/// complete and the skill fields are cleared on the next attempt, while
/// `overall` keeps the last-known summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelRecord {
    pub student_id: Uuid,
    pub reading: Option<CefrLevel>,
    pub writing: Option<CefrLevel>,
    pub listening: Option<CefrLevel>,
    pub speaking: Option<CefrLevel>,
    pub overall: CefrLevel,
}

impl LevelRecord {
    pub fn new(student_id: Uuid) -> Self {
        Self {
            student_id,
            reading: None,
            writing: None,
            listening: None,
            speaking: None,
            overall: CefrLevel::A1,
        }
    }

    pub fn skill_level(&self, skill: Skill) -> Option<CefrLevel> {
        match skill {
            Skill::Reading => self.reading,
            Skill::Writing => self.writing,
            Skill::Listening => self.listening,
            Skill::Speaking => self.speaking,
        }
    }

    pub fn set_skill_level(&mut self, skill: Skill, level: CefrLevel) {
        match skill {
            Skill::Reading => self.reading = Some(level),
            Skill::Writing => self.writing = Some(level),
            Skill::Listening => self.listening = Some(level),
            Skill::Speaking => self.speaking = Some(level),
        }
    }

    pub fn cycle_complete(&self) -> bool {
        Skill::ALL.iter().all(|s| self.skill_level(*s).is_some())
    }

    /// Clears the four skill fields for a new cycle. `overall` is preserved.
    pub fn reset_cycle(&mut self) {
        self.reading = None;
        self.writing = None;
        self.listening = None;
        self.speaking = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_bands_map_to_levels() {
        assert_eq!(CefrLevel::from_score(0.0), CefrLevel::A1);
        assert_eq!(CefrLevel::from_score(29.9), CefrLevel::A1);
        assert_eq!(CefrLevel::from_score(30.0), CefrLevel::A2);
        assert_eq!(CefrLevel::from_score(49.9), CefrLevel::A2);
        assert_eq!(CefrLevel::from_score(50.0), CefrLevel::B1);
        assert_eq!(CefrLevel::from_score(69.9), CefrLevel::B1);
        assert_eq!(CefrLevel::from_score(70.0), CefrLevel::B2);
        assert_eq!(CefrLevel::from_score(84.9), CefrLevel::B2);
        assert_eq!(CefrLevel::from_score(85.0), CefrLevel::C1);
        assert_eq!(CefrLevel::from_score(100.0), CefrLevel::C1);
    }

    #[test]
    fn c2_scores_like_c1() {
        assert_eq!(CefrLevel::C2.points(), CefrLevel::C1.points());
    }

    #[test]
    fn skill_round_trips_through_str() {
        for skill in Skill::ALL {
            assert_eq!(skill.as_str().parse::<Skill>().unwrap(), skill);
        }
        assert_eq!("speaking".parse::<Skill>().unwrap(), Skill::Speaking);
        assert!("JUGGLING".parse::<Skill>().is_err());
    }

    #[test]
    fn cycle_reset_keeps_overall() {
        let mut record = LevelRecord::new(Uuid::new_v4());
        for skill in Skill::ALL {
            record.set_skill_level(skill, CefrLevel::B2);
        }
        record.overall = CefrLevel::B2;
        assert!(record.cycle_complete());

        record.reset_cycle();
        assert!(!record.cycle_complete());
        assert_eq!(record.overall, CefrLevel::B2);
        assert_eq!(record.reading, None);
    }
}
