//! Generation requirements the validator and quality gate check against.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A K-6 grade. `0` is kindergarten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GradeLevel(u8);

impl GradeLevel {
    pub const KINDERGARTEN: GradeLevel = GradeLevel(0);
    pub const MAX: u8 = 6;

    /// Build from a number; grades above 6 clamp to 6.
    pub fn new(grade: u8) -> Self {
        Self(grade.min(Self::MAX))
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

impl fmt::Display for GradeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            f.write_str("K")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl FromStr for GradeLevel {
    type Err = String;

    /// Accepts "K", "Kindergarten", "Grade 3", "3rd", "3", "grade-3".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        if lower == "k" || lower.starts_with("kinder") || lower == "grade k" {
            return Ok(Self::KINDERGARTEN);
        }
        let digits: String = lower
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits
            .parse::<u8>()
            .map(Self::new)
            .map_err(|_| format!("unrecognised grade: {s:?}"))
    }
}

impl TryFrom<String> for GradeLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<GradeLevel> for String {
    fn from(g: GradeLevel) -> Self {
        g.to_string()
    }
}

/// What a generation request pins down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequirements {
    pub min_questions: usize,
    pub max_questions: usize,
    pub grade: GradeLevel,
    pub subject: String,
    #[serde(default = "default_require_answers")]
    pub require_answers: bool,
}

impl ValidationRequirements {
    pub fn new(grade: GradeLevel, subject: impl Into<String>) -> Self {
        Self {
            min_questions: 5,
            max_questions: 20,
            grade,
            subject: subject.into(),
            require_answers: true,
        }
    }

    /// Set the accepted question-count range.
    pub fn questions(mut self, min: usize, max: usize) -> Self {
        self.min_questions = min;
        self.max_questions = max;
        self
    }

    pub fn require_answers(mut self, require: bool) -> Self {
        self.require_answers = require;
        self
    }
}

fn default_require_answers() -> bool {
    true
}
