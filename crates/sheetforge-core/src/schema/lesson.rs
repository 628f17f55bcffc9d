//! Lesson plan types: the parallel entity to [`super::WorksheetPlan`] used
//! for lesson plan, teacher script and materials list artifacts.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LessonPlanStructure {
    pub metadata: LessonMetadata,
    #[serde(default)]
    pub sections: Vec<LessonSection>,
    /// Materials needed for the whole lesson.
    #[serde(default)]
    pub materials: Vec<MaterialItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub differentiation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LessonMetadata {
    pub title: String,
    pub grade: String,
    pub subject: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub standards: Vec<String>,
}

/// One phase of the lesson (warm-up, direct instruction, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LessonSection {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    /// Paragraphs describing the phase.
    #[serde(default)]
    pub content: Vec<String>,
    #[serde(default)]
    pub activities: Vec<String>,
    #[serde(default)]
    pub materials: Vec<MaterialItem>,
    /// Consumed only by the teacher script artifact.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub teacher_script: Vec<ScriptEntry>,
}

impl LessonSection {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            duration_minutes: None,
            content: Vec::new(),
            activities: Vec::new(),
            materials: Vec::new(),
            teacher_script: Vec::new(),
        }
    }
}

/// A line in the teacher script.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScriptEntry {
    #[serde(default)]
    pub cue: ScriptCue,
    pub text: String,
    /// Free-form timing hint, e.g. "2 min".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptCue {
    #[default]
    Say,
    Ask,
    Do,
    Note,
}

impl ScriptCue {
    /// Label printed in front of the script line.
    pub fn label(self) -> &'static str {
        match self {
            Self::Say => "Say",
            Self::Ask => "Ask",
            Self::Do => "Do",
            Self::Note => "Note",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MaterialItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

impl MaterialItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: None,
            notes: None,
            optional: false,
        }
    }
}

impl LessonPlanStructure {
    /// Whether any section carries teacher script entries.
    pub fn has_teacher_script(&self) -> bool {
        self.sections.iter().any(|s| !s.teacher_script.is_empty())
    }

    /// Sum of section durations, falling back to the metadata duration.
    pub fn total_minutes(&self) -> u32 {
        let sum: u32 = self.sections.iter().filter_map(|s| s.duration_minutes).sum();
        if sum == 0 { self.metadata.duration_minutes } else { sum }
    }
}
