//! Worksheet plan types.
//!
//! These types map directly to the JSON document the planner asks the LLM
//! to produce and are deserialized via `serde` + `serde_json`. Field names
//! are `camelCase` on the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::media::ImagePlacement;

/// Top-level structure of a worksheet plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorksheetPlan {
    /// Schema version written by the planner prompt.
    #[serde(default = "default_version")]
    pub version: String,
    /// Descriptive metadata (title, grade, subject, ...).
    pub metadata: PlanMetadata,
    /// Header and question sections.
    pub structure: PlanStructure,
    /// Difficulty and visual style.
    #[serde(default)]
    pub style: PlanStyle,
    /// Where illustrations go. The single source of truth for visuals.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub visual_placements: Vec<ImagePlacement>,
}

/// Plan-level metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanMetadata {
    pub title: String,
    /// Free-form grade label as written by the LLM ("3", "Grade 3", "K").
    pub grade: String,
    pub subject: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    /// Human-readable duration, e.g. "20 minutes".
    #[serde(default)]
    pub estimated_time: String,
}

/// Header plus the ordered list of sections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanStructure {
    pub header: WorksheetHeader,
    #[serde(default)]
    pub sections: Vec<WorksheetSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorksheetHeader {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// A titled group of items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorksheetSection {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default)]
    pub items: Vec<WorksheetItem>,
}

/// A single question on the worksheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorksheetItem {
    /// Unique across the whole plan.
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<u32>,
    /// Set for items that legitimately have no single answer.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub answer_exempt: bool,

    // Legacy per-item visual fields. Older planner prompts emitted these
    // instead of `visualPlacements`; the validator strips them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
}

impl WorksheetItem {
    /// Create an item with the required fields; everything else is empty.
    pub fn new(id: impl Into<String>, item_type: ItemType, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            item_type,
            prompt: prompt.into(),
            options: None,
            correct_answer: None,
            explanation: None,
            points: None,
            answer_exempt: false,
            visual: None,
            image: None,
            image_prompt: None,
        }
    }

    /// Set the answer choices.
    pub fn options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    /// Set the correct answer.
    pub fn answer(mut self, answer: impl Into<String>) -> Self {
        self.correct_answer = Some(answer.into());
        self
    }

    /// Set the explanation shown in the answer key.
    pub fn explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    /// Mark the item as not requiring an answer.
    pub fn exempt(mut self) -> Self {
        self.answer_exempt = true;
        self
    }

    /// Whether any legacy visual field is still populated.
    pub fn has_legacy_visuals(&self) -> bool {
        self.visual.is_some() || self.image.is_some() || self.image_prompt.is_some()
    }
}

/// Kind of worksheet item. Unknown strings survive as [`ItemType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ItemType {
    MultipleChoice,
    ShortAnswer,
    FillInBlank,
    TrueFalse,
    Matching,
    WordProblem,
    OpenResponse,
    Drawing,
    Other(String),
}

impl ItemType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::MultipleChoice => "multiple_choice",
            Self::ShortAnswer => "short_answer",
            Self::FillInBlank => "fill_in_blank",
            Self::TrueFalse => "true_false",
            Self::Matching => "matching",
            Self::WordProblem => "word_problem",
            Self::OpenResponse => "open_response",
            Self::Drawing => "drawing",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ItemType {
    fn from(s: String) -> Self {
        // LLMs drift between snake_case, kebab-case and camelCase.
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "multiplechoice" | "mc" | "mcq" => Self::MultipleChoice,
            "shortanswer" => Self::ShortAnswer,
            "fillinblank" | "fillintheblank" | "fillblank" => Self::FillInBlank,
            "truefalse" => Self::TrueFalse,
            "matching" => Self::Matching,
            "wordproblem" => Self::WordProblem,
            "openresponse" | "open" | "essay" => Self::OpenResponse,
            "drawing" | "draw" => Self::Drawing,
            _ => Self::Other(s),
        }
    }
}

impl From<ItemType> for String {
    fn from(t: ItemType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Difficulty and visual style.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanStyle {
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default = "default_visual_style")]
    pub visual_style: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

impl Default for PlanStyle {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::default(),
            visual_style: default_visual_style(),
            theme: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_visual_style() -> String {
    "cartoon".to_string()
}

impl WorksheetPlan {
    /// Iterate over every item across all sections, in document order.
    pub fn items(&self) -> impl Iterator<Item = &WorksheetItem> {
        self.structure.sections.iter().flat_map(|s| s.items.iter())
    }

    /// Total number of items; every item counts as a question.
    pub fn question_count(&self) -> usize {
        self.structure.sections.iter().map(|s| s.items.len()).sum()
    }

    /// Look up an item by id.
    pub fn item(&self, id: &str) -> Option<&WorksheetItem> {
        self.items().find(|i| i.id == id)
    }
}
