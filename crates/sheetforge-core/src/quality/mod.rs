//! Quality gate: scores assembled HTML and decides pass/fail and billing.
//!
//! Every check is independent and additive. Each issue deducts a fixed
//! penalty (by category and severity) from 100, floored at 0. A failing
//! gate is a value, never an error.

pub mod checks;
pub mod scan;

use serde::{Deserialize, Serialize};

use crate::schema::{ImageResult, ValidationRequirements, VisualSettings, WorksheetPlan};
use crate::validate::Severity;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    HtmlStructure,
    QuestionCount,
    PrintFriendly,
    NameDate,
    ContentQuality,
    AnswerKey,
    ImageCount,
    ImageSize,
    ImageQuality,
}

impl IssueCategory {
    pub const ALL: [IssueCategory; 9] = [
        Self::HtmlStructure,
        Self::QuestionCount,
        Self::PrintFriendly,
        Self::NameDate,
        Self::ContentQuality,
        Self::AnswerKey,
        Self::ImageCount,
        Self::ImageSize,
        Self::ImageQuality,
    ];

    /// Points deducted for one issue of this category.
    pub fn penalty(self, severity: Severity) -> u32 {
        use IssueCategory::*;
        use Severity::*;
        match (self, severity) {
            (HtmlStructure, Error) => 15,
            (HtmlStructure, Warning) => 5,
            (QuestionCount, Error) => 15,
            (QuestionCount, Warning) => 5,
            (PrintFriendly, Error) => 10,
            (PrintFriendly, Warning) => 3,
            (NameDate, Error) => 10,
            (NameDate, Warning) => 5,
            (ContentQuality, Error) => 20,
            (ContentQuality, Warning) => 5,
            (AnswerKey, Error) => 15,
            (AnswerKey, Warning) => 5,
            (ImageCount, Error) => 10,
            (ImageCount, Warning) => 5,
            (ImageSize, Error) => 15,
            (ImageSize, Warning) => 5,
            (ImageQuality, Error) => 10,
            (ImageQuality, Warning) => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HtmlStructure => "html_structure",
            Self::QuestionCount => "question_count",
            Self::PrintFriendly => "print_friendly",
            Self::NameDate => "name_date",
            Self::ContentQuality => "content_quality",
            Self::AnswerKey => "answer_key",
            Self::ImageCount => "image_count",
            Self::ImageSize => "image_size",
            Self::ImageQuality => "image_quality",
        }
    }
}

impl std::fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding of the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityIssue {
    pub category: IssueCategory,
    pub severity: Severity,
    pub message: String,
    pub penalty: u32,
}

impl QualityIssue {
    pub fn new(category: IssueCategory, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            category,
            severity,
            message: message.into(),
            penalty: category.penalty(severity),
        }
    }

    pub fn error(category: IssueCategory, message: impl Into<String>) -> Self {
        Self::new(category, Severity::Error, message)
    }

    pub fn warning(category: IssueCategory, message: impl Into<String>) -> Self {
        Self::new(category, Severity::Warning, message)
    }
}

/// Thresholds and limits. `pass_threshold` and `charge_threshold` are
/// independent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityGateConfig {
    pub pass_threshold: u32,
    pub charge_threshold: u32,
    pub min_content_chars: usize,
    pub max_total_image_bytes: usize,
    /// Fraction of worksheet questions the answer key must cover.
    pub answer_coverage: f64,
}

impl Default for QualityGateConfig {
    fn default() -> Self {
        Self {
            pass_threshold: 70,
            charge_threshold: 50,
            min_content_chars: 200,
            max_total_image_bytes: 5 * 1024 * 1024,
            answer_coverage: 0.8,
        }
    }
}

/// Everything the gate looks at.
#[derive(Debug, Clone, Copy)]
pub struct QualityInput<'a> {
    pub worksheet_html: &'a str,
    pub plan: &'a WorksheetPlan,
    pub requirements: &'a ValidationRequirements,
    pub answer_key_html: Option<&'a str>,
    pub images: Option<&'a [ImageResult]>,
    pub visual_settings: Option<VisualSettings>,
}

impl<'a> QualityInput<'a> {
    pub fn new(
        worksheet_html: &'a str,
        plan: &'a WorksheetPlan,
        requirements: &'a ValidationRequirements,
    ) -> Self {
        Self {
            worksheet_html,
            plan,
            requirements,
            answer_key_html: None,
            images: None,
            visual_settings: None,
        }
    }

    pub fn answer_key(mut self, html: &'a str) -> Self {
        self.answer_key_html = Some(html);
        self
    }

    pub fn images(mut self, images: &'a [ImageResult]) -> Self {
        self.images = Some(images);
        self
    }

    pub fn visual_settings(mut self, settings: VisualSettings) -> Self {
        self.visual_settings = Some(settings);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityCheckResult {
    pub passed: bool,
    pub score: u32,
    pub issues: Vec<QualityIssue>,
    pub should_charge: bool,
}

impl QualityCheckResult {
    pub fn issues_in(&self, category: IssueCategory) -> impl Iterator<Item = &QualityIssue> {
        self.issues.iter().filter(move |i| i.category == category)
    }

    pub fn total_penalty(&self) -> u32 {
        self.issues.iter().map(|i| i.penalty).sum()
    }

    pub fn error_count(&self) -> usize {
        self.issues.iter().filter(|i| i.severity == Severity::Error).count()
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Run every check and compute the verdict.
pub fn run_quality_gate(
    input: &QualityInput<'_>,
    config: &QualityGateConfig,
) -> QualityCheckResult {
    let mut issues = Vec::new();

    checks::check_html_structure(input.worksheet_html, &mut issues);
    checks::check_question_count(input.worksheet_html, input.plan.question_count(), &mut issues);
    checks::check_print_friendly(input.worksheet_html, &mut issues);
    checks::check_name_date(input.worksheet_html, &mut issues);
    checks::check_content_quality(input.worksheet_html, config, &mut issues);
    checks::check_answer_key(input, config, &mut issues);
    checks::check_images(input, config, &mut issues);

    let penalty: u32 = issues.iter().map(|i| i.penalty).sum();
    let score = 100u32.saturating_sub(penalty);
    let passed = score >= config.pass_threshold;
    let should_charge = score >= config.charge_threshold;

    if passed {
        tracing::info!(score, issues = issues.len(), "quality gate passed");
    } else {
        tracing::warn!(
            score,
            issues = issues.len(),
            should_charge,
            "quality gate failed"
        );
    }

    QualityCheckResult {
        passed,
        score,
        issues,
        should_charge,
    }
}
