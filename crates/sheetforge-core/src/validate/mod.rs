//! Plan validator: structural and pedagogical checks on a generated plan.
//!
//! Every check runs regardless of earlier failures and appends zero or
//! more [`ValidationIssue`]s. Errors make a plan invalid; warnings never do.
//! A plan with a small number of errors is eligible for one repair pass
//! (see [`crate::repair`]).
//!
//! The validator takes the plan by `&mut` because legacy per-item visual
//! fields are stripped in place: `visualPlacements` is the only place
//! visuals may be declared.

pub mod readability;

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{GradeLevel, ItemType, ValidationRequirements, WorksheetPlan};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warning => "warning",
        })
    }
}

/// A single problem found in a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    /// Path of the offending field, e.g. `items[q3].correctAnswer`.
    pub field: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    pub fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            field: field.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            field: field.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Tunables for the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Plans with more errors than this are not sent for repair.
    pub max_repairable_errors: usize,
    /// Readability warnings reported per question at most.
    pub max_readability_warnings: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_repairable_errors: 5,
            max_readability_warnings: 2,
        }
    }
}

/// Outcome of validating a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanValidationResult {
    /// `true` iff there are no error-severity issues.
    pub valid: bool,
    /// `true` iff `0 < error count <= max_repairable_errors`.
    pub auto_repairable: bool,
    pub issues: Vec<ValidationIssue>,
    pub question_count: usize,
}

impl PlanValidationResult {
    fn from_issues(
        issues: Vec<ValidationIssue>,
        question_count: usize,
        max_repairable: usize,
    ) -> Self {
        let errors = issues.iter().filter(|i| i.is_error()).count();
        Self {
            valid: errors == 0,
            auto_repairable: errors > 0 && errors <= max_repairable,
            issues,
            question_count,
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| !i.is_error())
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Owned copies of the error issues, as the repair prompt needs them.
    pub fn error_issues(&self) -> Vec<ValidationIssue> {
        self.errors().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Validate a plan with the default [`ValidatorConfig`].
pub fn validate(
    plan: &mut WorksheetPlan,
    requirements: &ValidationRequirements,
) -> PlanValidationResult {
    validate_with(plan, requirements, &ValidatorConfig::default())
}

/// Validate a plan against `requirements`.
///
/// Strips legacy per-item visual fields from `plan` as a side effect.
pub fn validate_with(
    plan: &mut WorksheetPlan,
    requirements: &ValidationRequirements,
    config: &ValidatorConfig,
) -> PlanValidationResult {
    let mut issues = Vec::new();

    check_plan_shape(plan, requirements, &mut issues);
    check_question_count(plan, requirements, &mut issues);
    check_duplicate_ids(plan, &mut issues);
    if requirements.require_answers {
        check_answers_present(plan, &mut issues);
    }
    check_multiple_choice(plan, &mut issues);
    check_readability(plan, requirements.grade, config.max_readability_warnings, &mut issues);
    check_prompt_text(plan, &mut issues);
    strip_legacy_visuals(plan, &mut issues);
    check_visual_placements(plan, &mut issues);

    let question_count = plan.question_count();
    let result =
        PlanValidationResult::from_issues(issues, question_count, config.max_repairable_errors);

    tracing::debug!(
        title = %plan.metadata.title,
        questions = question_count,
        errors = result.error_count(),
        warnings = result.warning_count(),
        "plan validated"
    );

    result
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn item_field(id: &str, field: &str) -> String {
    format!("items[{id}].{field}")
}

/// Warnings that never block generation: no sections, grade or subject
/// drift from what the request pinned.
fn check_plan_shape(
    plan: &WorksheetPlan,
    req: &ValidationRequirements,
    issues: &mut Vec<ValidationIssue>,
) {
    if plan.structure.sections.is_empty() {
        issues.push(ValidationIssue::warning("structure.sections", "plan has no sections"));
    }

    match plan.metadata.grade.parse::<GradeLevel>() {
        Ok(g) if g == req.grade => {}
        Ok(g) => issues.push(
            ValidationIssue::warning(
                "metadata.grade",
                format!("plan targets grade {g} but grade {} was requested", req.grade),
            )
            .suggest(format!("Set metadata.grade to \"{}\".", req.grade)),
        ),
        Err(_) => issues.push(ValidationIssue::warning(
            "metadata.grade",
            format!("unrecognised grade {:?}", plan.metadata.grade),
        )),
    }

    if !req.subject.is_empty()
        && !plan
            .metadata
            .subject
            .trim()
            .eq_ignore_ascii_case(req.subject.trim())
    {
        issues.push(ValidationIssue::warning(
            "metadata.subject",
            format!(
                "plan subject {:?} differs from requested subject {:?}",
                plan.metadata.subject, req.subject
            ),
        ));
    }
}

fn check_question_count(
    plan: &WorksheetPlan,
    req: &ValidationRequirements,
    issues: &mut Vec<ValidationIssue>,
) {
    let count = plan.question_count();
    if count < req.min_questions {
        issues.push(
            ValidationIssue::error(
                "structure.sections",
                format!("plan has {count} questions; at least {} are required", req.min_questions),
            )
            .suggest(format!("Add {} more questions.", req.min_questions - count)),
        );
    } else if count > req.max_questions {
        issues.push(
            ValidationIssue::warning(
                "structure.sections",
                format!("plan has {count} questions; at most {} were requested", req.max_questions),
            )
            .suggest(format!("Remove {} questions.", count - req.max_questions)),
        );
    }
}

fn check_duplicate_ids(plan: &WorksheetPlan, issues: &mut Vec<ValidationIssue>) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order = Vec::new();
    for item in plan.items() {
        let n = counts.entry(item.id.as_str()).or_insert(0);
        if *n == 0 {
            order.push(item.id.as_str());
        }
        *n += 1;
    }
    for id in order {
        let n = counts[id];
        if n > 1 {
            issues.push(
                ValidationIssue::error(
                    item_field(id, "id"),
                    format!("item id {id:?} is used {n} times"),
                )
                .suggest("Give every item a unique id."),
            );
        }
    }
}

/// Answers that mean "the model did not fill this in".
const PLACEHOLDER_ANSWERS: &[&str] = &[
    "?", "...", "tbd", "todo", "n/a", "answer", "[answer]", "<answer>", "xxx",
];

fn is_placeholder_answer(answer: &str) -> bool {
    let a = answer.trim().to_lowercase();
    a.is_empty() || PLACEHOLDER_ANSWERS.contains(&a.as_str())
}

fn check_answers_present(plan: &WorksheetPlan, issues: &mut Vec<ValidationIssue>) {
    for item in plan.items().filter(|i| !i.answer_exempt) {
        match item.correct_answer.as_deref() {
            None => issues.push(
                ValidationIssue::error(
                    item_field(&item.id, "correctAnswer"),
                    format!("item {:?} has no answer", item.id),
                )
                .suggest("Provide the correct answer."),
            ),
            Some(a) if is_placeholder_answer(a) => issues.push(
                ValidationIssue::error(
                    item_field(&item.id, "correctAnswer"),
                    format!("item {:?} has a placeholder answer {a:?}", item.id),
                )
                .suggest("Replace the placeholder with the real answer."),
            ),
            Some(_) => {}
        }
    }
}

/// Whether `answer` matches `option` exactly or by containment, ignoring
/// case and surrounding whitespace ("B) 12" vs "12").
fn answer_matches_option(answer: &str, option: &str) -> bool {
    let a = answer.trim().to_lowercase();
    let o = option.trim().to_lowercase();
    if a.is_empty() || o.is_empty() {
        return false;
    }
    a == o || o.contains(&a) || a.contains(&o)
}

fn check_multiple_choice(plan: &WorksheetPlan, issues: &mut Vec<ValidationIssue>) {
    for item in plan.items().filter(|i| i.item_type == ItemType::MultipleChoice) {
        let options = item.options.as_deref().unwrap_or_default();
        if options.len() < 2 {
            issues.push(
                ValidationIssue::error(
                    item_field(&item.id, "options"),
                    format!(
                        "multiple-choice item {:?} has {} options; at least 2 are required",
                        item.id,
                        options.len()
                    ),
                )
                .suggest("Provide 3-4 answer choices."),
            );
        }

        let Some(answer) = item.correct_answer.as_deref() else {
            continue;
        };
        if options.is_empty() || is_placeholder_answer(answer) {
            continue;
        }
        if !options.iter().any(|o| answer_matches_option(answer, o)) {
            issues.push(
                ValidationIssue::error(
                    item_field(&item.id, "correctAnswer"),
                    format!("answer {answer:?} for item {:?} is not one of its options", item.id),
                )
                .suggest("Make correctAnswer exactly match one of the options."),
            );
        }
    }
}

fn check_readability(
    plan: &WorksheetPlan,
    grade: GradeLevel,
    cap: usize,
    issues: &mut Vec<ValidationIssue>,
) {
    let header = &plan.structure.header;
    let mut header_texts = vec![("structure.header.title".to_string(), header.title.as_str())];
    if let Some(instr) = header.instructions.as_deref() {
        header_texts.push(("structure.header.instructions".to_string(), instr));
    }
    for (field, text) in header_texts {
        push_readability(&field, text, grade, cap, issues);
    }

    for item in plan.items() {
        push_readability(&item_field(&item.id, "prompt"), &item.prompt, grade, cap, issues);
    }
}

fn push_readability(
    field: &str,
    text: &str,
    grade: GradeLevel,
    cap: usize,
    issues: &mut Vec<ValidationIssue>,
) {
    for finding in readability::check_text(text, grade).into_iter().take(cap) {
        issues.push(
            ValidationIssue::warning(field, finding.message(grade)).suggest(finding.suggestion()),
        );
    }
}

fn check_prompt_text(plan: &WorksheetPlan, issues: &mut Vec<ValidationIssue>) {
    for item in plan.items() {
        if item.prompt.trim().chars().count() < 5 {
            issues.push(
                ValidationIssue::error(
                    item_field(&item.id, "prompt"),
                    format!("item {:?} has no real question text", item.id),
                )
                .suggest("Write the full question."),
            );
        }
    }
}

fn strip_legacy_visuals(plan: &mut WorksheetPlan, issues: &mut Vec<ValidationIssue>) {
    for section in &mut plan.structure.sections {
        for item in &mut section.items {
            let stripped = [
                ("visual", item.visual.take().is_some()),
                ("image", item.image.take().is_some()),
                ("imagePrompt", item.image_prompt.take().is_some()),
            ];
            for (name, was_set) in stripped {
                if was_set {
                    issues.push(
                        ValidationIssue::warning(
                            item_field(&item.id, name),
                            format!(
                                "legacy field {name:?} removed; visuals belong in visualPlacements"
                            ),
                        )
                        .suggest("Declare images in visualPlacements instead."),
                    );
                }
            }
        }
    }
}

fn check_visual_placements(plan: &WorksheetPlan, issues: &mut Vec<ValidationIssue>) {
    let ids: HashSet<&str> = plan.items().map(|i| i.id.as_str()).collect();

    for (idx, placement) in plan.visual_placements.iter().enumerate() {
        let field = |name: &str| format!("visualPlacements[{idx}].{name}");

        if !ids.contains(placement.after_item_id.as_str()) {
            issues.push(ValidationIssue::warning(
                field("afterItemId"),
                format!("placement refers to unknown item {:?}", placement.after_item_id),
            ));
        }
        if placement.description.trim().is_empty() {
            issues.push(ValidationIssue::warning(
                field("description"),
                "placement has no description",
            ));
        }
        if placement.purpose().is_none() {
            issues.push(
                ValidationIssue::warning(
                    field("purpose"),
                    format!("unknown image purpose {:?}", placement.purpose),
                )
                .suggest("Use counting, diagram, illustration, example, scene or decorative."),
            );
        }
        if placement.size().is_none() {
            issues.push(
                ValidationIssue::warning(
                    field("size"),
                    format!("invalid image size {:?}", placement.size),
                )
                .suggest("Use small, medium or wide."),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
