//! Turning free-text model output into typed JSON documents.
//!
//! Models wrap JSON in Markdown fences or prefix it with prose despite
//! being told not to. [`strip_code_fences`] and [`extract_json_object`]
//! undo both before `serde_json` sees the text.

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::schema::{LessonPlanStructure, WorksheetPlan};

/// Errors that can occur while parsing a model response.
#[derive(Debug, Error)]
pub enum PlanParseError {
    #[error("model response is empty")]
    Empty,

    #[error("model response contains no JSON object")]
    NoJsonObject,

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Remove a surrounding Markdown code fence (```json ... ```), if present.
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json", "JSON", ...) on the opening line.
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Slice from the first `{` to its matching `}`.
///
/// Braces inside JSON strings are skipped. Returns `None` when no balanced
/// object exists.
pub fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in content[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&content[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a model response into any JSON document type.
pub fn parse_json_response<T: DeserializeOwned>(content: &str) -> Result<T, PlanParseError> {
    let stripped = strip_code_fences(content);
    if stripped.is_empty() {
        return Err(PlanParseError::Empty);
    }
    match serde_json::from_str(stripped) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            // Retry on the embedded object only when there is prose around it.
            let object = extract_json_object(stripped).ok_or(PlanParseError::NoJsonObject)?;
            if object.len() == stripped.len() {
                return Err(PlanParseError::Json(first_err));
            }
            Ok(serde_json::from_str(object)?)
        }
    }
}

/// Parse a planner (or repair) response into a [`WorksheetPlan`].
pub fn parse_plan_response(content: &str) -> Result<WorksheetPlan, PlanParseError> {
    parse_json_response(content)
}

/// Parse a lesson planner response into a [`LessonPlanStructure`].
pub fn parse_lesson_response(content: &str) -> Result<LessonPlanStructure, PlanParseError> {
    parse_json_response(content)
}
