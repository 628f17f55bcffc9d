use std::fmt::Write as _;

use crate::schema::WorksheetPlan;
use crate::validate::ValidationIssue;

/// Build the prompt for a single repair call.
///
/// Lists every error with its field path and suggestion, then embeds the
/// current plan as pretty-printed JSON and asks for the whole corrected
/// document back.
pub fn build_repair_prompt(
    plan: &WorksheetPlan,
    errors: &[ValidationIssue],
) -> Result<String, serde_json::Error> {
    let plan_json = serde_json::to_string_pretty(plan)?;

    let mut prompt = String::new();
    prompt.push_str(
        "The worksheet plan below failed validation. Fix every error listed and \
         return the complete corrected plan.\n\n",
    );

    prompt.push_str("## Errors\n\n");
    for (i, issue) in errors.iter().enumerate() {
        // Writing to a String cannot fail.
        let _ = write!(prompt, "{}. `{}`: {}", i + 1, issue.field, issue.message);
        if let Some(suggestion) = &issue.suggestion {
            let _ = write!(prompt, " (suggestion: {suggestion})");
        }
        prompt.push('\n');
    }

    prompt.push_str("\n## Current plan\n\n```json\n");
    prompt.push_str(&plan_json);
    prompt.push_str("\n```\n\n");

    prompt.push_str(
        "## Rules\n\n\
         - Return ONLY the corrected JSON document, with the same schema.\n\
         - Keep every item id, section and field that is not part of an error.\n\
         - Multiple choice answers must match one of the item's options exactly.\n\
         - Do not add per-item visual fields; images belong in `visualPlacements`.\n",
    );
    Ok(prompt)
}
