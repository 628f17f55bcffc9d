//! Individual quality checks. Each appends zero or more issues.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::scan::{
    class_token_count, close_tag_count, data_item_id_count, numbered_lines, open_tag_count,
    visible_text, without_style_and_script,
};
use super::{IssueCategory, QualityGateConfig, QualityInput, QualityIssue};
use crate::image::{image_cap, select_placements};

/// Elements whose open/close counts must match.
const BALANCED_TAGS: &[&str] = &["div", "section", "table", "ul", "ol", "p", "figure"];

/// Share of expected questions that may be missing before it is an error.
const QUESTION_SHORTFALL_ERROR: f64 = 0.2;
/// Detected/expected ratio above which extra questions are flagged.
const QUESTION_EXCESS_WARNING: f64 = 1.5;

static DOCTYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<!doctype\s+html").expect("static regex"));
static HTML_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<html[\s>]").expect("static regex"));
static HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<head[\s>]").expect("static regex"));
static BODY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<body[\s>]").expect("static regex"));
static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<style[\s>]").expect("static regex"));

static FORM_CONTROL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(?:input|form|button|select|textarea)[\s>/]").expect("static regex")
});
static EXTERNAL_FONT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)fonts\.googleapis\.com|fonts\.gstatic\.com|use\.typekit\.net",
        r#"|@font-face|@import|<link\b[^>]*href\s*=\s*["']https?://"#,
    ))
    .expect("static regex")
});
static SCREEN_EFFECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)box-shadow|text-shadow|linear-gradient|radial-gradient|@keyframes",
        r"|\banimation(?:-[a-z]+)?\s*:|\btransition(?:-[a-z]+)?\s*:",
    ))
    .expect("static regex")
});
static IMG_SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?\bsrc\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("static regex")
});

static NAME_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bname\s*(?::|_{2,})").expect("static regex"));
static DATE_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bdate\s*(?::|_{2,})").expect("static regex"));

static PLACEHOLDER_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i:lorem ipsum)|\bTODO\b|\bTBD\b|(?i:\[insert)|\{\{").expect("static regex")
});

// ---------------------------------------------------------------------------
// Structure
// ---------------------------------------------------------------------------

pub fn check_html_structure(html: &str, issues: &mut Vec<QualityIssue>) {
    let required: [(&Regex, &str); 4] = [
        (&*DOCTYPE_RE, "<!DOCTYPE html>"),
        (&*HTML_RE, "<html>"),
        (&*HEAD_RE, "<head>"),
        (&*BODY_RE, "<body>"),
    ];
    for (re, name) in required {
        if !re.is_match(html) {
            issues.push(QualityIssue::error(
                IssueCategory::HtmlStructure,
                format!("document is missing {name}"),
            ));
        }
    }

    if !STYLE_RE.is_match(html) {
        issues.push(QualityIssue::warning(
            IssueCategory::HtmlStructure,
            "document has no <style> block; print layout will be unstyled",
        ));
    }

    let markup = without_style_and_script(html);
    let unbalanced: Vec<String> = BALANCED_TAGS
        .iter()
        .filter_map(|tag| {
            let open = open_tag_count(&markup, tag);
            let close = close_tag_count(&markup, tag);
            (open != close).then(|| format!("<{tag}> {open} open / {close} closed"))
        })
        .collect();
    if !unbalanced.is_empty() {
        issues.push(QualityIssue::warning(
            IssueCategory::HtmlStructure,
            format!("unbalanced tags: {}", unbalanced.join(", ")),
        ));
    }
}

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

/// Best-effort count of questions rendered in `html`.
///
/// Takes the largest of the tagged counts; falls back to numbered lines
/// in the visible text when nothing is tagged.
pub fn detect_question_count(html: &str) -> usize {
    let tagged = class_token_count(html, "question")
        .max(data_item_id_count(html))
        .max(class_token_count(html, "question-number"));
    if tagged > 0 {
        return tagged;
    }
    numbered_lines(&visible_text(html))
}

pub fn check_question_count(html: &str, expected: usize, issues: &mut Vec<QualityIssue>) {
    let detected = detect_question_count(html);

    if detected == 0 {
        issues.push(QualityIssue::error(
            IssueCategory::QuestionCount,
            format!("no questions detected; plan has {expected}"),
        ));
        return;
    }
    if expected == 0 {
        return;
    }

    if detected < expected {
        let missing = expected - detected;
        let message = format!("{detected} of {expected} planned questions rendered");
        if missing as f64 / expected as f64 > QUESTION_SHORTFALL_ERROR {
            issues.push(QualityIssue::error(IssueCategory::QuestionCount, message));
        } else {
            issues.push(QualityIssue::warning(IssueCategory::QuestionCount, message));
        }
    } else if detected as f64 > expected as f64 * QUESTION_EXCESS_WARNING {
        issues.push(QualityIssue::warning(
            IssueCategory::QuestionCount,
            format!("{detected} questions rendered but only {expected} planned"),
        ));
    }
}

// ---------------------------------------------------------------------------
// Print friendliness
// ---------------------------------------------------------------------------

pub fn check_print_friendly(html: &str, issues: &mut Vec<QualityIssue>) {
    if FORM_CONTROL_RE.is_match(html) {
        issues.push(QualityIssue::error(
            IssueCategory::PrintFriendly,
            "interactive form controls do not print",
        ));
    }
    if EXTERNAL_FONT_RE.is_match(html) {
        issues.push(QualityIssue::warning(
            IssueCategory::PrintFriendly,
            "external fonts or stylesheets referenced",
        ));
    }
    if let Some(m) = SCREEN_EFFECT_RE.find(html) {
        issues.push(QualityIssue::warning(
            IssueCategory::PrintFriendly,
            format!("screen-only effect in styles: {}", m.as_str().trim_end_matches(':').trim()),
        ));
    }

    let external = IMG_SRC_RE
        .captures_iter(html)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .filter(|src| !src.as_str().trim_start().starts_with("data:"))
        .count();
    if external > 0 {
        issues.push(QualityIssue::error(
            IssueCategory::PrintFriendly,
            format!("{external} image(s) load from an external source"),
        ));
    }
}

pub fn check_name_date(html: &str, issues: &mut Vec<QualityIssue>) {
    let text = visible_text(html);
    if !NAME_LINE_RE.is_match(&text) {
        issues.push(QualityIssue::warning(IssueCategory::NameDate, "no Name line"));
    }
    if !DATE_LINE_RE.is_match(&text) {
        issues.push(QualityIssue::warning(IssueCategory::NameDate, "no Date line"));
    }
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

pub fn check_content_quality(
    html: &str,
    config: &QualityGateConfig,
    issues: &mut Vec<QualityIssue>,
) {
    let text = visible_text(html);

    let mut found: Vec<&str> = PLACEHOLDER_TEXT_RE.find_iter(&text).map(|m| m.as_str()).collect();
    found.sort_unstable();
    found.dedup();
    if !found.is_empty() {
        issues.push(QualityIssue::error(
            IssueCategory::ContentQuality,
            format!("placeholder text found: {}", found.join(", ")),
        ));
    }

    let chars = text.chars().count();
    if chars < config.min_content_chars {
        issues.push(QualityIssue::error(
            IssueCategory::ContentQuality,
            format!(
                "only {chars} characters of content; expected at least {}",
                config.min_content_chars
            ),
        ));
    }
}

pub fn check_answer_key(
    input: &QualityInput<'_>,
    config: &QualityGateConfig,
    issues: &mut Vec<QualityIssue>,
) {
    let Some(key) = input.answer_key_html else {
        if input.requirements.require_answers {
            issues.push(QualityIssue::warning(IssueCategory::AnswerKey, "no answer key supplied"));
        }
        return;
    };

    let questions = match detect_question_count(input.worksheet_html) {
        0 => input.plan.question_count(),
        n => n,
    };
    if questions == 0 {
        return;
    }

    let answers = match class_token_count(key, "answer") {
        0 => numbered_lines(&visible_text(key)),
        n => n,
    };
    if (answers as f64) < questions as f64 * config.answer_coverage {
        issues.push(QualityIssue::error(
            IssueCategory::AnswerKey,
            format!("answer key covers {answers} of {questions} questions"),
        ));
    }
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

pub fn check_images(
    input: &QualityInput<'_>,
    config: &QualityGateConfig,
    issues: &mut Vec<QualityIssue>,
) {
    let Some(settings) = input.visual_settings.filter(|s| s.enabled) else {
        return;
    };
    let images = input.images.unwrap_or_default();

    if images.is_empty() {
        // Only placements the relevance gate would keep were owed an image.
        let item_ids: HashSet<&str> = input.plan.items().map(|i| i.id.as_str()).collect();
        let eligible = select_placements(
            &input.plan.visual_placements,
            &item_ids,
            settings.richness,
            input.plan.question_count(),
        );
        if !eligible.is_empty() {
            issues.push(QualityIssue::warning(
                IssueCategory::ImageCount,
                format!(
                    "{} eligible image placement(s), but no images were produced",
                    eligible.len()
                ),
            ));
        }
        return;
    }

    let cap = image_cap(settings.richness, input.plan.question_count());
    if images.len() > cap {
        issues.push(QualityIssue::error(
            IssueCategory::ImageCount,
            format!("{} images exceed the {} cap of {cap}", images.len(), settings.richness),
        ));
    }

    let total_bytes: usize = images.iter().map(|i| i.estimated_bytes()).sum();
    if total_bytes > config.max_total_image_bytes {
        issues.push(QualityIssue::error(
            IssueCategory::ImageSize,
            format!(
                "images total ~{} KiB; limit is {} KiB",
                total_bytes / 1024,
                config.max_total_image_bytes / 1024
            ),
        ));
    } else if total_bytes > config.max_total_image_bytes / 2 {
        issues.push(QualityIssue::warning(
            IssueCategory::ImageSize,
            format!("images total ~{} KiB, over half the limit", total_bytes / 1024),
        ));
    }

    let placeholders = images.iter().filter(|i| i.is_placeholder()).count();
    if placeholders * 2 > images.len() {
        issues.push(QualityIssue::error(
            IssueCategory::ImageQuality,
            format!("{placeholders} of {} images are placeholders", images.len()),
        ));
    } else if placeholders > 0 {
        issues.push(QualityIssue::warning(
            IssueCategory::ImageQuality,
            format!("{placeholders} of {} images are placeholders", images.len()),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        GradeLevel, ImagePlacement, ImagePurpose, ImageResult, ImageSize, ItemType, PlanMetadata,
        PlanStructure, PlanStyle, Richness, ValidationRequirements, VisualSettings,
        WorksheetHeader, WorksheetItem, WorksheetPlan, WorksheetSection,
    };

    fn categories(issues: &[QualityIssue]) -> Vec<IssueCategory> {
        issues.iter().map(|i| i.category).collect()
    }

    fn plan(questions: usize) -> WorksheetPlan {
        WorksheetPlan {
            version: "1.0".into(),
            metadata: PlanMetadata {
                title: "T".into(),
                grade: "2".into(),
                subject: "Math".into(),
                topic: String::new(),
                learning_objectives: vec![],
                estimated_time: String::new(),
            },
            structure: PlanStructure {
                header: WorksheetHeader {
                    title: "T".into(),
                    subtitle: None,
                    instructions: None,
                },
                sections: vec![WorksheetSection {
                    id: "s1".into(),
                    title: "S".into(),
                    instructions: None,
                    items: (1..=questions)
                        .map(|i| {
                            WorksheetItem::new(
                                format!("q{i}"),
                                ItemType::ShortAnswer,
                                format!("Question {i}?"),
                            )
                            .answer("1")
                        })
                        .collect(),
                }],
            },
            style: PlanStyle::default(),
            visual_placements: vec![],
        }
    }

    fn questions_html(n: usize) -> String {
        (1..=n)
            .map(|i| format!("<div class=\"question\" data-item-id=\"q{i}\"><p>{i}. Q</p></div>"))
            .collect()
    }

    fn png(bytes: usize) -> ImageResult {
        ImageResult {
            base64_data: "A".repeat(bytes * 4 / 3),
            media_type: "image/png".into(),
            width: 256,
            height: 256,
            placement_id: None,
        }
    }

    #[test]
    fn missing_body_is_structure_error() {
        let mut issues = Vec::new();
        check_html_structure(
            "<!DOCTYPE html><html><head><style></style></head></html>",
            &mut issues,
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category, IssueCategory::HtmlStructure);
        assert_eq!(issues[0].penalty, 15);
        assert!(issues[0].message.contains("<body>"));
    }

    #[test]
    fn header_element_does_not_count_as_head() {
        let mut issues = Vec::new();
        check_html_structure(
            "<!DOCTYPE html><html><body><header></header><style></style></body></html>",
            &mut issues,
        );
        assert!(issues.iter().any(|i| i.message.contains("<head>")));
    }

    #[test]
    fn unbalanced_tags_single_warning() {
        let mut issues = Vec::new();
        check_html_structure(
            "<!DOCTYPE html><html><head><style></style></head><body><div><div></div><ul></body></html>",
            &mut issues,
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].penalty, 5);
        assert!(issues[0].message.contains("<div>"));
        assert!(issues[0].message.contains("<ul>"));
    }

    #[test]
    fn question_count_exact_is_clean() {
        let mut issues = Vec::new();
        check_question_count(&questions_html(10), 10, &mut issues);
        assert!(issues.is_empty(), "got: {issues:?}");
    }

    #[test]
    fn question_shortfall_thresholds() {
        let mut issues = Vec::new();
        check_question_count(&questions_html(8), 10, &mut issues);
        assert_eq!(issues[0].severity, crate::validate::Severity::Warning);

        let mut issues = Vec::new();
        check_question_count(&questions_html(7), 10, &mut issues);
        assert_eq!(issues[0].severity, crate::validate::Severity::Error);
    }

    #[test]
    fn zero_questions_is_error() {
        let mut issues = Vec::new();
        check_question_count("<p>No questions here</p>", 5, &mut issues);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].penalty, 15);
    }

    #[test]
    fn too_many_questions_warns() {
        let mut issues = Vec::new();
        check_question_count(&questions_html(16), 10, &mut issues);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].penalty, 5);
    }

    #[test]
    fn numbered_lines_fallback() {
        assert_eq!(detect_question_count("<p>1. Add</p><p>2. Subtract</p><p>3) Multiply</p>"), 3);
    }

    #[test]
    fn print_checks() {
        let html = r#"<style>.x { box-shadow: 0 0 2px #000; } @import url("x.css");</style>
            <form><input type="text"></form><img src="https://example.com/a.png"><img src="data:image/png;base64,AA">"#;
        let mut issues = Vec::new();
        check_print_friendly(html, &mut issues);
        let penalties: Vec<u32> = issues.iter().map(|i| i.penalty).collect();
        assert_eq!(penalties, vec![10, 3, 3, 10]);
        assert!(issues[3].message.starts_with("1 image"));
    }

    #[test]
    fn clean_print_styles_pass() {
        let mut issues = Vec::new();
        check_print_friendly(
            r#"<style>@page { margin: 1in; } .q { page-break-inside: avoid; }</style><img src="data:image/png;base64,AA">"#,
            &mut issues,
        );
        assert!(issues.is_empty(), "got: {issues:?}");
    }

    #[test]
    fn name_and_date_lines() {
        let mut issues = Vec::new();
        check_name_date("<div><span>Name:</span><span>Date: ____</span></div>", &mut issues);
        assert!(issues.is_empty());

        let mut issues = Vec::new();
        check_name_date("<p>Name ________</p>", &mut issues);
        assert_eq!(categories(&issues), vec![IssueCategory::NameDate]);
        assert!(issues[0].message.contains("Date"));
    }

    #[test]
    fn todo_and_short_text_both_flagged() {
        let html =
            "<html><body><p>TODO: write the questions for this worksheet soon.</p></body></html>";
        let mut issues = Vec::new();
        check_content_quality(html, &QualityGateConfig::default(), &mut issues);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.category == IssueCategory::ContentQuality));
        assert!(issues.iter().map(|i| i.penalty).sum::<u32>() >= 20);
    }

    #[test]
    fn lowercase_todo_word_is_not_placeholder() {
        let text = "Make a list of things to do today. ".repeat(10);
        let mut issues = Vec::new();
        check_content_quality(
            &format!("<p>{text}</p>"),
            &QualityGateConfig::default(),
            &mut issues,
        );
        assert!(issues.is_empty(), "got: {issues:?}");
    }

    #[test]
    fn answer_key_coverage() {
        let plan = plan(10);
        let req = ValidationRequirements::new(GradeLevel::new(2), "Math");
        let worksheet = questions_html(10);
        let short_key: String = (1..=7).map(|i| format!("<li class=\"answer\">{i}</li>")).collect();
        let full_key: String = (1..=8).map(|i| format!("<li class=\"answer\">{i}</li>")).collect();

        let mut issues = Vec::new();
        check_answer_key(
            &QualityInput::new(&worksheet, &plan, &req).answer_key(&short_key),
            &QualityGateConfig::default(),
            &mut issues,
        );
        assert_eq!(categories(&issues), vec![IssueCategory::AnswerKey]);
        assert_eq!(issues[0].penalty, 15);

        let mut issues = Vec::new();
        check_answer_key(
            &QualityInput::new(&worksheet, &plan, &req).answer_key(&full_key),
            &QualityGateConfig::default(),
            &mut issues,
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn missing_answer_key_warns_only_when_required() {
        let plan = plan(3);
        let worksheet = questions_html(3);
        let req = ValidationRequirements::new(GradeLevel::new(2), "Math");
        let mut issues = Vec::new();
        check_answer_key(
            &QualityInput::new(&worksheet, &plan, &req),
            &QualityGateConfig::default(),
            &mut issues,
        );
        assert_eq!(issues[0].penalty, 5);

        let req = req.require_answers(false);
        let mut issues = Vec::new();
        check_answer_key(
            &QualityInput::new(&worksheet, &plan, &req),
            &QualityGateConfig::default(),
            &mut issues,
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn images_skipped_when_visuals_disabled() {
        let plan = plan(3);
        let req = ValidationRequirements::new(GradeLevel::new(2), "Math");
        let images = vec![ImageResult::placeholder("x", None); 5];
        let mut issues = Vec::new();
        let input = QualityInput::new("", &plan, &req)
            .images(&images)
            .visual_settings(VisualSettings::disabled());
        check_images(&input, &QualityGateConfig::default(), &mut issues);
        assert!(issues.is_empty());
    }

    #[test]
    fn image_cap_size_and_placeholders() {
        let plan = plan(10);
        let req = ValidationRequirements::new(GradeLevel::new(2), "Math");
        let images = vec![
            png(2 * 1024 * 1024),
            png(2 * 1024 * 1024),
            png(2 * 1024 * 1024),
            ImageResult::placeholder("timeout", None),
        ];
        let input = QualityInput::new("", &plan, &req)
            .images(&images)
            .visual_settings(VisualSettings::enabled(Richness::Standard));
        let mut issues = Vec::new();
        check_images(&input, &QualityGateConfig::default(), &mut issues);
        assert_eq!(
            categories(&issues),
            vec![IssueCategory::ImageCount, IssueCategory::ImageSize, IssueCategory::ImageQuality]
        );
        assert_eq!(issues.iter().map(|i| i.penalty).collect::<Vec<_>>(), vec![10, 15, 5]);
    }

    #[test]
    fn mostly_placeholders_is_error() {
        let plan = plan(10);
        let req = ValidationRequirements::new(GradeLevel::new(2), "Math");
        let images = vec![
            png(1024),
            ImageResult::placeholder("a", None),
            ImageResult::placeholder("b", None),
        ];
        let input = QualityInput::new("", &plan, &req)
            .images(&images)
            .visual_settings(VisualSettings::enabled(Richness::Rich));
        let mut issues = Vec::new();
        check_images(&input, &QualityGateConfig::default(), &mut issues);
        assert_eq!(categories(&issues), vec![IssueCategory::ImageQuality]);
        assert_eq!(issues[0].penalty, 10);
    }

    #[test]
    fn planned_but_no_images_warns() {
        let mut plan = plan(4);
        plan.visual_placements.push(ImagePlacement::new(
            "q1",
            "apples",
            ImagePurpose::Counting,
            ImageSize::Small,
        ));
        let req = ValidationRequirements::new(GradeLevel::new(2), "Math");
        let input = QualityInput::new("", &plan, &req)
            .visual_settings(VisualSettings::enabled(Richness::Standard));
        let mut issues = Vec::new();
        check_images(&input, &QualityGateConfig::default(), &mut issues);
        assert_eq!(categories(&issues), vec![IssueCategory::ImageCount]);
        assert_eq!(issues[0].penalty, 5);
    }

    #[test]
    fn placements_the_richness_tier_drops_are_not_owed_images() {
        let mut plan = plan(4);
        plan.visual_placements.push(ImagePlacement::new(
            "q1",
            "a star border",
            ImagePurpose::Decorative,
            ImageSize::Wide,
        ));
        plan.visual_placements.push(ImagePlacement::new(
            "q9",
            "apples",
            ImagePurpose::Counting,
            ImageSize::Small,
        ));
        let req = ValidationRequirements::new(GradeLevel::new(2), "Math");
        let input = QualityInput::new("", &plan, &req)
            .visual_settings(VisualSettings::enabled(Richness::Minimal));
        let mut issues = Vec::new();
        check_images(&input, &QualityGateConfig::default(), &mut issues);
        assert!(issues.is_empty(), "issues: {issues:?}");
    }
}
