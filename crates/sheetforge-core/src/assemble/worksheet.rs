//! Worksheet and answer key rendering.

use super::html::{document, escape_html};
use super::{AssembleOptions, PlacedImage};
use crate::schema::{ImageSize, ItemType, WorksheetItem, WorksheetPlan};

const CHOICE_LETTERS: &[u8] = b"ABCDEFGHIJ";

/// Images whose anchor names an item in `plan`, in the order given.
pub(crate) fn anchored_images<'a>(
    plan: &'a WorksheetPlan,
    options: &'a AssembleOptions,
) -> impl Iterator<Item = &'a PlacedImage> {
    options
        .images
        .iter()
        .filter(|p| plan.item(&p.placement.after_item_id).is_some())
}

/// Render the student-facing worksheet.
pub fn render_worksheet(plan: &WorksheetPlan, options: &AssembleOptions) -> String {
    let header = &plan.structure.header;
    let mut body = String::new();

    body.push_str("<header class=\"worksheet-header\">\n");
    body.push_str(&format!("<h1>{}</h1>\n", escape_html(&header.title)));
    if let Some(subtitle) = &header.subtitle {
        body.push_str(&format!("<p class=\"subtitle\">{}</p>\n", escape_html(subtitle)));
    }
    body.push_str("<div class=\"name-date\"><span>Name:</span><span>Date:</span></div>\n");
    if let Some(instructions) = &header.instructions {
        body.push_str(&format!("<p class=\"instructions\">{}</p>\n", escape_html(instructions)));
    }
    body.push_str("</header>\n");

    let mut number = 0usize;
    for section in &plan.structure.sections {
        body.push_str(&format!(
            "<section class=\"section\" data-section-id=\"{}\">\n<h2>{}</h2>\n",
            escape_html(&section.id),
            escape_html(&section.title)
        ));
        if let Some(instructions) = &section.instructions {
            body.push_str(&format!(
                "<p class=\"instructions\">{}</p>\n",
                escape_html(instructions)
            ));
        }
        for item in &section.items {
            number += 1;
            render_question(&mut body, number, item);
            for placed in options.images.iter().filter(|p| p.placement.after_item_id == item.id) {
                render_image(&mut body, placed);
            }
        }
        body.push_str("</section>\n");
    }

    document(&header.title, &body, options.generated_at)
}

fn render_question(body: &mut String, number: usize, item: &WorksheetItem) {
    body.push_str(&format!(
        "<div class=\"question\" data-item-id=\"{}\">\n<p><span class=\"question-number\">{number}.</span> {}</p>\n",
        escape_html(&item.id),
        escape_html(&item.prompt)
    ));

    let options = item.options.as_deref().unwrap_or_default();
    match &item.item_type {
        ItemType::MultipleChoice => render_choices(body, options),
        ItemType::TrueFalse => {
            body.push_str(
                "<ul class=\"choices\"><li><span class=\"bubble\">T</span>True</li><li><span class=\"bubble\">F</span>False</li></ul>\n",
            );
        }
        ItemType::Matching => {
            render_choices(body, options);
            answer_lines(body, options.len().max(1));
        }
        ItemType::WordProblem => {
            body.push_str("<div class=\"work-box\"></div>\n");
            answer_lines(body, 1);
        }
        ItemType::OpenResponse => answer_lines(body, 3),
        ItemType::Drawing => body.push_str("<div class=\"drawing-box\"></div>\n"),
        ItemType::ShortAnswer | ItemType::FillInBlank | ItemType::Other(_) => answer_lines(body, 1),
    }

    body.push_str("</div>\n");
}

fn render_choices(body: &mut String, options: &[String]) {
    if options.is_empty() {
        return;
    }
    body.push_str("<ul class=\"choices\">\n");
    for (i, option) in options.iter().enumerate() {
        body.push_str(&format!(
            "<li><span class=\"bubble\">{}</span>{}</li>\n",
            choice_label(i),
            escape_html(option)
        ));
    }
    body.push_str("</ul>\n");
}

fn choice_label(index: usize) -> String {
    match CHOICE_LETTERS.get(index) {
        Some(&b) => char::from(b).to_string(),
        None => (index + 1).to_string(),
    }
}

fn answer_lines(body: &mut String, count: usize) {
    for _ in 0..count {
        body.push_str("<div class=\"answer-line\"></div>\n");
    }
}

fn render_image(body: &mut String, placed: &PlacedImage) {
    let size = placed.placement.size().unwrap_or(ImageSize::Medium);
    let description = escape_html(&placed.placement.description);

    if placed.image.is_placeholder() {
        body.push_str(&format!(
            "<figure class=\"illustration size-{size}\">\n<div class=\"drawing-box\"><div class=\"drawing-label\">Draw: {description}</div></div>\n</figure>\n",
            size = size.as_str(),
        ));
        return;
    }

    body.push_str(&format!(
        "<figure class=\"illustration size-{size}\">\n<img src=\"{src}\" alt=\"{description}\" width=\"{w}\" height=\"{h}\">\n</figure>\n",
        size = size.as_str(),
        src = escape_html(&placed.image.data_uri()),
        w = placed.image.width,
        h = placed.image.height,
    ));
}

/// Render the teacher-facing answer key, numbered like the worksheet.
pub fn render_answer_key(plan: &WorksheetPlan, options: &AssembleOptions) -> String {
    let title = format!("{}: Answer Key", plan.structure.header.title);
    let mut body = format!("<h1>{}</h1>\n<ol class=\"answer-key\">\n", escape_html(&title));

    for (i, item) in plan.items().enumerate() {
        let answer = match item.correct_answer.as_deref().map(str::trim) {
            Some(a) if !a.is_empty() => escape_html(a),
            _ => "Answers will vary.".to_string(),
        };
        body.push_str(&format!(
            "<li class=\"answer\" data-item-id=\"{}\"><span class=\"question-number\">{}.</span> <strong>{answer}</strong>",
            escape_html(&item.id),
            i + 1,
        ));
        if let Some(explanation) = &item.explanation {
            body.push_str(&format!(
                "<p class=\"explanation\">{}</p>",
                escape_html(explanation)
            ));
        }
        body.push_str("</li>\n");
    }
    body.push_str("</ol>\n");

    document(&title, &body, options.generated_at)
}
