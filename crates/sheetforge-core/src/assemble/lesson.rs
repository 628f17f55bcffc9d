//! Lesson plan, teacher script and materials list rendering.

use std::collections::HashSet;

use super::AssembleOptions;
use super::html::{document, escape_html};
use crate::schema::{LessonPlanStructure, MaterialItem};

fn list(body: &mut String, class: &str, entries: &[String]) {
    if entries.is_empty() {
        return;
    }
    body.push_str(&format!("<ul class=\"{class}\">\n"));
    for entry in entries {
        body.push_str(&format!("<li>{}</li>\n", escape_html(entry)));
    }
    body.push_str("</ul>\n");
}

fn material_label(item: &MaterialItem) -> String {
    let mut label = escape_html(&item.name);
    if let Some(quantity) = &item.quantity {
        label.push_str(&format!(" ({})", escape_html(quantity)));
    }
    if let Some(notes) = &item.notes {
        label.push_str(&format!(" <span class=\"notes\">{}</span>", escape_html(notes)));
    }
    label
}

/// Render the lesson plan document.
pub fn render_lesson_plan(lesson: &LessonPlanStructure, options: &AssembleOptions) -> String {
    let meta = &lesson.metadata;
    let mut body = format!("<h1>{}</h1>\n", escape_html(&meta.title));
    body.push_str(&format!(
        "<p class=\"subtitle\">Grade {} &middot; {} &middot; {} minutes</p>\n",
        escape_html(&meta.grade),
        escape_html(&meta.subject),
        lesson.total_minutes()
    ));

    if !meta.objectives.is_empty() {
        body.push_str("<h2>Objectives</h2>\n");
        list(&mut body, "objectives", &meta.objectives);
    }
    if !meta.standards.is_empty() {
        body.push_str("<h2>Standards</h2>\n");
        list(&mut body, "standards", &meta.standards);
    }

    for section in &lesson.sections {
        body.push_str(&format!(
            "<section class=\"lesson-section\" data-section-id=\"{}\">\n",
            escape_html(&section.id)
        ));
        match section.duration_minutes {
            Some(min) => body.push_str(&format!(
                "<h2>{} ({min} min)</h2>\n",
                escape_html(&section.title)
            )),
            None => body.push_str(&format!("<h2>{}</h2>\n", escape_html(&section.title))),
        }
        for paragraph in &section.content {
            body.push_str(&format!("<p>{}</p>\n", escape_html(paragraph)));
        }
        list(&mut body, "activities", &section.activities);
        if !section.materials.is_empty() {
            let names: Vec<String> = section.materials.iter().map(|m| m.name.clone()).collect();
            body.push_str(&format!(
                "<p class=\"section-materials\">Materials: {}</p>\n",
                escape_html(&names.join(", "))
            ));
        }
        body.push_str("</section>\n");
    }

    if let Some(text) = &lesson.differentiation {
        body.push_str(&format!("<h2>Differentiation</h2>\n<p>{}</p>\n", escape_html(text)));
    }
    if let Some(text) = &lesson.assessment {
        body.push_str(&format!("<h2>Assessment</h2>\n<p>{}</p>\n", escape_html(text)));
    }

    document(&meta.title, &body, options.generated_at)
}

/// Render the teacher script, or `None` when no section has script entries.
pub fn render_teacher_script(
    lesson: &LessonPlanStructure,
    options: &AssembleOptions,
) -> Option<String> {
    if !lesson.has_teacher_script() {
        return None;
    }

    let title = format!("{}: Teacher Script", lesson.metadata.title);
    let mut body = format!("<h1>{}</h1>\n", escape_html(&title));

    for section in lesson.sections.iter().filter(|s| !s.teacher_script.is_empty()) {
        body.push_str(&format!(
            "<section class=\"script-section\">\n<h2>{}</h2>\n",
            escape_html(&section.title)
        ));
        for entry in &section.teacher_script {
            body.push_str(&format!(
                "<div class=\"script-entry cue-{cue}\"><span class=\"cue\">{label}:</span> {text}",
                cue = entry.cue.label().to_ascii_lowercase(),
                label = entry.cue.label(),
                text = escape_html(&entry.text),
            ));
            if let Some(timing) = &entry.timing {
                body.push_str(&format!(" <span class=\"timing\">({})</span>", escape_html(timing)));
            }
            body.push_str("</div>\n");
        }
        body.push_str("</section>\n");
    }

    Some(document(&title, &body, options.generated_at))
}

/// Merge lesson-level and per-section materials.
///
/// De-duplicated by case-insensitive name; the first occurrence wins.
pub fn merged_materials(lesson: &LessonPlanStructure) -> Vec<&MaterialItem> {
    let mut seen = HashSet::new();
    lesson
        .materials
        .iter()
        .chain(lesson.sections.iter().flat_map(|s| s.materials.iter()))
        .filter(|m| seen.insert(m.name.trim().to_lowercase()))
        .collect()
}

/// Render a checklist of materials, required items first.
pub fn render_materials_list(lesson: &LessonPlanStructure, options: &AssembleOptions) -> String {
    let title = format!("{}: Materials", lesson.metadata.title);
    let mut body = format!("<h1>{}</h1>\n", escape_html(&title));

    let materials = merged_materials(lesson);
    let (required, optional): (Vec<_>, Vec<_>) = materials.into_iter().partition(|m| !m.optional);

    for (heading, items) in [("Required", required), ("Optional", optional)] {
        if items.is_empty() {
            continue;
        }
        body.push_str(&format!("<h2>{heading}</h2>\n<ul class=\"materials\">\n"));
        for item in items {
            body.push_str(&format!(
                "<li><span class=\"checkbox\"></span>{}</li>\n",
                material_label(item)
            ));
        }
        body.push_str("</ul>\n");
    }

    document(&title, &body, options.generated_at)
}
