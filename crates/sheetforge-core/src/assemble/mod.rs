//! Assembler: renders validated plans into printable, self-contained HTML.
//!
//! Pure and deterministic. The same plan and options always produce
//! byte-identical output; the only time-dependent content is the optional
//! `generated_at` footer, which callers pass in explicitly.

pub mod html;
pub mod lesson;
pub mod worksheet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::{ImagePlacement, ImageResult, LessonPlanStructure, WorksheetPlan};

pub use html::escape_html;
pub use lesson::{render_lesson_plan, render_materials_list, render_teacher_script};
pub use worksheet::{render_answer_key, render_worksheet};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// An image together with the placement it was generated for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedImage {
    pub placement: ImagePlacement,
    pub image: ImageResult,
}

/// Rendering options.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembleOptions {
    /// Emit the answer key alongside the worksheet.
    pub include_answer_key: bool,
    /// Timestamp for the page footer; `None` omits the footer.
    pub generated_at: Option<DateTime<Utc>>,
    /// Images to embed, anchored by `placement.after_item_id`.
    pub images: Vec<PlacedImage>,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            include_answer_key: true,
            generated_at: None,
            images: Vec::new(),
        }
    }
}

impl AssembleOptions {
    pub fn include_answer_key(mut self, include: bool) -> Self {
        self.include_answer_key = include;
        self
    }

    pub fn generated_at(mut self, ts: DateTime<Utc>) -> Self {
        self.generated_at = Some(ts);
        self
    }

    pub fn images(mut self, images: Vec<PlacedImage>) -> Self {
        self.images = images;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Worksheet,
    AnswerKey,
    LessonPlan,
    TeacherScript,
    MaterialsList,
}

/// Summary of an assembled document set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyMetadata {
    pub title: String,
    pub grade: String,
    pub subject: String,
    pub artifacts: Vec<ArtifactKind>,
    pub question_count: usize,
    pub section_count: usize,
    /// Real (non-placeholder) images embedded in the worksheet.
    pub image_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledWorksheet {
    pub worksheet_html: String,
    pub answer_key_html: Option<String>,
    pub metadata: AssemblyMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledLesson {
    pub lesson_plan_html: String,
    pub teacher_script_html: Option<String>,
    pub materials_list_html: String,
    pub metadata: AssemblyMetadata,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Render the worksheet and, if requested, its answer key.
pub fn assemble_worksheet(plan: &WorksheetPlan, options: &AssembleOptions) -> AssembledWorksheet {
    let worksheet_html = render_worksheet(plan, options);
    let answer_key_html = options
        .include_answer_key
        .then(|| render_answer_key(plan, options));

    let mut artifacts = vec![ArtifactKind::Worksheet];
    if answer_key_html.is_some() {
        artifacts.push(ArtifactKind::AnswerKey);
    }

    let image_count = worksheet::anchored_images(plan, options)
        .filter(|p| !p.image.is_placeholder())
        .count();

    tracing::debug!(
        title = %plan.metadata.title,
        questions = plan.question_count(),
        images = image_count,
        "assembled worksheet"
    );

    AssembledWorksheet {
        worksheet_html,
        answer_key_html,
        metadata: AssemblyMetadata {
            title: plan.metadata.title.clone(),
            grade: plan.metadata.grade.clone(),
            subject: plan.metadata.subject.clone(),
            artifacts,
            question_count: plan.question_count(),
            section_count: plan.structure.sections.len(),
            image_count,
            generated_at: options.generated_at,
        },
    }
}

/// Render the lesson plan, materials list and (when present) teacher script.
pub fn assemble_lesson(lesson: &LessonPlanStructure, options: &AssembleOptions) -> AssembledLesson {
    let lesson_plan_html = render_lesson_plan(lesson, options);
    let teacher_script_html = render_teacher_script(lesson, options);
    let materials_list_html = render_materials_list(lesson, options);

    let mut artifacts = vec![ArtifactKind::LessonPlan];
    if teacher_script_html.is_some() {
        artifacts.push(ArtifactKind::TeacherScript);
    }
    artifacts.push(ArtifactKind::MaterialsList);

    AssembledLesson {
        lesson_plan_html,
        teacher_script_html,
        materials_list_html,
        metadata: AssemblyMetadata {
            title: lesson.metadata.title.clone(),
            grade: lesson.metadata.grade.clone(),
            subject: lesson.metadata.subject.clone(),
            artifacts,
            question_count: 0,
            section_count: lesson.sections.len(),
            image_count: 0,
            generated_at: options.generated_at,
        },
    }
}
