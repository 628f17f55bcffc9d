//! Shared test utilities for sheetforge integration tests.
//!
//! Fixtures for plans and lessons, scripted fakes for the LLM and image
//! capabilities, a manually advanced clock for the image cache, and a
//! tracing subscriber for test output.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use sheetforge_core::image::{Clock, ImageGenerator, ImageRequest};
use sheetforge_core::llm::{GenerationConfig, LlmProvider, LlmResponse};
use sheetforge_core::schema::{
    ImagePlacement, ImagePurpose, ImageResult, ImageSize, ItemType, LessonMetadata,
    LessonPlanStructure, LessonSection, MaterialItem, PlanMetadata, PlanStructure, PlanStyle,
    ScriptCue, ScriptEntry, WorksheetHeader, WorksheetItem, WorksheetPlan, WorksheetSection,
};

// -----------------------------------------------------------------------
// Tracing
// -----------------------------------------------------------------------

/// Install a fmt subscriber once per test binary. `RUST_LOG` overrides the
/// default `warn` filter.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// -----------------------------------------------------------------------
// Fixtures
// -----------------------------------------------------------------------

/// A valid grade 2 math plan with `questions` short-answer items split
/// over two sections.
pub fn sample_plan(questions: usize) -> WorksheetPlan {
    let items: Vec<WorksheetItem> = (1..=questions)
        .map(|i| {
            WorksheetItem::new(
                format!("q{i}"),
                ItemType::ShortAnswer,
                format!("What is {i} + {i}?"),
            )
            .answer((i * 2).to_string())
            .explanation(format!("Double {i} to get {}.", i * 2))
        })
        .collect();
    let split = questions.div_ceil(2);
    let (first, second) = items.split_at(split);

    let mut sections = vec![WorksheetSection {
        id: "s1".into(),
        title: "Warm Up".into(),
        instructions: Some("Add the numbers.".into()),
        items: first.to_vec(),
    }];
    if !second.is_empty() {
        sections.push(WorksheetSection {
            id: "s2".into(),
            title: "Practice".into(),
            instructions: None,
            items: second.to_vec(),
        });
    }

    WorksheetPlan {
        version: "1.0".into(),
        metadata: PlanMetadata {
            title: "Doubles Practice".into(),
            grade: "2".into(),
            subject: "Math".into(),
            topic: "Addition doubles".into(),
            learning_objectives: vec!["Add doubles within 20.".into()],
            estimated_time: "20 minutes".into(),
        },
        structure: PlanStructure {
            header: WorksheetHeader {
                title: "Doubles Practice".into(),
                subtitle: Some("Adding a number to itself".into()),
                instructions: Some("Solve each problem.".into()),
            },
            sections,
        },
        style: PlanStyle::default(),
        visual_placements: Vec::new(),
    }
}

/// A counting placement anchored after `item_id`.
pub fn counting_placement(item_id: &str) -> ImagePlacement {
    ImagePlacement::new(
        item_id,
        format!("apples for {item_id}"),
        ImagePurpose::Counting,
        ImageSize::Small,
    )
}

/// A small fake PNG image.
pub fn sample_image(tag: &str) -> ImageResult {
    ImageResult {
        base64_data: format!("iVBORw0KGgo{tag}"),
        media_type: "image/png".into(),
        width: 256,
        height: 256,
        placement_id: None,
    }
}

/// A lesson with materials in two places and a teacher script on one section.
pub fn sample_lesson() -> LessonPlanStructure {
    let mut intro = LessonSection::new("intro", "Warm Up");
    intro.duration_minutes = Some(10);
    intro.content.push("Show a plant and ask what it needs.".into());
    intro.teacher_script.push(ScriptEntry {
        cue: ScriptCue::Ask,
        text: "What does a plant need to grow?".into(),
        timing: Some("2 min".into()),
    });
    intro.materials.push(MaterialItem::new("Potted plant"));

    let mut explore = LessonSection::new("explore", "Plant a Seed");
    explore.duration_minutes = Some(25);
    explore.activities.push("Plant a bean seed in a cup.".into());
    explore.materials.push(MaterialItem::new("potted plant"));
    explore.materials.push(MaterialItem::new("Cups"));

    LessonPlanStructure {
        metadata: LessonMetadata {
            title: "How Plants Grow".into(),
            grade: "2".into(),
            subject: "Science".into(),
            topic: "Plants".into(),
            duration_minutes: 35,
            objectives: vec!["Name three things plants need.".into()],
            standards: vec![],
        },
        sections: vec![intro, explore],
        materials: vec![MaterialItem::new("Bean seeds")],
        differentiation: None,
        assessment: Some("Exit ticket: draw a plant and label what it needs.".into()),
    }
}

// -----------------------------------------------------------------------
// ScriptedLlm
// -----------------------------------------------------------------------

/// LLM fake that returns queued responses in order and records prompts.
/// Errors once the queue is empty.
#[derive(Debug, Default)]
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response.
    pub fn respond(self, content: impl Into<String>) -> Self {
        self.lock_responses().push_back(Ok(content.into()));
        self
    }

    /// Queue a plan serialized as JSON.
    pub fn respond_with_plan(self, plan: &WorksheetPlan) -> Self {
        let json = serde_json::to_string_pretty(plan).unwrap_or_default();
        self.respond(json)
    }

    /// Queue a provider failure.
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.lock_responses().push_back(Err(message.into()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, String>>> {
        self.responses.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate_content(
        &self,
        prompt: &str,
        _config: &GenerationConfig,
    ) -> Result<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());

        let next = self.lock_responses().pop_front();
        match next {
            Some(Ok(content)) => Ok(LlmResponse {
                input_tokens: (prompt.len() / 4) as u64,
                output_tokens: (content.len() / 4) as u64,
                content,
            }),
            Some(Err(message)) => bail!(message),
            None => bail!("scripted LLM has no more responses"),
        }
    }
}

// -----------------------------------------------------------------------
// ScriptedImageGenerator
// -----------------------------------------------------------------------

/// Image generator fake. Returns a deterministic image per description and
/// fails for descriptions containing any configured substring.
#[derive(Debug, Default)]
pub struct ScriptedImageGenerator {
    fail_on: Vec<String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ImageRequest>>,
}

impl ScriptedImageGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(mut self, needle: impl Into<String>) -> Self {
        self.fail_on.push(needle.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ImageRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ImageGenerator for ScriptedImageGenerator {
    async fn generate(&self, request: &ImageRequest) -> Result<ImageResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        if self.fail_on.iter().any(|n| request.description.contains(n.as_str())) {
            bail!("image backend rejected {:?}", request.description);
        }
        let tag: String = request
            .description
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        Ok(ImageResult {
            width: request.width,
            height: request.height,
            ..sample_image(&tag)
        })
    }
}

// -----------------------------------------------------------------------
// ManualClock
// -----------------------------------------------------------------------

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// A clock starting at 2026-01-01T00:00:00Z.
    pub fn starting_now() -> Self {
        Self::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().unwrap_or_else(Utc::now))
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn advance_days(&self, days: i64) {
        self.advance(Duration::days(days));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
