//! Premium generation pipeline: validate/repair, images, assemble, gate.
//!
//! ```text
//! WorksheetPlan
//!   -> validate_and_repair        (<= 1 repair call)
//!   -> select_placements          (relevance gate, visuals only)
//!   -> ImageCache::get_or_generate per placement (failures -> placeholders)
//!   -> assemble_worksheet         (worksheet + answer key)
//!   -> run_quality_gate           (score, passed, should_charge)
//!   -> BillingDecision
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::assemble::{AssembleOptions, AssembledWorksheet, PlacedImage, assemble_worksheet};
use crate::config::ForgeConfig;
use crate::image::{
    ImageCache, ImageGenerator, ImageRequest, image_hash, placeholder_image, select_placements,
};
use crate::llm::{GenerationConfig, LlmProvider, TokenUsage};
use crate::quality::{QualityCheckResult, QualityGateConfig, QualityInput, run_quality_gate};
use crate::repair::validate_and_repair_with;
use crate::schema::{
    ImagePlacement, ImageResult, ValidationRequirements, VisualSettings, WorksheetPlan,
};
use crate::validate::{PlanValidationResult, ValidatorConfig};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("plan is invalid after repair ({errors} error(s)); first: {first}")]
    InvalidPlan { errors: usize, first: String },
}

/// Stage settings shared by every run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineConfig {
    pub validator: ValidatorConfig,
    pub quality: QualityGateConfig,
}

impl From<&ForgeConfig> for PipelineConfig {
    fn from(config: &ForgeConfig) -> Self {
        Self {
            validator: config.validation.clone(),
            quality: config.quality.clone(),
        }
    }
}

/// Per-request settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRequest {
    pub requirements: ValidationRequirements,
    pub visual_settings: VisualSettings,
    pub ai_config: GenerationConfig,
    /// Fail the run instead of rendering a plan that is still invalid.
    pub reject_invalid: bool,
    pub include_answer_key: bool,
    pub generated_at: Option<DateTime<Utc>>,
}

impl PipelineRequest {
    pub fn new(requirements: ValidationRequirements) -> Self {
        Self {
            requirements,
            visual_settings: VisualSettings::disabled(),
            ai_config: GenerationConfig::default(),
            reject_invalid: false,
            include_answer_key: true,
            generated_at: None,
        }
    }

    /// A request whose visuals follow the `[images]` config section.
    pub fn from_config(requirements: ValidationRequirements, config: &ForgeConfig) -> Self {
        Self::new(requirements).visuals(config.images.visual_settings())
    }

    pub fn visuals(mut self, settings: VisualSettings) -> Self {
        self.visual_settings = settings;
        self
    }

    pub fn ai_config(mut self, config: GenerationConfig) -> Self {
        self.ai_config = config;
        self
    }

    pub fn reject_invalid(mut self, reject: bool) -> Self {
        self.reject_invalid = reject;
        self
    }

    pub fn include_answer_key(mut self, include: bool) -> Self {
        self.include_answer_key = include;
        self
    }

    pub fn generated_at(mut self, ts: DateTime<Utc>) -> Self {
        self.generated_at = Some(ts);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingDecision {
    Charge,
    Refund,
}

impl BillingDecision {
    pub fn from_quality(result: &QualityCheckResult) -> Self {
        if result.should_charge {
            Self::Charge
        } else {
            Self::Refund
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub generation_id: Uuid,
    pub plan: WorksheetPlan,
    pub validation: PlanValidationResult,
    pub was_repaired: bool,
    pub repair_attempted: bool,
    pub worksheet: AssembledWorksheet,
    pub images: Vec<PlacedImage>,
    pub quality: QualityCheckResult,
    pub billing: BillingDecision,
    pub usage: TokenUsage,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct PremiumPipeline {
    llm: Arc<dyn LlmProvider>,
    image_generator: Arc<dyn ImageGenerator>,
    cache: Arc<ImageCache>,
    config: PipelineConfig,
}

impl std::fmt::Debug for PremiumPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PremiumPipeline")
            .field("llm", &self.llm.name())
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish()
    }
}

impl PremiumPipeline {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        image_generator: Arc<dyn ImageGenerator>,
        cache: Arc<ImageCache>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            llm,
            image_generator,
            cache,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<ImageCache> {
        &self.cache
    }

    /// Run a planner-produced worksheet plan through every stage.
    ///
    /// Only fails when `request.reject_invalid` is set and the plan is
    /// still invalid after repair; everything else degrades in place.
    pub async fn run_worksheet(
        &self,
        plan: WorksheetPlan,
        request: &PipelineRequest,
    ) -> Result<PipelineOutput> {
        let generation_id = Uuid::new_v4();
        let span = tracing::info_span!("generation", generation_id = %generation_id);
        self.run_worksheet_inner(generation_id, plan, request)
            .instrument(span)
            .await
    }

    async fn run_worksheet_inner(
        &self,
        generation_id: Uuid,
        plan: WorksheetPlan,
        request: &PipelineRequest,
    ) -> Result<PipelineOutput> {
        tracing::info!(title = %plan.metadata.title, "worksheet generation started");

        // 1. Validate, repairing once if eligible.
        let validated = validate_and_repair_with(
            self.llm.as_ref(),
            plan,
            &request.requirements,
            &request.ai_config,
            &self.config.validator,
        )
        .await;

        // 2. Optionally refuse plans that are still broken.
        if !validated.validation.valid && request.reject_invalid {
            let first = validated
                .validation
                .errors()
                .next()
                .map(|i| format!("{}: {}", i.field, i.message))
                .unwrap_or_default();
            return Err(PipelineError::InvalidPlan {
                errors: validated.validation.error_count(),
                first,
            }
            .into());
        }
        let plan = validated.plan;

        // 3 + 4. Relevance gate and image generation.
        let images = if request.visual_settings.enabled {
            self.generate_images(&plan, request.visual_settings).await
        } else {
            Vec::new()
        };

        // 5. Assemble.
        let mut options = AssembleOptions::default()
            .include_answer_key(request.include_answer_key)
            .images(images.clone());
        options.generated_at = request.generated_at;
        let worksheet = assemble_worksheet(&plan, &options);

        // 6. Quality gate.
        let image_results: Vec<ImageResult> = images.iter().map(|p| p.image.clone()).collect();
        let mut input = QualityInput::new(&worksheet.worksheet_html, &plan, &request.requirements)
            .images(&image_results)
            .visual_settings(request.visual_settings);
        if let Some(key) = worksheet.answer_key_html.as_deref() {
            input = input.answer_key(key);
        }
        let quality = run_quality_gate(&input, &self.config.quality);

        // 7. Billing.
        let billing = BillingDecision::from_quality(&quality);

        tracing::info!(
            valid = validated.validation.valid,
            repaired = validated.was_repaired,
            images = images.len(),
            score = quality.score,
            billing = ?billing,
            "worksheet generation finished"
        );

        Ok(PipelineOutput {
            generation_id,
            plan,
            validation: validated.validation,
            was_repaired: validated.was_repaired,
            repair_attempted: validated.repair_attempted,
            worksheet,
            images,
            quality,
            billing,
            usage: validated.usage,
        })
    }

    async fn generate_images(
        &self,
        plan: &WorksheetPlan,
        settings: VisualSettings,
    ) -> Vec<PlacedImage> {
        let item_ids: HashSet<&str> = plan.items().map(|i| i.id.as_str()).collect();
        let selected = select_placements(
            &plan.visual_placements,
            &item_ids,
            settings.richness,
            plan.question_count(),
        );

        join_all(selected.into_iter().map(|placement| self.generate_one(plan, placement))).await
    }

    async fn generate_one(&self, plan: &WorksheetPlan, placement: ImagePlacement) -> PlacedImage {
        let request = ImageRequest::for_placement(
            &placement,
            &plan.style.visual_style,
            &plan.metadata.grade,
            &plan.metadata.subject,
            plan.style.theme.as_deref(),
        );
        let metadata = request.cache_metadata();
        let hash = image_hash(&metadata);
        let placement_id = Some(placement.after_item_id.clone());

        let image = match self
            .cache
            .get_or_generate(&hash, metadata, || self.image_generator.generate(&request))
            .await
        {
            Ok(cached) => {
                tracing::debug!(
                    hash = %hash,
                    cached = cached.cached,
                    after_item_id = %placement.after_item_id,
                    "image ready"
                );
                ImageResult {
                    placement_id,
                    ..cached.image
                }
            }
            Err(e) => {
                tracing::warn!(
                    hash = %hash,
                    after_item_id = %placement.after_item_id,
                    error = %e,
                    "image generation failed, using placeholder"
                );
                placeholder_image("generation failed", placement_id)
            }
        };

        PlacedImage { placement, image }
    }
}
