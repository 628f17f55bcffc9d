//! Repair loop: one LLM round-trip to fix a plan with a handful of errors.
//!
//! [`validate_and_repair`] is an explicit three-state machine:
//!
//! ```text
//! Initial --(valid | unrepairable)-----------------------------> Final
//! Initial --(repairable)--> attempt_repair --(ok)--> Repaired --> Final
//!                                         \--(err)-------------> Final (original plan)
//! ```
//!
//! `Repaired` re-validates exactly once and always moves to `Final`, so a
//! generation costs at most two LLM calls (generate + one repair) and the
//! loop cannot recurse.

pub mod prompt;

use thiserror::Error;

use crate::llm::{GenerationConfig, LlmProvider, PlanParseError, TokenUsage, parse_plan_response};
use crate::schema::{ValidationRequirements, WorksheetPlan};
use crate::validate::{PlanValidationResult, ValidationIssue, ValidatorConfig, validate_with};

pub use prompt::build_repair_prompt;

/// Why a repair attempt produced no usable plan.
#[derive(Debug, Error)]
pub enum RepairError {
    #[error("no error issues to repair")]
    NothingToRepair,

    #[error("repair request failed: {0:#}")]
    Provider(anyhow::Error),

    #[error("repair response could not be parsed: {source}")]
    Parse {
        #[source]
        source: PlanParseError,
        /// Tokens the provider billed for the unusable response.
        usage: TokenUsage,
    },

    #[error("failed to serialize plan for repair prompt: {0}")]
    Serialize(serde_json::Error),
}

impl RepairError {
    /// Tokens spent before the failure; zero unless the call completed.
    pub fn usage(&self) -> TokenUsage {
        match self {
            Self::Parse { usage, .. } => *usage,
            _ => TokenUsage::default(),
        }
    }
}

/// A successfully parsed repair response.
#[derive(Debug, Clone)]
pub struct RepairAttempt {
    pub plan: WorksheetPlan,
    pub usage: TokenUsage,
}

/// Result of [`validate_and_repair`]. Never an error: repair failures
/// degrade to the original plan.
#[derive(Debug, Clone)]
pub struct ValidatedPlan {
    pub plan: WorksheetPlan,
    pub validation: PlanValidationResult,
    /// `true` iff the returned plan came from the repair call.
    pub was_repaired: bool,
    /// `true` iff a repair call was made (whether or not it succeeded).
    pub repair_attempted: bool,
    /// Validation of the plan as first received.
    pub initial_validation: PlanValidationResult,
    /// Tokens spent on the repair call.
    pub usage: TokenUsage,
}

/// Ask the model to fix the listed errors and parse the corrected plan.
pub async fn attempt_repair(
    llm: &dyn LlmProvider,
    plan: &WorksheetPlan,
    errors: &[ValidationIssue],
    config: &GenerationConfig,
) -> Result<RepairAttempt, RepairError> {
    if errors.is_empty() {
        return Err(RepairError::NothingToRepair);
    }

    let prompt = build_repair_prompt(plan, errors).map_err(RepairError::Serialize)?;
    let response = llm
        .generate_content(&prompt, &config.for_repair())
        .await
        .map_err(RepairError::Provider)?;

    let usage = response.usage();
    let plan = parse_plan_response(&response.content)
        .map_err(|source| RepairError::Parse { source, usage })?;
    Ok(RepairAttempt { plan, usage })
}

enum RepairState {
    Initial {
        plan: WorksheetPlan,
        validation: PlanValidationResult,
    },
    Repaired {
        plan: WorksheetPlan,
        initial_validation: PlanValidationResult,
        usage: TokenUsage,
    },
    Final(ValidatedPlan),
}

/// [`validate_and_repair_with`] using the default [`ValidatorConfig`].
pub async fn validate_and_repair(
    llm: &dyn LlmProvider,
    plan: WorksheetPlan,
    requirements: &ValidationRequirements,
    config: &GenerationConfig,
) -> ValidatedPlan {
    validate_and_repair_with(llm, plan, requirements, config, &ValidatorConfig::default()).await
}

/// Validate `plan`; if it has a repairable number of errors, make one
/// repair call and re-validate the result once.
pub async fn validate_and_repair_with(
    llm: &dyn LlmProvider,
    plan: WorksheetPlan,
    requirements: &ValidationRequirements,
    config: &GenerationConfig,
    validator: &ValidatorConfig,
) -> ValidatedPlan {
    let mut plan = plan;
    let validation = validate_with(&mut plan, requirements, validator);
    let mut state = RepairState::Initial { plan, validation };

    loop {
        state = match state {
            RepairState::Initial { plan, validation } => {
                if validation.valid || !validation.auto_repairable {
                    if !validation.valid {
                        tracing::warn!(
                            errors = validation.error_count(),
                            max = validator.max_repairable_errors,
                            "plan has too many errors to repair"
                        );
                    }
                    RepairState::Final(ValidatedPlan {
                        initial_validation: validation.clone(),
                        plan,
                        validation,
                        was_repaired: false,
                        repair_attempted: false,
                        usage: TokenUsage::default(),
                    })
                } else {
                    let errors = validation.error_issues();
                    tracing::info!(errors = errors.len(), "attempting plan repair");
                    match attempt_repair(llm, &plan, &errors, config).await {
                        Ok(attempt) => RepairState::Repaired {
                            plan: attempt.plan,
                            initial_validation: validation,
                            usage: attempt.usage,
                        },
                        Err(e) => {
                            tracing::warn!(error = %e, "plan repair failed, keeping original plan");
                            RepairState::Final(ValidatedPlan {
                                initial_validation: validation.clone(),
                                plan,
                                validation,
                                was_repaired: false,
                                repair_attempted: true,
                                usage: e.usage(),
                            })
                        }
                    }
                }
            }
            RepairState::Repaired {
                mut plan,
                initial_validation,
                usage,
            } => {
                let validation = validate_with(&mut plan, requirements, validator);
                tracing::info!(
                    errors_before = initial_validation.error_count(),
                    errors_after = validation.error_count(),
                    valid = validation.valid,
                    "repaired plan re-validated"
                );
                RepairState::Final(ValidatedPlan {
                    plan,
                    validation,
                    was_repaired: true,
                    repair_attempted: true,
                    initial_validation,
                    usage,
                })
            }
            RepairState::Final(outcome) => return outcome,
        };
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::{Result, bail};
    use async_trait::async_trait;

    use super::*;
    use crate::llm::LlmResponse;
    use crate::schema::{
        GradeLevel, ItemType, PlanMetadata, PlanStructure, PlanStyle, WorksheetHeader,
        WorksheetItem, WorksheetSection,
    };

    /// Returns queued responses in order; errors once the queue is empty.
    struct QueuedLlm {
        responses: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl QueuedLlm {
        fn new(responses: Vec<String>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().collect()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for QueuedLlm {
        fn name(&self) -> &str {
            "queued"
        }

        async fn generate_content(
            &self,
            _prompt: &str,
            _config: &GenerationConfig,
        ) -> Result<LlmResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.responses.lock().unwrap().pop() {
                Some(content) => Ok(LlmResponse {
                    content,
                    input_tokens: 1000,
                    output_tokens: 500,
                }),
                None => bail!("provider unreachable"),
            }
        }
    }

    fn plan(items: Vec<WorksheetItem>) -> WorksheetPlan {
        WorksheetPlan {
            version: "1.0".into(),
            metadata: PlanMetadata {
                title: "Shapes".into(),
                grade: "1".into(),
                subject: "Math".into(),
                topic: "Shapes".into(),
                learning_objectives: vec![],
                estimated_time: "10 minutes".into(),
            },
            structure: PlanStructure {
                header: WorksheetHeader {
                    title: "Shapes".into(),
                    subtitle: None,
                    instructions: None,
                },
                sections: vec![WorksheetSection {
                    id: "s1".into(),
                    title: "Shapes".into(),
                    instructions: None,
                    items,
                }],
            },
            style: PlanStyle::default(),
            visual_placements: vec![],
        }
    }

    fn answered(n: usize) -> Vec<WorksheetItem> {
        (1..=n)
            .map(|i| {
                WorksheetItem::new(
                    format!("q{i}"),
                    ItemType::ShortAnswer,
                    format!("How many sides on shape {i}?"),
                )
                .answer("4")
            })
            .collect()
    }

    fn requirements() -> ValidationRequirements {
        ValidationRequirements::new(GradeLevel::new(1), "Math").questions(3, 10)
    }

    #[tokio::test]
    async fn valid_plan_returned_unchanged_without_llm_call() {
        let llm = QueuedLlm::new(vec![]);
        let input = plan(answered(3));
        let out = validate_and_repair(
            &llm,
            input.clone(),
            &requirements(),
            &GenerationConfig::default(),
        )
        .await;
        assert!(out.validation.valid);
        assert!(!out.was_repaired);
        assert!(!out.repair_attempted);
        assert_eq!(out.plan, input);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn unrepairable_plan_skips_llm() {
        let llm = QueuedLlm::new(vec![]);
        let items = (1..=6)
            .map(|i| {
                WorksheetItem::new(
                    format!("q{i}"),
                    ItemType::ShortAnswer,
                    format!("How many sides on shape {i}?"),
                )
            })
            .collect();
        let out = validate_and_repair(
            &llm,
            plan(items),
            &requirements(),
            &GenerationConfig::default(),
        )
        .await;
        assert!(!out.validation.valid);
        assert!(!out.validation.auto_repairable);
        assert!(!out.was_repaired);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn repairable_plan_is_repaired_once() {
        let mut broken_items = answered(3);
        broken_items[1].correct_answer = None;
        let fixed = serde_json::to_string(&plan(answered(3))).unwrap();
        let llm = QueuedLlm::new(vec![format!("```json\n{fixed}\n```")]);

        let out = validate_and_repair(
            &llm,
            plan(broken_items),
            &requirements(),
            &GenerationConfig::default(),
        )
        .await;
        assert!(out.was_repaired);
        assert!(out.validation.valid);
        assert_eq!(out.initial_validation.error_count(), 1);
        assert_eq!(out.usage.calls, 1);
        assert_eq!(out.usage.total(), 1500);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn still_broken_after_repair_is_not_repaired_again() {
        let mut broken_items = answered(3);
        broken_items[0].correct_answer = None;
        let still_broken = serde_json::to_string(&plan(broken_items.clone())).unwrap();
        let llm = QueuedLlm::new(vec![still_broken.clone(), still_broken]);

        let out = validate_and_repair(
            &llm,
            plan(broken_items),
            &requirements(),
            &GenerationConfig::default(),
        )
        .await;
        assert!(out.was_repaired);
        assert!(!out.validation.valid);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn unparseable_repair_falls_back_to_original() {
        let mut broken_items = answered(3);
        broken_items[2].correct_answer = Some("TBD".into());
        let original = plan(broken_items);
        let llm = QueuedLlm::new(vec!["Sorry, I can't do that.".into()]);

        let out = validate_and_repair(
            &llm,
            original.clone(),
            &requirements(),
            &GenerationConfig::default(),
        )
        .await;
        assert!(!out.was_repaired);
        assert!(out.repair_attempted);
        assert_eq!(out.plan, original);
        assert_eq!(out.validation, out.initial_validation);
        assert_eq!(llm.calls(), 1);
        assert_eq!(out.usage.calls, 1);
        assert!(out.usage.total() > 0);
    }

    #[tokio::test]
    async fn provider_failure_falls_back_to_original() {
        let mut broken_items = answered(3);
        broken_items[2].correct_answer = None;
        let llm = QueuedLlm::new(vec![]);
        let out = validate_and_repair(
            &llm,
            plan(broken_items),
            &requirements(),
            &GenerationConfig::default(),
        )
        .await;
        assert!(!out.was_repaired);
        assert!(out.repair_attempted);
        assert_eq!(out.validation.error_count(), 1);
    }

    #[tokio::test]
    async fn repair_threshold_is_configurable() {
        let mut broken_items = answered(3);
        broken_items[0].correct_answer = None;
        let llm = QueuedLlm::new(vec![]);
        let strict = ValidatorConfig {
            max_repairable_errors: 0,
            ..ValidatorConfig::default()
        };
        let out = validate_and_repair_with(
            &llm,
            plan(broken_items),
            &requirements(),
            &GenerationConfig::default(),
            &strict,
        )
        .await;
        assert!(!out.repair_attempted);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn attempt_repair_requires_errors() {
        let llm = QueuedLlm::new(vec![]);
        let err = attempt_repair(&llm, &plan(answered(3)), &[], &GenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RepairError::NothingToRepair));
        assert_eq!(llm.calls(), 0);
    }
}
