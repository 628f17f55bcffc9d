//! SheetForge premium generation pipeline.
//!
//! Turns an LLM-produced worksheet or lesson plan into printable HTML:
//! [`validate`] checks the plan, [`repair`] makes at most one LLM call to
//! fix it, [`image`] gates and caches illustrations, [`assemble`] renders
//! HTML, and [`quality`] scores the result and decides billing.
//! [`pipeline`] wires the stages together.

pub mod assemble;
pub mod config;
pub mod image;
pub mod llm;
pub mod pipeline;
pub mod quality;
pub mod repair;
pub mod schema;
pub mod validate;

pub use pipeline::{BillingDecision, PipelineOutput, PipelineRequest, PremiumPipeline};
