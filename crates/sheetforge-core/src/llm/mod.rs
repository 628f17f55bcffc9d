//! LLM capability interface consumed by the repair stage and the planner.
//!
//! # Architecture
//!
//! ```text
//! validate_and_repair
//!     |
//!     v
//! &dyn LlmProvider --generate_content(prompt, config)--> LlmResponse
//!     |                                                   |
//!     |                                                   v
//!     |                                  parse_plan_response(content)
//!     |                                                   |
//!     |                                                   v
//!     |                                            WorksheetPlan
//! ProviderRegistry --get("name") / supports_vision("name")
//! ```

pub mod parse;
pub mod registry;
pub mod trait_def;
pub mod types;

pub use parse::{
    PlanParseError, extract_json_object, parse_json_response, parse_lesson_response,
    parse_plan_response, strip_code_fences,
};
pub use registry::ProviderRegistry;
pub use trait_def::LlmProvider;
pub use types::{GenerationConfig, LlmResponse, TokenUsage};
