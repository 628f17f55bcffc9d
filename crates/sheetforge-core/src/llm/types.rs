use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

/// Per-call generation settings passed through to the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Provider to route the call to (looked up in the registry).
    pub provider: String,
    /// Model override; `None` uses the provider default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the provider for a JSON-only response when it supports that.
    #[serde(default)]
    pub json_mode: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: "default".to_string(),
            model: None,
            temperature: 0.4,
            max_tokens: 8192,
            json_mode: true,
        }
    }
}

impl GenerationConfig {
    /// Settings for a repair call: deterministic-leaning, JSON only.
    pub fn for_repair(&self) -> Self {
        Self {
            temperature: self.temperature.min(0.2),
            json_mode: true,
            ..self.clone()
        }
    }
}

/// Raw text returned by a provider plus token accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl LlmResponse {
    pub fn usage(&self) -> TokenUsage {
        TokenUsage {
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            calls: 1,
        }
    }
}

/// Accumulated token usage across calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub calls: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
        self.calls += rhs.calls;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repair_config_caps_temperature() {
        let cfg = GenerationConfig {
            temperature: 0.9,
            json_mode: false,
            ..GenerationConfig::default()
        };
        let repair = cfg.for_repair();
        assert!(repair.temperature <= 0.2);
        assert!(repair.json_mode);
        assert_eq!(repair.provider, cfg.provider);
    }

    #[test]
    fn usage_accumulates() {
        let mut total = TokenUsage::default();
        total += LlmResponse {
            content: String::new(),
            input_tokens: 100,
            output_tokens: 40,
        }
        .usage();
        total += LlmResponse {
            content: String::new(),
            input_tokens: 10,
            output_tokens: 5,
        }
        .usage();
        assert_eq!(total.calls, 2);
        assert_eq!(total.total(), 155);
    }
}
