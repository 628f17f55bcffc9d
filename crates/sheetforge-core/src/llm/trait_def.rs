//! The `LlmProvider` trait -- the capability interface for text models.
//!
//! Each concrete provider (hosted API, local model server, ...) lives
//! outside this crate and implements this trait. The trait is object-safe
//! so it can be stored as `Arc<dyn LlmProvider>` in the
//! [`super::ProviderRegistry`] and handed to pipeline stages.

use anyhow::{Result, bail};
use async_trait::async_trait;

use super::types::{GenerationConfig, LlmResponse};
use crate::schema::ImageResult;

/// Capability interface for a large-language-model backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Registry name for this provider (e.g. "anthropic", "ollama").
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate_content(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<LlmResponse>;

    /// Whether [`LlmProvider::analyze_image_with_vision`] is available.
    fn supports_vision(&self) -> bool {
        false
    }

    /// Ask a vision-capable model about an image.
    async fn analyze_image_with_vision(
        &self,
        _image: &ImageResult,
        _prompt: &str,
        _config: &GenerationConfig,
    ) -> Result<LlmResponse> {
        bail!("provider {:?} does not support vision", self.name())
    }
}

// Compile-time assertion: LlmProvider must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn LlmProvider) {}
};
