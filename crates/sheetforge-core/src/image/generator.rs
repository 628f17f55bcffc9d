use anyhow::Result;
use async_trait::async_trait;

use super::hash::CacheMetadata;
use crate::schema::{ImagePlacement, ImageResult, ImageSize};

/// A request for one illustration.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    /// Item the image is anchored after.
    pub placement_id: String,
    pub description: String,
    pub style: String,
    pub size: ImageSize,
    pub width: u32,
    pub height: u32,
    pub grade: String,
    pub subject: String,
    pub theme: Option<String>,
}

impl ImageRequest {
    /// Build a request for `placement`, using the plan's style defaults
    /// when the placement has none of its own.
    pub fn for_placement(
        placement: &ImagePlacement,
        style: &str,
        grade: &str,
        subject: &str,
        theme: Option<&str>,
    ) -> Self {
        let size = placement.size().unwrap_or(ImageSize::Medium);
        let (width, height) = size.dimensions();
        Self {
            placement_id: placement.after_item_id.clone(),
            description: placement.description.clone(),
            style: placement.style.clone().unwrap_or_else(|| style.to_string()),
            size,
            width,
            height,
            grade: grade.to_string(),
            subject: subject.to_string(),
            theme: theme.map(str::to_string),
        }
    }

    /// The cache key inputs for this request.
    pub fn cache_metadata(&self) -> CacheMetadata {
        CacheMetadata {
            description: self.description.clone(),
            style: self.style.clone(),
            grade: self.grade.clone(),
            subject: self.subject.clone(),
            size: self.size.as_str().to_string(),
            theme: self.theme.clone(),
        }
    }
}

/// Opaque image generation capability.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate one image. Errors are turned into placeholders by the caller.
    async fn generate(&self, request: &ImageRequest) -> Result<ImageResult>;
}

// Compile-time assertion: ImageGenerator must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn ImageGenerator) {}
};

/// Sentinel result for a failed generation. Never cached.
pub fn placeholder_image(reason: &str, placement_id: Option<String>) -> ImageResult {
    ImageResult::placeholder(reason, placement_id)
}
