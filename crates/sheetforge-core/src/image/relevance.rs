//! Relevance gate: decides which planned images are worth generating.

use std::collections::HashSet;

use crate::schema::{ImagePlacement, ImagePurpose, ImageSize, Richness};

/// Upper bound on images for `rich` documents, however long.
pub const MAX_RICH_IMAGES: usize = 6;
pub const STANDARD_IMAGE_CAP: usize = 3;
pub const MINIMAL_IMAGE_CAP: usize = 1;

/// Maximum number of images a document may carry.
pub fn image_cap(richness: Richness, question_count: usize) -> usize {
    match richness {
        Richness::Rich => question_count.min(MAX_RICH_IMAGES),
        Richness::Standard => STANDARD_IMAGE_CAP,
        Richness::Minimal => MINIMAL_IMAGE_CAP,
    }
}

/// Whether a purpose is allowed at a richness tier.
pub fn purpose_allowed(richness: Richness, purpose: ImagePurpose) -> bool {
    match richness {
        Richness::Minimal => matches!(purpose, ImagePurpose::Counting | ImagePurpose::Diagram),
        Richness::Standard => purpose != ImagePurpose::Decorative,
        Richness::Rich => true,
    }
}

/// Largest size allowed at a richness tier.
pub fn max_size(richness: Richness) -> ImageSize {
    match richness {
        Richness::Minimal => ImageSize::Small,
        Richness::Standard => ImageSize::Medium,
        Richness::Rich => ImageSize::Wide,
    }
}

/// Filter, clamp and cap the planned placements.
///
/// Keeps plan order. Placements with an unknown purpose, an anchor that is
/// not in `valid_item_ids`, or an anchor already used by an earlier
/// placement are dropped.
pub fn select_placements(
    placements: &[ImagePlacement],
    valid_item_ids: &HashSet<&str>,
    richness: Richness,
    question_count: usize,
) -> Vec<ImagePlacement> {
    let cap = image_cap(richness, question_count);
    let ceiling = max_size(richness);
    let mut anchors = HashSet::new();
    let mut selected = Vec::new();

    for placement in placements {
        if selected.len() == cap {
            break;
        }
        let Some(purpose) = placement.purpose() else {
            tracing::debug!(
                purpose = %placement.purpose,
                "dropping placement with unknown purpose"
            );
            continue;
        };
        if !purpose_allowed(richness, purpose) {
            continue;
        }
        let anchor = placement.after_item_id.as_str();
        if !valid_item_ids.contains(anchor) {
            tracing::debug!(after_item_id = %anchor, "dropping placement with dangling anchor");
            continue;
        }
        if !anchors.insert(anchor) {
            continue;
        }

        let mut kept = placement.clone();
        let size = placement.size().unwrap_or(ImageSize::Medium).min(ceiling);
        kept.size = size.as_str().to_string();
        selected.push(kept);
    }

    tracing::debug!(
        planned = placements.len(),
        selected = selected.len(),
        cap,
        richness = %richness,
        "relevance gate applied"
    );
    selected
}
