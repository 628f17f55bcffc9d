//! Illustration types shared by the validator, image stage, assembler and
//! quality gate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Prefix marking an [`ImageResult`] that stands in for a failed generation.
pub const PLACEHOLDER_PREFIX: &str = "placeholder:";

/// Where an illustration goes and what it should show.
///
/// `purpose` and `size` are kept as the raw strings the LLM produced so the
/// validator can report bad values instead of failing deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImagePlacement {
    /// The item this image is rendered after.
    pub after_item_id: String,
    pub description: String,
    pub purpose: String,
    pub size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl ImagePlacement {
    pub fn new(
        after_item_id: impl Into<String>,
        description: impl Into<String>,
        purpose: ImagePurpose,
        size: ImageSize,
    ) -> Self {
        Self {
            after_item_id: after_item_id.into(),
            description: description.into(),
            purpose: purpose.to_string(),
            size: size.to_string(),
            style: None,
        }
    }

    /// Parsed purpose, or `None` if the raw value is not recognised.
    pub fn purpose(&self) -> Option<ImagePurpose> {
        self.purpose.parse().ok()
    }

    /// Parsed size, or `None` if the raw value is not recognised.
    pub fn size(&self) -> Option<ImageSize> {
        self.size.parse().ok()
    }
}

/// Why an image is on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImagePurpose {
    /// Objects the student counts.
    Counting,
    /// Labelled diagram the question refers to.
    Diagram,
    /// Illustrates a concept.
    Illustration,
    /// Worked example.
    Example,
    /// Sets the scene for a word problem.
    Scene,
    /// Pure decoration.
    Decorative,
}

impl ImagePurpose {
    pub const ALL: [ImagePurpose; 6] = [
        Self::Counting,
        Self::Diagram,
        Self::Illustration,
        Self::Example,
        Self::Scene,
        Self::Decorative,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Counting => "counting",
            Self::Diagram => "diagram",
            Self::Illustration => "illustration",
            Self::Example => "example",
            Self::Scene => "scene",
            Self::Decorative => "decorative",
        }
    }
}

impl fmt::Display for ImagePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImagePurpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == lower)
            .ok_or_else(|| format!("unknown image purpose: {s:?}"))
    }
}

/// Printed footprint of an image. "large" is deliberately not a size:
/// full-page art breaks worksheet pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImageSize {
    Small,
    Medium,
    Wide,
}

impl ImageSize {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Wide => "wide",
        }
    }

    /// Pixel dimensions requested from the image generator.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Small => (256, 256),
            Self::Medium => (512, 512),
            Self::Wide => (1024, 512),
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "wide" => Ok(Self::Wide),
            other => Err(format!(
                "invalid image size: {other:?} (expected small, medium, or wide)"
            )),
        }
    }
}

/// A generated (or placeholder) illustration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageResult {
    pub base64_data: String,
    pub media_type: String,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement_id: Option<String>,
}

impl ImageResult {
    /// Build the sentinel result for a failed generation.
    pub fn placeholder(reason: &str, placement_id: Option<String>) -> Self {
        Self {
            base64_data: format!("{PLACEHOLDER_PREFIX}{reason}"),
            media_type: "text/plain".to_string(),
            width: 0,
            height: 0,
            placement_id,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.base64_data.starts_with(PLACEHOLDER_PREFIX)
    }

    /// Decoded size estimate: base64 carries 3 bytes per 4 characters.
    pub fn estimated_bytes(&self) -> usize {
        if self.is_placeholder() {
            return 0;
        }
        self.base64_data.len() * 3 / 4
    }

    /// `data:` URI suitable for an `<img src>`.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.base64_data)
    }
}

/// How many illustrations a document may carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Richness {
    Minimal,
    #[default]
    Standard,
    Rich,
}

impl fmt::Display for Richness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Minimal => "minimal",
            Self::Standard => "standard",
            Self::Rich => "rich",
        })
    }
}

impl FromStr for Richness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minimal" => Ok(Self::Minimal),
            "standard" => Ok(Self::Standard),
            "rich" => Ok(Self::Rich),
            other => Err(format!(
                "invalid richness: {other:?} (expected minimal, standard, or rich)"
            )),
        }
    }
}

/// Per-request visual settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualSettings {
    pub enabled: bool,
    #[serde(default)]
    pub richness: Richness,
}

impl VisualSettings {
    pub fn enabled(richness: Richness) -> Self {
        Self {
            enabled: true,
            richness,
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_detection() {
        let img = ImageResult::placeholder("none", None);
        assert!(img.is_placeholder());
        assert_eq!(img.base64_data, "placeholder:none");
        assert_eq!(img.estimated_bytes(), 0);
    }

    #[test]
    fn estimated_bytes_is_three_quarters_of_base64() {
        let img = ImageResult {
            base64_data: "A".repeat(400),
            media_type: "image/png".into(),
            width: 10,
            height: 10,
            placement_id: None,
        };
        assert_eq!(img.estimated_bytes(), 300);
        assert!(img.data_uri().starts_with("data:image/png;base64,AAAA"));
    }

    #[test]
    fn size_rejects_large() {
        assert!("large".parse::<ImageSize>().is_err());
        assert_eq!("Wide".parse::<ImageSize>(), Ok(ImageSize::Wide));
    }

    #[test]
    fn purpose_parses_all_variants() {
        for p in ImagePurpose::ALL {
            assert_eq!(p.as_str().parse::<ImagePurpose>(), Ok(p));
        }
        assert!("banner".parse::<ImagePurpose>().is_err());
    }

    #[test]
    fn placement_accessors_parse_raw_strings() {
        let json = r#"{
            "afterItemId": "q1",
            "description": "three apples",
            "purpose": "counting",
            "size": "large"
        }"#;
        let p: ImagePlacement = serde_json::from_str(json).unwrap();
        assert_eq!(p.purpose(), Some(ImagePurpose::Counting));
        assert_eq!(p.size(), None);
    }
}
