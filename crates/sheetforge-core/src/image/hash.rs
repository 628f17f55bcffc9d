use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex characters kept from the SHA-256 digest.
pub const HASH_LEN: usize = 32;

/// The inputs that make two image requests interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    pub description: String,
    pub style: String,
    pub grade: String,
    pub subject: String,
    pub size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

fn normalize(field: &str) -> String {
    field
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Content hash used as the cache key.
///
/// Fields are trimmed, lower-cased and whitespace-collapsed, so cosmetic
/// differences in the description map to the same entry. Each field is
/// length-prefixed so separators inside a field cannot shift boundaries.
pub fn image_hash(meta: &CacheMetadata) -> String {
    let fields = [
        meta.style.as_str(),
        meta.grade.as_str(),
        meta.subject.as_str(),
        meta.size.as_str(),
        meta.description.as_str(),
        meta.theme.as_deref().unwrap_or(""),
    ];

    let mut hasher = Sha256::new();
    for field in fields.map(normalize) {
        hasher.update(field.len().to_string().as_bytes());
        hasher.update(b":");
        hasher.update(field.as_bytes());
        hasher.update(b"|");
    }

    let mut hex = hex::encode(hasher.finalize());
    hex.truncate(HASH_LEN);
    hex
}
