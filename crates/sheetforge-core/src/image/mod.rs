//! Image stage: relevance gate, content-addressed cache, and the image
//! generation capability.
//!
//! ```text
//! visualPlacements --select_placements(richness)--> selected
//!     selected --ImageRequest::for_placement--> request
//!     request.cache_metadata() --image_hash--> hash
//!     ImageCache::get_or_generate(hash, .., || generator.generate(&request))
//! ```

pub mod cache;
pub mod generator;
pub mod hash;
pub mod relevance;

pub use cache::{
    CacheEntry, CacheError, CacheStats, CachedImage, Clock, INDEX_FILE, ImageCache,
    ImageCacheConfig, SweeperHandle, SystemClock, load_index,
};
pub use generator::{ImageGenerator, ImageRequest, placeholder_image};
pub use hash::{CacheMetadata, HASH_LEN, image_hash};
pub use relevance::{MAX_RICH_IMAGES, image_cap, select_placements};
