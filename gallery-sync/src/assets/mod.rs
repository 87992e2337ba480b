pub mod manifest;
pub mod placeholder;
pub mod processor;

use std::io;

use thiserror::Error;

pub use manifest::{IMAGE_MANIFEST_FILE, ImageManifest, ImageManifestEntry};
pub use processor::AssetProcessor;

/// Reserved directory under the gallery root holding generated thumbnails.
pub const THUMBNAILS_DIR: &str = "_thumbnails";

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("placeholder error: {0}")]
    Placeholder(#[from] placeholder::PlaceholderError),
}
