use std::path::Path;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::AssetError;
use crate::sync::paths::write_atomic;

pub const IMAGE_MANIFEST_FILE: &str = "imageManifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifestEntry {
    pub path: String,
    pub thumbnail_path: String,
    pub blur_hash: Option<String>,
    pub width: u32,
    pub height: u32,
}

/// Everything the site needs to lay out the gallery without opening images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    #[serde(with = "time::serde::rfc3339")]
    pub generated: OffsetDateTime,
    pub total_images: usize,
    pub images: Vec<ImageManifestEntry>,
}

impl ImageManifest {
    pub fn new(generated: OffsetDateTime, images: Vec<ImageManifestEntry>) -> Self {
        Self {
            generated,
            total_images: images.len(),
            images,
        }
    }

    pub fn write_to(&self, path: &Path) -> Result<(), AssetError> {
        let bytes = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &bytes)?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self, AssetError> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use time::macros::datetime;

    fn entry() -> ImageManifestEntry {
        ImageManifestEntry {
            path: "Concept/a.jpg".into(),
            thumbnail_path: "_thumbnails/Concept/a.jpg".into(),
            blur_hash: None,
            width: 1200,
            height: 800,
        }
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let manifest = ImageManifest::new(datetime!(2024-05-01 10:00 UTC), vec![entry()]);
        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "generated": "2024-05-01T10:00:00Z",
                "totalImages": 1,
                "images": [{
                    "path": "Concept/a.jpg",
                    "thumbnailPath": "_thumbnails/Concept/a.jpg",
                    "blurHash": null,
                    "width": 1200,
                    "height": 800
                }]
            })
        );
    }

    #[test]
    fn total_matches_entries() {
        let manifest = ImageManifest::new(OffsetDateTime::UNIX_EPOCH, vec![entry(), entry()]);
        assert_eq!(manifest.total_images, 2);
        assert_eq!(ImageManifest::new(OffsetDateTime::UNIX_EPOCH, Vec::new()).total_images, 0);
    }

    #[test]
    fn write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(IMAGE_MANIFEST_FILE);
        let manifest = ImageManifest::new(datetime!(2024-05-01 10:00 UTC), vec![entry()]);
        manifest.write_to(&path).unwrap();

        assert_eq!(ImageManifest::read_from(&path).unwrap(), manifest);
        assert!(!dir.path().join("imageManifest.json.partial").exists());
    }
}
