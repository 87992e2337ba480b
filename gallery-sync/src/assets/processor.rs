use std::collections::HashSet;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use time::OffsetDateTime;
use walkdir::{DirEntry, WalkDir};

use super::manifest::{IMAGE_MANIFEST_FILE, ImageManifest, ImageManifestEntry};
use super::{AssetError, THUMBNAILS_DIR, placeholder};
use crate::sync::paths::{relative_key, write_atomic};
use crate::sync::tree::has_extension;

pub const PROCESSED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];
pub const THUMBNAIL_WIDTH: u32 = 600;
pub const THUMBNAIL_QUALITY: u8 = 60;
const PLACEHOLDER_SAMPLE: u32 = 100;
const PLACEHOLDER_COMPONENTS: (u32, u32) = (4, 3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub relative_path: String,
    pub path: PathBuf,
}

/// Regenerates thumbnails, placeholders and the image manifest from whatever
/// is currently on disk under the gallery root.
pub struct AssetProcessor {
    root: PathBuf,
}

impl AssetProcessor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(IMAGE_MANIFEST_FILE)
    }

    /// Images under the root in path order. Entries whose name starts with
    /// `_` or `.` are skipped along with everything below them.
    pub fn scan(&self) -> Vec<SourceImage> {
        if !self.root.is_dir() {
            return Vec::new();
        }
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_reserved(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!(%err, "error reading gallery directory");
                    None
                }
            })
            .filter(|entry| {
                entry.file_type().is_file()
                    && has_extension(&entry.file_name().to_string_lossy(), PROCESSED_EXTENSIONS)
            })
            .filter_map(|entry| {
                let relative_path = relative_key(&self.root, entry.path())?;
                Some(SourceImage {
                    relative_path,
                    path: entry.into_path(),
                })
            })
            .collect()
    }

    /// Processes every scanned image and rewrites the manifest. Images that
    /// fail are logged and left out; the manifest is written even when empty.
    pub fn process(&self) -> Result<ImageManifest, AssetError> {
        std::fs::create_dir_all(self.root.join(THUMBNAILS_DIR))?;

        let sources = self.scan();
        if sources.is_empty() {
            tracing::warn!(root = %self.root.display(), "no images found in gallery");
        } else {
            tracing::info!(count = sources.len(), "processing gallery images");
        }
        for thumbnail in shared_thumbnail_paths(&sources) {
            tracing::warn!(
                %thumbnail,
                "several images map to the same thumbnail, the last one processed wins"
            );
        }

        let total = sources.len();
        let mut images = Vec::with_capacity(total);
        for (index, source) in sources.iter().enumerate() {
            tracing::info!(
                "processing [{}/{}] {}",
                index + 1,
                total,
                source.relative_path
            );
            match self.process_one(source) {
                Ok(entry) => images.push(entry),
                Err(err) => {
                    tracing::error!(path = %source.relative_path, %err, "failed to process image");
                }
            }
        }

        let manifest = ImageManifest::new(OffsetDateTime::now_utc(), images);
        let manifest_path = self.manifest_path();
        manifest.write_to(&manifest_path)?;
        tracing::info!(
            images = manifest.total_images,
            skipped = total - manifest.total_images,
            manifest = %manifest_path.display(),
            "processing complete"
        );
        Ok(manifest)
    }

    fn process_one(&self, source: &SourceImage) -> Result<ImageManifestEntry, AssetError> {
        let img = ImageReader::open(&source.path)?
            .with_guessed_format()?
            .decode()?;
        let (width, height) = (img.width(), img.height());

        let thumbnail_path = thumbnail_relative_path(&source.relative_path);
        write_thumbnail(&img, &self.root.join(&thumbnail_path))?;

        let blur_hash = match placeholder_for(&img) {
            Ok(hash) => Some(hash),
            Err(err) => {
                tracing::warn!(path = %source.relative_path, %err, "placeholder encoding failed");
                None
            }
        };

        Ok(ImageManifestEntry {
            path: source.relative_path.clone(),
            thumbnail_path,
            blur_hash,
            width,
            height,
        })
    }
}

fn is_reserved(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    name.starts_with('_') || name.starts_with('.')
}

/// `Concept/a.png` -> `_thumbnails/Concept/a.jpg`.
pub fn thumbnail_relative_path(relative_path: &str) -> String {
    let (dir, file) = match relative_path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, relative_path),
    };
    let stem = match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    };
    match dir {
        Some(dir) => format!("{THUMBNAILS_DIR}/{dir}/{stem}.jpg"),
        None => format!("{THUMBNAILS_DIR}/{stem}.jpg"),
    }
}

/// Thumbnail paths produced by more than one source, e.g. `a.png` and
/// `a.jpg` side by side. Reported once each, in scan order.
pub fn shared_thumbnail_paths(sources: &[SourceImage]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut shared = Vec::new();
    for source in sources {
        let thumbnail = thumbnail_relative_path(&source.relative_path);
        if !seen.insert(thumbnail.clone()) && !shared.contains(&thumbnail) {
            shared.push(thumbnail);
        }
    }
    shared
}

/// Scales to `THUMBNAIL_WIDTH` keeping aspect ratio; narrower images keep their size.
pub fn thumbnail_dimensions(width: u32, height: u32) -> (u32, u32) {
    if width <= THUMBNAIL_WIDTH || width == 0 {
        return (width, height);
    }
    let scaled = (height as u64 * THUMBNAIL_WIDTH as u64 + width as u64 / 2) / width as u64;
    (THUMBNAIL_WIDTH, (scaled as u32).max(1))
}

fn write_thumbnail(img: &DynamicImage, target: &Path) -> Result<(), AssetError> {
    let (width, height) = thumbnail_dimensions(img.width(), img.height());
    let resized = if (width, height) == (img.width(), img.height()) {
        img.to_rgb8()
    } else {
        img.resize_exact(width, height, FilterType::Lanczos3).to_rgb8()
    };

    let mut bytes = Vec::new();
    resized.write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, THUMBNAIL_QUALITY))?;
    write_atomic(target, &bytes)?;
    Ok(())
}

fn placeholder_for(img: &DynamicImage) -> Result<String, AssetError> {
    let sample = img.resize_to_fill(PLACEHOLDER_SAMPLE, PLACEHOLDER_SAMPLE, FilterType::Triangle);
    let rgba = opaque_rgba(&sample);
    let (cx, cy) = PLACEHOLDER_COMPONENTS;
    Ok(placeholder::encode(cx, cy, sample.width(), sample.height(), &rgba)?)
}

/// RGBA8 pixels with alpha forced to 255; grey and RGB sources are expanded.
fn opaque_rgba(img: &DynamicImage) -> Vec<u8> {
    let mut rgba = img.to_rgba8().into_raw();
    for pixel in rgba.chunks_exact_mut(4) {
        pixel[3] = 255;
    }
    rgba
}
