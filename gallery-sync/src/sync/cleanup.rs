use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use super::manifest::SyncManifest;
use super::paths::relative_key;
use super::tree::{SYNCED_EXTENSIONS, has_extension};
use crate::assets::THUMBNAILS_DIR;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orphan {
    pub relative_path: String,
    pub path: PathBuf,
}

/// Local synced-type files that have no remote counterpart.
///
/// `remote_paths` holds lowercased root-relative paths. Only directories whose
/// top-level name is in `remote_folders` are descended, so local-only trees
/// are never touched; files directly under `root` are always considered.
pub fn find_orphans(
    root: &Path,
    remote_paths: &HashSet<String>,
    remote_folders: &BTreeSet<String>,
) -> Vec<Orphan> {
    if !root.is_dir() {
        return Vec::new();
    }

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| should_descend(entry, remote_folders));

    let mut orphans = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(%err, "error reading gallery directory");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if !has_extension(&entry.file_name().to_string_lossy(), SYNCED_EXTENSIONS) {
            continue;
        }
        let Some(relative_path) = relative_key(root, entry.path()) else {
            continue;
        };
        if !remote_paths.contains(&relative_path.to_lowercase()) {
            orphans.push(Orphan {
                relative_path,
                path: entry.into_path(),
            });
        }
    }
    orphans
}

/// Deletes `orphans` and forgets their manifest entries. Under `dry_run`
/// only the manifest copy in memory is updated, so the report matches what a
/// real run would do. Returns the number of orphans seen.
pub fn remove_orphans(orphans: &[Orphan], manifest: &mut SyncManifest, dry_run: bool) -> usize {
    for orphan in orphans {
        if dry_run {
            tracing::info!(path = %orphan.relative_path, "[dry run] would delete orphan");
            manifest.remove_by_path(&orphan.relative_path);
            continue;
        }
        match std::fs::remove_file(&orphan.path) {
            Ok(()) => {
                tracing::info!(path = %orphan.relative_path, "deleted orphan");
                manifest.remove_by_path(&orphan.relative_path);
            }
            Err(err) => {
                tracing::warn!(path = %orphan.relative_path, %err, "could not delete orphan");
            }
        }
    }
    orphans.len()
}

fn should_descend(entry: &DirEntry, remote_folders: &BTreeSet<String>) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    if name == THUMBNAILS_DIR {
        return false;
    }
    entry.depth() > 1 || remote_folders.contains(name.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_lowercase()).collect()
    }

    fn folders(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn relative(orphans: &[Orphan]) -> Vec<&str> {
        orphans.iter().map(|o| o.relative_path.as_str()).collect()
    }

    #[test]
    fn reports_missing_files_under_synced_folders() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "Concept/keep.jpg");
        touch(dir.path(), "Concept/Old/gone.png");
        touch(dir.path(), "Concept/readme.md");

        let orphans = find_orphans(
            dir.path(),
            &set(&["Concept/keep.jpg"]),
            &folders(&["Concept"]),
        );
        assert_eq!(relative(&orphans), vec!["Concept/Old/gone.png"]);
        assert_eq!(orphans[0].path, dir.path().join("Concept/Old/gone.png"));
    }

    #[test]
    fn never_descends_into_local_only_folders() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "resume/cv.txt");
        touch(dir.path(), "resume/photo.jpg");

        let orphans = find_orphans(dir.path(), &set(&[]), &folders(&["Concept"]));
        assert!(orphans.is_empty());
    }

    #[test]
    fn compares_paths_case_insensitively() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "Concept/Photo.JPG");

        let orphans = find_orphans(
            dir.path(),
            &set(&["concept/photo.jpg"]),
            &folders(&["Concept"]),
        );
        assert!(orphans.is_empty());
    }

    #[test]
    fn skips_thumbnail_directories() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "_thumbnails/Concept/a.jpg");
        touch(dir.path(), "Concept/_thumbnails/b.jpg");

        let orphans = find_orphans(
            dir.path(),
            &set(&[]),
            &folders(&["Concept", "_thumbnails"]),
        );
        assert!(orphans.is_empty());
    }

    #[test]
    fn root_level_files_are_checked() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "stray.txt");
        touch(dir.path(), "cover.jpg");
        touch(dir.path(), "imageManifest.json");

        let orphans = find_orphans(dir.path(), &set(&["cover.jpg"]), &folders(&[]));
        assert_eq!(relative(&orphans), vec!["stray.txt"]);
    }

    #[test]
    fn remove_deletes_file_and_manifest_entry() {
        use crate::sync::manifest::SyncManifestEntry;
        use time::OffsetDateTime;

        let dir = tempdir().unwrap();
        touch(dir.path(), "Concept/old.jpg");
        let mut manifest = SyncManifest::default();
        manifest.record(SyncManifestEntry {
            remote_id: "gone".into(),
            local_relative_path: "Concept/old.jpg".into(),
            size: 1,
            modified_time: None,
            downloaded_at: OffsetDateTime::UNIX_EPOCH,
        });

        let orphans = find_orphans(dir.path(), &set(&[]), &folders(&["Concept"]));
        let mut preview = manifest.clone();
        assert_eq!(remove_orphans(&orphans, &mut preview, true), 1);
        assert!(dir.path().join("Concept/old.jpg").exists());
        assert!(preview.is_empty());

        assert_eq!(remove_orphans(&orphans, &mut manifest, false), 1);
        assert!(!dir.path().join("Concept/old.jpg").exists());
        assert!(manifest.is_empty());
    }

    #[test]
    fn missing_root_has_no_orphans() {
        let dir = tempdir().unwrap();
        let orphans = find_orphans(&dir.path().join("absent"), &set(&[]), &folders(&[]));
        assert!(orphans.is_empty());
    }
}
