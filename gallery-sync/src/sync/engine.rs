use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use time::OffsetDateTime;

use super::cleanup::{find_orphans, remove_orphans};
use super::manifest::{
    Fingerprint, ManifestError, SYNC_MANIFEST_FILE, SyncManifest, SyncManifestEntry, needs_update,
};
use super::paths::local_path_for;
use super::remote::{DriveRemote, RemoteError};
use super::tree::{RemoteFile, synced_files, top_level_folders};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),
    #[error("sync manifest error: {0}")]
    Manifest(#[from] ManifestError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Re-download everything and rebuild the manifest from scratch.
    pub force: bool,
    /// Log intended changes without touching disk or the manifest.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub orphaned: usize,
    pub total_tracked: usize,
}

pub struct SyncEngine {
    remote: DriveRemote,
    root_folder_id: String,
    gallery_root: PathBuf,
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(
        remote: DriveRemote,
        root_folder_id: impl Into<String>,
        gallery_root: PathBuf,
        options: SyncOptions,
    ) -> Self {
        Self {
            remote,
            root_folder_id: root_folder_id.into(),
            gallery_root,
            options,
        }
    }

    pub fn gallery_root(&self) -> &Path {
        &self.gallery_root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.gallery_root.join(SYNC_MANIFEST_FILE)
    }

    /// Full tree under the configured root folder.
    pub async fn list_remote(&mut self) -> Result<Vec<RemoteFile>, EngineError> {
        let root_folder_id = self.root_folder_id.clone();
        Ok(self.remote.list_files(&root_folder_id, true).await?)
    }

    /// Reconciles the gallery root against `tree`: orphans first, then
    /// downloads of new or changed files. Per-file failures are counted,
    /// never returned.
    pub async fn sync(&mut self, tree: &[RemoteFile]) -> Result<SyncReport, EngineError> {
        let SyncOptions { force, dry_run } = self.options;
        let manifest_path = self.manifest_path();
        let mut manifest = if force {
            tracing::info!("force enabled: discarding previous sync manifest");
            SyncManifest::default()
        } else {
            SyncManifest::load(&manifest_path)?
        };
        for path in manifest.retain_existing(&self.gallery_root) {
            tracing::info!(%path, "tracked file missing locally, will re-download");
        }

        let files = synced_files(tree);
        tracing::info!(
            files = files.len(),
            root = %self.gallery_root.display(),
            "reconciling gallery"
        );

        let mut report = SyncReport {
            orphaned: self.clean_orphans(tree, &files, &mut manifest),
            ..SyncReport::default()
        };

        for file in files {
            if !force && !needs_update(manifest.get(&file.id), &Fingerprint::of(file)) {
                tracing::debug!(path = %file.path, "unchanged, skipping");
                report.skipped += 1;
                continue;
            }
            let target = match local_path_for(&self.gallery_root, &file.path) {
                Ok(target) => target,
                Err(err) => {
                    tracing::error!(path = %file.path, %err, "refusing to map remote path");
                    report.failed += 1;
                    continue;
                }
            };
            if dry_run {
                tracing::info!(path = %file.path, size = file.size, "[dry run] would download");
                report.downloaded += 1;
                continue;
            }

            tracing::info!(path = %file.path, "downloading");
            match self.remote.download_to(&file.id, &target).await {
                Ok(_) => {
                    manifest.record(SyncManifestEntry {
                        remote_id: file.id.clone(),
                        local_relative_path: file.path.clone(),
                        size: file.size.unwrap_or(0),
                        modified_time: file.modified_time,
                        downloaded_at: OffsetDateTime::now_utc(),
                    });
                    report.downloaded += 1;
                }
                Err(err) => {
                    tracing::error!(path = %file.path, %err, "download failed");
                    report.failed += 1;
                }
            }
        }

        report.total_tracked = manifest.len();
        if dry_run {
            tracing::info!("[dry run] no files or manifests were modified");
        } else {
            manifest.save(&manifest_path)?;
        }
        Ok(report)
    }

    fn clean_orphans(
        &self,
        tree: &[RemoteFile],
        files: &[&RemoteFile],
        manifest: &mut SyncManifest,
    ) -> usize {
        let remote_paths: HashSet<String> = files.iter().map(|f| f.path.to_lowercase()).collect();
        let remote_folders = top_level_folders(tree);
        tracing::debug!(folders = ?remote_folders, "remote folders eligible for cleanup");

        let orphans = find_orphans(&self.gallery_root, &remote_paths, &remote_folders);
        remove_orphans(&orphans, manifest, self.options.dry_run)
    }
}
