use std::path::PathBuf;

use anyhow::Context;
use gdrive_core::{DriveClient, ServiceAccountClient};

use crate::assets::{AssetProcessor, ImageManifest};
use crate::config::{DriveConfig, GalleryConfig};
use crate::sync::engine::{SyncEngine, SyncOptions, SyncReport};
use crate::sync::remote::DriveRemote;
use crate::sync::tree::{RemoteFile, image_files, synced_files};
use crate::token_provider::TokenProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Sync from the drive, then regenerate thumbnails and the manifest.
    All,
    SyncOnly,
    ProcessOnly,
    /// Print the remote tree and exit.
    List,
}

impl RunMode {
    pub fn needs_remote(self) -> bool {
        !matches!(self, RunMode::ProcessOnly)
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub tree: Option<Vec<RemoteFile>>,
    pub sync: Option<SyncReport>,
    pub manifest: Option<ImageManifest>,
}

pub struct Pipeline {
    gallery_root: PathBuf,
    drive: Option<DriveConfig>,
    options: SyncOptions,
}

impl Pipeline {
    pub fn new(gallery: GalleryConfig, drive: Option<DriveConfig>, options: SyncOptions) -> Self {
        Self {
            gallery_root: gallery.gallery_root,
            drive,
            options,
        }
    }

    /// Runs the stages `mode` asks for, strictly one after another. Errors
    /// returned here are the fatal ones; per-file failures only show up in
    /// the summary.
    pub async fn run(self, mode: RunMode) -> anyhow::Result<RunSummary> {
        let Self {
            gallery_root,
            drive,
            options,
        } = self;
        let mut summary = RunSummary::default();

        if mode.needs_remote() {
            let drive = drive.context("drive configuration is required for this mode")?;
            let (remote, folder_id) = connect(drive)?;
            let mut engine = SyncEngine::new(remote, folder_id, gallery_root.clone(), options);
            let tree = engine
                .list_remote()
                .await
                .context("failed to list remote gallery")?;
            tracing::info!(
                images = image_files(&tree).len(),
                synced = synced_files(&tree).len(),
                "listed remote gallery"
            );

            if mode == RunMode::List {
                summary.tree = Some(tree);
                return Ok(summary);
            }

            if options.dry_run {
                tracing::info!("[dry run] no changes will be written");
            }
            let report = engine.sync(&tree).await.context("sync failed")?;
            log_report(&report, options.dry_run);
            summary.sync = Some(report);
        }

        if matches!(mode, RunMode::All | RunMode::ProcessOnly) {
            if options.dry_run {
                tracing::info!("[dry run] skipping image processing");
            } else {
                let processor = AssetProcessor::new(gallery_root);
                let manifest = tokio::task::spawn_blocking(move || processor.process())
                    .await
                    .context("image processing task failed")?
                    .context("image processing failed")?;
                summary.manifest = Some(manifest);
            }
        }

        Ok(summary)
    }
}

fn connect(drive: DriveConfig) -> anyhow::Result<(DriveRemote, String)> {
    let DriveConfig {
        folder_id,
        credentials,
        api_base,
        token_url,
    } = drive;
    let client = match api_base {
        Some(base) => DriveClient::with_base_url(&base)?,
        None => DriveClient::new()?,
    };
    let oauth = match token_url {
        Some(url) => ServiceAccountClient::with_token_url(&url, credentials)?,
        None => ServiceAccountClient::new(credentials)?,
    };
    tracing::debug!(account = oauth.client_email(), folder = %folder_id, "connecting to drive");
    let remote = DriveRemote::new(client, TokenProvider::new(Some(oauth)));
    Ok((remote, folder_id))
}

fn log_report(report: &SyncReport, dry_run: bool) {
    let prefix = if dry_run { "[dry run] " } else { "" };
    tracing::info!(
        downloaded = report.downloaded,
        skipped = report.skipped,
        failed = report.failed,
        orphaned = report.orphaned,
        total_tracked = report.total_tracked,
        "{prefix}sync finished"
    );
    if report.failed > 0 {
        tracing::warn!(failed = report.failed, "some files failed to download");
    }
}
