use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use super::paths::{local_path_for, write_atomic};
use super::tree::RemoteFile;

pub const SYNC_MANIFEST_FILE: &str = "syncManifest.json";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncManifestEntry {
    pub remote_id: String,
    pub local_relative_path: String,
    pub size: u64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub modified_time: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub downloaded_at: OffsetDateTime,
}

/// What change detection compares: a remote file is unchanged while its
/// size, modification time and root-relative path all match the last download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint<'a> {
    pub size: u64,
    pub modified_time: Option<OffsetDateTime>,
    pub path: &'a str,
}

impl<'a> Fingerprint<'a> {
    pub fn of(remote: &'a RemoteFile) -> Self {
        Self {
            size: remote.size.unwrap_or(0),
            modified_time: remote.modified_time,
            path: &remote.path,
        }
    }
}

impl SyncManifestEntry {
    pub fn fingerprint(&self) -> Fingerprint<'_> {
        Fingerprint {
            size: self.size,
            modified_time: self.modified_time,
            path: &self.local_relative_path,
        }
    }
}

pub fn needs_update(previous: Option<&SyncManifestEntry>, remote: &Fingerprint<'_>) -> bool {
    match previous {
        Some(entry) => entry.fingerprint() != *remote,
        None => true,
    }
}

/// Remote id -> last downloaded state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncManifest {
    entries: BTreeMap<String, SyncManifestEntry>,
}

impl SyncManifest {
    /// A missing file is an empty manifest; an unreadable one is discarded
    /// with a warning so the next run re-downloads instead of failing.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(manifest) => Ok(manifest),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "ignoring malformed sync manifest");
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let bytes = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &bytes)?;
        Ok(())
    }

    pub fn get(&self, remote_id: &str) -> Option<&SyncManifestEntry> {
        self.entries.get(remote_id)
    }

    pub fn record(&mut self, entry: SyncManifestEntry) {
        self.entries.insert(entry.remote_id.clone(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &SyncManifestEntry> {
        self.entries.values()
    }

    /// Drops every entry pointing at `relative_path` (case-insensitive) and
    /// returns the removed remote ids.
    pub fn remove_by_path(&mut self, relative_path: &str) -> Vec<String> {
        let needle = relative_path.to_lowercase();
        let removed: Vec<String> = self
            .entries
            .values()
            .filter(|entry| entry.local_relative_path.to_lowercase() == needle)
            .map(|entry| entry.remote_id.clone())
            .collect();
        for id in &removed {
            self.entries.remove(id);
        }
        removed
    }

    /// Drops entries whose local file no longer exists under `root`.
    pub fn retain_existing(&mut self, root: &Path) -> Vec<String> {
        let mut vanished = Vec::new();
        self.entries.retain(|_, entry| {
            let exists = local_path_for(root, &entry.local_relative_path)
                .map(|path| path.is_file())
                .unwrap_or(false);
            if !exists {
                vanished.push(entry.local_relative_path.clone());
            }
            exists
        });
        vanished
    }
}
