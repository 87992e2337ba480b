use std::path::PathBuf;

use gdrive_core::{OAuthError, ServiceAccountKey};
use thiserror::Error;

pub const DEFAULT_GALLERY_ROOT: &str = "public/gallery";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error(
        "service account credentials are not set: provide GOOGLE_SERVICE_ACCOUNT_EMAIL and \
         GOOGLE_SERVICE_ACCOUNT_KEY, or GOOGLE_SERVICE_ACCOUNT_KEY_FILE"
    )]
    MissingCredentials,
    #[error("failed to read key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid service account key: {0}")]
    InvalidKey(#[from] OAuthError),
}

/// Settings shared by every mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryConfig {
    pub gallery_root: PathBuf,
}

impl GalleryConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let gallery_root = lookup("GALLERY_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_GALLERY_ROOT));
        Self { gallery_root }
    }
}

/// Everything needed to talk to the remote drive. Built before any network
/// call so configuration mistakes fail fast.
#[derive(Debug)]
pub struct DriveConfig {
    pub folder_id: String,
    pub credentials: ServiceAccountKey,
    pub api_base: Option<String>,
    pub token_url: Option<String>,
}

impl DriveConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let folder_id = lookup("GOOGLE_DRIVE_ID").ok_or(ConfigError::Missing("GOOGLE_DRIVE_ID"))?;
        let credentials = match (
            lookup("GOOGLE_SERVICE_ACCOUNT_EMAIL"),
            lookup("GOOGLE_SERVICE_ACCOUNT_KEY"),
        ) {
            (Some(email), Some(key)) => ServiceAccountKey::from_env_parts(email, &key)?,
            _ => match lookup("GOOGLE_SERVICE_ACCOUNT_KEY_FILE") {
                Some(path) => {
                    let path = PathBuf::from(path);
                    let bytes = std::fs::read(&path)
                        .map_err(|source| ConfigError::KeyFile { path, source })?;
                    ServiceAccountKey::from_json(&bytes)?
                }
                None => return Err(ConfigError::MissingCredentials),
            },
        };

        Ok(Self {
            folder_id,
            credentials,
            api_base: lookup("GDRIVE_API_BASE"),
            token_url: lookup("GDRIVE_TOKEN_URL"),
        })
    }
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
