use std::{io, path::Path};

use futures_util::StreamExt;
use reqwest::Client;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use url::Url;

use super::paths::partial_path;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Clone)]
pub struct TransferClient {
    http: Client,
}

impl TransferClient {
    pub fn new() -> Self {
        Self::with_http(Client::new())
    }

    pub fn with_http(http: Client) -> Self {
        Self { http }
    }

    /// Streams `url` into `target` through a `.partial` sibling that is renamed
    /// into place only after the whole body has been flushed to disk.
    pub async fn download_to_path(
        &self,
        url: Url,
        access_token: &str,
        target: &Path,
    ) -> Result<u64, TransferError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await?
            .error_for_status()?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = partial_path(target);
        match write_stream(response, &partial).await {
            Ok(written) => {
                tokio::fs::rename(&partial, target).await?;
                Ok(written)
            }
            Err(err) => {
                let _ = tokio::fs::remove_file(&partial).await;
                Err(err)
            }
        }
    }
}

impl Default for TransferClient {
    fn default() -> Self {
        Self::new()
    }
}

async fn write_stream(response: reqwest::Response, partial: &Path) -> Result<u64, TransferError> {
    let mut file = tokio::fs::File::create(partial).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}
