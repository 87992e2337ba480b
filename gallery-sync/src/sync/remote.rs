use std::path::Path;

use gdrive_core::{DriveClient, DriveError, DriveFile, MAX_PAGE_SIZE};
use thiserror::Error;

use super::transfer::{TransferClient, TransferError};
use super::tree::{RemoteFile, join_remote_path};
use crate::token_provider::{TokenError, TokenProvider};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("authentication failed: {0}")]
    Token(#[from] TokenError),
    #[error("drive api error: {0}")]
    Drive(#[from] DriveError),
    #[error("transfer failed: {0}")]
    Transfer(#[from] TransferError),
}

/// Authenticated view of the remote storage: listing and media downloads
/// share one token cache.
pub struct DriveRemote {
    client: DriveClient,
    tokens: TokenProvider,
    transfer: TransferClient,
    page_size: u32,
}

impl DriveRemote {
    pub fn new(client: DriveClient, tokens: TokenProvider) -> Self {
        Self {
            client,
            tokens,
            transfer: TransferClient::new(),
            page_size: MAX_PAGE_SIZE,
        }
    }

    pub fn with_transfer(mut self, transfer: TransferClient) -> Self {
        self.transfer = transfer;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Lists `folder_id`. A failure listing the folder itself is returned;
    /// in recursive mode failures below it only prune that branch.
    pub async fn list_files(
        &mut self,
        folder_id: &str,
        recursive: bool,
    ) -> Result<Vec<RemoteFile>, RemoteError> {
        let items = self.list_children(folder_id).await?;
        if !recursive {
            return Ok(items
                .iter()
                .map(|item| RemoteFile::from_drive(item, "", Vec::new()))
                .collect());
        }
        Ok(self.build_level(items, "").await)
    }

    async fn build_level(&mut self, items: Vec<DriveFile>, parent_path: &str) -> Vec<RemoteFile> {
        let mut nodes = Vec::with_capacity(items.len());
        for item in items {
            if !item.is_folder() {
                nodes.push(RemoteFile::from_drive(&item, parent_path, Vec::new()));
                continue;
            }
            let path = join_remote_path(parent_path, &item.name);
            let children = match self.list_children(&item.id).await {
                Ok(sub_items) => Box::pin(self.build_level(sub_items, &path)).await,
                Err(err) => {
                    tracing::warn!(folder = %path, %err, "skipping unreadable subfolder");
                    Vec::new()
                }
            };
            nodes.push(RemoteFile::from_drive(&item, parent_path, children));
        }
        nodes
    }

    async fn list_children(&mut self, folder_id: &str) -> Result<Vec<DriveFile>, RemoteError> {
        let token = self.tokens.valid_access_token().await?;
        Ok(self
            .client
            .list_children(&token, folder_id, self.page_size)
            .await?)
    }

    pub async fn download_to(&mut self, file_id: &str, target: &Path) -> Result<u64, RemoteError> {
        let token = self.tokens.valid_access_token().await?;
        let url = self.client.media_url(file_id)?;
        Ok(self.transfer.download_to_path(url, &token, target).await?)
    }
}
