mod client;
mod oauth;

pub use client::{DriveClient, DriveError, DriveFile, FOLDER_MIME_TYPE, MAX_PAGE_SIZE};
pub use oauth::{
    AssertionClaims, DRIVE_READONLY_SCOPE, OAuthError, OAuthToken, ServiceAccountClient,
    ServiceAccountKey,
};
