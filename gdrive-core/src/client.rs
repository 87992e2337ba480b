use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";
const FILES_ENDPOINT: &str = "/drive/v3/files";
const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, modifiedTime, size)";

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
pub const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    base_url: Url,
}

impl DriveClient {
    pub fn new() -> Result<Self, DriveError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, DriveError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
        })
    }

    /// Lists the non-trashed children of `folder_id`, ordered by name.
    ///
    /// Follows `nextPageToken` until the listing is exhausted, so the result
    /// is complete even for folders larger than one page.
    pub async fn list_children(
        &self,
        access_token: &str,
        folder_id: &str,
        page_size: u32,
    ) -> Result<Vec<DriveFile>, DriveError> {
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let mut page_token: Option<String> = None;
        let mut files = Vec::new();
        loop {
            let page = self
                .list_page(access_token, folder_id, page_size, page_token.as_deref())
                .await?;
            files.extend(page.files);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(files)
    }

    async fn list_page(
        &self,
        access_token: &str,
        folder_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<FileListPage, DriveError> {
        let mut url = self.endpoint(FILES_ENDPOINT)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("q", &children_query(folder_id));
            query.append_pair("pageSize", &page_size.to_string());
            query.append_pair("fields", LIST_FIELDS);
            query.append_pair("orderBy", "name");
            if let Some(page_token) = page_token {
                query.append_pair("pageToken", page_token);
            }
        }
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// URL that returns the raw bytes of a file when fetched with a bearer token.
    pub fn media_url(&self, file_id: &str) -> Result<Url, DriveError> {
        let mut url = self.endpoint(&format!("{FILES_ENDPOINT}/{file_id}"))?;
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }

    fn endpoint(&self, path: &str) -> Result<Url, DriveError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DriveError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(DriveError::Api { status, body })
        }
    }
}

fn children_query(folder_id: &str) -> String {
    // Single quotes inside ids would terminate the literal early.
    let escaped = folder_id.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}' in parents and trashed=false")
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    /// Decimal byte count; the API encodes int64 values as strings.
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub modified_time: Option<String>,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_deref().and_then(|v| v.parse().ok())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListPage {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_query_filters_trashed_items() {
        assert_eq!(
            children_query("abc123"),
            "'abc123' in parents and trashed=false"
        );
    }

    #[test]
    fn children_query_escapes_quotes() {
        assert_eq!(
            children_query("it's"),
            "'it\\'s' in parents and trashed=false"
        );
    }

    #[test]
    fn size_bytes_parses_string_encoded_size() {
        let file = DriveFile {
            id: "1".into(),
            name: "a.jpg".into(),
            mime_type: "image/jpeg".into(),
            size: Some("2048".into()),
            modified_time: None,
        };
        assert_eq!(file.size_bytes(), Some(2048));
        assert!(!file.is_folder());
    }

    #[test]
    fn media_url_requests_raw_content() {
        let client = DriveClient::with_base_url("https://drive.example").unwrap();
        let url = client.media_url("file-1").unwrap();
        assert_eq!(url.as_str(), "https://drive.example/drive/v3/files/file-1?alt=media");
    }
}
