use gdrive_core::{DriveClient, DriveError, FOLDER_MIME_TYPE};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn list_children_sends_bearer_and_filter() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(header("authorization", "Bearer test-token"))
        .and(query_param("q", "'root-folder' in parents and trashed=false"))
        .and(query_param("orderBy", "name"))
        .and(query_param("pageSize", "1000"))
        .and(query_param(
            "fields",
            "nextPageToken, files(id, name, mimeType, modifiedTime, size)",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                {
                    "id": "f1",
                    "name": "Concept Art",
                    "mimeType": FOLDER_MIME_TYPE,
                    "modifiedTime": "2024-01-01T00:00:00.000Z"
                },
                {
                    "id": "f2",
                    "name": "cover.jpg",
                    "mimeType": "image/jpeg",
                    "size": "2048",
                    "modifiedTime": "2024-02-01T10:00:00.000Z"
                }
            ]
        })))
        .mount(&server)
        .await;

    let client = DriveClient::with_base_url(&server.uri()).unwrap();
    let files = client
        .list_children("test-token", "root-folder", 1000)
        .await
        .unwrap();

    assert_eq!(files.len(), 2);
    assert!(files[0].is_folder());
    assert_eq!(files[0].size_bytes(), None);
    assert_eq!(files[1].name, "cover.jpg");
    assert_eq!(files[1].size_bytes(), Some(2048));
}

#[tokio::test]
async fn list_children_follows_next_page_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nextPageToken": "page-2",
            "files": [
                { "id": "a", "name": "a.jpg", "mimeType": "image/jpeg", "size": "1" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                { "id": "b", "name": "b.jpg", "mimeType": "image/jpeg", "size": "2" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = DriveClient::with_base_url(&server.uri()).unwrap();
    let files = client.list_children("test-token", "root", 1).await.unwrap();

    let ids: Vec<&str> = files.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[tokio::test]
async fn list_children_caps_page_size() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("pageSize", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let client = DriveClient::with_base_url(&server.uri()).unwrap();
    let files = client.list_children("test-token", "root", 5000).await.unwrap();
    assert!(files.is_empty());
}

#[tokio::test]
async fn list_children_returns_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(404).set_body_string("File not found: root"))
        .mount(&server)
        .await;

    let client = DriveClient::with_base_url(&server.uri()).unwrap();
    let err = client
        .list_children("test-token", "root", 100)
        .await
        .unwrap_err();

    match err {
        DriveError::Api { status, body } => {
            assert_eq!(status.as_u16(), 404);
            assert!(body.contains("File not found"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
