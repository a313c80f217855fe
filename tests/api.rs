//! HTTP tests: drive the router in-process with `tower::ServiceExt::oneshot`.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use common::{config_with, converter, expected_markdown, ScriptedPandoc};
use edgequake_doc2md::api::types::{BatchView, ErrorBody, ToolCheckView};
use edgequake_doc2md::{
    router, Batch, BatchConverter, BatchStatus, BatchStore, FileStatus, MemoryStore,
};
use serde::de::DeserializeOwned;
use std::io::{Cursor, Read};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "doc2md-test-boundary";

fn app(pandoc: Arc<ScriptedPandoc>) -> (Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let app = router(Arc::new(converter(dir.path(), pandoc)));
    (app, dir)
}

/// `(field, filename, bytes)` parts as a multipart/form-data body.
fn multipart(parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, filename, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(parts: &[(&str, &str, &[u8])]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/upload/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart(parts)))
        .unwrap()
}

fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

async fn send_json<T: DeserializeOwned>(app: &Router, req: Request<Body>) -> (StatusCode, T) {
    let (status, _, body) = send(app, req).await;
    let parsed = serde_json::from_slice(&body)
        .unwrap_or_else(|e| panic!("bad JSON ({e}): {}", String::from_utf8_lossy(&body)));
    (status, parsed)
}

// ── Service endpoints ────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_ok() {
    let (app, _dir) = app(ScriptedPandoc::installed());
    let (status, body): (_, serde_json::Value) = send_json(&app, request(Method::GET, "/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn check_pandoc_reports_installed() {
    let (app, _dir) = app(ScriptedPandoc::installed());
    let (status, body): (_, ToolCheckView) =
        send_json(&app, request(Method::GET, "/api/check-pandoc/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.pandoc_installed);
    assert_eq!(body.message, "Pandoc is installed and ready");
    assert_eq!(body.version.as_deref(), Some("pandoc 3.1.11"));
}

#[tokio::test]
async fn check_pandoc_reports_missing_with_200() {
    let (app, _dir) = app(ScriptedPandoc::missing());
    let (status, body): (_, ToolCheckView) =
        send_json(&app, request(Method::GET, "/api/check-pandoc/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.pandoc_installed);
    assert_eq!(
        body.message,
        "Pandoc is not installed. Please install Pandoc to use this service."
    );
}

// ── Upload ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn upload_converts_and_returns_201() {
    let (app, _dir) = app(ScriptedPandoc::installed());
    let req = upload_request(&[
        ("files", "report.doc", b"legacy bytes"),
        ("files", "notes.docx", b"modern bytes"),
    ]);
    let (status, batch): (_, BatchView) = send_json(&app, req).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(batch.status, BatchStatus::Completed);
    assert!(batch.completed_at.is_some());
    assert_eq!(batch.file_count, 2);
    assert_eq!(
        batch.download_url.as_deref(),
        Some(format!("/api/batch/{}/download/", batch.id).as_str())
    );
    assert_eq!(batch.files[0].original_filename, "report.doc");
    assert_eq!(batch.files[0].file_extension, ".doc");
    assert_eq!(batch.files[0].markdown_filename, "report.md");
    for file in &batch.files {
        assert_eq!(file.status, FileStatus::Converted);
        assert_eq!(
            file.download_url.as_deref(),
            Some(format!("/api/file/{}/download/", file.id).as_str())
        );
    }
}

#[tokio::test]
async fn bracketed_field_name_is_accepted() {
    let (app, _dir) = app(ScriptedPandoc::installed());
    let req = upload_request(&[("files[]", "a.docx", b"x"), ("comment", "ignored.docx", b"y")]);
    let (status, batch): (_, BatchView) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(batch.file_count, 1);
}

#[tokio::test]
async fn partial_failure_is_still_created() {
    let (app, _dir) = app(ScriptedPandoc::installed());
    let req = upload_request(&[("files", "ok.docx", b"x"), ("files", "broken.docx", b"y")]);
    let (status, batch): (_, BatchView) = send_json(&app, req).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(batch.status, BatchStatus::Failed);
    let failed = &batch.files[1];
    assert_eq!(failed.status, FileStatus::Failed);
    assert!(failed.download_url.is_none());
    assert!(failed
        .error_message
        .as_deref()
        .is_some_and(|m| m.contains("cannot parse broken input")));
}

#[tokio::test]
async fn invalid_upload_is_400_and_creates_nothing() {
    let (app, _dir) = app(ScriptedPandoc::installed());
    let req = upload_request(&[("files", "deck.pptx", b"x")]);
    let (status, body): (_, ErrorBody) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body.error,
        "Invalid file type: deck.pptx. Only .doc and .docx files are allowed."
    );

    let (_, batches): (_, Vec<BatchView>) =
        send_json(&app, request(Method::GET, "/api/batches/")).await;
    assert!(batches.is_empty());
}

#[tokio::test]
async fn upload_without_files_is_400() {
    let (app, _dir) = app(ScriptedPandoc::installed());
    let (status, body): (_, ErrorBody) = send_json(&app, upload_request(&[])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.error, "No files uploaded. Upload at least one .doc or .docx file.");
}

#[tokio::test]
async fn missing_tool_is_503_with_hint() {
    let (app, _dir) = app(ScriptedPandoc::missing());
    let req = upload_request(&[("files", "a.docx", b"x")]);
    let (status, body): (_, ErrorBody) = send_json(&app, req).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body.error,
        "Pandoc is not installed on the server. Please install Pandoc first."
    );
    assert!(body.hint.is_some());

    let (_, batches): (_, Vec<BatchView>) =
        send_json(&app, request(Method::GET, "/api/batches/")).await;
    assert!(batches.is_empty());
}

// ── Retrieval and downloads ──────────────────────────────────────────────

async fn created(app: &Router, parts: &[(&str, &str, &[u8])]) -> BatchView {
    let (status, batch) = send_json::<BatchView>(app, upload_request(parts)).await;
    assert_eq!(status, StatusCode::CREATED);
    batch
}

#[tokio::test]
async fn batch_can_be_fetched_and_listed() {
    let (app, _dir) = app(ScriptedPandoc::installed());
    let batch = created(&app, &[("files", "a.docx", b"x")]).await;

    let (status, fetched): (_, BatchView) =
        send_json(&app, request(Method::GET, &format!("/api/batch/{}/", batch.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched.id, batch.id);
    assert_eq!(fetched.files.len(), 1);

    let (status, listed): (_, Vec<BatchView>) =
        send_json(&app, request(Method::GET, "/api/batches/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, batch.id);
}

#[tokio::test]
async fn unknown_batch_is_404() {
    let (app, _dir) = app(ScriptedPandoc::installed());
    let id = edgequake_doc2md::BatchId::new();
    for uri in [format!("/api/batch/{id}/"), format!("/api/batch/{id}/download/")] {
        let (status, _, _) = send(&app, request(Method::GET, &uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn file_download_serves_markdown_attachment() {
    let (app, _dir) = app(ScriptedPandoc::installed());
    let batch = created(&app, &[("files", "Annual Report.docx", b"x")]).await;
    let file = &batch.files[0];

    let (status, headers, body) = send(
        &app,
        request(Method::GET, &format!("/api/file/{}/download/", file.id)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/markdown; charset=utf-8");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Annual Report.md\""
    );
    assert_eq!(String::from_utf8(body).unwrap(), expected_markdown("Annual Report"));
}

#[tokio::test]
async fn failed_file_download_is_404() {
    let (app, _dir) = app(ScriptedPandoc::installed());
    let batch = created(&app, &[("files", "broken.doc", b"x")]).await;

    let (status, body): (_, ErrorBody) = send_json(
        &app,
        request(Method::GET, &format!("/api/file/{}/download/", batch.files[0].id)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body.error, "File has not been converted yet");
}

#[tokio::test]
async fn batch_download_is_a_zip_of_converted_files() {
    let (app, _dir) = app(ScriptedPandoc::installed());
    let batch = created(
        &app,
        &[
            ("files", "one.docx", b"1"),
            ("files", "broken.docx", b"2"),
            ("files", "two.doc", b"3"),
        ],
    )
    .await;

    let (status, headers, body) = send(
        &app,
        request(Method::GET, &format!("/api/batch/{}/download/", batch.id)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/zip");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"converted_files_{}.zip\"", batch.id).as_str()
    );

    let mut archive = zip::ZipArchive::new(Cursor::new(body)).unwrap();
    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        let mut text = String::new();
        entry.read_to_string(&mut text).unwrap();
        entries.push((entry.name().to_string(), text));
    }
    assert_eq!(
        entries,
        vec![
            ("one.md".to_string(), expected_markdown("one")),
            ("two.md".to_string(), expected_markdown("two")),
        ]
    );
}

#[tokio::test]
async fn delete_is_204_then_404() {
    let (app, _dir) = app(ScriptedPandoc::installed());
    let batch = created(&app, &[("files", "a.docx", b"x")]).await;
    let uri = format!("/api/batch/{}/", batch.id);

    let (status, _, body) = send(&app, request(Method::DELETE, &uri)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());

    let (status, _, _) = send(&app, request(Method::DELETE, &uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = send(&app, request(Method::GET, &uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_id_is_rejected() {
    let (app, _dir) = app(ScriptedPandoc::installed());
    let (status, _, _) = send(&app, request(Method::GET, "/api/batch/not-a-uuid/")).await;
    assert!(status.is_client_error(), "got {status}");
}

#[tokio::test]
async fn delete_while_converting_is_409() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let config = config_with(dir.path(), ScriptedPandoc::installed()).build().unwrap();
    let app = router(Arc::new(BatchConverter::new(config, store.clone())));

    let mut batch = Batch::new();
    batch.start();
    store.insert_batch(&batch).await.unwrap();

    let uri = format!("/api/batch/{}/", batch.id);
    let (status, body): (_, ErrorBody) = send_json(&app, request(Method::DELETE, &uri)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body.error, format!("Batch is still being processed: {}", batch.id));

    let (status, fetched): (_, BatchView) = send_json(&app, request(Method::GET, &uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched.status, BatchStatus::Processing);
    assert!(fetched.download_url.is_none());
}

#[tokio::test]
async fn body_over_the_limit_is_413_file_too_large() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with(dir.path(), ScriptedPandoc::installed())
        .max_files(1)
        .max_file_bytes(1024)
        .build()
        .unwrap();
    let app = router(Arc::new(BatchConverter::in_memory(config)));

    let big = vec![b'x'; 2 * 1024 * 1024];
    let (status, body): (_, ErrorBody) =
        send_json(&app, upload_request(&[("files", "big.docx", big.as_slice())])).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body.error.starts_with("File too large: big.docx"), "got: {}", body.error);

    let (_, batches): (_, Vec<BatchView>) =
        send_json(&app, request(Method::GET, "/api/batches/")).await;
    assert!(batches.is_empty());
}
