use super::types::{BatchView, ToolCheckView};
use super::AppState;
use crate::error::Doc2MdError;
use crate::model::{BatchId, FileId};
use crate::validate::UploadCandidate;
use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use tracing::debug;

/// Multipart field names that carry documents.
const FILE_FIELDS: [&str; 2] = ["files", "files[]"];

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn check_pandoc(State(state): State<AppState>) -> Json<ToolCheckView> {
    let status = state.converter.check_tool().await;
    Json(ToolCheckView::from(&status))
}

/// Accept up to `max_files` documents and convert them before replying.
///
/// ```bash
/// curl -F "files=@report.doc" -F "files=@notes.docx" http://localhost:8000/api/upload/
/// ```
///
/// Replies `201` with the batch even when some files failed.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, Doc2MdError> {
    let max = state.converter.config().max_file_bytes;
    let mut candidates = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, None, max))?
    {
        if !field.name().is_some_and(|n| FILE_FIELDS.contains(&n)) {
            continue;
        }
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, Some(&name), max))?;
        debug!("Received {} ({} bytes)", name, content.len());
        candidates.push(UploadCandidate::new(name, content));
    }

    let detail = state.converter.create_batch(candidates).await?;
    Ok((StatusCode::CREATED, Json(BatchView::from(&detail))))
}

/// A body cut off by the size limit becomes `PayloadTooLarge`; anything else is malformed.
fn multipart_error(e: MultipartError, filename: Option<&str>, max: u64) -> Doc2MdError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return Doc2MdError::PayloadTooLarge {
            filename: filename.unwrap_or("upload").to_string(),
            max,
        };
    }
    match filename {
        Some(name) => Doc2MdError::Upload(format!("Failed to read file data for {name}: {e}")),
        None => Doc2MdError::Upload(format!("Failed to read multipart field: {e}")),
    }
}

pub async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<BatchId>,
) -> Result<Json<BatchView>, Doc2MdError> {
    let detail = state.converter.get_batch(id).await?;
    Ok(Json(BatchView::from(&detail)))
}

pub async fn delete_batch(
    State(state): State<AppState>,
    Path(id): Path<BatchId>,
) -> Result<StatusCode, Doc2MdError> {
    state.converter.delete_batch(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_batches(State(state): State<AppState>) -> Result<Json<Vec<BatchView>>, Doc2MdError> {
    let batches = state.converter.list_batches().await?;
    Ok(Json(batches.iter().map(BatchView::from).collect()))
}

pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<FileId>,
) -> Result<impl IntoResponse, Doc2MdError> {
    let download = state.converter.markdown_for_file(id).await?;
    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/markdown; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, attachment(&download.filename)),
        ],
        download.content,
    ))
}

pub async fn download_batch(
    State(state): State<AppState>,
    Path(id): Path<BatchId>,
) -> Result<impl IntoResponse, Doc2MdError> {
    let archive = state.converter.build_archive(id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/zip")),
            (header::CONTENT_DISPOSITION, attachment(&archive.filename)),
        ],
        archive.bytes,
    ))
}

/// `attachment; filename="…"` with an RFC 5987 `filename*` for non-ASCII names.
pub(crate) fn attachment(filename: &str) -> HeaderValue {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            ' '..='~' if c != '"' && c != '\\' => c,
            _ => '_',
        })
        .collect();

    let value = if fallback == filename {
        format!("attachment; filename=\"{fallback}\"")
    } else {
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            percent_encode(filename)
        )
    };
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 3);
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || b"-._~".contains(&b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}
