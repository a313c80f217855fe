//! HTTP surface over [`BatchConverter`].
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | GET    | `/health` | [`handlers::health`] |
//! | GET    | `/api/check-pandoc/` | [`handlers::check_pandoc`] |
//! | POST   | `/api/upload/` | [`handlers::upload`] (multipart field `files`) |
//! | GET    | `/api/batches/` | [`handlers::list_batches`] |
//! | GET    | `/api/batch/:id/` | [`handlers::get_batch`] |
//! | DELETE | `/api/batch/:id/` | [`handlers::delete_batch`] (`409` while converting) |
//! | GET    | `/api/batch/:id/download/` | [`handlers::download_batch`] |
//! | GET    | `/api/file/:id/download/` | [`handlers::download_file`] |

pub mod handlers;
pub mod types;

use crate::convert::BatchConverter;
use crate::error::Doc2MdError;
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;
use types::ErrorBody;

/// Headroom for multipart framing on top of the file payload.
const BODY_SLACK_BYTES: u64 = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub converter: Arc<BatchConverter>,
}

/// Build the application router.
///
/// The body limit admits `max_files` files of `max_file_bytes` each. Within
/// it an oversized file reaches the validator and gets its specific message;
/// a body beyond it is cut off while streaming and answered with `413`.
pub fn router(converter: Arc<BatchConverter>) -> Router {
    let config = converter.config();
    let body_limit = (config.max_files as u64)
        .saturating_mul(config.max_file_bytes)
        .saturating_add(BODY_SLACK_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/check-pandoc/", get(handlers::check_pandoc))
        .route("/api/upload/", axum::routing::post(handlers::upload))
        .route("/api/batches/", get(handlers::list_batches))
        .route(
            "/api/batch/:id/",
            get(handlers::get_batch).delete(handlers::delete_batch),
        )
        .route("/api/batch/:id/download/", get(handlers::download_batch))
        .route("/api/file/:id/download/", get(handlers::download_file))
        .with_state(AppState { converter })
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
}

impl IntoResponse for Doc2MdError {
    fn into_response(self) -> Response {
        let (status, hint) = match &self {
            Doc2MdError::Validation(_) | Doc2MdError::Upload(_) => (StatusCode::BAD_REQUEST, None),
            Doc2MdError::ToolUnavailable { hint, .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, Some(hint.clone()))
            }
            Doc2MdError::PayloadTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, None),
            Doc2MdError::BatchNotFound(_) | Doc2MdError::FileNotFound(_) => {
                (StatusCode::NOT_FOUND, None)
            }
            Doc2MdError::BatchInProgress(_) => (StatusCode::CONFLICT, None),
            Doc2MdError::NotConverted(_) => {
                return (
                    StatusCode::NOT_FOUND,
                    Json(ErrorBody {
                        error: "File has not been converted yet".to_string(),
                        hint: None,
                    }),
                )
                    .into_response();
            }
            _ => {
                error!("Request failed: {}", self);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody {
                        error: "Internal server error".to_string(),
                        hint: None,
                    }),
                )
                    .into_response();
            }
        };

        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
                hint,
            }),
        )
            .into_response()
    }
}
