//! HTTP boundary.
//!
//! `GET /scroll-text/?text=...` renders a video with the configured defaults,
//! records it, and returns it as a download.

use std::sync::Arc;

use anyhow::Context as _;
use axum::{
    extract::{Path as AxumPath, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::ScrollError;
use crate::library::VideoRecord;
use crate::service::ScrollTextService;

pub fn create_router(service: Arc<ScrollTextService>) -> Router {
    Router::new()
        .route("/scroll-text/", get(scroll_text_handler))
        .route("/videos/", get(list_videos_handler))
        .route("/videos/:id", get(get_video_handler))
        .with_state(service)
}

pub async fn serve(service: Arc<ScrollTextService>, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, create_router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
}

#[derive(Debug, Deserialize)]
pub struct ScrollTextQuery {
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    ok: bool,
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

fn error_response(err: &ScrollError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!(code = err.code(), "request failed: {err}");
    }
    let message = match err {
        ScrollError::InvalidInput(message) => message.clone(),
        other => other.to_string(),
    };
    let body = ErrorEnvelope {
        ok: false,
        error: ErrorBody {
            code: err.code(),
            message,
        },
    };
    (status, Json(body)).into_response()
}

fn content_disposition(file_name: &str) -> String {
    let safe = file_name.replace(['"', '\\'], "_");
    format!("attachment; filename=\"{safe}\"")
}

/// Runs store and render work off the async executor.
async fn run_blocking<T, F>(service: &Arc<ScrollTextService>, task: F) -> Result<T, ScrollError>
where
    T: Send + 'static,
    F: FnOnce(&ScrollTextService) -> Result<T, ScrollError> + Send + 'static,
{
    let worker = Arc::clone(service);
    match tokio::task::spawn_blocking(move || task(&worker)).await {
        Ok(result) => result,
        Err(join_error) => Err(ScrollError::Other(anyhow::anyhow!(
            "blocking task failed: {join_error}"
        ))),
    }
}

/// Generate, record, and return the video as an attachment.
async fn scroll_text_handler(
    State(service): State<Arc<ScrollTextService>>,
    Query(query): Query<ScrollTextQuery>,
) -> Response {
    let created =
        match run_blocking(&service, move |service| service.create(query.text.as_deref())).await {
            Ok(created) => created,
            Err(err) => return error_response(&err),
        };

    match tokio::fs::read(&created.path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "video/mp4".to_owned()),
                (
                    header::CONTENT_DISPOSITION,
                    content_disposition(created.record.file_name()),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(err) => error_response(&ScrollError::encoding(format!(
            "failed to read '{}': {err}",
            created.path.display()
        ))),
    }
}

async fn list_videos_handler(State(service): State<Arc<ScrollTextService>>) -> Response {
    match run_blocking(&service, |service| service.library().list()).await {
        Ok(records) => Json::<Vec<VideoRecord>>(records).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn get_video_handler(
    State(service): State<Arc<ScrollTextService>>,
    AxumPath(id): AxumPath<u64>,
) -> Response {
    match run_blocking(&service, move |service| service.library().get(id)).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(err) => error_response(&err),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::config::Settings;

    fn state(root: &std::path::Path) -> Arc<ScrollTextService> {
        let settings = Settings {
            media_root: root.to_path_buf(),
            ..Settings::default()
        };
        Arc::new(ScrollTextService::new(&settings))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn missing_text_is_bad_request() {
        let root = tempdir().unwrap();
        let response =
            scroll_text_handler(State(state(root.path())), Query(ScrollTextQuery { text: None }))
                .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
        assert_eq!(body["error"]["message"], "Missing 'text' parameter");
    }

    #[tokio::test]
    async fn empty_library_lists_nothing_and_unknown_id_is_not_found() {
        let root = tempdir().unwrap();
        let service = state(root.path());

        let response = list_videos_handler(State(Arc::clone(&service))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!([]));

        let response = get_video_handler(State(service), AxumPath(42)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn corrupt_registry_is_a_server_error() {
        let root = tempdir().unwrap();
        let service = state(root.path());
        let registry = service.library().registry_path();
        std::fs::create_dir_all(registry.parent().unwrap()).unwrap();
        std::fs::write(&registry, b"[broken").unwrap();

        let response = list_videos_handler(State(Arc::clone(&service))).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"]["code"], "STORE_FAILURE");

        let response = get_video_handler(State(service), AxumPath(1)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn content_disposition_is_an_attachment() {
        assert_eq!(
            content_disposition("hello-abc123.mp4"),
            "attachment; filename=\"hello-abc123.mp4\""
        );
        assert_eq!(
            content_disposition("a\"b.mp4"),
            "attachment; filename=\"a_b.mp4\""
        );
    }
}
