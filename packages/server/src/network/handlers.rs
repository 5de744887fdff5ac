//! HTTP handlers bridging axum requests onto a service instance.
//!
//! Each service runs its own router, so the shared state carries exactly
//! one [`ServiceInstance`]. Handlers translate transport concerns (headers,
//! body streams, status codes) and leave all content semantics to the
//! instance and its event handlers.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio_util::io::ReaderStream;
use tracing::error;

use hostbox_core::ApiReply;

use crate::service::{CreateOutcome, ServiceInstance, VisitOutcome};

/// Shared state for one service's router.
#[derive(Clone)]
pub struct AppState {
    /// The service instance this router serves.
    pub instance: Arc<ServiceInstance>,
}

/// Handles `POST /` content submissions.
///
/// The body is streamed into the instance rather than buffered by the
/// extractor, so oversized uploads are aborted as soon as the configured
/// size limit is crossed.
pub async fn submit_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    let content_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());

    let stream = Box::pin(body.into_data_stream());

    match state
        .instance
        .submit(content_type, content_length, stream)
        .await
    {
        Ok(submitted) => {
            let reply = match submitted.outcome {
                Some(CreateOutcome::Created { kind }) => {
                    ApiReply::created(&kind, &submitted.id)
                }
                // No creation handler claimed the record; acknowledge it
                // with a generic success envelope.
                None => ApiReply::created("content", &submitted.id),
            };
            reply_response(reply)
        }
        Err(err) => reply_response(err.to_reply()),
    }
}

/// Handles `GET /{id}` content retrieval.
///
/// The visit outcome decides the response shape: stored files are
/// streamed back with their recorded MIME type, redirect targets become
/// a `302 Found`, and a record nobody claims is acknowledged with its ID.
pub async fn retrieve_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.instance.retrieve(&id).await {
        Ok(Some(VisitOutcome::File { path, mime })) => stream_file(path, mime).await,
        Ok(Some(VisitOutcome::Redirect { url })) => redirect_found(&url),
        Ok(None) => reply_response(ApiReply::success(
            200,
            format!("Found content with ID '{id}'"),
            Some(id),
        )),
        Err(err) => reply_response(err.to_reply()),
    }
}

/// Fallback for any route outside the content API.
///
/// Deliberately a bare status with no body.
pub async fn fallback_handler() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Converts an [`ApiReply`] into an HTTP response with a JSON body.
fn reply_response(reply: ApiReply) -> Response {
    let status =
        StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(reply.body)).into_response()
}

/// Streams a stored file back to the client with its recorded MIME type.
async fn stream_file(path: PathBuf, mime: String) -> Response {
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(err) => {
            error!(path = %path.display(), error = %err, "failed to open stored content");
            return reply_response(ApiReply::server_error());
        }
    };

    let Ok(mime_value) = HeaderValue::from_str(&mime) else {
        error!(mime, "stored MIME type is not a valid header value");
        return reply_response(ApiReply::server_error());
    };

    let body = Body::from_stream(ReaderStream::new(file));
    match Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime_value)
        .body(body)
    {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, "failed to build file response");
            reply_response(ApiReply::server_error())
        }
    }
}

/// Builds a `302 Found` redirect to the stored target URL.
fn redirect_found(url: &str) -> Response {
    let Ok(location) = HeaderValue::from_str(url) else {
        error!(url, "stored redirect target is not a valid header value");
        return reply_response(ApiReply::server_error());
    };

    match Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, location)
        .body(Body::empty())
    {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, "failed to build redirect response");
            reply_response(ApiReply::server_error())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::Value;
    use tempfile::TempDir;

    use crate::config::{AppConfig, ServiceConfig};
    use crate::plugins;
    use crate::service::EventBus;

    fn service_config(dir: &TempDir, handler: &str, extra_key: &str) -> ServiceConfig {
        let raw = format!(
            r#"{{
                "services": [
                    {{
                        "name": "test",
                        "idLength": 6,
                        "idChars": "abcdef0123456789",
                        "port": 0,
                        "storeLocation": "store.json",
                        "handler": "{handler}",
                        "{extra_key}": "data"
                    }}
                ]
            }}"#
        );
        let config = AppConfig::from_slice(raw.as_bytes(), dir.path()).unwrap();
        config.services.into_iter().next().unwrap()
    }

    fn clips_state(dir: &TempDir) -> AppState {
        let config = service_config(dir, "clips", "clipsLocation");
        let bus = plugins::install(&config).unwrap();
        AppState {
            instance: Arc::new(ServiceInstance::new(config, bus).unwrap()),
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn submit_without_content_type_is_411() {
        let dir = TempDir::new().unwrap();
        let state = clips_state(&dir);

        let response =
            submit_handler(State(state), HeaderMap::new(), Body::from("data")).await;

        assert_eq!(response.status(), StatusCode::LENGTH_REQUIRED);
        let body = body_json(response).await;
        assert_eq!(body["success"], Value::Bool(false));
        assert_eq!(body["error"], "Content-Type header is missing!");
    }

    #[tokio::test]
    async fn retrieve_unknown_id_is_404() {
        let dir = TempDir::new().unwrap();
        let state = clips_state(&dir);

        let response = retrieve_handler(State(state), Path("nope".to_string())).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "The ID 'nope' was not found");
    }

    #[tokio::test]
    async fn submitted_clip_streams_back_with_mime() {
        let dir = TempDir::new().unwrap();
        let state = clips_state(&dir);

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("video/mp4"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("9"));
        let payload = b"clip data".to_vec();

        let response = submit_handler(
            State(state.clone()),
            headers,
            Body::from(payload.clone()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let id = body["id"].as_str().unwrap().to_string();
        assert_eq!(
            body["message"].as_str().unwrap(),
            format!("Created clip with ID '{id}'")
        );

        let response = retrieve_handler(State(state), Path(id)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "video/mp4"
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(bytes.as_ref(), payload.as_slice());
    }

    #[tokio::test]
    async fn short_link_visit_redirects() {
        let dir = TempDir::new().unwrap();
        let config = service_config(&dir, "short-link", "linksLocation");
        let bus = plugins::install(&config).unwrap();
        let state = AppState {
            instance: Arc::new(ServiceInstance::new(config, bus).unwrap()),
        };

        let payload = br#"{"url":"https://example.com/page"}"#.to_vec();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::CONTENT_LENGTH,
            HeaderValue::from_str(&payload.len().to_string()).unwrap(),
        );

        let response =
            submit_handler(State(state.clone()), headers, Body::from(payload)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let id = body["id"].as_str().unwrap().to_string();

        let response = retrieve_handler(State(state), Path(id)).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://example.com/page"
        );
    }

    #[tokio::test]
    async fn fallback_is_bare_404() {
        let status = fallback_handler().await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
