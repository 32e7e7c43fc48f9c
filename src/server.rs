//! HTTP facade over the relay.
//!
//! - POST /api/message - publish the form field `body`
//! - GET /api/messages - every message in the device log, newest first
//! - anything else is served from the static directory

use crate::error::RelayError;
use crate::relay::Relay;
use anyhow::Context;
use axum::{
    extract::{FromRequest, Multipart, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tower_http::services::ServeDir;

#[derive(Debug, Default, Deserialize)]
struct MessageForm {
    body: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

pub struct ApiError(RelayError);

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        ApiError(e)
    }
}

pub fn status_for(e: &RelayError) -> StatusCode {
    match e {
        RelayError::Validation(_) => StatusCode::BAD_REQUEST,
        RelayError::NotFound => StatusCode::NOT_FOUND,
        RelayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        e if e.is_transport() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        let body = ErrorBody {
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(relay: Arc<Relay>, public_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/api/message", post(post_message))
        .route("/api/messages", get(get_messages))
        .with_state(relay)
        .fallback_service(ServeDir::new(public_dir))
        .layer(middleware::from_fn(log_request))
}

pub async fn serve(relay: Arc<Relay>, public_dir: &Path, listen: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], listen));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Listening on http://{}", addr);
    axum::serve(listener, router(relay, public_dir))
        .await
        .context("HTTP server error")?;
    Ok(())
}

async fn post_message(
    State(relay): State<Arc<Relay>>,
    request: Request,
) -> Result<StatusCode, ApiError> {
    let body = form_value(request).await?.unwrap_or_default();
    relay.publish(&body).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The `body` field from a url-encoded or multipart form, falling back
/// to the query string.
async fn form_value(request: Request) -> Result<Option<String>, ApiError> {
    let from_query = Query::<MessageForm>::try_from_uri(request.uri())
        .map(|Query(form)| form.body)
        .unwrap_or_default();

    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let from_body = if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(form) = Form::<MessageForm>::from_request(request, &())
            .await
            .map_err(|e| RelayError::Validation(e.body_text()))?;
        form.body
    } else if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| RelayError::Validation(e.body_text()))?;
        multipart_field(multipart, "body").await?
    } else {
        None
    };

    Ok(from_body.or(from_query))
}

async fn multipart_field(mut multipart: Multipart, name: &str) -> Result<Option<String>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RelayError::Validation(e.body_text()))?
    {
        if field.name() == Some(name) {
            let text = field
                .text()
                .await
                .map_err(|e| RelayError::Validation(e.body_text()))?;
            return Ok(Some(text));
        }
    }
    Ok(None)
}

async fn get_messages(State(relay): State<Arc<Relay>>) -> Result<Response, ApiError> {
    let messages = relay.fetch_all().await?;
    Ok(Json(messages).into_response())
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        "{} {} -> {} ({:?})",
        method,
        path,
        response.status().as_u16(),
        started.elapsed()
    );
    response
}
