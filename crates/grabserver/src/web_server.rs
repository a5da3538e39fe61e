//! HTTP boundary.
//!
//! One download endpoint (GET with a query string, POST with JSON) that
//! answers with file bytes, fallback URLs, a structured error or, when
//! `progress` is set, a server-sent event stream of progress events.

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::{header, HeaderValue},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::get,
    Router,
};
use futures_util::StreamExt;
use serde::{de, Deserialize, Deserializer};
use serde_json::json;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use grabcore::core::config::ServerSettings;
use grabcore::core::utils::escape_filename;
use grabcore::download::BufferedDownload;
use grabcore::{DownloadRequest, FetchOutcome, Orchestrator, Quality};

use crate::error::ApiError;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
}

/// Parameters accepted by `/api/download`, from the query string or a JSON body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadParams {
    pub url: String,
    #[serde(default)]
    pub quality: Option<Quality>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub audio_only: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub progress: Option<bool>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagRepr {
    Bool(bool),
    Number(u64),
    Text(String),
}

/// Boolean flag as sent by forms and scripts: `true`/`false`, `1`/`0`,
/// `yes`/`no` or `on`/`off`.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(repr) = Option::<FlagRepr>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let flag = match repr {
        FlagRepr::Bool(flag) => flag,
        FlagRepr::Number(1) => true,
        FlagRepr::Number(0) => false,
        FlagRepr::Number(n) => return Err(de::Error::custom(format!("invalid flag value '{n}'"))),
        FlagRepr::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            other => return Err(de::Error::custom(format!("invalid flag value '{other}'"))),
        },
    };
    Ok(Some(flag))
}

impl DownloadParams {
    fn to_request(&self) -> Result<DownloadRequest, ApiError> {
        Ok(DownloadRequest::parse(
            &self.url,
            self.quality.unwrap_or_default(),
            self.audio_only.unwrap_or(false),
        )?)
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/download", get(download_get_handler).post(download_post_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the web server and serve until Ctrl-C.
pub async fn start_web_server(server: &ServerSettings, orchestrator: Orchestrator) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", server.host, server.port).parse()?;
    let app = router(AppState { orchestrator });

    tracing::info!("Starting web server on http://{}", addr);
    tracing::info!("  GET/POST /api/download  - Download (file, fallback URLs or SSE progress)");
    tracing::info!("  GET      /health        - Health check");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// GET /api/download?url=..&quality=..&audioOnly=..&progress=..
async fn download_get_handler(
    State(state): State<AppState>,
    params: Result<Query<DownloadParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    handle_download(state, params).await
}

/// POST /api/download with a JSON body.
async fn download_post_handler(
    State(state): State<AppState>,
    params: Result<Json<DownloadParams>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    handle_download(state, params).await
}

async fn handle_download(state: AppState, params: DownloadParams) -> Result<Response, ApiError> {
    let request = params.to_request()?;

    if params.progress.unwrap_or(false) {
        tracing::info!("📥 Progressive download requested: {}", request.url());
        let events = state
            .orchestrator
            .progressive(request)
            .map(|event| Event::default().json_data(event));
        return Ok(Sse::new(events).keep_alive(KeepAlive::default()).into_response());
    }

    tracing::info!("📥 Download requested: {}", request.url());
    match state.orchestrator.fetch(&request).await? {
        FetchOutcome::File(file) => Ok(file_response(file)),
        FetchOutcome::Fallback(result) => Ok(Json(result).into_response()),
    }
}

/// Streams the buffered artifact back as an attachment.
fn file_response(file: BufferedDownload) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", escape_filename(&file.file_name));
    let mut response = file.bytes.into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&file.content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(file.file_size));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}

/// GET /health: simple health check.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "strategies": state.orchestrator.settings().strategies,
    }))
}
