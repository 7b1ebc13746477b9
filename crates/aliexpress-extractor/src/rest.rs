//! HTTP API.
//!
//! `POST /extrair` renders one product page per request; `GET /` and
//! `GET /health` report liveness.

use std::sync::Arc;

use aliexpress_product::PageData;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::browser::BrowserLauncher;
use crate::config::{BrowserSettings, ServerConfig};
use crate::error::ApiError;
use crate::pipeline::extract_product_page;

/// Handler state. Immutable; nothing is shared between requests beyond
/// the launcher and settings.
pub struct AppState {
    pub launcher: Arc<dyn BrowserLauncher>,
    pub settings: BrowserSettings,
}

impl AppState {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, settings: BrowserSettings) -> Self {
        Self { launcher, settings }
    }
}

/// `GET /` body.
#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub status: &'static str,
    pub mensagem: &'static str,
}

/// Success envelope for `POST /extrair`.
#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub sucesso: bool,
    pub dados: PageData,
}

/// Build the axum Router with all endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/extrair", post(extrair))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until Ctrl-C or SIGTERM.
pub async fn serve(config: ServerConfig, launcher: Arc<dyn BrowserLauncher>) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(launcher, config.browser));
    let app = router(state);

    let listener = TcpListener::bind(config.addr).await?;
    info!("AliExpress extractor listening on http://{}", config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

/// Whether the request declares a JSON body (`application/json`, any parameters).
pub fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

/// Pull a non-empty string `url` out of a request body.
///
/// Bodies that are empty, not JSON, or carry a non-string `url` count as
/// missing the URL.
pub fn requested_url(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<Value>(body)
        .ok()?
        .get("url")?
        .as_str()
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

// ── Handlers ────────────────────────────────────────────────────

async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        status: "✅ Funcionando!",
        mensagem: "Servidor AliExpress no ar!",
    })
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn extrair(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ExtractResponse>, ApiError> {
    // A body that is not declared as JSON is not read at all.
    let url = is_json(&headers)
        .then(|| requested_url(&body))
        .flatten()
        .ok_or(ApiError::MissingUrl)?;
    info!(url = %url, "product URL received");

    match extract_product_page(state.launcher.as_ref(), &state.settings, &url).await {
        Ok(dados) => Ok(Json(ExtractResponse {
            sucesso: true,
            dados,
        })),
        Err(e) => {
            error!(url = %url, error = %e, "extraction failed");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_url_present() {
        let url = requested_url(br#"{"url":"https://pt.aliexpress.com/item/1.html"}"#);
        assert_eq!(url.as_deref(), Some("https://pt.aliexpress.com/item/1.html"));
    }

    #[test]
    fn test_requested_url_missing_forms() {
        assert!(requested_url(b"").is_none());
        assert!(requested_url(b"{}").is_none());
        assert!(requested_url(b"not json").is_none());
        assert!(requested_url(br#"{"url":""}"#).is_none());
        assert!(requested_url(br#"{"url":null}"#).is_none());
        assert!(requested_url(br#"{"url":42}"#).is_none());
        assert!(requested_url(br#"["https://a.example"]"#).is_none());
    }

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, content_type.parse().unwrap());
        headers
    }

    #[test]
    fn test_is_json() {
        assert!(is_json(&headers("application/json")));
        assert!(is_json(&headers("application/json; charset=utf-8")));
        assert!(is_json(&headers("Application/JSON")));
        assert!(!is_json(&headers("text/plain")));
        assert!(!is_json(&headers("application/x-www-form-urlencoded")));
        assert!(!is_json(&HeaderMap::new()));
    }
}
