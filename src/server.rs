//! Demo HTTP server exposing a session over a small REST API.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /session` - Current session id and values (starts one if needed)
//! - `POST /session/{key}` - Store the request body as a string value
//! - `POST /session/regenerate` - Move the session to a fresh id
//! - `DELETE /session` - Destroy the session and clear its cookie
//! - `GET /stats` - Provider name and session count

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{request::Parts, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::SessionError;
use crate::http::HttpCarrier;
use crate::session::{SessionManager, Store};
use crate::value::Value;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionManager>,
    /// Treat every request as TLS, for servers behind a TLS-terminating proxy.
    pub behind_tls: bool,
}

impl AppState {
    pub fn new(manager: SessionManager) -> Self {
        Self {
            manager: Arc::new(manager),
            behind_tls: false,
        }
    }

    pub fn with_behind_tls(mut self, behind_tls: bool) -> Self {
        self.behind_tls = behind_tls;
        self
    }

    /// Carrier for one request. An `https` request URI also counts as TLS.
    fn carrier(&self, parts: &Parts) -> HttpCarrier {
        let carrier = HttpCarrier::from_parts(parts);
        if self.behind_tls {
            carrier.with_tls(true)
        } else {
            carrier
        }
    }
}

/// Session contents returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub values: BTreeMap<String, serde_json::Value>,
}

impl SessionResponse {
    fn from_store(store: &Store) -> Self {
        Self {
            session_id: String::from_utf8_lossy(&store.session_id()).into_owned(),
            values: store
                .data()
                .iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect(),
        }
    }
}

/// Storage statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub provider: String,
    pub sessions: usize,
    pub idle_stores: usize,
}

/// Error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<(HeaderMap, Json<T>), ApiError>;

fn api_error(err: SessionError) -> ApiError {
    let (status, code) = match err {
        SessionError::NotConfigured => (StatusCode::SERVICE_UNAVAILABLE, "NOT_CONFIGURED"),
        SessionError::InvalidSessionId(_) => (StatusCode::BAD_REQUEST, "INVALID_SESSION_ID"),
        SessionError::Codec(_) => (StatusCode::UNPROCESSABLE_ENTITY, "CORRUPT_SESSION"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: code.to_string(),
        }),
    )
}

/// Plain JSON rendering of a session value. Bytes become base64 text.
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Value::from(*f),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Bytes(b) => serde_json::Value::String(STANDARD.encode(b)),
        Value::List(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::Map(map) => serde_json::Value::Object(
            map.iter().map(|(k, v)| (k.clone(), to_json(v))).collect(),
        ),
    }
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

/// Load (or start) the session and return its contents.
pub async fn get_session(
    State(state): State<AppState>,
    parts: Parts,
) -> ApiResult<SessionResponse> {
    let manager = &state.manager;
    let mut carrier = state.carrier(&parts);

    let store = manager.get(&mut carrier).await.map_err(api_error)?;
    let response = SessionResponse::from_store(&store);
    manager.save(&mut carrier, store).await.map_err(api_error)?;

    Ok((carrier.into_response_headers(), Json(response)))
}

/// Store the request body under `key`.
pub async fn set_value(
    State(state): State<AppState>,
    Path(key): Path<String>,
    parts: Parts,
    body: String,
) -> ApiResult<SessionResponse> {
    let manager = &state.manager;
    let mut carrier = state.carrier(&parts);

    let mut store = manager.get(&mut carrier).await.map_err(api_error)?;
    store.set(key, body);
    let response = SessionResponse::from_store(&store);
    manager.save(&mut carrier, store).await.map_err(api_error)?;

    Ok((carrier.into_response_headers(), Json(response)))
}

/// Move the session to a fresh id.
pub async fn regenerate_session(
    State(state): State<AppState>,
    parts: Parts,
) -> ApiResult<SessionResponse> {
    let manager = &state.manager;
    let mut carrier = state.carrier(&parts);

    let mut store = manager.get(&mut carrier).await.map_err(api_error)?;
    manager
        .regenerate(&mut carrier, &mut store)
        .await
        .map_err(api_error)?;
    let response = SessionResponse::from_store(&store);
    manager.save(&mut carrier, store).await.map_err(api_error)?;

    Ok((carrier.into_response_headers(), Json(response)))
}

/// Destroy the session.
pub async fn destroy_session(
    State(state): State<AppState>,
    parts: Parts,
) -> ApiResult<serde_json::Value> {
    let mut carrier = state.carrier(&parts);
    state
        .manager
        .destroy(&mut carrier)
        .await
        .map_err(api_error)?;

    Ok((
        carrier.into_response_headers(),
        Json(serde_json::json!({ "destroyed": true })),
    ))
}

/// Provider statistics.
pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let manager = &state.manager;
    let sessions = manager.count().await.map_err(api_error)?;
    let provider = manager
        .provider()
        .map(|p| p.name().to_string())
        .unwrap_or_default();

    Ok(Json(StatsResponse {
        provider,
        sessions,
        idle_stores: manager.pool().idle(),
    }))
}

/// Create the router with all routes configured.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/session", get(get_session).delete(destroy_session))
        .route("/session/regenerate", post(regenerate_session))
        .route("/session/{key}", post(set_value))
        .route("/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: AppState) -> crate::Result<()> {
    let router = create_router(state);

    info!("Starting session-keeper server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
