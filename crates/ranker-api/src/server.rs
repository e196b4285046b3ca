//! HTTP surface for presence ingestion, pass triggering, and hierarchy
//! queries.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use contracts::{ApiError, ErrorCode, HierarchyEntry, IdentityId, PresenceUpdate};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::{EngineApi, PersistenceError};

#[derive(Debug)]
pub enum ServerError {
    Io(std::io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "server io error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[derive(Debug)]
struct HttpApiError {
    status: StatusCode,
    error: ApiError,
}

impl HttpApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: ApiError::new(ErrorCode::NotFound, message, None),
        }
    }

    fn invalid_request(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: ApiError::new(ErrorCode::InvalidRequest, message, details),
        }
    }
}

impl From<PersistenceError> for HttpApiError {
    fn from(value: PersistenceError) -> Self {
        match value {
            PersistenceError::NotAttached => Self {
                status: StatusCode::CONFLICT,
                error: ApiError::new(
                    ErrorCode::StoreUnavailable,
                    "no sqlite store is attached",
                    None,
                ),
            },
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: ApiError::new(ErrorCode::InternalError, other.to_string(), None),
            },
        }
    }
}

impl IntoResponse for HttpApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

#[derive(Clone)]
struct AppState {
    api: Arc<Mutex<EngineApi>>,
}

/// Bind the listener and serve until the process exits.
pub async fn serve(addr: SocketAddr, api: EngineApi) -> Result<(), ServerError> {
    let state = AppState {
        api: Arc::new(Mutex::new(api)),
    };
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/presence", post(post_presence))
        .route("/api/v1/presence/flush", post(post_flush))
        .route("/api/v1/pass", post(post_pass))
        .route("/api/v1/hierarchy", get(get_hierarchy))
        .route("/api/v1/identities/{id}", get(get_identity))
        .route("/api/v1/promotions", get(get_promotions))
        .with_state(state)
}

async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let api = state.api.lock().await;
    Json(api.status())
}

async fn post_presence(
    State(state): State<AppState>,
    Json(update): Json<PresenceUpdate>,
) -> Result<impl IntoResponse, HttpApiError> {
    if update.groups.iter().any(|group| group.is_empty()) {
        return Err(HttpApiError::invalid_request(
            "presence groups must be non-empty",
            None,
        ));
    }
    let mut api = state.api.lock().await;
    api.observe_presence(&update)?;
    Ok(Json(json!({ "buffered_pairs": api.status().buffered_pairs })))
}

async fn post_flush(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, HttpApiError> {
    let mut api = state.api.lock().await;
    let flushed = api.flush_presence()?;
    Ok(Json(json!({ "flushed": flushed })))
}

async fn post_pass(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, HttpApiError> {
    let mut api = state.api.lock().await;
    let report = api.run_pass()?;
    Ok(Json(report))
}

async fn get_hierarchy(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, HttpApiError> {
    let api = state.api.lock().await;
    let snapshot = api
        .snapshot()
        .cloned()
        .ok_or_else(|| HttpApiError::not_found("no pass has completed yet"))?;
    Ok(Json(snapshot))
}

async fn get_identity(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HierarchyEntry>, HttpApiError> {
    let id: IdentityId = id.parse().map_err(|_| {
        HttpApiError::invalid_request("identity id must be an unsigned integer", Some(id.clone()))
    })?;
    let api = state.api.lock().await;
    let entry = api
        .snapshot()
        .and_then(|snapshot| snapshot.entries.get(&id))
        .cloned()
        .ok_or_else(|| HttpApiError::not_found(format!("identity {id} is not ranked")))?;
    Ok(Json(entry))
}

#[derive(Debug, Deserialize)]
struct PromotionsQuery {
    limit: Option<usize>,
}

async fn get_promotions(
    State(state): State<AppState>,
    Query(query): Query<PromotionsQuery>,
) -> Result<impl IntoResponse, HttpApiError> {
    let limit = query.limit.unwrap_or(50).min(500);
    let api = state.api.lock().await;
    let log = api.promotion_log(limit)?;
    let body: Vec<_> = log
        .iter()
        .map(|entry| {
            json!({
                "id": entry.event.id.to_string(),
                "old_rank": entry.event.old_rank,
                "new_rank": entry.event.new_rank,
                "title": entry.event.title,
                "recorded_at": entry.recorded_at,
            })
        })
        .collect();
    Ok(Json(body))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
