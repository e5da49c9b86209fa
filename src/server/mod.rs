//! Reference remote service for shoplist clients.
//!
//! Serves the item API over HTTP and can simulate a slow or unreliable
//! network: every `/items` request waits for the configured latency plus up
//! to 100ms of jitter, and fails with 503 at the configured rate.

pub mod storage;

pub use storage::{ItemStorage, StorageError};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use rand::Rng;
use serde::Serialize;
use shoplist_core::{ItemId, RemoteItem};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

const MAX_JITTER_MS: u64 = 100;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Directory holding `items.json`
    pub data_dir: PathBuf,
    /// Base artificial latency per item request
    pub latency: Duration,
    /// Fraction of item requests that fail, 0.0 to 1.0
    pub failure_rate: f32,
}

impl ServerConfig {
    /// Configuration with no simulated latency or failures.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            port: 8080,
            data_dir: data_dir.into(),
            latency: Duration::ZERO,
            failure_rate: 0.0,
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let port = std::env::var("SHOPLIST_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let data_dir = std::env::var("SHOPLIST_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("shoplist-server")
            });

        let latency = std::env::var("SHOPLIST_LATENCY_MS")
            .ok()
            .and_then(|ms| ms.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::ZERO);

        let failure_rate = std::env::var("SHOPLIST_FAILURE_RATE")
            .ok()
            .and_then(|rate| rate.parse().ok())
            .unwrap_or(0.0);

        Self {
            port,
            data_dir,
            latency,
            failure_rate,
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct ServerState {
    inner: Arc<StateInner>,
}

struct StateInner {
    storage: ItemStorage,
    latency_ms: AtomicU64,
    // f32 bits
    failure_rate: AtomicU32,
}

impl ServerState {
    pub fn open(config: ServerConfig) -> Result<Self, StorageError> {
        let storage = ItemStorage::open(&config.data_dir)?;
        let state = Self {
            inner: Arc::new(StateInner {
                storage,
                latency_ms: AtomicU64::new(0),
                failure_rate: AtomicU32::new(0),
            }),
        };
        state.set_latency(config.latency);
        state.set_failure_rate(config.failure_rate);
        Ok(state)
    }

    pub fn storage(&self) -> &ItemStorage {
        &self.inner.storage
    }

    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.inner.latency_ms.store(ms, Ordering::Relaxed);
    }

    /// Clamped to 0.0..=1.0.
    pub fn set_failure_rate(&self, rate: f32) {
        let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        self.inner
            .failure_rate
            .store(rate.to_bits(), Ordering::Relaxed);
    }

    pub fn failure_rate(&self) -> f32 {
        f32::from_bits(self.inner.failure_rate.load(Ordering::Relaxed))
    }

    async fn simulate_network(&self) -> Result<(), ApiError> {
        let base = self.inner.latency_ms.load(Ordering::Relaxed);
        if base > 0 {
            let jitter = rand::rng().random_range(0..=MAX_JITTER_MS);
            tokio::time::sleep(Duration::from_millis(base.saturating_add(jitter))).await;
        }

        let rate = self.failure_rate();
        if rate > 0.0 && rand::random::<f32>() < rate {
            tracing::debug!("Simulated network failure");
            return Err(ApiError::Unavailable);
        }
        Ok(())
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

enum ApiError {
    NotFound(ItemId),
    Unavailable,
    Storage(StorageError),
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(id) => ApiError::NotFound(id),
            other => ApiError::Storage(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(id) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Item not found: {}", id),
            ),
            ApiError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "unavailable",
                "Network error".to_string(),
            ),
            ApiError::Storage(e) => {
                tracing::error!("Storage error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_error",
                    e.to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error, message })).into_response()
    }
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint (never subject to simulated failures)
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_items(State(state): State<ServerState>) -> Result<Json<Vec<RemoteItem>>, ApiError> {
    state.simulate_network().await?;
    Ok(Json(state.storage().list()))
}

async fn add_item(
    State(state): State<ServerState>,
    Json(item): Json<RemoteItem>,
) -> Result<Json<RemoteItem>, ApiError> {
    state.simulate_network().await?;
    let item = state.storage().upsert(item)?;
    tracing::info!(id = %item.id, "Item stored");
    Ok(Json(item))
}

async fn update_item(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(mut item): Json<RemoteItem>,
) -> Result<Json<RemoteItem>, ApiError> {
    state.simulate_network().await?;
    item.id = ItemId::from(id);
    let item = state.storage().update(item)?;
    tracing::info!(id = %item.id, "Item updated");
    Ok(Json(item))
}

async fn delete_item(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.simulate_network().await?;
    let id = ItemId::from(id);
    state.storage().delete(&id)?;
    tracing::info!(%id, "Item deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Build the HTTP router.
pub fn router(state: ServerState) -> Router {
    let item_routes = Router::new()
        .route("/items", get(list_items).post(add_item))
        .route("/items/{id}", put(update_item).delete(delete_item));

    Router::new()
        .route("/health", get(health))
        .merge(item_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the item API on an already-bound listener until the process ends.
pub async fn serve(listener: tokio::net::TcpListener, state: ServerState) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}
