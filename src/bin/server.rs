//! Shoplist Server
//!
//! Reference remote service for shoplist clients. Stores items in a JSON file
//! and can simulate a slow or unreliable network.
//!
//! # Configuration
//!
//! Environment variables:
//! - `SHOPLIST_PORT`: Port to listen on (default: 8080)
//! - `SHOPLIST_DATA_DIR`: Directory to store items (default: ~/.local/share/shoplist-server)
//! - `SHOPLIST_LATENCY_MS`: Artificial latency per item request (default: 0)
//! - `SHOPLIST_FAILURE_RATE`: Fraction of item requests that fail with 503 (default: 0.0)
//!
//! # Endpoints
//!
//! - `GET /health`: Health check
//! - `GET /items`: List all items
//! - `POST /items`: Insert or replace an item
//! - `PUT /items/{id}`: Replace an existing item
//! - `DELETE /items/{id}`: Delete an item

use shoplist::server::{serve, ServerConfig, ServerState};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shoplist=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();

    tracing::info!("Data directory: {}", config.data_dir.display());
    if !config.latency.is_zero() || config.failure_rate > 0.0 {
        tracing::info!(
            "Simulating latency {:?} (+ jitter), failure rate {}",
            config.latency,
            config.failure_rate
        );
    }

    let port = config.port;
    let state = match ServerState::open(config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to open item storage: {}", e);
            std::process::exit(1);
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = serve(listener, state).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
