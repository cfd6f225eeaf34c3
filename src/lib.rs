//! Adike Mitra - Farm Management Backend
//!
//! This library provides the HTTP backend for the Adike Mitra arecanut
//! farming assistant. It handles:
//! - Farmer and developer accounts with cookie sessions
//! - Leaf and fruit image uploads with simulated disease analysis
//! - Simulated weather advisories for spraying
//! - Market price history, refresh and short-term prediction
//! - A simulated irrigation pump panel
//! - Admin settings and data export

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod detection;
pub mod export;
pub mod irrigation;
pub mod market;
pub mod models;
pub mod settings;
pub mod weather;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use config::Config;
use db::Database;
use market::feed::PriceFeed;

/// Application state shared by every request handler
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub feed: PriceFeed,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        let feed = PriceFeed::new(config.price_feed_url.clone());
        Self { db, config, feed }
    }
}

pub type SharedState = Arc<AppState>;

/// Error type for request handlers
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] db::DbError),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Error processing image: {0}")]
    Image(String),

    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Upload(_) | AppError::Image(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Database(_) | AppError::Io(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database",
            AppError::Validation(_) => "validation",
            AppError::Unauthorized(_) => "authentication",
            AppError::Forbidden(_) => "authorization",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Upload(_) | AppError::PayloadTooLarge(_) => "upload",
            AppError::Image(_) => "image",
            AppError::Io(_) | AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        let body = serde_json::json!({
            "error": {
                "category": self.category(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Server Setup
// ============================================================================

/// Start the server and block until it stops
pub async fn run(config: Config) -> Result<(), AppError> {
    tracing::info!("Starting Adike Mitra backend");
    tracing::info!("Database path: {:?}", config.db_path);

    // Create database and upload directories if they don't exist
    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let database = Database::new(config.db_path.clone())?;
    database.initialize()?;
    tracing::info!("Database initialized successfully at {:?}", config.db_path);

    let bind = config.bind;
    let state = Arc::new(AppState::new(database, config));

    let seeded = market::seed_price_history(&state).await?;
    if seeded > 0 {
        tracing::info!("Added {} historical price entries", seeded);
    }

    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Listening on {}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
