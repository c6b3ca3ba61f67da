// API module for Page Gate
//
// This module implements the HTTP surface of the gate

use crate::content::ContentResolver;
use crate::error::{PageGateError, Result};
use crate::validator::TokenValidator;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod context;
pub mod handlers;

pub use handlers::{restricted_redirect, ACCESS_RESTRICTED_PATH};

/// Shared state handed to every handler
pub struct AppState {
    /// Token validator
    pub validator: TokenValidator,
    /// Source of protected documents
    pub content: Arc<dyn ContentResolver>,
}

/// API Server
pub struct ApiServer {
    state: Arc<AppState>,
    /// Server bind address
    bind_address: String,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(
        validator: TokenValidator,
        content: Arc<dyn ContentResolver>,
        bind_address: impl Into<String>,
    ) -> Self {
        Self {
            state: Arc::new(AppState { validator, content }),
            bind_address: bind_address.into(),
        }
    }

    /// Start the API server
    pub async fn start(&self) -> Result<()> {
        let app = self.router();

        let addr: SocketAddr = self
            .bind_address
            .parse()
            .map_err(|e| PageGateError::Config(format!("Invalid bind address: {}", e)))?;

        info!("Starting API server on {}", addr);

        axum::Server::bind(&addr)
            .serve(app.into_make_service())
            .await
            .map_err(|e| PageGateError::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Build the API router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(handlers::health_check))
            .route(ACCESS_RESTRICTED_PATH, get(handlers::access_restricted))
            .route("/t/:token/*page", get(handlers::gate_page))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }
}
