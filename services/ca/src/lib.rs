//! Meshlink certificate authority service.
//!
//! Issues certificates binding node ids to P-256 public keys and answers
//! verification queries. The root key lives only in memory.

pub mod config;
pub mod handlers;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub use config::Config;
pub use state::AppState;

/// HTTP routes of the CA.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/sign", post(handlers::sign))
        .route("/verify", post(handlers::verify))
        .with_state(state)
}
