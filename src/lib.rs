//! Ride/delivery matching backend.
//!
//! Customers request rides, drivers accept pending ones, and the
//! [`services::lifecycle::RideLifecycleManager`] moves each ride through its
//! status lifecycle.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;

use services::estimator::Estimator;
use storage::RideStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RideStore>,
    pub estimator: Arc<dyn Estimator>,
}

/// Full HTTP application with CORS and request tracing.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(api::router::create_router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
