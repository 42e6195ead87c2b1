use crate::AppState;
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints outside the admin section. The edge gate never sees these.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers; answers without touching the backend.
        .route("/health", get(|| async { "ok" }))
}
