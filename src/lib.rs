use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use std::sync::Arc;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Decision logic (pure, no I/O).
pub mod token;
pub mod gate;
pub mod guard;

// Client session layer.
pub mod backend;
pub mod provider;
pub mod storage;

// Shared types and configuration.
pub mod config;
pub mod error;
pub mod models;

// Host routing (public vs. gated admin section).
pub mod routes;
use routes::{admin, public};

// --- Public Re-exports ---

// The types a host needs to assemble the gate, the provider and the guard.
pub use backend::{AdminBackend, BackendState, HttpBackendClient, MockBackend};
pub use config::AppConfig;
pub use error::AuthError;
pub use gate::{GateDecision, GatePolicy};
pub use guard::{GuardView, RouteGuard};
pub use provider::{FetchOutcome, Navigation, SessionProvider};
pub use storage::{MemorySessionStore, SessionStore, SessionStoreState};

/// AppState
///
/// Shared, immutable state of the admin host. The edge gate is stateless per
/// request; it only needs the policy derived from configuration.
#[derive(Clone)]
pub struct AppState {
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
    /// Edge gate policy, built once from `config`.
    pub gate: Arc<GatePolicy>,
}

impl AppState {
    /// Builds the state, deriving the gate policy from `config`.
    pub fn new(config: AppConfig) -> Self {
        let gate = Arc::new(config.gate_policy());
        Self { config, gate }
    }
}

// Lets handlers extract `State<AppConfig>` directly.
impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the host: public routes, the admin shell behind the edge gate,
/// and the observability layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(public::public_routes())
        // Admin section: every request passes the edge gate before the shell is served.
        .merge(
            admin::admin_routes(&state.config.shell_dir).layer(middleware::from_fn_with_state(
                state.clone(),
                gate::edge_gate,
            )),
        )
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // Assigns an `x-request-id` to requests that arrive without one.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // One span per request, closed with status and latency at INFO.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // Echoes the request id back on the response.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, URI and the request id, so every log
/// line of one request (including edge gate rejections) correlates.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
