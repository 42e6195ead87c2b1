use std::path::Path;

use crate::AppState;
use axum::Router;
use tower_http::services::{ServeDir, ServeFile};

/// Admin Router Module
///
/// Serves the admin single-page shell from `shell_dir`. Unknown paths fall
/// back to `index.html` so client-side routing (dashboard, categories,
/// payments, ...) resolves in the browser.
///
/// Access Control:
/// This router is only ever mounted wrapped in the `edge_gate` middleware.
/// Login, forgot-password and register are shell routes as well; the gate and
/// the route guard decide which of them need a session.
pub fn admin_routes(shell_dir: &str) -> Router<AppState> {
    let index = Path::new(shell_dir).join("index.html");

    Router::new().nest_service(
        "/admin",
        ServeDir::new(shell_dir).fallback(ServeFile::new(index)),
    )
}
