use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};

use crate::{
    AppState,
    error::AuthError,
    token::{TokenVerifier, now_secs},
};

/// Name of the cookie carrying the admin session token.
pub const ADMIN_TOKEN_COOKIE: &str = "adminToken";

/// GateDecision
///
/// Output of the edge check. The decision is pure; applying it (forwarding,
/// redirecting, deleting the cookie) is the middleware's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Forward the request unchanged.
    Allow,
    /// Send the browser to `location`, optionally deleting the token cookie.
    Redirect {
        /// Login URL carrying the original target.
        location: String,
        /// Whether the token cookie must be deleted.
        clear_cookie: bool,
        /// Why the request was refused, for the log line.
        reason: AuthError,
    },
}

/// GatePolicy
///
/// Which paths the edge gate guards and how it inspects the token. Built once
/// from `AppConfig` and shared read-only across requests.
#[derive(Clone)]
pub struct GatePolicy {
    /// Everything at or below this prefix is guarded.
    pub admin_prefix: String,
    /// Where rejected requests are sent; never guarded itself.
    pub login_path: String,
    /// Backend/API traffic is never gated here.
    pub api_prefix: String,
    /// Static asset locations passed through untouched.
    pub asset_prefixes: Vec<String>,
    /// File extensions (lowercase, no dot) served as static assets from
    /// anywhere in the admin section.
    pub asset_extensions: Vec<String>,
    /// Cookie holding the admin token.
    pub cookie_name: String,
    /// Token inspection, with or without signature verification.
    pub verifier: TokenVerifier,
}

/// Extensions of the files the admin shell build emits.
pub const ASSET_EXTENSIONS: &[&str] = &[
    "js", "mjs", "css", "map", "png", "jpg", "jpeg", "gif", "webp", "avif", "svg", "ico",
    "woff", "woff2", "ttf", "otf", "eot", "txt", "webmanifest",
];

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            admin_prefix: "/admin".to_string(),
            login_path: "/admin/login".to_string(),
            api_prefix: "/api".to_string(),
            asset_prefixes: vec![
                "/_next/".to_string(),
                "/static/".to_string(),
                "/assets/".to_string(),
                "/favicon.ico".to_string(),
            ],
            asset_extensions: ASSET_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            cookie_name: ADMIN_TOKEN_COOKIE.to_string(),
            verifier: TokenVerifier::decode_only(),
        }
    }
}

impl GatePolicy {
    /// is_bypassed
    ///
    /// Asset paths, API paths, the login page and anything outside the admin
    /// section skip the token check entirely. Inside the section a path counts
    /// as an asset only when its extension is a known asset extension, so
    /// dotted client routes such as `/admin/users/jane.doe` stay guarded.
    pub fn is_bypassed(&self, path: &str) -> bool {
        if is_under(path, &self.api_prefix) {
            return true;
        }
        if !is_under(path, &self.admin_prefix) {
            return true;
        }
        if self
            .asset_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return true;
        }
        if self.is_asset_file(path) {
            return true;
        }
        normalize(path) == normalize(&self.login_path)
    }

    /// evaluate
    ///
    /// Decides `Allow` or `Redirect` for a request target (path plus optional
    /// query) and the raw token cookie value, if any.
    pub fn evaluate(&self, target: &str, token: Option<&str>, now: i64) -> GateDecision {
        let path = target.split('?').next().unwrap_or(target);
        if self.is_bypassed(path) {
            return GateDecision::Allow;
        }

        let token = match token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => token,
            None => return self.reject(target, AuthError::MissingToken),
        };

        match self.verifier.inspect_admin(token, now) {
            Ok(_) => GateDecision::Allow,
            Err(reason) => self.reject(target, reason),
        }
    }

    /// Whether the last segment ends in one of `asset_extensions`.
    fn is_asset_file(&self, path: &str) -> bool {
        asset_extension(path).is_some_and(|ext| {
            self.asset_extensions
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
    }

    /// Builds the redirect for a refused request.
    fn reject(&self, target: &str, reason: AuthError) -> GateDecision {
        GateDecision::Redirect {
            location: login_location(&self.login_path, Some(target)),
            clear_cookie: reason.clears_token(),
            reason,
        }
    }
}

/// login_location
///
/// The login URL, carrying the originally requested target as `redirect` so
/// the login screen can send the admin back afterwards.
pub fn login_location(login_path: &str, return_to: Option<&str>) -> String {
    match return_to.filter(|target| !target.is_empty()) {
        Some(target) => format!("{}?redirect={}", login_path, urlencoding::encode(target)),
        None => login_path.to_string(),
    }
}

/// Prefix match on whole path segments: `/admin` covers `/admin` and
/// `/admin/x`, not `/administrator`.
pub(crate) fn is_under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Drops trailing slashes; the root stays `/`.
pub(crate) fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

/// Extension of the last path segment. `None` when the segment has no dot,
/// starts with one, or ends with one.
fn asset_extension(path: &str) -> Option<&str> {
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext)
}

/// edge_gate
///
/// Axum middleware applying `GatePolicy::evaluate` to every request under the
/// admin section. On rejection the token cookie is deleted (unless it was
/// never sent) and the browser is redirected to login.
pub async fn edge_gate(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let policy = &state.gate;
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let token = jar.get(&policy.cookie_name).map(|cookie| cookie.value());

    match policy.evaluate(&target, token, now_secs()) {
        GateDecision::Allow => next.run(request).await,
        GateDecision::Redirect {
            location,
            clear_cookie,
            reason,
        } => {
            tracing::info!(request_target = %target, reason = %reason, "edge gate redirecting to login");

            let jar = if clear_cookie {
                jar.remove(Cookie::build((policy.cookie_name.clone(), "")).path("/"))
            } else {
                jar
            };
            (jar, Redirect::to(&location)).into_response()
        }
    }
}
