use std::env;
use std::time::Duration;

use crate::{
    gate::GatePolicy,
    provider::DEFAULT_PROFILE_TIMEOUT,
    token::TokenVerifier,
};

/// AppConfig
///
/// Holds the gate's entire configuration. Immutable once loaded and shared
/// through `AppState` via `FromRef`.
#[derive(Clone)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and which variables are mandatory.
    pub env: Env,
    // Origin of the marketplace REST backend.
    pub backend_url: String,
    // Socket address the admin host listens on.
    pub bind_addr: String,
    // Directory holding the built admin single-page shell (index.html + assets).
    pub shell_dir: String,
    // Section guarded by the edge gate.
    pub admin_prefix: String,
    // Login screen; the target of every rejection.
    pub login_path: String,
    // Upper bound on the client-side profile fetch.
    pub profile_timeout: Duration,
    // Optional HS256 secret. When set, the edge gate also verifies signatures.
    pub jwt_secret: Option<String>,
}

/// Env
///
/// Runtime context: local development or hardened production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// default
    ///
    /// Safe, non-panicking values for tests and local scaffolding.
    fn default() -> Self {
        Self {
            env: Env::Local,
            backend_url: "http://localhost:5000".to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
            shell_dir: "./public".to_string(),
            admin_prefix: "/admin".to_string(),
            login_path: "/admin/login".to_string(),
            profile_timeout: DEFAULT_PROFILE_TIMEOUT,
            jwt_secret: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables, failing fast on
    /// anything the current environment cannot run without.
    ///
    /// # Panics
    /// Panics if `BACKEND_API_URL` is unset in production, or if
    /// `PROFILE_TIMEOUT_SECS` is set but not a positive integer.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let defaults = Self::default();

        let backend_url = match env {
            Env::Production => env::var("BACKEND_API_URL")
                .expect("FATAL: BACKEND_API_URL must be set in production."),
            Env::Local => env::var("BACKEND_API_URL").unwrap_or(defaults.backend_url),
        };

        let profile_timeout = match env::var("PROFILE_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs = raw
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .expect("FATAL: PROFILE_TIMEOUT_SECS must be a positive integer.");
                Duration::from_secs(secs)
            }
            Err(_) => defaults.profile_timeout,
        };

        // An empty secret means "not configured", not "verify against the empty key".
        let jwt_secret = env::var("ADMIN_JWT_SECRET")
            .ok()
            .filter(|secret| !secret.trim().is_empty());

        Self {
            env,
            backend_url,
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            shell_dir: env::var("ADMIN_SHELL_DIR").unwrap_or(defaults.shell_dir),
            admin_prefix: defaults.admin_prefix,
            login_path: defaults.login_path,
            profile_timeout,
            jwt_secret,
        }
    }

    /// gate_policy
    ///
    /// Derives the edge gate policy from this configuration.
    pub fn gate_policy(&self) -> GatePolicy {
        let verifier = match &self.jwt_secret {
            Some(secret) => TokenVerifier::with_secret(secret),
            None => TokenVerifier::decode_only(),
        };

        GatePolicy {
            admin_prefix: self.admin_prefix.clone(),
            login_path: self.login_path.clone(),
            verifier,
            ..GatePolicy::default()
        }
    }
}
