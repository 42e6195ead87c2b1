use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::{
    error::AuthError,
    models::{AdminProfile, ProfileEnvelope},
};

pub const PROFILE_PATH: &str = "/api/v1/users/profile";
pub const LOGOUT_PATH: &str = "/api/v1/users/logout";

// 1. AdminBackend Contract
/// AdminBackend
///
/// The two backend calls the session provider makes. Abstracted so the
/// provider can be driven by the real REST client or by `MockBackend` in tests
/// without changing its logic.
#[async_trait]
pub trait AdminBackend: Send + Sync {
    /// Exchanges the bearer token for the profile of the user it belongs to.
    async fn fetch_profile(&self, token: &str) -> Result<AdminProfile, AuthError>;

    /// Tells the backend the session is over. Callers treat this as best-effort.
    async fn logout(&self, token: &str) -> Result<(), AuthError>;
}

/// BackendState
///
/// The concrete type used to share backend access with the provider.
pub type BackendState = Arc<dyn AdminBackend>;

// 2. The Real Implementation (REST backend)
/// HttpBackendClient
///
/// `reqwest` client for the marketplace REST backend. The client-level timeout
/// bounds both calls.
#[derive(Clone)]
pub struct HttpBackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackendClient {
    /// new
    ///
    /// `base_url` is the backend origin, e.g. `https://api.example.com`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn transport_error(e: reqwest::Error) -> AuthError {
    if e.is_timeout() {
        AuthError::Timeout
    } else {
        AuthError::NetworkFailure(e.to_string())
    }
}

#[async_trait]
impl AdminBackend for HttpBackendClient {
    /// fetch_profile
    ///
    /// `GET /api/v1/users/profile`. 401 and 403 are surfaced as server
    /// rejections so the provider can pick the right notice; any other
    /// non-success status is a plain network failure.
    async fn fetch_profile(&self, token: &str) -> Result<AdminProfile, AuthError> {
        let response = self
            .client
            .get(self.url(PROFILE_PATH))
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::ServerRejected(status.as_u16()));
        }
        if !status.is_success() {
            return Err(AuthError::NetworkFailure(format!(
                "profile request returned {}",
                status
            )));
        }

        let envelope = response.json::<ProfileEnvelope>().await.map_err(|e| {
            if e.is_timeout() {
                AuthError::Timeout
            } else {
                AuthError::MalformedProfile(e.to_string())
            }
        })?;

        envelope.into_profile()
    }

    /// logout
    ///
    /// `POST /api/v1/users/logout`.
    async fn logout(&self, token: &str) -> Result<(), AuthError> {
        let response = self
            .client
            .post(self.url(LOGOUT_PATH))
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::ServerRejected(status.as_u16()));
        }
        Ok(())
    }
}

// 3. The Mock Implementation (For Tests)
/// MockBackend
///
/// Scripted `AdminBackend` used by the provider tests. Counts calls so tests
/// can assert how many network round trips a flow made.
pub struct MockBackend {
    profile: Result<AdminProfile, AuthError>,
    profile_delay: Duration,
    logout_result: Result<(), AuthError>,
    /// When true, `logout` never completes.
    logout_hangs: bool,
    profile_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl MockBackend {
    /// A backend that answers every profile request with `profile`.
    pub fn with_profile(profile: AdminProfile) -> Self {
        Self::scripted(Ok(profile))
    }

    /// A backend whose profile request always fails with `error`.
    pub fn failing(error: AuthError) -> Self {
        Self::scripted(Err(error))
    }

    fn scripted(profile: Result<AdminProfile, AuthError>) -> Self {
        Self {
            profile,
            profile_delay: Duration::ZERO,
            logout_result: Ok(()),
            logout_hangs: false,
            profile_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        }
    }

    /// Delays every profile answer.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.profile_delay = delay;
        self
    }

    pub fn failing_logout(mut self, error: AuthError) -> Self {
        self.logout_result = Err(error);
        self
    }

    pub fn hanging_logout(mut self) -> Self {
        self.logout_hangs = true;
        self
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdminBackend for MockBackend {
    async fn fetch_profile(&self, _token: &str) -> Result<AdminProfile, AuthError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        if !self.profile_delay.is_zero() {
            tokio::time::sleep(self.profile_delay).await;
        }
        self.profile.clone()
    }

    async fn logout(&self, _token: &str) -> Result<(), AuthError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.logout_hangs {
            std::future::pending::<()>().await;
        }
        self.logout_result.clone()
    }
}
