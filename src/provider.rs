use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::{
    config::AppConfig,
    backend::BackendState,
    error::AuthError,
    models::{AdminProfile, Notice, SessionPhase, SessionSnapshot, SessionState},
    storage::{self, SessionStoreState},
    token::{ADMIN_ROLE, check_token_freshness, now_secs},
};

/// Upper bound on a single profile fetch.
pub const DEFAULT_PROFILE_TIMEOUT: Duration = Duration::from_secs(15);

/// Navigation
///
/// A redirect the host must perform, with the toast to show first (if any).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    /// Path to navigate to, usually the login screen.
    pub to: String,
    /// Toast to show before navigating.
    pub notice: Option<Notice>,
}

/// FetchOutcome
///
/// Result of one `fetch_admin` call, returned as a value so the host decides
/// how to navigate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The backend confirmed an admin session.
    Authenticated(AdminProfile),
    /// Non-forced fetch served from the in-memory profile.
    Cached(AdminProfile),
    /// Another fetch is outstanding; this call did nothing.
    AlreadyInFlight,
    /// The session ended (logout or rejection) while the backend was
    /// answering. The late answer was discarded and nothing was written.
    Superseded,
    /// The session is gone. Storage has been cleared.
    Rejected {
        error: AuthError,
        redirect: Navigation,
    },
}

impl FetchOutcome {
    /// The navigation a rejection asks for, if any.
    pub fn redirect(&self) -> Option<&Navigation> {
        match self {
            FetchOutcome::Rejected { redirect, .. } => Some(redirect),
            _ => None,
        }
    }
}

/// Releases the in-flight flag on every exit path.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// SessionProvider
///
/// Owns the admin session for the lifetime of a page: the in-memory
/// `SessionState`, the stored token, and the conversation with the backend.
/// Screens read `snapshot()`; only the provider mutates state.
///
/// Lifecycle: `mount()` once the page is interactive, `refresh_admin()` after
/// profile edits, `logout()` to tear down.
pub struct SessionProvider {
    /// Backend the token is exchanged with.
    backend: BackendState,
    /// Persistent side of the session (token, session type, mirrored profile).
    store: SessionStoreState,
    /// In-memory side of the session; never locked across an `.await`.
    state: RwLock<SessionState>,
    /// Set while a profile fetch is outstanding.
    in_flight: AtomicBool,
    /// Bumped whenever the session is torn down. A fetch that sees a different
    /// value after its backend call drops the answer.
    epoch: AtomicU64,
    /// Target of every redirect the provider asks for.
    login_path: String,
    /// Upper bound on one profile fetch.
    profile_timeout: Duration,
    /// Epoch-seconds clock used for local expiry checks.
    clock: fn() -> i64,
}

impl SessionProvider {
    /// Builds an uninitialized provider with the default login path and
    /// profile timeout.
    pub fn new(backend: BackendState, store: SessionStoreState) -> Self {
        Self {
            backend,
            store,
            state: RwLock::new(SessionState::default()),
            in_flight: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            login_path: "/admin/login".to_string(),
            profile_timeout: DEFAULT_PROFILE_TIMEOUT,
            clock: now_secs,
        }
    }

    /// Builds a provider with the login path and timeout from `AppConfig`.
    pub fn from_config(config: &AppConfig, backend: BackendState, store: SessionStoreState) -> Self {
        Self::new(backend, store)
            .with_login_path(&config.login_path)
            .with_profile_timeout(config.profile_timeout)
    }

    /// Overrides the login path used for redirects.
    pub fn with_login_path(mut self, login_path: &str) -> Self {
        self.login_path = login_path.to_string();
        self
    }

    /// Overrides the bound on a single profile fetch.
    pub fn with_profile_timeout(mut self, timeout: Duration) -> Self {
        self.profile_timeout = timeout;
        self
    }

    /// Replaces the wall clock (epoch seconds) used for local expiry checks.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    // --- Read side ---

    /// Copy of the current session state. A poisoned lock still yields the
    /// last written state.
    pub fn state(&self) -> SessionState {
        self.state
            .read()
            .map(|state| state.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// The `{admin, isAuthenticated, loading}` view handed to screens.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state().snapshot()
    }

    /// The authenticated admin, if any.
    pub fn admin(&self) -> Option<AdminProfile> {
        self.state().admin
    }

    /// Whether a confirmed admin session is in place.
    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    /// Whether the session has not settled yet.
    pub fn is_loading(&self) -> bool {
        self.state().is_loading()
    }

    // --- Operations ---

    /// mount
    ///
    /// First-load initialization. A stored session type other than "admin"
    /// (a consumer or agent login, or none at all) settles straight to
    /// `Unauthenticated` without a backend call.
    pub async fn mount(&self) -> FetchOutcome {
        match storage::stored_session_type(self.store.as_ref()) {
            Some(kind) if kind == ADMIN_ROLE => self.fetch_admin(true).await,
            Some(kind) => {
                tracing::debug!(session_type = %kind, "stored session is not an admin session");
                self.reject(AuthError::WrongRole)
            }
            None => self.reject(AuthError::MissingToken),
        }
    }

    /// fetch_admin
    ///
    /// Validates the stored token locally, then exchanges it for the admin
    /// profile under `profile_timeout`. At most one fetch is outstanding; a call
    /// made while one is pending returns `AlreadyInFlight` without touching the
    /// network. With `force == false` an already authenticated session is
    /// answered from memory. If the session is torn down while the backend is
    /// answering, the answer is dropped and `Superseded` is returned.
    pub async fn fetch_admin(&self, force: bool) -> FetchOutcome {
        if !force {
            let state = self.state();
            if let (SessionPhase::Authenticated, Some(admin)) = (state.phase, state.admin) {
                return FetchOutcome::Cached(admin);
            }
        }

        let Some(_in_flight) = InFlightGuard::acquire(&self.in_flight) else {
            tracing::debug!("admin profile fetch already in flight");
            return FetchOutcome::AlreadyInFlight;
        };

        let epoch = self.epoch.load(Ordering::Acquire);
        self.update(|state| state.phase = SessionPhase::Loading);

        let Some(token) = storage::stored_token(self.store.as_ref()) else {
            return self.reject(AuthError::MissingToken);
        };

        if let Err(e) = check_token_freshness(&token, (self.clock)()) {
            return self.reject(e);
        }

        let answer = tokio::time::timeout(
            self.profile_timeout,
            self.backend.fetch_profile(&token),
        )
        .await;

        if self.epoch.load(Ordering::Acquire) != epoch {
            tracing::debug!("session ended during profile fetch, discarding the answer");
            return FetchOutcome::Superseded;
        }

        let profile = match answer {
            Err(_elapsed) => return self.reject(AuthError::Timeout),
            Ok(Err(e)) => return self.reject(e),
            Ok(Ok(profile)) => profile,
        };

        if !profile.is_admin() {
            tracing::warn!(user_id = %profile.id, role = %profile.role, "profile is not an admin");
            return self.reject(AuthError::WrongRole);
        }

        // Re-checked under the state lock, which `end_session` also holds.
        let committed = self.update(|state| {
            if self.epoch.load(Ordering::Acquire) != epoch {
                return false;
            }
            storage::store_profile(self.store.as_ref(), &profile);
            *state = SessionState::authenticated(profile.clone());
            true
        });
        if !committed {
            tracing::debug!("session ended before the profile was stored, discarding it");
            return FetchOutcome::Superseded;
        }
        tracing::info!(admin_id = %profile.id, "admin session established");

        FetchOutcome::Authenticated(profile)
    }

    /// Re-syncs the profile after an edit.
    pub async fn refresh_admin(&self) -> FetchOutcome {
        self.fetch_admin(true).await
    }

    /// logout
    ///
    /// Always succeeds locally. The backend is notified on a detached task so
    /// a slow or failing call cannot hold the logout up.
    pub fn logout(&self) -> Navigation {
        if let Some(token) = storage::stored_token(self.store.as_ref()) {
            self.notify_logout(token);
        }

        self.end_session();
        tracing::info!("admin logged out");

        Navigation {
            to: self.login_path.clone(),
            notice: None,
        }
    }

    /// Sends the best-effort logout call on a detached task. Outside a tokio
    /// runtime there is nothing to spawn on, so the call is skipped.
    fn notify_logout(&self, token: String) {
        let backend = self.backend.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = backend.logout(&token).await {
                        tracing::debug!(error = %e, "logout notification failed, ignoring");
                    }
                });
            }
            Err(_) => tracing::debug!("no runtime available, skipping logout notification"),
        }
    }

    /// Drops the session: storage first, then memory, then the redirect.
    fn reject(&self, error: AuthError) -> FetchOutcome {
        tracing::warn!(error = %error, "admin session rejected");

        self.end_session();

        FetchOutcome::Rejected {
            redirect: Navigation {
                to: self.login_path.clone(),
                notice: error.notice(),
            },
            error,
        }
    }

    /// Invalidates outstanding fetches, clears storage and resets state.
    fn end_session(&self) {
        self.update(|state| {
            self.epoch.fetch_add(1, Ordering::AcqRel);
            self.store.clear();
            *state = SessionState::unauthenticated();
        });
    }

    /// Applies `f` to the session state under the write lock.
    fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        match self.state.write() {
            Ok(mut state) => f(&mut *state),
            Err(poisoned) => f(&mut *poisoned.into_inner()),
        }
    }
}
