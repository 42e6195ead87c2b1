use estate_admin_gate::{
    AppConfig, AuthError, FetchOutcome, MemorySessionStore, MockBackend, SessionProvider, SessionStore,
    models::{AdminProfile, Notice, SessionPhase},
    storage::{self, PROFILE_KEY, SESSION_TYPE_KEY, TOKEN_KEY},
    token::Claims,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{sync::Arc, time::Duration};

// --- Helper Functions ---

const NOW: i64 = 1_700_000_000;

fn fixed_now() -> i64 {
    NOW
}

fn token(usertype: &str, exp: i64) -> String {
    let claims = Claims {
        usertype: Some(usertype.to_string()),
        exp: Some(exp),
        iat: Some(NOW - 60),
        ..Claims::default()
    };
    let key = EncodingKey::from_secret(b"provider-test-secret");
    encode(&Header::default(), &claims, &key).unwrap()
}

fn profile(role: &str) -> AdminProfile {
    AdminProfile {
        id: "7".to_string(),
        name: "Dana Admin".to_string(),
        email: "dana@example.com".to_string(),
        role: role.to_string(),
        user_type: role.to_string(),
        avatar: None,
    }
}

fn admin_store() -> Arc<MemorySessionStore> {
    Arc::new(MemorySessionStore::with_session(
        &token("admin", NOW + 3600),
        "admin",
    ))
}

fn provider(backend: &Arc<MockBackend>, store: &Arc<MemorySessionStore>) -> SessionProvider {
    SessionProvider::new(backend.clone(), store.clone()).with_clock(fixed_now)
}

fn assert_rejected(outcome: &FetchOutcome, expected: AuthError) {
    match outcome {
        FetchOutcome::Rejected { error, redirect } => {
            assert_eq!(*error, expected);
            assert_eq!(redirect.to, "/admin/login");
        }
        other => panic!("expected rejection with {:?}, got {:?}", expected, other),
    }
}

// --- Tests ---

#[tokio::test]
async fn test_initial_state_is_loading_and_unauthenticated() {
    let backend = Arc::new(MockBackend::with_profile(profile("admin")));
    let provider = provider(&backend, &admin_store());

    let state = provider.state();
    assert_eq!(state.phase, SessionPhase::Uninitialized);
    let snapshot = provider.snapshot();
    assert!(snapshot.loading);
    assert!(!snapshot.is_authenticated);
    assert!(snapshot.admin.is_none());
}

#[tokio::test]
async fn test_mount_with_admin_session_authenticates() {
    let backend = Arc::new(MockBackend::with_profile(profile("admin")));
    let store = admin_store();
    let provider = provider(&backend, &store);

    let outcome = provider.mount().await;

    assert_eq!(outcome, FetchOutcome::Authenticated(profile("admin")));
    assert_eq!(backend.profile_calls(), 1);

    let snapshot = provider.snapshot();
    assert!(snapshot.is_authenticated);
    assert!(!snapshot.loading);
    assert_eq!(snapshot.admin, Some(profile("admin")));

    // Profile is mirrored next to the token.
    assert_eq!(storage::stored_profile(store.as_ref()), Some(profile("admin")));
    assert!(store.get(TOKEN_KEY).is_some());
}

#[tokio::test]
async fn test_mount_with_non_admin_session_type_skips_backend() {
    let backend = Arc::new(MockBackend::with_profile(profile("admin")));
    let store = Arc::new(MemorySessionStore::with_session(
        &token("agent", NOW + 3600),
        "agent",
    ));
    let provider = provider(&backend, &store);

    let outcome = provider.mount().await;

    assert_rejected(&outcome, AuthError::WrongRole);
    assert_eq!(backend.profile_calls(), 0);
    assert_eq!(provider.state().phase, SessionPhase::Unauthenticated);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_mount_without_session_type_skips_backend() {
    let backend = Arc::new(MockBackend::with_profile(profile("admin")));
    let store = Arc::new(MemorySessionStore::new());
    let provider = provider(&backend, &store);

    assert_rejected(&provider.mount().await, AuthError::MissingToken);
    assert_eq!(backend.profile_calls(), 0);
}

#[tokio::test]
async fn test_missing_or_expired_token_fails_before_network() {
    let backend = Arc::new(MockBackend::with_profile(profile("admin")));

    let no_token = Arc::new(MemorySessionStore::new());
    no_token.set(SESSION_TYPE_KEY, "admin".to_string());
    let outcome = provider(&backend, &no_token).fetch_admin(true).await;
    assert_rejected(&outcome, AuthError::MissingToken);

    let expired = Arc::new(MemorySessionStore::with_session(&token("admin", NOW), "admin"));
    let outcome = provider(&backend, &expired).fetch_admin(true).await;
    assert_rejected(&outcome, AuthError::ExpiredToken);
    assert!(expired.is_empty(), "stale token must not survive");

    let malformed = Arc::new(MemorySessionStore::with_session("not-a-token", "admin"));
    let outcome = provider(&backend, &malformed).fetch_admin(true).await;
    assert_rejected(&outcome, AuthError::MalformedToken);

    assert_eq!(backend.profile_calls(), 0);
}

#[tokio::test]
async fn test_backend_401_surfaces_session_expired() {
    let backend = Arc::new(MockBackend::failing(AuthError::ServerRejected(401)));
    let store = admin_store();
    let provider = provider(&backend, &store);

    let outcome = provider.mount().await;

    match &outcome {
        FetchOutcome::Rejected { error, redirect } => {
            assert_eq!(*error, AuthError::ServerRejected(401));
            assert_eq!(redirect.to, "/admin/login");
            assert_eq!(redirect.notice, Some(Notice::SessionExpired));
            assert_eq!(
                redirect.notice.unwrap().message(),
                "Session expired. Please log in again."
            );
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert!(!provider.is_authenticated());
    assert!(!provider.is_loading());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_backend_403_surfaces_access_denied() {
    let backend = Arc::new(MockBackend::failing(AuthError::ServerRejected(403)));
    let provider = provider(&backend, &admin_store());

    let outcome = provider.fetch_admin(true).await;
    assert_eq!(
        outcome.redirect().and_then(|nav| nav.notice),
        Some(Notice::AccessDenied)
    );
    assert_eq!(provider.state().phase, SessionPhase::Unauthenticated);
}

#[tokio::test]
async fn test_network_failure_redirects_without_notice() {
    let backend = Arc::new(MockBackend::failing(AuthError::NetworkFailure(
        "connection refused".to_string(),
    )));
    let store = admin_store();
    let provider = provider(&backend, &store);

    let outcome = provider.fetch_admin(true).await;
    assert_eq!(outcome.redirect().unwrap().notice, None);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_non_admin_profile_is_rejected() {
    let backend = Arc::new(MockBackend::with_profile(profile("agent")));
    let store = admin_store();
    let provider = provider(&backend, &store);

    assert_rejected(&provider.fetch_admin(true).await, AuthError::WrongRole);
    assert!(store.get(PROFILE_KEY).is_none());
    assert!(provider.admin().is_none());
}

#[tokio::test]
async fn test_profile_fetch_times_out() {
    let backend = Arc::new(
        MockBackend::with_profile(profile("admin")).delayed(Duration::from_secs(5)),
    );
    let store = admin_store();
    let provider = provider(&backend, &store).with_profile_timeout(Duration::from_millis(50));

    let outcome = provider.fetch_admin(true).await;

    assert_rejected(&outcome, AuthError::Timeout);
    assert_eq!(provider.state().phase, SessionPhase::Unauthenticated);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_concurrent_fetches_collapse_into_one_call() {
    let backend = Arc::new(
        MockBackend::with_profile(profile("admin")).delayed(Duration::from_millis(100)),
    );
    let provider = provider(&backend, &admin_store());

    let (first, second, third) = tokio::join!(
        provider.fetch_admin(true),
        provider.fetch_admin(true),
        provider.refresh_admin(),
    );

    assert_eq!(backend.profile_calls(), 1);
    assert_eq!(first, FetchOutcome::Authenticated(profile("admin")));
    assert_eq!(second, FetchOutcome::AlreadyInFlight);
    assert_eq!(third, FetchOutcome::AlreadyInFlight);
    assert!(provider.is_authenticated());
}

#[tokio::test]
async fn test_in_flight_flag_is_released_after_failure() {
    let backend = Arc::new(MockBackend::failing(AuthError::Timeout));
    let backend_ok = Arc::new(MockBackend::with_profile(profile("admin")));

    let store = admin_store();
    let failing = provider(&backend, &store);
    failing.fetch_admin(true).await;
    // Storage was cleared; reseed and retry on the same provider.
    store.set(TOKEN_KEY, token("admin", NOW + 3600));
    failing.fetch_admin(true).await;
    assert_eq!(backend.profile_calls(), 2);

    let ok = provider(&backend_ok, &admin_store());
    ok.fetch_admin(true).await;
    ok.fetch_admin(true).await;
    assert_eq!(backend_ok.profile_calls(), 2);
}

#[tokio::test]
async fn test_unforced_fetch_uses_cached_profile() {
    let backend = Arc::new(MockBackend::with_profile(profile("admin")));
    let provider = provider(&backend, &admin_store());

    provider.mount().await;
    let cached = provider.fetch_admin(false).await;

    assert_eq!(cached, FetchOutcome::Cached(profile("admin")));
    assert_eq!(backend.profile_calls(), 1);

    // refresh_admin always goes to the backend.
    provider.refresh_admin().await;
    assert_eq!(backend.profile_calls(), 2);
}

#[tokio::test]
async fn test_logout_clears_session_and_notifies_backend() {
    let backend = Arc::new(MockBackend::with_profile(profile("admin")));
    let store = admin_store();
    let provider = provider(&backend, &store);
    provider.mount().await;

    let navigation = provider.logout();

    assert_eq!(navigation.to, "/admin/login");
    assert_eq!(navigation.notice, None);
    assert!(store.is_empty());
    assert_eq!(provider.state().phase, SessionPhase::Unauthenticated);
    assert!(provider.admin().is_none());

    // The notification runs on a detached task.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(backend.logout_calls(), 1);
}

#[tokio::test]
async fn test_logout_succeeds_when_backend_fails() {
    let backend = Arc::new(
        MockBackend::with_profile(profile("admin"))
            .failing_logout(AuthError::NetworkFailure("502".to_string())),
    );
    let store = admin_store();
    let provider = provider(&backend, &store);
    provider.mount().await;

    provider.logout();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(backend.logout_calls(), 1);
    assert!(store.is_empty());
    assert!(!provider.is_authenticated());
}

#[tokio::test]
async fn test_logout_does_not_wait_for_hanging_backend() {
    let backend = Arc::new(MockBackend::with_profile(profile("admin")).hanging_logout());
    let store = admin_store();
    let provider = provider(&backend, &store);
    provider.mount().await;

    let navigation = tokio::time::timeout(Duration::from_secs(1), async { provider.logout() })
        .await
        .expect("logout must not block on the backend");

    assert_eq!(navigation.to, "/admin/login");
    assert!(store.is_empty());
    assert_eq!(provider.state().phase, SessionPhase::Unauthenticated);
}

#[test]
fn test_logout_outside_runtime_still_clears_locally() {
    let backend = Arc::new(MockBackend::with_profile(profile("admin")));
    let store = admin_store();
    let provider = provider(&backend, &store);

    provider.logout();

    assert!(store.is_empty());
    assert_eq!(provider.state().phase, SessionPhase::Unauthenticated);
    assert_eq!(backend.logout_calls(), 0);
}

#[tokio::test]
async fn test_logout_during_fetch_discards_the_late_profile() {
    let backend = Arc::new(
        MockBackend::with_profile(profile("admin")).delayed(Duration::from_millis(100)),
    );
    let store = admin_store();
    let provider = provider(&backend, &store);

    let (outcome, navigation) = tokio::join!(provider.fetch_admin(true), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        provider.logout()
    });

    assert_eq!(outcome, FetchOutcome::Superseded);
    assert_eq!(navigation.to, "/admin/login");
    assert_eq!(backend.profile_calls(), 1);
    assert_eq!(provider.state().phase, SessionPhase::Unauthenticated);
    assert!(provider.admin().is_none());
    assert!(store.is_empty());
    assert_eq!(storage::stored_profile(store.as_ref()), None);

    // A new login on the same provider starts from a clean slate.
    store.set(TOKEN_KEY, token("admin", NOW + 3600));
    store.set(SESSION_TYPE_KEY, "admin".to_string());
    let outcome = provider.mount().await;
    assert_eq!(outcome, FetchOutcome::Authenticated(profile("admin")));
    assert!(provider.is_authenticated());
}

#[tokio::test]
async fn test_custom_login_path_is_used_for_redirects() {
    let backend = Arc::new(MockBackend::failing(AuthError::ServerRejected(401)));
    let provider = SessionProvider::new(backend, admin_store())
        .with_clock(fixed_now)
        .with_login_path("/backoffice/login");

    let outcome = provider.fetch_admin(true).await;
    assert_eq!(outcome.redirect().unwrap().to, "/backoffice/login");
}

#[tokio::test]
async fn test_provider_from_config_uses_configured_timeout() {
    let config = AppConfig {
        login_path: "/staff/login".to_string(),
        profile_timeout: Duration::from_millis(30),
        ..AppConfig::default()
    };
    let backend = Arc::new(
        MockBackend::with_profile(profile("admin")).delayed(Duration::from_secs(5)),
    );
    let provider = SessionProvider::from_config(&config, backend, admin_store()).with_clock(fixed_now);

    let outcome = provider.fetch_admin(true).await;

    assert_rejected_to(&outcome, AuthError::Timeout, "/staff/login");
}

fn assert_rejected_to(outcome: &FetchOutcome, expected: AuthError, login: &str) {
    match outcome {
        FetchOutcome::Rejected { error, redirect } => {
            assert_eq!(*error, expected);
            assert_eq!(redirect.to, login);
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}
