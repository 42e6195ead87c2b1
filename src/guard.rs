use crate::{
    gate::{login_location, normalize},
    models::SessionState,
};

/// GuardView
///
/// What a protected admin screen should render right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardView {
    /// Server-rendered pass: render nothing until hydration.
    Blank,
    /// Blocking spinner overlay while the session settles.
    Spinner,
    /// Full-page redirect in progress; show a placeholder, never the children.
    Redirecting { location: String },
    /// Release the protected content.
    Children,
}

/// RouteGuard
///
/// Component-level gate consulted by every admin screen. Stateless: the view is
/// a function of the path, whether the client has hydrated, and the provider's
/// current state.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    login_path: String,
    public_paths: Vec<String>,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(
            "/admin/login",
            &["/admin/login", "/admin/forgot-password", "/admin/register"],
        )
    }
}

impl RouteGuard {
    pub fn new(login_path: &str, public_paths: &[&str]) -> Self {
        Self {
            login_path: login_path.to_string(),
            public_paths: public_paths.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn is_public(&self, path: &str) -> bool {
        let path = normalize(path.split('?').next().unwrap_or(path));
        self.public_paths.iter().any(|p| normalize(p) == path)
    }

    /// view
    ///
    /// Order matters: hydration first, then public paths (rendered whatever the
    /// session says), then loading, then the redirect.
    pub fn view(&self, path: &str, hydrated: bool, session: &SessionState) -> GuardView {
        if !hydrated {
            return GuardView::Blank;
        }
        if self.is_public(path) {
            return GuardView::Children;
        }
        if session.is_loading() {
            return GuardView::Spinner;
        }
        if !session.is_authenticated() {
            return GuardView::Redirecting {
                location: login_location(&self.login_path, Some(path)),
            };
        }
        GuardView::Children
    }
}
