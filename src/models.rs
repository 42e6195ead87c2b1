use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::error::AuthError;

// --- Session Data (exported to the TypeScript front-end) ---

/// AdminProfile
///
/// The authenticated admin as the rest of the admin screens see it. Produced by
/// exchanging the session token with the backend; lives in memory for the
/// provider's lifetime and is mirrored into session storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AdminProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    // Normalized role, always lowercase.
    pub role: String,
    // The raw `usertype` value as the backend sent it.
    pub user_type: String,
    pub avatar: Option<String>,
}

impl AdminProfile {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// SessionSnapshot
///
/// Read-only view handed to screens. Mirrors the `{admin, isAuthenticated,
/// loading}` triple the admin screens destructure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SessionSnapshot {
    pub admin: Option<AdminProfile>,
    pub is_authenticated: bool,
    pub loading: bool,
}

/// Notice
///
/// Toast surfaced alongside a redirect when the backend explicitly rejected
/// the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Notice {
    SessionExpired,
    AccessDenied,
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Notice::SessionExpired => "Session expired. Please log in again.",
            Notice::AccessDenied => "Access denied. Admin privileges required.",
        }
    }
}

// --- Session State Machine ---

/// SessionPhase
///
/// `Uninitialized -> Loading -> {Authenticated, Unauthenticated}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Uninitialized,
    Loading,
    Authenticated,
    Unauthenticated,
}

/// SessionState
///
/// In-memory record of the current admin identity, owned by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub admin: Option<AdminProfile>,
    pub phase: SessionPhase,
}

impl SessionState {
    pub fn authenticated(admin: AdminProfile) -> Self {
        Self {
            admin: Some(admin),
            phase: SessionPhase::Authenticated,
        }
    }

    pub fn unauthenticated() -> Self {
        Self {
            admin: None,
            phase: SessionPhase::Unauthenticated,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase == SessionPhase::Authenticated && self.admin.is_some()
    }

    /// Nothing has settled yet. `Uninitialized` counts as loading so a guard
    /// consulted before mount never releases protected content.
    pub fn is_loading(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Uninitialized | SessionPhase::Loading
        )
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            admin: self.admin.clone(),
            is_authenticated: self.is_authenticated(),
            loading: self.is_loading(),
        }
    }
}

// --- Backend Wire Format ---

/// ProfileEnvelope
///
/// Response body of `GET /api/v1/users/profile`.
#[derive(Debug, Deserialize)]
pub struct ProfileEnvelope {
    #[serde(default)]
    pub success: bool,
    pub user: Option<ProfileUser>,
}

/// ProfileUser
///
/// The `user` object inside the profile response. Older backend builds send
/// `name` instead of `full_name`, and ids arrive as either numbers or strings.
#[derive(Debug, Deserialize)]
pub struct ProfileUser {
    #[serde(default)]
    pub id: Value,
    pub full_name: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub usertype: Option<String>,
    pub image_icon: Option<String>,
}

impl ProfileEnvelope {
    /// into_profile
    ///
    /// Validates the envelope and normalizes it into an `AdminProfile`. The
    /// role check itself is left to the caller.
    pub fn into_profile(self) -> Result<AdminProfile, AuthError> {
        if !self.success {
            return Err(AuthError::MalformedProfile(
                "response did not report success".to_string(),
            ));
        }
        let user = self
            .user
            .ok_or_else(|| AuthError::MalformedProfile("missing user object".to_string()))?;

        let id = match &user.id {
            Value::String(s) if !s.is_empty() => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => {
                return Err(AuthError::MalformedProfile(
                    "user id is missing or not a scalar".to_string(),
                ));
            }
        };

        let user_type = user
            .usertype
            .ok_or_else(|| AuthError::MalformedProfile("missing usertype".to_string()))?;

        Ok(AdminProfile {
            id,
            name: user.full_name.or(user.name).unwrap_or_default(),
            email: user.email.unwrap_or_default(),
            role: user_type.trim().to_lowercase(),
            user_type,
            avatar: user.image_icon.filter(|icon| !icon.is_empty()),
        })
    }
}
