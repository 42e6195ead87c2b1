use base64::{
    Engine,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::AuthError;

/// Payload decoder. Browsers and backends disagree on padding, so both padded
/// and unpadded segments are accepted.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Role value that grants access to the admin section.
pub const ADMIN_ROLE: &str = "admin";

/// Claims
///
/// The fields of the admin session token the gate cares about. Nothing here is
/// trusted for authorization on the server; the backend re-checks every call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Claims {
    /// Subject as the login endpoint issues it (`id`), numeric or string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Standard JWT subject, present on tokens from newer issuers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<Value>,
    /// Role claim, current field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usertype: Option<String>,
    /// Role claim, legacy camelCase field name.
    #[serde(
        default,
        rename = "userType",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_type: Option<String>,
    /// Expiration (epoch seconds).
    #[serde(
        default,
        deserialize_with = "epoch_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub exp: Option<i64>,
    /// Issued at (epoch seconds).
    #[serde(
        default,
        deserialize_with = "epoch_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub iat: Option<i64>,
}

impl Claims {
    /// The role claim, read from `usertype` first and `userType` second. A
    /// blank value counts as absent.
    pub fn role(&self) -> Option<&str> {
        let present = |role: &&str| !role.trim().is_empty();
        self.usertype
            .as_deref()
            .filter(present)
            .or_else(|| self.user_type.as_deref().filter(present))
    }

    pub fn is_admin(&self) -> bool {
        self.role()
            .is_some_and(|role| role.trim().eq_ignore_ascii_case(ADMIN_ROLE))
    }

    /// A token without `exp` never expires locally.
    pub fn is_expired(&self, now: i64) -> bool {
        self.exp.is_some_and(|exp| exp <= now)
    }
}

/// Accepts integer or fractional epoch seconds; fractions are truncated.
fn epoch_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.map(|secs| secs.trunc() as i64))
}

/// decode_claims
///
/// Splits the token, base64-decodes the middle segment and parses it as a JSON
/// object. No signature check happens here.
pub fn decode_claims(token: &str) -> Result<Claims, AuthError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 || segments[1].is_empty() {
        return Err(AuthError::MalformedToken);
    }

    // Tolerate the standard alphabet as well as the url-safe one.
    let payload: String = segments[1]
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();

    let bytes = PAYLOAD_ENGINE
        .decode(payload.as_bytes())
        .map_err(|_| AuthError::MalformedToken)?;

    let value: Value = serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedToken)?;
    if !value.is_object() {
        return Err(AuthError::MalformedToken);
    }

    serde_json::from_value(value).map_err(|_| AuthError::MalformedToken)
}

/// check_token_freshness
///
/// Client-side re-validation before spending a round trip: shape and expiry
/// only. The role is left to the backend's answer.
pub fn check_token_freshness(token: &str, now: i64) -> Result<Claims, AuthError> {
    let claims = decode_claims(token)?;
    if claims.is_expired(now) {
        return Err(AuthError::ExpiredToken);
    }
    Ok(claims)
}

/// TokenVerifier
///
/// Shape-and-claims inspection of admin tokens, with optional HS256 signature
/// verification when a shared secret is configured.
#[derive(Clone, Default)]
pub struct TokenVerifier {
    key: Option<DecodingKey>,
}

impl TokenVerifier {
    /// Decode-only inspection; signatures are not checked.
    pub fn decode_only() -> Self {
        Self { key: None }
    }

    pub fn with_secret(secret: &str) -> Self {
        Self {
            key: Some(DecodingKey::from_secret(secret.as_bytes())),
        }
    }

    pub fn verifies_signatures(&self) -> bool {
        self.key.is_some()
    }

    /// claims
    ///
    /// Decodes the claims and, if a key is configured, verifies the signature.
    /// Expiry is left out of the `jsonwebtoken` validation so that
    /// both modes share the same `exp` semantics (optional, `<=` means expired).
    pub fn claims(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = decode_claims(token)?;

        if let Some(key) = &self.key {
            let mut validation = Validation::new(Algorithm::HS256);
            validation.validate_exp = false;
            validation.validate_aud = false;
            validation.required_spec_claims.clear();

            decode::<Value>(token, key, &validation).map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                ErrorKind::InvalidAlgorithm => AuthError::InvalidSignature,
                _ => AuthError::MalformedToken,
            })?;
        }

        Ok(claims)
    }

    /// inspect_admin
    ///
    /// Full edge check: shape, signature (if enabled), expiry, then role.
    /// Expiry is evaluated before role so an expired token is rejected as
    /// expired whatever role it claims.
    pub fn inspect_admin(&self, token: &str, now: i64) -> Result<Claims, AuthError> {
        let claims = self.claims(token)?;

        if claims.is_expired(now) {
            return Err(AuthError::ExpiredToken);
        }
        if !claims.is_admin() {
            return Err(AuthError::WrongRole);
        }

        Ok(claims)
    }
}

/// Decode-only admin inspection.
pub fn inspect_admin_token(token: &str, now: i64) -> Result<Claims, AuthError> {
    TokenVerifier::decode_only().inspect_admin(token, now)
}

/// Current time in epoch seconds.
pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}
