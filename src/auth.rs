//! Bearer token authentication.
//!
//! Access tokens are HS256 JWTs issued by the identity provider. This module
//! only verifies them: signature (constant-time, via `ring::hmac`), expiry,
//! and the presence of `sub` and `email`. The caller's role is resolved
//! locally from the bootstrap superadmin list and the `admins` table.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::hmac;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::response::ApiError;
use crate::storage::models::Role;
use crate::AppState;

#[derive(Debug, Error, PartialEq)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,
    #[error("Malformed token")]
    Malformed,
    #[error("Unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("Invalid token signature")]
    BadSignature,
    #[error("Token expired")]
    Expired,
    #[error("Token is missing the {0} claim")]
    MissingClaim(&'static str),
}

#[derive(Debug, Deserialize)]
struct Header {
    alg: String,
}

/// Claims this service reads from an access token. Other claims are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: i64,
}

/// Verifies HS256 tokens against the shared secret.
pub struct TokenVerifier {
    key: hmac::Key,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes()),
        }
    }

    /// Verify a compact JWT and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(sig_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::Malformed);
        };

        let header: Header = decode_segment(header_b64)?;
        if header.alg != "HS256" {
            return Err(AuthError::UnsupportedAlgorithm(header.alg));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| AuthError::Malformed)?;
        let signed = &token[..header_b64.len() + 1 + payload_b64.len()];
        hmac::verify(&self.key, signed.as_bytes(), &signature)
            .map_err(|_| AuthError::BadSignature)?;

        let claims: Claims = decode_segment(payload_b64)?;
        if claims.exp <= chrono::Utc::now().timestamp() {
            return Err(AuthError::Expired);
        }
        if claims.sub.as_deref().is_none_or(str::is_empty) {
            return Err(AuthError::MissingClaim("sub"));
        }
        if claims.email.as_deref().is_none_or(str::is_empty) {
            return Err(AuthError::MissingClaim("email"));
        }

        Ok(claims)
    }

    /// Sign claims into a compact HS256 JWT. Used by local tooling and tests.
    pub fn sign(&self, claims: &Claims) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap_or_default());
        let unsigned = format!("{header}.{payload}");
        let tag = hmac::sign(&self.key, unsigned.as_bytes());
        format!("{unsigned}.{}", URL_SAFE_NO_PAD.encode(tag.as_ref()))
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::Malformed)
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::unauthorized(e.to_string())
    }
}

// ============================================================================
// Extractors
// ============================================================================

/// Any caller holding a valid access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    /// Lower-cased
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role >= Role::Admin
    }
}

/// Resolve the caller's role. Bootstrap superadmins win over the admins table.
pub fn resolve_role(state: &AppState, email: &str) -> Result<Role, ApiError> {
    if state.config.is_bootstrap_superadmin(email) {
        return Ok(Role::Superadmin);
    }
    let admin = state
        .db
        .get_admin(email)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(admin.map(|a| a.role).unwrap_or(Role::Student))
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, ApiError> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = state.verifier.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "Rejected access token");
            e
        })?;

        let email = claims.email.unwrap_or_default().to_lowercase();
        let role = resolve_role(state, &email)?;

        Ok(AuthUser {
            user_id: claims.sub.unwrap_or_default(),
            email,
            role,
        })
    }
}

/// Caller with the admin or superadmin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, ApiError> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::forbidden("Admin access required"));
        }
        Ok(AdminUser(user))
    }
}

/// Caller with the superadmin role.
#[derive(Debug, Clone)]
pub struct SuperadminUser(pub AuthUser);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for SuperadminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, ApiError> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Superadmin {
            return Err(ApiError::forbidden("Superadmin access required"));
        }
        Ok(SuperadminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(exp_offset: i64) -> Claims {
        Claims {
            sub: Some("user-1".to_string()),
            email: Some("Student@PEC.edu".to_string()),
            exp: chrono::Utc::now().timestamp() + exp_offset,
        }
    }

    #[test]
    fn test_sign_then_verify() {
        let verifier = TokenVerifier::new("secret");
        let token = verifier.sign(&claims(3600));
        let verified = verifier.verify(&token).unwrap();
        assert_eq!(verified.sub.as_deref(), Some("user-1"));
        assert_eq!(verified.email.as_deref(), Some("Student@PEC.edu"));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = TokenVerifier::new("secret").sign(&claims(3600));
        assert_eq!(
            TokenVerifier::new("other").verify(&token).unwrap_err(),
            AuthError::BadSignature
        );
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let verifier = TokenVerifier::new("secret");
        let token = verifier.sign(&claims(-10));
        assert_eq!(verifier.verify(&token).unwrap_err(), AuthError::Expired);
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let verifier = TokenVerifier::new("secret");
        let token = verifier.sign(&claims(3600));
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&Claims {
                email: Some("root@pec.edu".to_string()),
                ..claims(3600)
            })
            .unwrap(),
        );
        parts[1] = &forged;
        assert_eq!(
            verifier.verify(&parts.join(".")).unwrap_err(),
            AuthError::BadSignature
        );
    }

    #[test]
    fn test_malformed_and_unsupported_tokens() {
        let verifier = TokenVerifier::new("secret");
        assert_eq!(verifier.verify("abc").unwrap_err(), AuthError::Malformed);
        assert_eq!(verifier.verify("a.b.c.d").unwrap_err(), AuthError::Malformed);

        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(b"{}");
        assert_eq!(
            verifier
                .verify(&format!("{header}.{payload}."))
                .unwrap_err(),
            AuthError::UnsupportedAlgorithm("none".to_string())
        );
    }

    #[test]
    fn test_missing_email_claim() {
        let verifier = TokenVerifier::new("secret");
        let token = verifier.sign(&Claims {
            email: None,
            ..claims(3600)
        });
        assert_eq!(
            verifier.verify(&token).unwrap_err(),
            AuthError::MissingClaim("email")
        );
    }
}
