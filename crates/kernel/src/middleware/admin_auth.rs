//! Bearer token authentication for the admin API.
//!
//! Tokens are HS256 JWTs issued by the external auth provider. A token is
//! accepted when its signature and expiry check out and its email is on
//! the admin allowlist.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::debug;

use crate::error::AppError;
use crate::state::AppState;

/// Claims read from an auth provider token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminClaims {
    /// Subject (the provider's user id).
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

/// Authenticated admin, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentity {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("invalid token")]
    InvalidToken,
    #[error("token has no email")]
    MissingEmail,
    #[error("not an admin")]
    NotAdmin,
}

/// Verifies admin bearer tokens.
#[derive(Clone)]
pub struct AdminAuth {
    decoding_key: DecodingKey,
    admin_emails: Vec<String>,
}

impl AdminAuth {
    pub fn new(secret: &[u8], admin_emails: Vec<String>) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            admin_emails: admin_emails
                .into_iter()
                .map(|e| e.trim().to_lowercase())
                .collect(),
        }
    }

    /// Verify a token and check the allowlist.
    ///
    /// The audience is not validated; providers disagree on what they put
    /// there.
    pub fn verify(&self, token: &str) -> Result<AdminIdentity, AuthFailure> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;

        let claims = jsonwebtoken::decode::<AdminClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                debug!(error = %e, "invalid admin token");
                AuthFailure::InvalidToken
            })?
            .claims;

        let email = claims
            .email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .ok_or(AuthFailure::MissingEmail)?;

        if !self.is_admin_email(&email) {
            debug!(sub = %claims.sub, "token is valid but not on the admin allowlist");
            return Err(AuthFailure::NotAdmin);
        }

        Ok(AdminIdentity {
            user_id: claims.sub,
            email,
        })
    }

    fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|allowed| bool::from(allowed.as_bytes().ct_eq(email.as_bytes())))
    }
}

impl std::fmt::Debug for AdminAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminAuth")
            .field("admin_emails", &self.admin_emails.len())
            .finish_non_exhaustive()
    }
}

/// Middleware guarding the admin API.
///
/// Missing or invalid tokens get 401, valid tokens for non-admins get 403.
/// Without a configured secret every request is refused as a server
/// misconfiguration.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(auth) = state.admin_auth() else {
        return AppError::ServerMisconfigured(
            "Server misconfigured: AUTH_JWT_SECRET is not set".to_string(),
        )
        .into_response();
    };

    let token = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        return AppError::Unauthorized.into_response();
    };

    match auth.verify(token) {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(AuthFailure::NotAdmin) => AppError::Forbidden.into_response(),
        Err(_) => AppError::Unauthorized.into_response(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};

    const SECRET: &[u8] = b"test-secret";

    fn token(email: Option<&str>, exp_offset: i64, secret: &[u8]) -> String {
        let claims = AdminClaims {
            sub: "user-1".to_string(),
            email: email.map(str::to_string),
            exp: chrono::Utc::now().timestamp() + exp_offset,
        };
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    fn auth() -> AdminAuth {
        AdminAuth::new(SECRET, vec![" Editor@Cadence.app ".to_string()])
    }

    #[test]
    fn allowlisted_email_is_accepted_case_insensitively() {
        let identity = auth()
            .verify(&token(Some("editor@cadence.APP"), 3600, SECRET))
            .unwrap();
        assert_eq!(identity.email, "editor@cadence.app");
        assert_eq!(identity.user_id, "user-1");
    }

    #[test]
    fn rejections() {
        let auth = auth();
        assert_eq!(
            auth.verify(&token(Some("someone@else.com"), 3600, SECRET)),
            Err(AuthFailure::NotAdmin)
        );
        assert_eq!(
            auth.verify(&token(None, 3600, SECRET)),
            Err(AuthFailure::MissingEmail)
        );
        assert_eq!(
            auth.verify(&token(Some("editor@cadence.app"), 3600, b"wrong")),
            Err(AuthFailure::InvalidToken)
        );
        assert_eq!(
            auth.verify(&token(Some("editor@cadence.app"), -3600, SECRET)),
            Err(AuthFailure::InvalidToken)
        );
        assert_eq!(auth.verify("not.a.jwt"), Err(AuthFailure::InvalidToken));
    }
}
