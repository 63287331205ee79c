//! Identity resolution for Clerk-issued session tokens.
//!
//! Every `/api/v1` route except the Stripe webhook takes a `CurrentIdentity`
//! extractor, which verifies the bearer JWT through the `ClerkVerifier` held in
//! `AppState`. Key material is pluggable through `KeyProvider`.

pub mod extractor;
pub mod keys;

use std::sync::Arc;

use jsonwebtoken::{decode, decode_header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::errors::AppError;

pub use extractor::CurrentIdentity;
pub use keys::{JwksKeyProvider, KeyProvider, StaticKeyProvider};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Token header has no key id")]
    MissingKeyId,

    #[error("No verification key with id '{0}'")]
    UnknownKey(String),

    #[error("Failed to fetch signing keys: {0}")]
    KeyFetch(#[from] reqwest::Error),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::KeyFetch(e) => AppError::Internal(anyhow::anyhow!("JWKS fetch failed: {e}")),
            other => {
                debug!("Rejected session token: {other}");
                AppError::Unauthorized
            }
        }
    }
}

/// Claims carried by a Clerk session token. `email` and `name` are only
/// present when the JWT template includes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// A verified caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub clerk_id: String,
    pub email: String,
    pub name: String,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            clerk_id: claims.sub,
            email: claims.email.unwrap_or_default(),
            name: claims.name.unwrap_or_default(),
        }
    }
}

#[derive(Clone)]
pub struct ClerkVerifier {
    keys: Arc<dyn KeyProvider>,
    issuer: Option<String>,
    audience: Option<String>,
}

impl ClerkVerifier {
    pub fn new(
        keys: Arc<dyn KeyProvider>,
        issuer: Option<String>,
        audience: Option<String>,
    ) -> Self {
        Self {
            keys,
            issuer,
            audience,
        }
    }

    /// Checks signature, expiry and (when configured) issuer and audience.
    pub async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let header = decode_header(token)?;
        let key = self.keys.key_for(header.kid.as_deref()).await?;

        let mut validation = Validation::new(key.algorithm);
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let data = decode::<Claims>(token, &key.key, &validation)?;
        Ok(Identity::from(data.claims))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_valid_token_resolves_identity() {
        let token = sign(&claims_for("user_123"), TEST_SECRET);
        let identity = verifier().verify(&token).await.unwrap();
        assert_eq!(identity.clerk_id, "user_123");
        assert_eq!(identity.email, "user_123@example.com");
        assert_eq!(identity.name, "Test User");
    }

    #[tokio::test]
    async fn test_missing_profile_claims_default_to_empty() {
        let mut claims = claims_for("user_456");
        claims.email = None;
        claims.name = None;
        let token = sign(&claims, TEST_SECRET);
        let identity = verifier().verify(&token).await.unwrap();
        assert_eq!(identity.email, "");
        assert_eq!(identity.name, "");
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let mut claims = claims_for("user_123");
        claims.exp = (chrono::Utc::now().timestamp() - 3600) as usize;
        let token = sign(&claims, TEST_SECRET);
        assert!(verifier().verify(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_wrong_key_rejected() {
        let token = sign(&claims_for("user_123"), b"someone-else");
        assert!(verifier().verify(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_wrong_issuer_rejected() {
        let mut claims = claims_for("user_123");
        claims.iss = Some("https://evil.example".to_string());
        let token = sign(&claims, TEST_SECRET);
        assert!(verifier().verify(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_garbage_token_rejected() {
        let err = verifier().verify("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn test_auth_errors_map_to_unauthorized() {
        let app: AppError = AuthError::MissingKeyId.into();
        assert!(matches!(app, AppError::Unauthorized));
    }
}
