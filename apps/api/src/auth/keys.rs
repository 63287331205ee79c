use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey};
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::auth::AuthError;

/// Cached JWKS documents are refetched after this long.
const JWKS_TTL: Duration = Duration::from_secs(60 * 60);
/// Unknown key ids never trigger more than one refetch per interval.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct VerificationKey {
    pub key: DecodingKey,
    pub algorithm: Algorithm,
}

/// Source of token verification keys. Carried in `ClerkVerifier` as
/// `Arc<dyn KeyProvider>` so tests can sign with a shared secret.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn key_for(&self, kid: Option<&str>) -> Result<VerificationKey, AuthError>;
}

/// A single fixed key; the token's `kid` is ignored.
pub struct StaticKeyProvider {
    key: VerificationKey,
}

impl StaticKeyProvider {
    /// Clerk's "JWT public key" (PEM), verified as RS256.
    pub fn from_rsa_pem(pem: &str) -> Result<Self, AuthError> {
        Ok(Self {
            key: VerificationKey {
                key: DecodingKey::from_rsa_pem(pem.as_bytes())?,
                algorithm: Algorithm::RS256,
            },
        })
    }

    #[cfg(test)]
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            key: VerificationKey {
                key: DecodingKey::from_secret(secret),
                algorithm: Algorithm::HS256,
            },
        }
    }
}

#[async_trait]
impl KeyProvider for StaticKeyProvider {
    async fn key_for(&self, _kid: Option<&str>) -> Result<VerificationKey, AuthError> {
        Ok(self.key.clone())
    }
}

/// The algorithm a JWK declares, RS256 when it declares none (Clerk's default).
fn signing_algorithm(jwk: &Jwk) -> Algorithm {
    match jwk.common.key_algorithm {
        Some(KeyAlgorithm::RS384) => Algorithm::RS384,
        Some(KeyAlgorithm::RS512) => Algorithm::RS512,
        Some(KeyAlgorithm::PS256) => Algorithm::PS256,
        Some(KeyAlgorithm::PS384) => Algorithm::PS384,
        Some(KeyAlgorithm::PS512) => Algorithm::PS512,
        Some(KeyAlgorithm::ES256) => Algorithm::ES256,
        Some(KeyAlgorithm::ES384) => Algorithm::ES384,
        Some(KeyAlgorithm::EdDSA) => Algorithm::EdDSA,
        _ => Algorithm::RS256,
    }
}

struct CachedJwks {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Keys fetched from Clerk's JWKS endpoint, cached between requests.
pub struct JwksKeyProvider {
    client: Client,
    url: String,
    cache: RwLock<Option<CachedJwks>>,
}

impl JwksKeyProvider {
    pub fn new(url: String) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(10)).build()?,
            url,
            cache: RwLock::new(None),
        })
    }

    async fn cached_key(&self, kid: &str) -> Option<VerificationKey> {
        let guard = self.cache.read().await;
        let cached = guard.as_ref()?;
        if cached.fetched_at.elapsed() > JWKS_TTL {
            return None;
        }
        let jwk = cached.keys.find(kid)?;
        match DecodingKey::from_jwk(jwk) {
            Ok(key) => Some(VerificationKey {
                key,
                algorithm: signing_algorithm(jwk),
            }),
            Err(e) => {
                warn!("Unusable JWK '{kid}': {e}");
                None
            }
        }
    }

    async fn refresh(&self) -> Result<(), AuthError> {
        let mut guard = self.cache.write().await;
        if let Some(cached) = guard.as_ref() {
            if cached.fetched_at.elapsed() < MIN_REFRESH_INTERVAL {
                return Ok(());
            }
        }

        let keys: JwkSet = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info!("Fetched {} signing keys from {}", keys.keys.len(), self.url);
        *guard = Some(CachedJwks {
            keys,
            fetched_at: Instant::now(),
        });
        Ok(())
    }
}

#[async_trait]
impl KeyProvider for JwksKeyProvider {
    async fn key_for(&self, kid: Option<&str>) -> Result<VerificationKey, AuthError> {
        let kid = kid.ok_or(AuthError::MissingKeyId)?;
        if let Some(key) = self.cached_key(kid).await {
            return Ok(key);
        }
        self.refresh().await?;
        self.cached_key(kid)
            .await
            .ok_or_else(|| AuthError::UnknownKey(kid.to_string()))
    }
}
