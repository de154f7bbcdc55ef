//! Provider JWKS fetching and caching.
//!
//! ID tokens are verified with keys published at the provider's JWKS
//! endpoint. [`JwksCache`] keeps one key set per endpoint:
//!
//! - TTL follows `Cache-Control: max-age`, clamped to `[min_ttl, max_ttl]`
//! - a `kid` that is not in the cached set triggers one refresh
//! - only HTTPS endpoints are fetched unless `allow_http` is set
//! - bodies larger than `max_response_size` are rejected

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{Jwk, JwkSet, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::RwLock;
use url::Url;

/// Configuration for the JWKS cache.
#[derive(Debug, Clone)]
pub struct JwksCacheConfig {
    /// TTL when the response has no usable Cache-Control (default: 1 hour).
    pub default_ttl: Duration,

    /// Upper TTL bound (default: 24 hours).
    pub max_ttl: Duration,

    /// Lower TTL bound (default: 5 minutes).
    pub min_ttl: Duration,

    /// Maximum response size in bytes (default: 1 MB).
    pub max_response_size: usize,

    /// Allow plain HTTP JWKS URIs. Testing only.
    pub allow_http: bool,
}

impl Default for JwksCacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
            max_ttl: Duration::from_secs(86400),
            min_ttl: Duration::from_secs(300),
            max_response_size: 1024 * 1024,
            allow_http: false,
        }
    }
}

impl JwksCacheConfig {
    /// Sets the default TTL.
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Sets the TTL bounds.
    #[must_use]
    pub fn with_ttl_bounds(mut self, min: Duration, max: Duration) -> Self {
        self.min_ttl = min;
        self.max_ttl = max;
        self
    }

    /// Sets the maximum response size.
    #[must_use]
    pub fn with_max_response_size(mut self, size: usize) -> Self {
        self.max_response_size = size;
        self
    }

    /// Allows HTTP (non-HTTPS) JWKS URIs.
    #[must_use]
    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }
}

/// Errors that can occur during JWKS operations.
#[derive(Debug, thiserror::Error)]
pub enum JwksError {
    /// A network error occurred while fetching the JWKS.
    #[error("Network error: {0}")]
    Network(String),

    /// The endpoint returned a non-success status code.
    #[error("HTTP error: status {0}")]
    Http(u16),

    /// The response is not a JWK set.
    #[error("Failed to parse JWKS: {0}")]
    Parse(String),

    /// No key with the requested `kid` exists, even after a refresh.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// The key set holds no signing keys.
    #[error("No signing keys found in JWKS")]
    NoSigningKeys,

    /// The key could not be converted to a decoding key.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The JWKS URI scheme is not allowed.
    #[error("Invalid URL scheme: only HTTPS is allowed")]
    InvalidScheme,

    /// The response exceeded the maximum allowed size.
    #[error("Response exceeds maximum size of {max_size} bytes")]
    ResponseTooLarge {
        /// The maximum allowed size.
        max_size: usize,
    },
}

struct CachedJwks {
    jwks: JwkSet,
    expires_at: Instant,
}

impl CachedJwks {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// In-memory cache of provider key sets, keyed by JWKS URI.
pub struct JwksCache {
    http_client: reqwest::Client,
    cache: RwLock<HashMap<String, CachedJwks>>,
    config: JwksCacheConfig,
}

impl JwksCache {
    /// Creates a cache that fetches with `http_client`.
    ///
    /// The client's own timeout applies to JWKS requests.
    #[must_use]
    pub fn new(http_client: reqwest::Client, config: JwksCacheConfig) -> Self {
        Self {
            http_client,
            cache: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Returns the decoding key for `kid`, refreshing once on a miss.
    ///
    /// # Errors
    ///
    /// Returns `KeyNotFound` if the refreshed set still lacks `kid`, or the
    /// fetch error if the refresh fails.
    pub async fn get_key(
        &self,
        jwks_uri: &Url,
        kid: &str,
    ) -> Result<(DecodingKey, Option<Algorithm>), JwksError> {
        if let Some(found) = self.cached_key(jwks_uri, kid).await {
            tracing::trace!(%jwks_uri, kid, "JWKS cache hit");
            return found;
        }

        tracing::debug!(%jwks_uri, kid, "JWKS cache miss");
        self.refresh(jwks_uri).await?;

        self.cached_key(jwks_uri, kid)
            .await
            .unwrap_or_else(|| Err(JwksError::KeyNotFound(kid.to_string())))
    }

    async fn cached_key(
        &self,
        jwks_uri: &Url,
        kid: &str,
    ) -> Option<Result<(DecodingKey, Option<Algorithm>), JwksError>> {
        let cache = self.cache.read().await;
        let cached = cache.get(&cache_key(jwks_uri)).filter(|c| c.is_fresh())?;
        let jwk = cached
            .jwks
            .keys
            .iter()
            .find(|k| k.common.key_id.as_deref() == Some(kid))?;
        Some(decoding_key(jwk))
    }

    /// Returns every signing key in the set (keys marked `use: enc` are
    /// skipped). Used for tokens without a `kid` header.
    ///
    /// # Errors
    ///
    /// Returns `NoSigningKeys` if none are usable, or the fetch error.
    pub async fn find_signing_keys(
        &self,
        jwks_uri: &Url,
    ) -> Result<Vec<(DecodingKey, Option<Algorithm>)>, JwksError> {
        let key = cache_key(jwks_uri);
        let fresh = self
            .cache
            .read()
            .await
            .get(&key)
            .is_some_and(CachedJwks::is_fresh);
        if !fresh {
            self.refresh(jwks_uri).await?;
        }

        let cache = self.cache.read().await;
        let keys: Vec<_> = cache
            .get(&key)
            .map(|cached| {
                cached
                    .jwks
                    .keys
                    .iter()
                    .filter(|k| !matches!(k.common.public_key_use, Some(PublicKeyUse::Encryption)))
                    .filter_map(|jwk| decoding_key(jwk).ok())
                    .collect()
            })
            .unwrap_or_default();

        if keys.is_empty() {
            Err(JwksError::NoSigningKeys)
        } else {
            Ok(keys)
        }
    }

    /// Fetches the key set and replaces the cached entry.
    ///
    /// # Errors
    ///
    /// Returns an error for a disallowed scheme, a failed request, an
    /// oversized body or an unparsable key set.
    pub async fn refresh(&self, jwks_uri: &Url) -> Result<(), JwksError> {
        self.validate_scheme(jwks_uri)?;

        let response = self
            .http_client
            .get(jwks_uri.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(%jwks_uri, error = %e, "JWKS fetch failed");
                JwksError::Network(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(JwksError::Http(response.status().as_u16()));
        }

        let max_size = self.config.max_response_size;
        if response
            .content_length()
            .is_some_and(|len| len > max_size as u64)
        {
            return Err(JwksError::ResponseTooLarge { max_size });
        }

        let ttl = self.ttl_from_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| JwksError::Network(e.to_string()))?;
        if body.len() > max_size {
            return Err(JwksError::ResponseTooLarge { max_size });
        }

        let jwks: JwkSet =
            serde_json::from_slice(&body).map_err(|e| JwksError::Parse(e.to_string()))?;

        tracing::debug!(%jwks_uri, keys = jwks.keys.len(), ?ttl, "JWKS cached");

        self.cache.write().await.insert(
            cache_key(jwks_uri),
            CachedJwks {
                jwks,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    fn validate_scheme(&self, uri: &Url) -> Result<(), JwksError> {
        match uri.scheme() {
            "https" => Ok(()),
            "http" if self.config.allow_http => Ok(()),
            _ => Err(JwksError::InvalidScheme),
        }
    }

    /// TTL from `max-age`, clamped to the configured bounds.
    fn ttl_from_headers(&self, headers: &reqwest::header::HeaderMap) -> Duration {
        headers
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| {
                v.split(',')
                    .find_map(|d| d.trim().strip_prefix("max-age=")?.parse::<u64>().ok())
            })
            .map_or(self.config.default_ttl, Duration::from_secs)
            .clamp(self.config.min_ttl, self.config.max_ttl)
    }
}

fn cache_key(uri: &Url) -> String {
    uri.as_str().trim_end_matches('/').to_string()
}

fn decoding_key(jwk: &Jwk) -> Result<(DecodingKey, Option<Algorithm>), JwksError> {
    DecodingKey::from_jwk(jwk)
        .map(|key| (key, jwk_algorithm(jwk)))
        .map_err(|e| JwksError::InvalidKey(e.to_string()))
}

fn jwk_algorithm(jwk: &Jwk) -> Option<Algorithm> {
    match jwk.common.key_algorithm.as_ref()? {
        KeyAlgorithm::HS256 => Some(Algorithm::HS256),
        KeyAlgorithm::HS384 => Some(Algorithm::HS384),
        KeyAlgorithm::HS512 => Some(Algorithm::HS512),
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}
