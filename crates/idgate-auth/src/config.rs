//! Authentication configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! [auth.authorization]
//! code_lifetime = "10m"
//!
//! [[auth.authorization.clients]]
//! client_id = "abc"
//! redirect_uris = ["https://app.example/cb"]
//!
//! [auth.providers.google]
//! client_id = "1234.apps.googleusercontent.com"
//! client_secret = "..."
//! redirect_uri = "https://idgate.example/auth/google/callback"
//!
//! [auth.providers.google.options]
//! allowed_domains = ["example.com"]
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::federation::provider::ProviderConfig;
use crate::oauth::code::DEFAULT_CODE_LIFETIME;
use crate::types::RegisteredClient;

/// Root authentication configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Authorization endpoint settings.
    pub authorization: AuthorizationConfig,

    /// Identity providers keyed by registered provider name.
    pub providers: BTreeMap<String, ProviderConfig>,

    /// Revoke the provider access token once a federated login completes.
    pub revoke_provider_tokens: bool,
}

/// Authorization endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    /// Lifetime of issued authorization codes.
    #[serde(with = "humantime_serde")]
    pub code_lifetime: Duration,

    /// Clients allowed to request codes.
    pub clients: Vec<RegisteredClient>,

    /// Header carrying the user id set by an authenticating proxy.
    /// When unset, no request is considered authenticated.
    pub trusted_user_header: Option<String>,

    /// Interval of the expired-code sweep. Zero disables it.
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            code_lifetime: DEFAULT_CODE_LIFETIME,
            clients: Vec::new(),
            trusted_user_header: None,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the code lifetime is zero or longer than ten
    /// minutes, a client lacks a redirect URI or is malformed or duplicated,
    /// the trusted header name is not a valid header, or a provider misses
    /// credentials.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let authz = &self.authorization;

        if authz.code_lifetime.is_zero() || authz.code_lifetime > DEFAULT_CODE_LIFETIME {
            return Err(ConfigError::InvalidValue(
                "authorization.code_lifetime must be between 1s and 10m".to_string(),
            ));
        }

        let mut seen = Vec::with_capacity(authz.clients.len());
        for client in &authz.clients {
            client.validate().map_err(ConfigError::InvalidValue)?;
            if seen.contains(&client.client_id.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "duplicate client_id '{}'",
                    client.client_id
                )));
            }
            seen.push(client.client_id.as_str());
        }

        if let Some(header) = &authz.trusted_user_header
            && axum::http::HeaderName::from_bytes(header.as_bytes()).is_err()
        {
            return Err(ConfigError::InvalidValue(format!(
                "trusted_user_header '{header}' is not a valid header name"
            )));
        }

        for (name, provider) in &self.providers {
            if provider.client_id.trim().is_empty() {
                return Err(ConfigError::Missing(format!("providers.{name}.client_id")));
            }
            if provider.client_secret.trim().is_empty() {
                return Err(ConfigError::Missing(format!(
                    "providers.{name}.client_secret"
                )));
            }
            provider
                .validate(name)
                .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.authorization.code_lifetime, Duration::from_secs(600));
        assert!(config.authorization.clients.is_empty());
        assert!(config.providers.is_empty());
        assert!(!config.revoke_provider_tokens);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize() {
        let config: AuthConfig = serde_json::from_value(serde_json::json!({
            "authorization": {
                "code_lifetime": "5m",
                "clients": [{"client_id": "abc", "redirect_uris": ["https://app.example/cb"]}],
                "trusted_user_header": "x-authenticated-user"
            },
            "providers": {
                "github": {
                    "client_id": "Iv1.abc",
                    "client_secret": "shh",
                    "redirect_uri": "https://idgate.example/auth/github/callback"
                }
            }
        }))
        .unwrap();

        assert_eq!(config.authorization.code_lifetime, Duration::from_secs(300));
        assert_eq!(config.authorization.clients[0].client_id, "abc");
        assert!(config.providers.contains_key("github"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_code_lifetime_bounds() {
        let mut config = AuthConfig::default();
        config.authorization.code_lifetime = Duration::ZERO;
        assert!(config.validate().is_err());

        config.authorization.code_lifetime = Duration::from_secs(3600);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_clients() {
        let mut config = AuthConfig::default();
        let client = RegisteredClient::new("abc").with_redirect_uri("https://app.example/cb");
        config.authorization.clients = vec![client.clone(), client];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue(msg)) if msg.contains("duplicate")
        ));
    }

    #[test]
    fn test_client_requires_redirect_uri() {
        let config: AuthConfig = serde_json::from_value(serde_json::json!({
            "authorization": {"clients": [{"client_id": "abc"}]}
        }))
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue(msg)) if msg.contains("redirect URI")
        ));
    }

    #[test]
    fn test_invalid_trusted_header() {
        let mut config = AuthConfig::default();
        config.authorization.trusted_user_header = Some("bad header".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_provider_missing_secret() {
        let mut config = AuthConfig::default();
        config.providers.insert(
            "google".to_string(),
            ProviderConfig::new("cid", "", "https://idgate.example/cb"),
        );
        assert!(matches!(config.validate(), Err(ConfigError::Missing(_))));
    }
}
