//! Registered OAuth client.

use serde::{Deserialize, Serialize};
use url::Url;

/// A client allowed to use the authorization endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClient {
    /// OAuth `client_id`.
    pub client_id: String,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Allowed redirect URIs, matched exactly. At least one is required.
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// Require PKCE on every authorization request.
    #[serde(default)]
    pub require_pkce: bool,
}

impl RegisteredClient {
    /// Creates a client. Add redirect URIs before registering it.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            name: None,
            redirect_uris: Vec::new(),
            require_pkce: false,
        }
    }

    /// Adds an allowed redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uris.push(uri.into());
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Requires PKCE.
    #[must_use]
    pub fn with_require_pkce(mut self, require: bool) -> Self {
        self.require_pkce = require;
        self
    }

    /// Returns `true` if `uri` may receive codes for this client.
    ///
    /// Registered URIs are matched exactly. A client without registered
    /// URIs accepts none.
    #[must_use]
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|r| r == uri)
    }

    /// Checks the registration itself.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.client_id.trim().is_empty() {
            return Err("client_id must not be empty".to_string());
        }
        if self.redirect_uris.is_empty() {
            return Err(format!(
                "client '{}' must register at least one redirect URI",
                self.client_id
            ));
        }
        for uri in &self.redirect_uris {
            let parsed = Url::parse(uri).map_err(|e| format!("invalid redirect URI {uri}: {e}"))?;
            if parsed.fragment().is_some() {
                return Err(format!("redirect URI {uri} must not contain a fragment"));
            }
        }
        Ok(())
    }
}
