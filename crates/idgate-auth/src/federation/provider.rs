//! Identity provider contract and per-provider configuration.
//!
//! Every external identity provider implements [`IdentityProvider`]. A
//! provider is built from an immutable [`ProviderConfig`]; everything that
//! differs between providers (endpoints, default scopes, claim extensions,
//! error vocabulary) lives in the implementing type, not in shared state.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use super::claims;
use super::types::{IdTokenClaims, TokenResponse, UserInfo};
use crate::AuthResult;
use crate::error::AuthError;

/// Default timeout for provider HTTP calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default clock skew tolerance for `iat` validation.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(60);

/// Configuration for a single identity provider.
///
/// Read once when the provider is constructed. Empty `scopes` means the
/// provider's default scope set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// OAuth client ID registered with the provider.
    pub client_id: String,

    /// OAuth client secret registered with the provider.
    #[serde(skip_serializing)]
    pub client_secret: String,

    /// Callback URL registered with the provider.
    pub redirect_uri: String,

    /// Requested scopes. Duplicates are ignored.
    pub scopes: Vec<String>,

    /// Extra authorization request parameters sent on every login.
    pub additional_params: BTreeMap<String, String>,

    /// Provider-specific policy switches.
    pub options: ProviderOptions,

    /// Timeout applied to every outbound call to this provider.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Allowed clock skew when checking `iat`.
    #[serde(with = "humantime_serde")]
    pub clock_skew: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            scopes: Vec::new(),
            additional_params: BTreeMap::new(),
            options: ProviderOptions::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            clock_skew: DEFAULT_CLOCK_SKEW,
        }
    }
}

impl ProviderConfig {
    /// Creates a configuration with the client credentials and callback URL.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            ..Self::default()
        }
    }

    /// Sets the requested scopes.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Adds an authorization request parameter.
    #[must_use]
    pub fn with_additional_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_params.insert(key.into(), value.into());
        self
    }

    /// Sets the provider options.
    #[must_use]
    pub fn with_options(mut self, options: ProviderOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the outbound request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the clock skew tolerance.
    #[must_use]
    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    /// Returns the scopes to request, falling back to `defaults` when none
    /// are configured. Order is preserved and duplicates dropped.
    #[must_use]
    pub fn effective_scopes(&self, defaults: &[&str]) -> Vec<String> {
        let source: Vec<&str> = if self.scopes.is_empty() {
            defaults.to_vec()
        } else {
            self.scopes.iter().map(String::as_str).collect()
        };

        let mut scopes: Vec<String> = Vec::with_capacity(source.len());
        for scope in source {
            let scope = scope.trim();
            if !scope.is_empty() && !scopes.iter().any(|s| s == scope) {
                scopes.push(scope.to_string());
            }
        }
        scopes
    }

    /// Checks the fields every provider needs.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if a credential is missing or the
    /// redirect URI is not an absolute URL.
    pub fn validate(&self, provider: &str) -> AuthResult<()> {
        if self.client_id.trim().is_empty() {
            return Err(AuthError::configuration(format!(
                "{provider}: client_id is required"
            )));
        }
        if self.client_secret.trim().is_empty() {
            return Err(AuthError::configuration(format!(
                "{provider}: client_secret is required"
            )));
        }
        Url::parse(&self.redirect_uri).map_err(|e| {
            AuthError::configuration(format!("{provider}: invalid redirect_uri: {e}"))
        })?;
        if self.request_timeout.is_zero() {
            return Err(AuthError::configuration(format!(
                "{provider}: request_timeout must be greater than zero"
            )));
        }
        Ok(())
    }
}

/// Provider policy switches.
///
/// Not every provider honours every option; unsupported options are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOptions {
    /// Accepted account domains. Empty allows every domain.
    pub allowed_domains: Vec<String>,

    /// Always show the provider's consent screen.
    pub force_consent: bool,

    /// Reject accounts whose email the provider has not verified.
    pub require_verified_email: bool,

    /// Access type requested from providers that support it
    /// (`offline` yields a refresh token).
    pub access_type: Option<String>,

    /// Endpoint overrides, mainly for testing against local mocks.
    pub endpoints: ProviderEndpoints,

    /// Allow plain HTTP endpoints. Testing only.
    pub allow_insecure_http: bool,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            allowed_domains: Vec::new(),
            force_consent: false,
            require_verified_email: true,
            access_type: None,
            endpoints: ProviderEndpoints::default(),
            allow_insecure_http: false,
        }
    }
}

impl ProviderOptions {
    /// Sets the allowed account domains.
    #[must_use]
    pub fn with_allowed_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    /// Forces the consent screen.
    #[must_use]
    pub fn with_force_consent(mut self, force: bool) -> Self {
        self.force_consent = force;
        self
    }

    /// Sets whether a verified email is required.
    #[must_use]
    pub fn with_require_verified_email(mut self, require: bool) -> Self {
        self.require_verified_email = require;
        self
    }

    /// Sets the requested access type.
    #[must_use]
    pub fn with_access_type(mut self, access_type: impl Into<String>) -> Self {
        self.access_type = Some(access_type.into());
        self
    }

    /// Sets endpoint overrides.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Allows plain HTTP endpoints.
    #[must_use]
    pub fn with_allow_insecure_http(mut self, allow: bool) -> Self {
        self.allow_insecure_http = allow;
        self
    }

    /// Returns `true` if `domain` passes the allow-list (case-insensitive).
    #[must_use]
    pub fn is_domain_allowed(&self, domain: &str) -> bool {
        self.allowed_domains.is_empty()
            || self
                .allowed_domains
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(domain))
    }
}

/// Optional endpoint overrides. `None` uses the provider's built-in URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderEndpoints {
    /// Authorization endpoint.
    pub authorization: Option<Url>,
    /// Token endpoint.
    pub token: Option<Url>,
    /// User-info endpoint.
    pub userinfo: Option<Url>,
    /// Secondary email listing endpoint (GitHub).
    pub emails: Option<Url>,
    /// Revocation endpoint. The `{client_id}` placeholder is substituted.
    pub revocation: Option<Url>,
    /// JWKS endpoint.
    pub jwks: Option<Url>,
}

/// Resolves an endpoint override or parses the built-in default.
pub(crate) fn resolve_endpoint(
    provider: &str,
    override_url: Option<&Url>,
    default_url: &str,
    allow_http: bool,
) -> AuthResult<Url> {
    let url = match override_url {
        Some(url) => url.clone(),
        None => Url::parse(default_url).map_err(|e| {
            AuthError::configuration(format!("{provider}: invalid endpoint {default_url}: {e}"))
        })?,
    };

    match url.scheme() {
        "https" => Ok(url),
        "http" if allow_http => Ok(url),
        scheme => Err(AuthError::configuration(format!(
            "{provider}: endpoint scheme '{scheme}' is not allowed"
        ))),
    }
}

/// Capability set every identity provider implements.
///
/// The default `validate_id_token_claims` runs the generic OIDC checks
/// before [`IdentityProvider::validate_extension_claims`], so a protocol
/// violation is always reported as `InvalidIdToken` rather than a
/// provider-specific error.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Lowercase provider name, e.g. `google`.
    fn name(&self) -> &str;

    /// The configuration this provider was built from.
    fn config(&self) -> &ProviderConfig;

    /// Builds the provider authorization URL for `state`.
    ///
    /// Parameter order: `client_id`, `redirect_uri`, `scope`,
    /// `response_type=code`, `state`, provider parameters, configured
    /// additional parameters, then `extra_params`.
    fn build_authorization_url(&self, state: &str, extra_params: &[(&str, &str)]) -> Url;

    /// Exchanges an authorization code at the provider token endpoint.
    ///
    /// # Errors
    ///
    /// Returns `TokenExchangeFailure` on a non-success status, an
    /// unparsable body, a network error or a timeout. There is no retry.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> AuthResult<TokenResponse>;

    /// Fetches and normalizes the user profile for an access token.
    async fn get_user_info(&self, access_token: &str) -> AuthResult<UserInfo>;

    /// Maps a raw provider payload to [`UserInfo`]. Never fails; missing
    /// optional fields become `None`.
    fn normalize_user_info(&self, raw: serde_json::Value) -> UserInfo;

    /// Issuers accepted in ID tokens.
    fn expected_issuers(&self) -> &[&str];

    /// Whether this provider issues OIDC ID tokens at all.
    fn issues_id_tokens(&self) -> bool {
        !self.expected_issuers().is_empty()
    }

    /// Provider-specific claim checks, run after the generic checks pass.
    fn validate_extension_claims(&self, _claims: &IdTokenClaims) -> AuthResult<()> {
        Ok(())
    }

    /// Validates ID token claims: generic checks first, then extensions.
    fn validate_id_token_claims(&self, claims: &IdTokenClaims) -> AuthResult<()> {
        let config = self.config();
        claims::validate_standard_claims(
            claims,
            self.expected_issuers(),
            &config.client_id,
            config.clock_skew,
            claims::now_unix(),
        )?;
        self.validate_extension_claims(claims)
    }

    /// Verifies an ID token signature against the provider's JWKS and
    /// validates its claims.
    async fn decode_id_token(&self, id_token: &str) -> AuthResult<IdTokenClaims>;

    /// Revokes a token at the provider. Best effort and idempotent: only
    /// network-level failures produce `RevocationFailure`.
    async fn revoke_token(&self, token: &str, token_type_hint: Option<&str>) -> AuthResult<()>;

    /// Maps a provider error body into the shared error taxonomy.
    fn handle_provider_error(&self, body: &str) -> AuthError;
}

/// Appends the authorization query in the canonical order.
pub(crate) fn authorization_url(
    endpoint: &Url,
    config: &ProviderConfig,
    scope: &str,
    state: &str,
    provider_params: &[(&str, String)],
    extra_params: &[(&str, &str)],
) -> Url {
    let mut url = endpoint.clone();
    {
        let mut params = url.query_pairs_mut();
        params.append_pair("client_id", &config.client_id);
        params.append_pair("redirect_uri", &config.redirect_uri);
        params.append_pair("scope", scope);
        params.append_pair("response_type", "code");
        params.append_pair("state", state);
        for (key, value) in provider_params {
            params.append_pair(key, value);
        }
        for (key, value) in &config.additional_params {
            params.append_pair(key, value);
        }
        for (key, value) in extra_params {
            params.append_pair(key, value);
        }
    }
    url
}
