//! GitHub OAuth App provider.
//!
//! GitHub is plain OAuth 2.0: no ID tokens and no OIDC issuer. The token
//! endpoint answers errors with HTTP 200, and email verification comes from
//! the `/user/emails` listing rather than the profile. Revocation deletes
//! only the token passed in; other tokens of the same authorization stay
//! valid.

use async_trait::async_trait;
use url::Url;

use super::client::{ProviderHttpClient, map_oauth_error};
use super::provider::{IdentityProvider, ProviderConfig, authorization_url, resolve_endpoint};
use super::types::{IdTokenClaims, OAuthErrorResponse, TokenResponse, UserInfo, str_field};
use crate::AuthResult;
use crate::error::AuthError;

/// Registered provider name.
pub const NAME: &str = "github";

const AUTHORIZATION_URL: &str = "https://github.com/login/oauth/authorize";
const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const USER_URL: &str = "https://api.github.com/user";
const EMAILS_URL: &str = "https://api.github.com/user/emails";
const REVOCATION_URL: &str = "https://api.github.com/applications/{client_id}/token";

const DEFAULT_SCOPES: &[&str] = &["read:user", "user:email"];
const API_ACCEPT: &str = "application/vnd.github+json";

/// Key under which the email listing is merged into the raw payload.
const EMAILS_KEY: &str = "emails";

/// GitHub OAuth provider.
pub struct GithubProvider {
    config: ProviderConfig,
    authorization_url: Url,
    token_url: Url,
    user_url: Url,
    emails_url: Url,
    revocation_url: Url,
    http: ProviderHttpClient,
}

impl GithubProvider {
    /// Builds the provider from its configuration.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` for missing credentials or
    /// unusable endpoint overrides.
    pub fn new(config: ProviderConfig) -> AuthResult<Self> {
        config.validate(NAME)?;

        let endpoints = &config.options.endpoints;
        let allow_http = config.options.allow_insecure_http;

        let revocation_template = endpoints
            .revocation
            .as_ref()
            .map_or_else(|| REVOCATION_URL.to_string(), |u| u.as_str().to_string());
        // `{` and `}` are percent-encoded once parsed, so substitute first.
        let revocation = revocation_template
            .replace("{client_id}", &config.client_id)
            .replace("%7Bclient_id%7D", &config.client_id);
        let revocation_url = resolve_endpoint(NAME, None, &revocation, allow_http)?;

        Ok(Self {
            authorization_url: resolve_endpoint(
                NAME,
                endpoints.authorization.as_ref(),
                AUTHORIZATION_URL,
                allow_http,
            )?,
            token_url: resolve_endpoint(NAME, endpoints.token.as_ref(), TOKEN_URL, allow_http)?,
            user_url: resolve_endpoint(NAME, endpoints.userinfo.as_ref(), USER_URL, allow_http)?,
            emails_url: resolve_endpoint(NAME, endpoints.emails.as_ref(), EMAILS_URL, allow_http)?,
            revocation_url,
            http: ProviderHttpClient::new(config.request_timeout)?,
            config,
        })
    }
}

/// GitHub's token endpoint uses its own names for a few standard errors.
fn canonical_error(code: &str) -> &str {
    match code {
        "bad_verification_code" => "invalid_grant",
        "incorrect_client_credentials" => "invalid_client",
        "unverified_user_email" => "access_denied",
        other => other,
    }
}

/// Maps a GitHub profile, optionally carrying the email listing under
/// `emails`.
fn normalize(raw: serde_json::Value) -> UserInfo {
    let primary = raw
        .get(EMAILS_KEY)
        .and_then(serde_json::Value::as_array)
        .and_then(|emails| {
            emails.iter().find(|e| {
                e.get("primary").and_then(serde_json::Value::as_bool) == Some(true)
                    && e.get("verified").and_then(serde_json::Value::as_bool) == Some(true)
            })
        })
        .and_then(|e| str_field(e, "email"));

    let (email, email_verified) = match primary {
        Some(email) => (Some(email), true),
        None => (str_field(&raw, "email"), false),
    };

    UserInfo {
        id: str_field(&raw, "id").unwrap_or_default(),
        email,
        email_verified,
        name: str_field(&raw, "name").or_else(|| str_field(&raw, "login")),
        picture: str_field(&raw, "avatar_url"),
        locale: None,
        provider: NAME.to_string(),
        raw,
    }
}

#[async_trait]
impl IdentityProvider for GithubProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn build_authorization_url(&self, state: &str, extra_params: &[(&str, &str)]) -> Url {
        let scope = self.config.effective_scopes(DEFAULT_SCOPES).join(" ");
        let mut provider_params = Vec::new();
        if self.config.options.force_consent {
            provider_params.push(("prompt", "select_account".to_string()));
        }
        authorization_url(
            &self.authorization_url,
            &self.config,
            &scope,
            state,
            &provider_params,
            extra_params,
        )
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> AuthResult<TokenResponse> {
        let params = [
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        self.http.exchange_code(self, &self.token_url, &params).await
    }

    async fn get_user_info(&self, access_token: &str) -> AuthResult<UserInfo> {
        let mut raw = self
            .http
            .get_json(NAME, &self.user_url, access_token, API_ACCEPT)
            .await?;

        match self
            .http
            .get_json(NAME, &self.emails_url, access_token, API_ACCEPT)
            .await
        {
            Ok(emails) => {
                if let Some(profile) = raw.as_object_mut() {
                    profile.insert(EMAILS_KEY.to_string(), emails);
                }
            }
            Err(e) => {
                tracing::warn!(provider = NAME, error = %e, "email listing unavailable");
            }
        }

        let user = self.normalize_user_info(raw);
        if user.id.is_empty() {
            return Err(AuthError::token_exchange(NAME, "user info has no id"));
        }

        let options = &self.config.options;
        if options.require_verified_email && !user.email_verified {
            return Err(AuthError::EmailNotVerified);
        }
        Ok(user)
    }

    fn normalize_user_info(&self, raw: serde_json::Value) -> UserInfo {
        normalize(raw)
    }

    fn expected_issuers(&self) -> &[&str] {
        &[]
    }

    fn validate_id_token_claims(&self, _claims: &IdTokenClaims) -> AuthResult<()> {
        Err(AuthError::invalid_id_token("github does not issue ID tokens"))
    }

    async fn decode_id_token(&self, _id_token: &str) -> AuthResult<IdTokenClaims> {
        Err(AuthError::invalid_id_token("github does not issue ID tokens"))
    }

    /// Deletes `token` via the OAuth application API. Only that token is
    /// revoked; the hint is ignored.
    async fn revoke_token(&self, token: &str, _token_type_hint: Option<&str>) -> AuthResult<()> {
        let request = self
            .http
            .inner()
            .delete(self.revocation_url.as_str())
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header(reqwest::header::ACCEPT, API_ACCEPT)
            .json(&serde_json::json!({ "access_token": token }));
        self.http.revoke(NAME, request).await
    }

    fn handle_provider_error(&self, body: &str) -> AuthError {
        match OAuthErrorResponse::parse(body) {
            Some(mut error) => {
                error.error = canonical_error(&error.error).to_string();
                map_oauth_error(NAME, &error)
            }
            None => AuthError::token_exchange(NAME, "unrecognized error response"),
        }
    }
}
