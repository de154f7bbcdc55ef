//! Outbound HTTP plumbing shared by the concrete providers.
//!
//! Every call is a single request bounded by the provider's configured
//! timeout. Nothing here retries.

use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{RequestBuilder, StatusCode};

use super::provider::IdentityProvider;
use super::types::{OAuthErrorResponse, TokenResponse};
use crate::AuthResult;
use crate::error::AuthError;

const USER_AGENT: &str = concat!("idgate/", env!("CARGO_PKG_VERSION"));

/// HTTP client bound to one provider's timeout.
#[derive(Debug, Clone)]
pub struct ProviderHttpClient {
    inner: reqwest::Client,
}

impl ProviderHttpClient {
    /// Builds a client with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the TLS backend cannot be
    /// initialised.
    pub fn new(timeout: Duration) -> AuthResult<Self> {
        let inner = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AuthError::configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { inner })
    }

    /// The underlying `reqwest` client.
    #[must_use]
    pub fn inner(&self) -> &reqwest::Client {
        &self.inner
    }

    /// Posts an authorization-code grant and parses the token response.
    ///
    /// OAuth error bodies are mapped through the provider's
    /// `handle_provider_error`, including ones returned with HTTP 200.
    pub async fn exchange_code(
        &self,
        provider: &dyn IdentityProvider,
        token_url: &url::Url,
        params: &[(&str, &str)],
    ) -> AuthResult<TokenResponse> {
        let name = provider.name();
        tracing::debug!(provider = name, "exchanging authorization code");

        let response = self
            .inner
            .post(token_url.as_str())
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .form(params)
            .send()
            .await
            .map_err(|e| request_error(name, &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| request_error(name, &e))?;

        if !status.is_success() {
            tracing::warn!(provider = name, %status, "token endpoint returned an error");
            return Err(provider.handle_provider_error(&body));
        }

        match serde_json::from_str::<TokenResponse>(&body) {
            Ok(token) => Ok(token),
            Err(e) => {
                if OAuthErrorResponse::parse(&body).is_some() {
                    tracing::warn!(provider = name, "token endpoint returned an error body");
                    return Err(provider.handle_provider_error(&body));
                }
                Err(AuthError::token_exchange(
                    name,
                    format!("malformed token response: {e}"),
                ))
            }
        }
    }

    /// Fetches a JSON document with bearer authorization.
    pub async fn get_json(
        &self,
        provider: &str,
        url: &url::Url,
        access_token: &str,
        accept: &'static str,
    ) -> AuthResult<serde_json::Value> {
        let response = self
            .inner
            .get(url.as_str())
            .bearer_auth(access_token)
            .header(ACCEPT, HeaderValue::from_static(accept))
            .send()
            .await
            .map_err(|e| request_error(provider, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::token_exchange(
                provider,
                format!("{} returned HTTP {status}", url.path()),
            ));
        }

        response.json().await.map_err(|e| {
            AuthError::token_exchange(provider, format!("malformed response from {}: {e}", url.path()))
        })
    }

    /// Sends a prepared revocation request with idempotent semantics.
    ///
    /// 2xx and 4xx responses are both treated as handled. Only failures to
    /// reach the provider become `RevocationFailure`.
    pub async fn revoke(&self, provider: &str, request: RequestBuilder) -> AuthResult<()> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(provider, error = %e, "token revocation request failed");
            AuthError::revocation(provider, e.to_string())
        })?;

        log_revocation_status(provider, response.status());
        Ok(())
    }
}

fn log_revocation_status(provider: &str, status: StatusCode) {
    if status.is_success() {
        tracing::info!(provider, %status, "token revoked");
    } else if status.is_client_error() {
        tracing::info!(provider, %status, "token already revoked or unknown");
    } else {
        tracing::warn!(provider, %status, "unexpected revocation response");
    }
}

fn request_error(provider: &str, err: &reqwest::Error) -> AuthError {
    if err.is_timeout() {
        AuthError::token_exchange(provider, "request timed out")
    } else {
        AuthError::token_exchange(provider, format!("request failed: {err}"))
    }
}

/// Maps a standard OAuth error code to the shared taxonomy.
///
/// `access_denied` means the user declined at the provider and has to
/// restart the flow. Everything else is a failed exchange.
pub(crate) fn map_oauth_error(provider: &str, error: &OAuthErrorResponse) -> AuthError {
    let detail = match &error.error_description {
        Some(description) => format!("{}: {description}", error.error),
        None => error.error.clone(),
    };

    match error.error.as_str() {
        "access_denied" => AuthError::invalid_request(format!("{provider}: {detail}")),
        _ => AuthError::token_exchange(provider, detail),
    }
}
