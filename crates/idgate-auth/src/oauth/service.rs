//! Authorization service.
//!
//! Issues single-use codes at the authorization endpoint and redeems them
//! for an external token endpoint.

use std::sync::Arc;
use std::time::Duration;

use super::authorize::{AuthorizationRequest, AuthorizationResponse};
use super::code::{AuthorizationCode, DEFAULT_CODE_LIFETIME};
use super::pkce::{PkceChallenge, PkceVerifier};
use crate::AuthResult;
use crate::error::AuthError;
use crate::identity::AuthenticatedUser;
use crate::storage::{AuthorizationCodeStorage, ClientStorage};

/// Issues and redeems authorization codes.
pub struct AuthorizationService {
    clients: Arc<dyn ClientStorage>,
    codes: Arc<dyn AuthorizationCodeStorage>,
    code_lifetime: Duration,
}

impl AuthorizationService {
    /// Creates a service with the default ten-minute code lifetime.
    #[must_use]
    pub fn new(clients: Arc<dyn ClientStorage>, codes: Arc<dyn AuthorizationCodeStorage>) -> Self {
        Self {
            clients,
            codes,
            code_lifetime: DEFAULT_CODE_LIFETIME,
        }
    }

    /// Sets the code lifetime.
    #[must_use]
    pub fn with_code_lifetime(mut self, lifetime: Duration) -> Self {
        self.code_lifetime = lifetime;
        self
    }

    /// The code store, for maintenance tasks.
    #[must_use]
    pub fn code_storage(&self) -> Arc<dyn AuthorizationCodeStorage> {
        Arc::clone(&self.codes)
    }

    /// Handles an authorization request for `user`.
    ///
    /// Checks run in order: request shape, client, redirect URI
    /// registration, PKCE policy, user. Nothing is stored unless all pass.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` for malformed requests or unregistered redirect URIs
    /// - `UnauthorizedClient` for unknown clients
    /// - `AuthenticationRequired` when `user` is `None`
    /// - `Storage` if the code cannot be persisted
    pub async fn authorize(
        &self,
        request: &AuthorizationRequest,
        user: Option<&AuthenticatedUser>,
    ) -> AuthResult<AuthorizationResponse> {
        let request = request.validate()?;

        let client = self
            .clients
            .find_by_client_id(&request.client_id)
            .await?
            .ok_or_else(|| {
                tracing::warn!(client_id = %request.client_id, "authorization request from unknown client");
                AuthError::unauthorized_client(format!("unknown client '{}'", request.client_id))
            })?;

        if !client.is_redirect_uri_allowed(&request.redirect_uri) {
            return Err(AuthError::invalid_request(
                "redirect_uri is not registered for this client",
            ));
        }

        if client.require_pkce && request.pkce.is_none() {
            return Err(AuthError::invalid_request("client requires PKCE"));
        }

        let user = user.ok_or_else(|| AuthError::authentication_required("no authenticated user"))?;

        let mut code = AuthorizationCode::issue(
            &client.client_id,
            &request.redirect_uri,
            &user.user_id,
            self.code_lifetime,
        );
        code.state = request.state.clone();
        code.scope = request.scope.clone();
        if let Some((challenge, method)) = &request.pkce {
            code.code_challenge = Some(challenge.as_str().to_string());
            code.code_challenge_method = Some(method.as_str().to_string());
        }

        self.codes.create(&code).await?;

        tracing::info!(
            client_id = %client.client_id,
            user_id = %user.user_id,
            pkce = request.pkce.is_some(),
            "authorization code issued"
        );

        Ok(AuthorizationResponse {
            redirect_uri: request.redirect_url,
            code: code.code,
            state: request.state,
        })
    }

    /// Redeems a code for the client that received it.
    ///
    /// The code is consumed before the binding checks, so a failed attempt
    /// still burns it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRequest` for unknown, expired or replayed
    /// codes, a client or redirect URI mismatch, and missing or wrong PKCE
    /// verifiers.
    pub async fn redeem(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> AuthResult<AuthorizationCode> {
        let record = self.codes.consume(code).await?;

        if record.client_id != client_id {
            tracing::warn!(
                expected = %record.client_id,
                presented = client_id,
                "authorization code presented by another client"
            );
            return Err(AuthError::invalid_request("client_id mismatch"));
        }
        if record.redirect_uri != redirect_uri {
            return Err(AuthError::invalid_request("redirect_uri mismatch"));
        }

        if let Some(challenge) = &record.code_challenge {
            let verifier = code_verifier
                .ok_or_else(|| AuthError::invalid_request("missing code_verifier"))?;
            let verifier = PkceVerifier::new(verifier.to_string())
                .map_err(|e| AuthError::invalid_request(e.to_string()))?;
            PkceChallenge::new(challenge.clone())
                .and_then(|c| c.verify(&verifier))
                .map_err(|e| AuthError::invalid_request(e.to_string()))?;
        }

        tracing::info!(client_id, user_id = %record.user_id, "authorization code redeemed");
        Ok(record)
    }
}
