//! User authentication seam for the authorization endpoint.
//!
//! Deciding who the user is belongs to an external collaborator (a login
//! session, an authenticating proxy). The endpoint only asks a
//! [`UserAuthenticator`] and refuses to issue a code when it gets no answer.

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName};

use crate::AuthResult;
use crate::error::AuthError;

/// A user verified by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Internal user identifier bound to issued codes.
    pub user_id: String,
}

impl AuthenticatedUser {
    /// Creates an authenticated user.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// Resolves the authenticated user for an inbound request.
#[async_trait]
pub trait UserAuthenticator: Send + Sync {
    /// Returns the user, or `None` when the request is not authenticated.
    ///
    /// # Errors
    ///
    /// Returns an error only when authentication could not be determined.
    async fn authenticate(&self, headers: &HeaderMap) -> AuthResult<Option<AuthenticatedUser>>;
}

/// Trusts a header set by an authenticating reverse proxy.
///
/// Only safe when the proxy strips the header from client requests.
#[derive(Debug, Clone)]
pub struct TrustedHeaderAuthenticator {
    header: HeaderName,
}

impl TrustedHeaderAuthenticator {
    /// Creates an authenticator reading `header`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if `header` is not a valid name.
    pub fn new(header: &str) -> AuthResult<Self> {
        let header = HeaderName::from_bytes(header.as_bytes())
            .map_err(|e| AuthError::configuration(format!("invalid header name '{header}': {e}")))?;
        Ok(Self { header })
    }
}

#[async_trait]
impl UserAuthenticator for TrustedHeaderAuthenticator {
    async fn authenticate(&self, headers: &HeaderMap) -> AuthResult<Option<AuthenticatedUser>> {
        Ok(headers
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(AuthenticatedUser::new))
    }
}

/// Never authenticates anyone. Used when no user source is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousAuthenticator;

#[async_trait]
impl UserAuthenticator for AnonymousAuthenticator {
    async fn authenticate(&self, _headers: &HeaderMap) -> AuthResult<Option<AuthenticatedUser>> {
        Ok(None)
    }
}
