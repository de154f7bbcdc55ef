//! Authentication error types.
//!
//! This module defines the shared error taxonomy for the authorization
//! endpoint and every identity provider. Provider-specific error vocabularies
//! are mapped into these kinds before they leave a provider implementation.

use std::fmt;

use axum::http::StatusCode;

/// Errors that can occur during authentication operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Malformed or missing authorization parameters, or a replayed, expired
    /// or unknown authorization code at redemption time.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of why the request is invalid.
        message: String,
    },

    /// The `client_id` is not a registered client.
    #[error("Unauthorized client: {message}")]
    UnauthorizedClient {
        /// Description of why the client was rejected.
        message: String,
    },

    /// No verified user identity is available to bind to an authorization code.
    #[error("Authentication required: {message}")]
    AuthenticationRequired {
        /// Description of why authentication is required.
        message: String,
    },

    /// The provider name is not registered.
    #[error("Unsupported provider: {provider}")]
    UnsupportedProvider {
        /// The requested provider name.
        provider: String,
    },

    /// The provider token endpoint returned a non-success status, an
    /// unparsable body, or could not be reached in time.
    #[error("Token exchange failed: {provider} - {message}")]
    TokenExchangeFailure {
        /// The identity provider name.
        provider: String,
        /// Description of the failure.
        message: String,
    },

    /// Generic ID token claim validation failure (issuer, audience, expiry).
    #[error("Invalid ID token: {message}")]
    InvalidIdToken {
        /// Description of the violated claim.
        message: String,
    },

    /// The account's domain is not in the provider's allow-list.
    #[error("Domain not allowed: {domain}")]
    DomainNotAllowed {
        /// The rejected domain (empty when the token carried none).
        domain: String,
    },

    /// The provider reports the account email as unverified.
    #[error("Email not verified")]
    EmailNotVerified,

    /// A token revocation call could not reach the provider.
    #[error("Revocation failed: {provider} - {message}")]
    RevocationFailure {
        /// The identity provider name.
        provider: String,
        /// Description of the failure.
        message: String,
    },

    /// An error occurred while storing or retrieving authorization codes.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The configuration or provider registration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `UnauthorizedClient` error.
    #[must_use]
    pub fn unauthorized_client(message: impl Into<String>) -> Self {
        Self::UnauthorizedClient {
            message: message.into(),
        }
    }

    /// Creates a new `AuthenticationRequired` error.
    #[must_use]
    pub fn authentication_required(message: impl Into<String>) -> Self {
        Self::AuthenticationRequired {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedProvider` error.
    #[must_use]
    pub fn unsupported_provider(provider: impl Into<String>) -> Self {
        Self::UnsupportedProvider {
            provider: provider.into(),
        }
    }

    /// Creates a new `TokenExchangeFailure` error.
    #[must_use]
    pub fn token_exchange(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TokenExchangeFailure {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates a new `InvalidIdToken` error.
    #[must_use]
    pub fn invalid_id_token(message: impl Into<String>) -> Self {
        Self::InvalidIdToken {
            message: message.into(),
        }
    }

    /// Creates a new `DomainNotAllowed` error.
    #[must_use]
    pub fn domain_not_allowed(domain: impl Into<String>) -> Self {
        Self::DomainNotAllowed {
            domain: domain.into(),
        }
    }

    /// Creates a new `RevocationFailure` error.
    #[must_use]
    pub fn revocation(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RevocationFailure {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRequest { .. } => ErrorCategory::Validation,
            Self::UnauthorizedClient { .. } => ErrorCategory::Authentication,
            Self::AuthenticationRequired { .. } => ErrorCategory::Authentication,
            Self::UnsupportedProvider { .. } => ErrorCategory::Configuration,
            Self::TokenExchangeFailure { .. } => ErrorCategory::Federation,
            Self::InvalidIdToken { .. } => ErrorCategory::Security,
            Self::DomainNotAllowed { .. } => ErrorCategory::Security,
            Self::EmailNotVerified => ErrorCategory::Security,
            Self::RevocationFailure { .. } => ErrorCategory::Federation,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
        }
    }

    /// Returns the HTTP status code used when this error reaches an endpoint.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Self::UnauthorizedClient { .. } => StatusCode::UNAUTHORIZED,
            Self::AuthenticationRequired { .. } => StatusCode::UNAUTHORIZED,
            Self::UnsupportedProvider { .. } => StatusCode::NOT_FOUND,
            Self::TokenExchangeFailure { .. } => StatusCode::BAD_GATEWAY,
            Self::InvalidIdToken { .. } => StatusCode::UNAUTHORIZED,
            Self::DomainNotAllowed { .. } => StatusCode::FORBIDDEN,
            Self::EmailNotVerified => StatusCode::FORBIDDEN,
            Self::RevocationFailure { .. } => StatusCode::BAD_GATEWAY,
            Self::Storage { .. } | Self::Configuration { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the public message rendered in the `{"error": ...}` body.
    ///
    /// Internal details stay in logs; the authorization endpoint messages are
    /// fixed strings clients can match on.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidRequest { .. } => "Invalid request parameters".to_string(),
            Self::UnauthorizedClient { .. } => "Invalid client_id".to_string(),
            Self::AuthenticationRequired { .. } => "Authentication required".to_string(),
            Self::UnsupportedProvider { provider } => format!("Unsupported provider: {provider}"),
            Self::TokenExchangeFailure { .. } => "Token exchange failed".to_string(),
            Self::InvalidIdToken { .. } => "Invalid ID token".to_string(),
            Self::DomainNotAllowed { .. } => "Domain not allowed".to_string(),
            Self::EmailNotVerified => "Email not verified".to_string(),
            Self::RevocationFailure { .. } => "Token revocation failed".to_string(),
            Self::Storage { .. } | Self::Configuration { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}

/// Categories of authentication errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Request validation errors.
    Validation,
    /// Client or user authentication errors.
    Authentication,
    /// ID token claim violations.
    Security,
    /// Identity provider communication errors.
    Federation,
    /// Infrastructure/storage errors.
    Infrastructure,
    /// Configuration errors.
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Authentication => write!(f, "authentication"),
            Self::Security => write!(f, "security"),
            Self::Federation => write!(f, "federation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}
