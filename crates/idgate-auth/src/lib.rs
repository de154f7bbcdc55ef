//! # idgate-auth
//!
//! Multi-provider OAuth 2.0 / OpenID Connect authentication core.
//!
//! This crate provides:
//! - A provider contract for external identity providers, with Google and
//!   GitHub implementations
//! - A provider registry with explicit, one-time initialization
//! - ID token validation against provider JWKS
//! - An OAuth 2.0 authorization endpoint issuing single-use codes
//!
//! ## Modules
//!
//! - [`config`] - Authentication configuration
//! - [`federation`] - Identity providers, registry and federated login
//! - [`oauth`] - Authorization endpoint, codes and PKCE
//! - [`identity`] - User authentication seam for the authorization endpoint
//! - [`storage`] - Storage traits and in-memory backends
//! - [`http`] - Axum HTTP handlers

pub mod config;
pub mod error;
pub mod federation;
pub mod http;
pub mod identity;
pub mod oauth;
pub mod storage;
pub mod types;

pub use config::{AuthConfig, AuthorizationConfig, ConfigError};
pub use error::{AuthError, ErrorCategory};
pub use federation::{
    FederatedIdentity, FederationService, GithubProvider, GoogleProvider, IdTokenClaims,
    IdentityProvider, ProviderConfig, ProviderOptions, ProviderRegistry, TokenResponse, UserInfo,
};
pub use http::{AuthState, auth_router};
pub use identity::{
    AnonymousAuthenticator, AuthenticatedUser, TrustedHeaderAuthenticator, UserAuthenticator,
};
pub use oauth::{AuthorizationCode, AuthorizationRequest, AuthorizationService};
pub use storage::{
    AuthorizationCodeStorage, ClientStorage, InMemoryClientStorage, InMemoryCodeStorage,
};
pub use types::RegisteredClient;

/// Type alias for authentication results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use idgate_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::{AuthConfig, ConfigError};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::federation::{
        FederationService, IdentityProvider, ProviderConfig, ProviderRegistry, UserInfo,
    };
    pub use crate::http::{AuthState, auth_router};
    pub use crate::identity::{AuthenticatedUser, UserAuthenticator};
    pub use crate::oauth::AuthorizationService;
    pub use crate::storage::{AuthorizationCodeStorage, ClientStorage};
}
