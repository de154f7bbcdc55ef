//! External identity provider federation.

pub mod claims;
pub mod client;
pub mod github;
pub mod google;
pub mod jwks;
pub mod provider;
pub mod registry;
pub mod service;
pub mod types;

pub use github::GithubProvider;
pub use google::GoogleProvider;
pub use jwks::{JwksCache, JwksCacheConfig, JwksError};
pub use provider::{IdentityProvider, ProviderConfig, ProviderEndpoints, ProviderOptions};
pub use registry::{ProviderFactory, ProviderRegistry};
pub use service::{FederatedIdentity, FederationService};
pub use types::{IdTokenClaims, TokenResponse, UserInfo};
