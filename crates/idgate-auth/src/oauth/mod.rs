//! OAuth 2.0 authorization endpoint.
//!
//! 1. The client sends the user agent to `/oauth/authorize`
//! 2. An external collaborator authenticates the user
//! 3. A single-use code is issued and the user agent is redirected back
//! 4. An external token endpoint redeems the code through
//!    [`AuthorizationService::redeem`]

pub mod authorize;
pub mod code;
pub mod pkce;
pub mod service;

pub use authorize::{AuthorizationRequest, AuthorizationResponse, ValidatedAuthorizationRequest};
pub use code::{AuthorizationCode, DEFAULT_CODE_LIFETIME};
pub use pkce::{PkceChallenge, PkceChallengeMethod, PkceError, PkceVerifier};
pub use service::AuthorizationService;
