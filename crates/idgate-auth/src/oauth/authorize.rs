//! Authorization request and response types.
//!
//! ```text
//! GET /oauth/authorize?response_type=code&client_id=abc
//!     &redirect_uri=https://app.example/cb&state=xyz
//!
//! HTTP/1.1 302 Found
//! Location: https://app.example/cb?code=...&state=xyz
//! ```

use serde::Deserialize;
use url::Url;

use super::pkce::{PkceChallenge, PkceChallengeMethod};
use crate::AuthResult;
use crate::error::AuthError;

/// Raw authorization request query.
///
/// Every field is optional so a missing parameter surfaces as
/// `InvalidRequest` instead of an extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizationRequest {
    /// Must be `code`.
    pub response_type: Option<String>,

    /// Registered client identifier.
    pub client_id: Option<String>,

    /// Absolute URI that receives the code.
    pub redirect_uri: Option<String>,

    /// Requested scope. Stored on the code, not enforced.
    pub scope: Option<String>,

    /// Opaque client state, echoed unchanged.
    pub state: Option<String>,

    /// PKCE challenge.
    pub code_challenge: Option<String>,

    /// PKCE challenge method; only `S256`.
    pub code_challenge_method: Option<String>,
}

/// An authorization request whose shape has been checked.
#[derive(Debug, Clone)]
pub struct ValidatedAuthorizationRequest {
    /// Client identifier.
    pub client_id: String,
    /// Redirect URI, as sent (used for exact matching).
    pub redirect_uri: String,
    /// Parsed redirect URI.
    pub redirect_url: Url,
    /// Requested scope.
    pub scope: Option<String>,
    /// Client state.
    pub state: Option<String>,
    /// PKCE challenge and method.
    pub pkce: Option<(PkceChallenge, PkceChallengeMethod)>,
}

impl AuthorizationRequest {
    /// Checks required parameters and their formats.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRequest` when `client_id` is missing,
    /// `redirect_uri` is missing or not an absolute URL without fragment,
    /// `response_type` is not `code`, or the PKCE pair is incomplete or
    /// malformed.
    pub fn validate(&self) -> AuthResult<ValidatedAuthorizationRequest> {
        let client_id = non_empty(self.client_id.as_deref())
            .ok_or_else(|| AuthError::invalid_request("missing client_id"))?;

        let redirect_uri = non_empty(self.redirect_uri.as_deref())
            .ok_or_else(|| AuthError::invalid_request("missing redirect_uri"))?;
        let redirect_url = Url::parse(redirect_uri)
            .map_err(|e| AuthError::invalid_request(format!("invalid redirect_uri: {e}")))?;
        if redirect_url.fragment().is_some() {
            return Err(AuthError::invalid_request(
                "redirect_uri must not contain a fragment",
            ));
        }

        match self.response_type.as_deref() {
            Some("code") => {}
            Some(other) => {
                return Err(AuthError::invalid_request(format!(
                    "unsupported response_type '{other}'"
                )));
            }
            None => return Err(AuthError::invalid_request("missing response_type")),
        }

        let pkce = match (
            non_empty(self.code_challenge.as_deref()),
            non_empty(self.code_challenge_method.as_deref()),
        ) {
            (None, None) => None,
            (Some(challenge), Some(method)) => {
                let method = PkceChallengeMethod::parse(method)
                    .map_err(|e| AuthError::invalid_request(e.to_string()))?;
                let challenge = PkceChallenge::new(challenge.to_string())
                    .map_err(|e| AuthError::invalid_request(e.to_string()))?;
                Some((challenge, method))
            }
            _ => {
                return Err(AuthError::invalid_request(
                    "code_challenge and code_challenge_method must be sent together",
                ));
            }
        };

        Ok(ValidatedAuthorizationRequest {
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            redirect_url,
            scope: self.scope.clone(),
            state: self.state.clone(),
            pkce,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Successful authorization result.
#[derive(Debug, Clone)]
pub struct AuthorizationResponse {
    /// Where to send the user agent.
    pub redirect_uri: Url,
    /// Issued authorization code.
    pub code: String,
    /// State from the request, if any.
    pub state: Option<String>,
}

impl AuthorizationResponse {
    /// Builds the redirect URL: `redirect_uri` plus `code` and, when
    /// supplied, the unmodified `state`. Existing query parameters are kept.
    #[must_use]
    pub fn redirect_url(&self) -> Url {
        let mut url = self.redirect_uri.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("code", &self.code);
            if let Some(state) = &self.state {
                query.append_pair("state", state);
            }
        }
        url
    }
}
