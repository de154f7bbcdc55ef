//! Federated login handlers.
//!
//! ```text
//! GET /auth/{provider}/login?state=...     → 302 provider authorization URL
//! GET /auth/{provider}/callback?code=...   → 200 UserInfo JSON
//! GET /auth/{provider}/callback?error=...  → provider error
//! ```
//!
//! The callback does not correlate `state` with the login request; that
//! belongs to the session layer in front of this router.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::Deserialize;
use serde_json::json;

use super::{AuthState, query_params};
use super::authorize::found;
use crate::AuthResult;
use crate::error::AuthError;
use crate::federation::UserInfo;
use crate::oauth::AuthorizationCode;

/// Query parameters for the login redirect.
#[derive(Debug, Default, Deserialize)]
pub struct LoginParams {
    /// Opaque state forwarded to the provider. Generated when absent.
    pub state: Option<String>,
}

/// Query parameters the provider sends back to the callback.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// GET /auth/{provider}/login handler.
pub async fn login_handler(
    State(state): State<AuthState>,
    Path(provider): Path<String>,
    query: Result<Query<LoginParams>, QueryRejection>,
) -> AuthResult<Response> {
    let params = query_params(query)?;
    let login_state = params
        .state
        .filter(|s| !s.is_empty())
        .unwrap_or_else(AuthorizationCode::generate_code);

    let url = state.federation.login_url(&provider, &login_state, &[])?;
    tracing::debug!(provider = %provider, "redirecting to identity provider");
    Ok(found(url.as_str()))
}

/// GET /auth/{provider}/callback handler.
pub async fn callback_handler(
    State(state): State<AuthState>,
    Path(provider): Path<String>,
    query: Result<Query<CallbackParams>, QueryRejection>,
) -> AuthResult<Json<UserInfo>> {
    let params = query_params(query)?;
    if let Some(error) = params.error {
        let idp = state.federation.provider(&provider)?;
        let body = json!({
            "error": error,
            "error_description": params.error_description,
        });
        return Err(idp.handle_provider_error(&body.to_string()));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AuthError::invalid_request("missing code"))?;

    let identity = state.federation.complete_login(&provider, &code).await?;

    if state.revoke_provider_tokens {
        let federation = state.federation.clone();
        let access_token = identity.tokens.access_token.clone();
        tokio::spawn(async move {
            federation
                .revoke(&provider, &access_token, Some("access_token"))
                .await;
        });
    }

    Ok(Json(identity.user))
}
