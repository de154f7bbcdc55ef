//! `GET /oauth/authorize` handler.
//!
//! ```text
//! GET /oauth/authorize?client_id=...&redirect_uri=...&response_type=code
//!     ├─► Malformed request       → 400 {"error": "Invalid request parameters"}
//!     ├─► Unknown client          → 401 {"error": "Invalid client_id"}
//!     ├─► No authenticated user   → 401 {"error": "Authentication required"}
//!     └─► OK                      → 302 redirect_uri?code=...&state=...
//! ```
//!
//! Errors are never redirected to the client: the redirect URI is not
//! trusted until the client has been checked. Parameters that do not decode
//! to UTF-8 are rejected, so `state` is echoed byte for byte.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, RawQuery, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};

use super::{AuthState, query_params};
use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::AuthorizationRequest;

/// GET /oauth/authorize handler.
pub async fn authorize_handler(
    State(state): State<AuthState>,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
    query: Result<Query<AuthorizationRequest>, QueryRejection>,
) -> AuthResult<Response> {
    ensure_utf8_query(raw.as_deref().unwrap_or_default())?;
    let params = query_params(query)?;

    let user = state.authenticator.authenticate(&headers).await?;
    let response = state
        .authorization
        .authorize(&params, user.as_ref())
        .await?;

    Ok(found(response.redirect_url().as_str()))
}

/// Rejects a query with a key or value that is not UTF-8 once
/// percent-decoded.
fn ensure_utf8_query(raw: &str) -> AuthResult<()> {
    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if urlencoding::decode(key).is_err() || urlencoding::decode(value).is_err() {
            return Err(AuthError::invalid_request(format!(
                "query parameter '{key}' is not valid UTF-8"
            )));
        }
    }
    Ok(())
}

/// `302 Found` with a `Location` header. axum's `Redirect` only offers
/// 303, 307 and 308.
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}
