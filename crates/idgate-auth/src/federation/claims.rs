//! ID token signature verification and generic claim validation.

use std::collections::HashSet;
use std::time::Duration;

use jsonwebtoken::{Validation, decode_header};
use time::OffsetDateTime;
use url::Url;

use super::jwks::{JwksCache, JwksError};
use super::provider::IdentityProvider;
use super::types::IdTokenClaims;
use crate::AuthResult;
use crate::error::AuthError;

/// Current time as a Unix timestamp.
#[must_use]
pub fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Runs the provider-independent OIDC checks in order: issuer, audience,
/// expiry, issued-at.
///
/// `exp` must be strictly in the future. `iat` may be at most `clock_skew`
/// ahead of `now`.
///
/// # Errors
///
/// Returns `AuthError::InvalidIdToken` naming the first violated claim.
pub fn validate_standard_claims(
    claims: &IdTokenClaims,
    expected_issuers: &[&str],
    client_id: &str,
    clock_skew: Duration,
    now: i64,
) -> AuthResult<()> {
    if !expected_issuers.contains(&claims.iss.as_str()) {
        return Err(AuthError::invalid_id_token(format!(
            "unexpected issuer '{}'",
            claims.iss
        )));
    }

    if !claims.aud.iter().any(|aud| aud == client_id) {
        return Err(AuthError::invalid_id_token(
            "audience does not contain the client id",
        ));
    }

    if claims.exp <= now {
        return Err(AuthError::invalid_id_token("token has expired"));
    }

    let skew = i64::try_from(clock_skew.as_secs()).unwrap_or(i64::MAX);
    if claims.iat > now.saturating_add(skew) {
        return Err(AuthError::invalid_id_token("token issued in the future"));
    }

    Ok(())
}

/// Verifies the signature of `id_token` with a key from `jwks_uri`, then
/// runs the provider's claim validation.
///
/// Only the signature is checked by `jsonwebtoken`; every claim rule goes
/// through [`IdentityProvider::validate_id_token_claims`] so that the
/// generic-then-provider ordering holds.
///
/// # Errors
///
/// - `InvalidIdToken` for malformed tokens, unknown keys, bad signatures
///   and claim violations
/// - `TokenExchangeFailure` when the JWKS cannot be fetched
/// - `DomainNotAllowed` / `EmailNotVerified` from provider extensions
pub async fn verify_id_token(
    provider: &dyn IdentityProvider,
    jwks: &JwksCache,
    jwks_uri: &Url,
    id_token: &str,
) -> AuthResult<IdTokenClaims> {
    let header = decode_header(id_token)
        .map_err(|e| AuthError::invalid_id_token(format!("malformed token: {e}")))?;

    let candidates = match header.kid.as_deref() {
        Some(kid) => vec![
            jwks.get_key(jwks_uri, kid)
                .await
                .map_err(|e| jwks_error(provider.name(), e))?,
        ],
        None => jwks
            .find_signing_keys(jwks_uri)
            .await
            .map_err(|e| jwks_error(provider.name(), e))?,
    };

    let mut last_error = None;
    for (key, key_alg) in candidates {
        if let Some(alg) = key_alg
            && alg != header.alg
        {
            last_error = Some(format!(
                "token algorithm {:?} does not match key algorithm {alg:?}",
                header.alg
            ));
            continue;
        }

        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        match jsonwebtoken::decode::<IdTokenClaims>(id_token, &key, &validation) {
            Ok(data) => {
                provider.validate_id_token_claims(&data.claims)?;
                tracing::debug!(
                    provider = provider.name(),
                    issuer = %data.claims.iss,
                    "ID token verified"
                );
                return Ok(data.claims);
            }
            Err(e) => last_error = Some(e.to_string()),
        }
    }

    Err(AuthError::invalid_id_token(format!(
        "signature verification failed: {}",
        last_error.unwrap_or_else(|| "no usable key".to_string())
    )))
}

fn jwks_error(provider: &str, err: JwksError) -> AuthError {
    match err {
        JwksError::KeyNotFound(_) | JwksError::NoSigningKeys | JwksError::InvalidKey(_) => {
            AuthError::invalid_id_token(err.to_string())
        }
        other => {
            tracing::warn!(provider, error = %other, "JWKS unavailable");
            AuthError::token_exchange(provider, format!("JWKS unavailable: {other}"))
        }
    }
}
