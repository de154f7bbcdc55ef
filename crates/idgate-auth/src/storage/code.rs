//! Authorization code storage trait.
//!
//! Implementations must make [`AuthorizationCodeStorage::consume`] a single
//! atomic check-and-mark: of two concurrent redemptions of one code,
//! exactly one succeeds.
//!
//! Codes are bearer secrets. Implementations must not log them.

use async_trait::async_trait;

use crate::AuthResult;
use crate::oauth::code::AuthorizationCode;

/// Storage for issued authorization codes.
#[async_trait]
pub trait AuthorizationCodeStorage: Send + Sync {
    /// Persists a newly issued code.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the code already exists or the
    /// backend is unavailable.
    async fn create(&self, code: &AuthorizationCode) -> AuthResult<()>;

    /// Finds a code regardless of its consumed/expired status.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find(&self, code: &str) -> AuthResult<Option<AuthorizationCode>>;

    /// Marks a code as consumed and returns it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRequest` if the code is unknown, already
    /// consumed or expired, or `AuthError::Storage` on backend failure.
    ///
    /// # Atomicity
    ///
    /// A SQL backend would use a conditional update:
    ///
    /// ```sql
    /// UPDATE authorization_codes
    /// SET consumed_at = NOW()
    /// WHERE code = $1 AND consumed_at IS NULL AND expires_at > NOW()
    /// RETURNING *
    /// ```
    async fn consume(&self, code: &str) -> AuthResult<AuthorizationCode>;

    /// Deletes expired codes and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
