//! Client storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::RegisteredClient;

/// Lookup of registered OAuth clients.
#[async_trait]
pub trait ClientStorage: Send + Sync {
    /// Finds a client by its OAuth `client_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<RegisteredClient>>;
}
