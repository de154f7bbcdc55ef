//! In-memory storage backends.
//!
//! Used by the server binary and tests. State is lost on restart, which is
//! acceptable for ten-minute authorization codes on a single node.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;

use super::client::ClientStorage;
use super::code::AuthorizationCodeStorage;
use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::code::AuthorizationCode;
use crate::types::RegisteredClient;

/// Authorization code store backed by a concurrent hash map.
///
/// `consume` runs under the shard write lock of the code's entry, so the
/// consumed check and the mark happen atomically.
#[derive(Debug, Default)]
pub struct InMemoryCodeStorage {
    codes: DashMap<String, AuthorizationCode>,
}

impl InMemoryCodeStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored codes, including consumed ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Returns `true` if no codes are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

#[async_trait]
impl AuthorizationCodeStorage for InMemoryCodeStorage {
    async fn create(&self, code: &AuthorizationCode) -> AuthResult<()> {
        match self.codes.entry(code.code.clone()) {
            Entry::Occupied(_) => Err(AuthError::storage("authorization code collision")),
            Entry::Vacant(slot) => {
                slot.insert(code.clone());
                Ok(())
            }
        }
    }

    async fn find(&self, code: &str) -> AuthResult<Option<AuthorizationCode>> {
        Ok(self.codes.get(code).map(|entry| entry.value().clone()))
    }

    async fn consume(&self, code: &str) -> AuthResult<AuthorizationCode> {
        let mut entry = self
            .codes
            .get_mut(code)
            .ok_or_else(|| AuthError::invalid_request("unknown authorization code"))?;

        let now = OffsetDateTime::now_utc();
        if entry.is_consumed() {
            tracing::warn!(client_id = %entry.client_id, "authorization code replay rejected");
            return Err(AuthError::invalid_request("authorization code already used"));
        }
        if entry.is_expired_at(now) {
            return Err(AuthError::invalid_request("authorization code expired"));
        }

        entry.consumed_at = Some(now);
        Ok(entry.value().clone())
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let now = OffsetDateTime::now_utc();
        let mut removed = 0u64;
        self.codes.retain(|_, code| {
            let keep = !code.is_expired_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}

/// Client registry held in memory, typically loaded from configuration.
#[derive(Debug, Default)]
pub struct InMemoryClientStorage {
    clients: DashMap<String, RegisteredClient>,
}

impl InMemoryClientStorage {
    /// Creates a store holding `clients`.
    #[must_use]
    pub fn from_clients(clients: impl IntoIterator<Item = RegisteredClient>) -> Self {
        let storage = Self::default();
        for client in clients {
            storage.insert(client);
        }
        storage
    }

    /// Adds or replaces a client.
    pub fn insert(&self, client: RegisteredClient) {
        self.clients.insert(client.client_id.clone(), client);
    }
}

#[async_trait]
impl ClientStorage for InMemoryClientStorage {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<RegisteredClient>> {
        Ok(self.clients.get(client_id).map(|c| c.value().clone()))
    }
}
