//! Provider registry.
//!
//! Maps lowercase provider names to factories. A registry is assembled at
//! startup, published once with [`init`], and only read afterwards.

use std::fmt;
use std::sync::{Arc, OnceLock};

use super::provider::{IdentityProvider, ProviderConfig};
use super::{github, google};
use crate::AuthResult;
use crate::error::AuthError;

/// Constructor for a provider instance.
pub type ProviderFactory =
    Arc<dyn Fn(ProviderConfig) -> AuthResult<Arc<dyn IdentityProvider>> + Send + Sync>;

/// Ordered name-to-factory mapping.
#[derive(Default)]
pub struct ProviderRegistry {
    entries: Vec<(String, ProviderFactory)>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with `google` and `github` registered.
    ///
    /// # Errors
    ///
    /// Never fails in practice; registration errors are propagated.
    pub fn with_builtin() -> AuthResult<Self> {
        let mut registry = Self::new();
        registry.register(google::NAME, |config| {
            Ok(Arc::new(google::GoogleProvider::new(config)?) as Arc<dyn IdentityProvider>)
        })?;
        registry.register(github::NAME, |config| {
            Ok(Arc::new(github::GithubProvider::new(config)?) as Arc<dyn IdentityProvider>)
        })?;
        Ok(registry)
    }

    /// Registers `factory` under the lowercased `name`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the name is empty or already
    /// registered.
    pub fn register<F>(&mut self, name: &str, factory: F) -> AuthResult<()>
    where
        F: Fn(ProviderConfig) -> AuthResult<Arc<dyn IdentityProvider>> + Send + Sync + 'static,
    {
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() {
            return Err(AuthError::configuration("provider name must not be empty"));
        }
        if self.contains(&name) {
            return Err(AuthError::configuration(format!(
                "provider '{name}' is already registered"
            )));
        }

        tracing::debug!(provider = %name, "registered identity provider");
        let factory: ProviderFactory = Arc::new(factory);
        self.entries.push((name, factory));
        Ok(())
    }

    /// Instantiates the provider registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnsupportedProvider` for unknown names, or the
    /// factory's own error.
    pub fn create(&self, name: &str, config: ProviderConfig) -> AuthResult<Arc<dyn IdentityProvider>> {
        let name = name.trim().to_ascii_lowercase();
        let factory = self
            .entries
            .iter()
            .find(|(registered, _)| *registered == name)
            .map(|(_, factory)| Arc::clone(factory))
            .ok_or_else(|| AuthError::unsupported_provider(name.as_str()))?;
        factory(config)
    }

    /// Returns `true` if `name` is registered (case-insensitive).
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|(registered, _)| registered.eq_ignore_ascii_case(name))
    }

    /// Registered names in registration order.
    #[must_use]
    pub fn list_registered(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.list_registered())
            .finish()
    }
}

static GLOBAL: OnceLock<ProviderRegistry> = OnceLock::new();

/// Publishes the process-wide registry. Call once at startup.
///
/// # Errors
///
/// Returns `AuthError::Configuration` if a registry was already published.
pub fn init(registry: ProviderRegistry) -> AuthResult<&'static ProviderRegistry> {
    GLOBAL
        .set(registry)
        .map_err(|_| AuthError::configuration("provider registry already initialized"))?;
    global()
}

/// Returns the process-wide registry.
///
/// # Errors
///
/// Returns `AuthError::Configuration` if [`init`] has not run.
pub fn global() -> AuthResult<&'static ProviderRegistry> {
    GLOBAL
        .get()
        .ok_or_else(|| AuthError::configuration("provider registry not initialized"))
}
