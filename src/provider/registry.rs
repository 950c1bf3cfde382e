//! Name to provider table owned by the application.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use super::Provider;
use crate::error::SessionError;
use crate::Result;

/// Registry of named providers.
///
/// There is no process-wide instance; build one where the application is
/// wired together and pass it to [`crate::session::SessionManager::use_registered`].
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn Provider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under `name`.
    ///
    /// Fails for an empty name or a name already taken.
    pub fn register(&self, name: impl Into<String>, provider: Arc<dyn Provider>) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(SessionError::InvalidProviderName);
        }

        let mut providers = self.providers.write().unwrap_or_else(|e| e.into_inner());
        if providers.contains_key(&name) {
            return Err(SessionError::ProviderAlreadyRegistered(name));
        }

        debug!(name = %name, backend = provider.name(), "Provider registered");
        providers.insert(name, provider);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .providers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}
