//! Provider registry -- a named collection of available LLM providers.
//!
//! Lets callers route a [`super::GenerationConfig::provider`] name to a
//! concrete provider at runtime and ask whether it can see images.

use std::collections::HashMap;
use std::sync::Arc;

use super::trait_def::LlmProvider;

/// A collection of registered [`LlmProvider`] implementations, keyed by name.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under [`LlmProvider::name`].
    ///
    /// Replaces and returns any provider already registered under that name.
    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) -> Option<Arc<dyn LlmProvider>> {
        let name = provider.name().to_string();
        self.providers.insert(name, provider)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(name).cloned()
    }

    /// `false` for unknown providers.
    pub fn supports_vision(&self, name: &str) -> bool {
        self.providers
            .get(name)
            .is_some_and(|p| p.supports_vision())
    }

    /// Names of all registered providers, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.list())
            .finish()
    }
}
