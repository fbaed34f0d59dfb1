pub mod mock;
pub mod ollama;
pub mod openrouter;

use std::collections::HashMap;
use std::sync::Arc;

use crate::llm::LlmProvider;

/// Named LLM providers available to an `LlmGateway`.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Providers matching `names`, in the order given. Unknown names are skipped.
    pub fn get_providers(&self, names: &[String]) -> Vec<Arc<dyn LlmProvider>> {
        names
            .iter()
            .filter_map(|name| self.providers.get(name).cloned())
            .collect()
    }

    /// Registered provider names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
