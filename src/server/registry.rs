//! Registry of the resources a server exposes

use crate::core::error::{ConfigError, ResourceError};
use crate::core::service::ResourceFetcher;
use indexmap::IndexMap;
use std::sync::Arc;

/// Resources by route name, in registration order
#[derive(Default, Clone)]
pub struct ResourceRegistry {
    fetchers: IndexMap<String, Arc<dyn ResourceFetcher>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fetcher under its schema name; names must be unique
    pub fn register(&mut self, fetcher: Arc<dyn ResourceFetcher>) -> Result<(), ConfigError> {
        let name = fetcher.schema().name.clone();
        if self.fetchers.contains_key(&name) {
            return Err(ConfigError::Invalid {
                key: format!("resources.{}", name),
                message: "resource is declared twice".to_string(),
            });
        }
        self.fetchers.insert(name, fetcher);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn ResourceFetcher>, ResourceError> {
        self.fetchers
            .get(name)
            .ok_or_else(|| ResourceError::UnknownResource {
                resource: name.to_string(),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.fetchers.keys().map(|s| s.as_str()).collect()
    }

    pub fn fetchers(&self) -> impl Iterator<Item = &Arc<dyn ResourceFetcher>> {
        self.fetchers.values()
    }

    pub fn len(&self) -> usize {
        self.fetchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }
}
