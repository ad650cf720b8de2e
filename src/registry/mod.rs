//! 提供商注册表：按配置构建适配器，构建后只读共享
//!
//! Provider registry. Built once from [`Settings`], then shared read-only
//! (behind an `Arc`) by every dispatch. Nothing can be added or removed
//! after construction, so lookups need no lock.

use std::sync::Arc;

use crate::config::{ProviderEntry, Settings};
use crate::providers::{create_adapter, ProviderAdapter};
use crate::types::{ProviderId, ProviderListing};

/// Configured adapters, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    adapters: Vec<(ProviderId, Arc<dyn ProviderAdapter>)>,
}

impl ProviderRegistry {
    /// Builds an adapter for every entry with a complete credential set.
    ///
    /// Incomplete entries are skipped (info); unknown ids, repeated ids and
    /// adapters that fail to construct are skipped (warn). Never fails.
    pub fn initialize(settings: &Settings) -> Self {
        let mut registry = Self::default();
        for entry in &settings.providers {
            registry.try_register(entry);
        }
        let ids: Vec<String> = registry.list().iter().map(ToString::to_string).collect();
        tracing::info!(providers = ?ids, "provider registry initialized");
        registry
    }

    fn try_register(&mut self, entry: &ProviderEntry) {
        let missing = entry.missing_credentials();
        if !missing.is_empty() {
            tracing::info!(provider = %entry.id, missing = ?missing, "provider not configured, skipping");
            return;
        }
        if self.contains(&entry.id) {
            tracing::warn!(provider = %entry.id, "duplicate provider entry ignored");
            return;
        }
        match create_adapter(entry) {
            Ok(Some(adapter)) => {
                tracing::info!(provider = %entry.id, name = %adapter.capabilities().name, "provider registered");
                self.adapters.push((entry.id.clone(), adapter));
            }
            Ok(None) => {
                tracing::warn!(provider = %entry.id, "unknown provider id, skipping");
            }
            Err(e) => {
                tracing::warn!(provider = %entry.id, error = %e, "provider adapter could not be built");
            }
        }
    }

    /// Registry over pre-built adapters, keyed by their own provider id.
    /// The first adapter wins when ids repeat.
    pub fn from_adapters<I>(adapters: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn ProviderAdapter>>,
    {
        let mut registry = Self::default();
        for adapter in adapters {
            let id = adapter.provider_id().clone();
            if registry.contains(&id) {
                tracing::warn!(provider = %id, "duplicate provider adapter ignored");
                continue;
            }
            registry.adapters.push((id, adapter));
        }
        registry
    }

    pub fn get(&self, id: &ProviderId) -> Option<&Arc<dyn ProviderAdapter>> {
        self.adapters
            .iter()
            .find(|(key, _)| key == id)
            .map(|(_, adapter)| adapter)
    }

    pub fn contains(&self, id: &ProviderId) -> bool {
        self.get(id).is_some()
    }

    /// Registered ids, in insertion order.
    pub fn list(&self) -> Vec<ProviderId> {
        self.adapters.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Descriptor of every registered provider, marked available.
    pub fn all_capabilities(&self) -> Vec<ProviderListing> {
        self.adapters
            .iter()
            .map(|(_, adapter)| ProviderListing::from(adapter.capabilities()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
