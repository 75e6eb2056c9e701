//! Plugin-based provider registry
//!
//! The registry maps type names from configuration to factories, so the
//! binary never hard-codes which providers or IP sources exist.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dyndns_core::ProviderRegistry;
//!
//! let registry = ProviderRegistry::new();
//! dyndns_provider_route53::register(&registry);
//! dyndns_ip_http::register(&registry);
//!
//! let provider = registry.create_provider(&config.provider).await?;
//! let source = registry.create_ip_source(&config.ip_source, IpVersion::V4)?;
//! ```

use crate::config::{IpSourceConfig, IpVersion, ProviderConfig};
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, DnsProviderFactory, IpSource, IpSourceFactory};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Registry of DNS provider and IP source factories
///
/// Registration takes `&self`; maps are behind `RwLock`s.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn DnsProviderFactory>>>,
    ip_sources: RwLock<HashMap<String, Arc<dyn IpSourceFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS provider factory under a type name (e.g. "route53")
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::from(factory));
    }

    /// Register an IP source factory under a type name (e.g. "http")
    pub fn register_ip_source(&self, name: impl Into<String>, factory: Box<dyn IpSourceFactory>) {
        self.ip_sources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::from(factory));
    }

    /// Create a DNS provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DnsProvider>)`: Created provider
    /// - `Err(Error)`: Unknown provider type, or the factory failed
    pub async fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        let provider_type = config.type_name();

        // Clone the factory out so the lock is not held across the await.
        let factory = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(provider_type)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config).await
    }

    /// Create an IP source from configuration
    ///
    /// `version` is the address family the managed record needs.
    pub fn create_ip_source(
        &self,
        config: &IpSourceConfig,
        version: IpVersion,
    ) -> Result<Box<dyn IpSource>> {
        let source_type = config.type_name();
        let sources = self.ip_sources.read().unwrap_or_else(PoisonError::into_inner);

        let factory = sources
            .get(source_type)
            .ok_or_else(|| Error::config(format!("Unknown IP source type: {}", source_type)))?;

        factory.create(config, version)
    }

    /// List registered provider types, sorted
    pub fn list_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Check if an IP source type is registered
    pub fn has_ip_source(&self, name: &str) -> bool {
        self.ip_sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}
