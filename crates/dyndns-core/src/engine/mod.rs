//! Single-shot sync engine
//!
//! The DdnsEngine runs one pass of the update pipeline:
//! - Fetch the current public IP from the IpSource
//! - Compare against the cache, then against what the name resolves to
//! - Upsert the record via the DnsProvider when they differ
//! - Record the written IP in the cache
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐   current()   ┌──────────────┐
//! │  IpSource   │──────────────▶│  DdnsEngine  │
//! └─────────────┘               └──────────────┘
//!                                      │
//!         ┌────────────────────────────┼────────────────────────────┐
//!         ▼                            ▼                            ▼
//! ┌─────────────┐           ┌──────────────────┐           ┌─────────────┐
//! │ StateStore  │           │ AddressResolver  │           │ DnsProvider │
//! │ (cache)     │           │ (already set?)   │           │ (upsert)    │
//! └─────────────┘           └──────────────────┘           └─────────────┘
//! ```
//!
//! There is no loop and no retry. Scheduling repeated runs is the caller's job.

use std::fmt;
use std::net::IpAddr;

use tracing::{debug, info, warn};

use crate::config::{DdnsConfig, EngineConfig, RecordSet};
use crate::error::{Error, Result};
use crate::resolver::domain_resolves_to;
use crate::traits::{AddressResolver, DnsProvider, IpSource, StateRecord, StateStore, UpsertOutcome};

/// Where the "already current" answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonSource {
    /// Local cache file
    Cache,
    /// DNS lookup of the record name
    Dns,
}

impl fmt::Display for ComparisonSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonSource::Cache => f.write_str("cache"),
            ComparisonSource::Dns => f.write_str("dns"),
        }
    }
}

/// Result of one engine run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The record already holds the current IP; nothing was sent
    Unchanged {
        /// The current IP
        ip: IpAddr,
        /// What confirmed it
        source: ComparisonSource,
    },

    /// Dry run: an upsert would have been sent
    DryRun {
        /// The IP that would have been written
        ip: IpAddr,
    },

    /// The record was upserted
    Updated {
        /// The IP written
        ip: IpAddr,
        /// What the provider reported
        outcome: UpsertOutcome,
    },
}

/// Single-shot DNS sync engine
///
/// ## Lifecycle
///
/// 1. Create with [`DdnsEngine::new()`]
/// 2. Call [`DdnsEngine::run_once()`]
/// 3. Drop
pub struct DdnsEngine {
    ip_source: Box<dyn IpSource>,
    provider: Box<dyn DnsProvider>,
    resolver: Box<dyn AddressResolver>,
    state_store: Option<Box<dyn StateStore>>,
    record: RecordSet,
    settings: EngineConfig,
}

impl DdnsEngine {
    /// Create a new engine
    ///
    /// # Parameters
    ///
    /// - `ip_source`: Where the current IP comes from
    /// - `provider`: DNS provider performing the upsert
    /// - `resolver`: Resolver used to check the record's current value
    /// - `state_store`: Optional local cache
    /// - `config`: Validated before use
    pub fn new(
        ip_source: Box<dyn IpSource>,
        provider: Box<dyn DnsProvider>,
        resolver: Box<dyn AddressResolver>,
        state_store: Option<Box<dyn StateStore>>,
        config: DdnsConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            ip_source,
            provider,
            resolver,
            state_store,
            record: config.record,
            settings: config.engine,
        })
    }

    /// The record set this engine manages
    pub fn record(&self) -> &RecordSet {
        &self.record
    }

    /// Run the pipeline once
    ///
    /// # Returns
    ///
    /// - `Ok(SyncOutcome)`: what happened
    /// - `Err(Error)`: IP lookup, provider or cache failure; nothing is retried
    pub async fn run_once(&self) -> Result<SyncOutcome> {
        let record = &self.record;

        let ip = self.ip_source.current().await?;
        info!("Current public IP: {}", ip);

        if !record.record_type.matches(&ip) {
            return Err(Error::invalid_input(format!(
                "current IP {} cannot be stored in a {} record",
                ip, record.record_type
            )));
        }

        if self.settings.force {
            info!("Forced update, skipping comparison");
        } else if let Some(source) = self.already_current(ip).await? {
            info!(
                "{} already resolves to {}; nothing to do (checked: {})",
                record.domain(),
                ip,
                source
            );
            return Ok(SyncOutcome::Unchanged { ip, source });
        }

        if !self.provider.supports_record(record) {
            return Err(Error::dns_provider(format!(
                "provider {} cannot manage record {}",
                self.provider.provider_name(),
                record.name
            )));
        }

        if self.settings.dry_run {
            info!(
                "[DRY-RUN] Would upsert {} {} {} (ttl {}) via {}",
                record.name,
                record.record_type,
                ip,
                record.ttl,
                self.provider.provider_name()
            );
            return Ok(SyncOutcome::DryRun { ip });
        }

        info!(
            "Upserting {} {} -> {} via {}",
            record.name,
            record.record_type,
            ip,
            self.provider.provider_name()
        );
        let outcome = self
            .provider
            .upsert_record(record, ip, self.settings.comment())
            .await?;
        info!("Upsert accepted: {}", outcome);

        self.remember(ip).await;

        Ok(SyncOutcome::Updated { ip, outcome })
    }

    /// Check the cache, then DNS, for the current IP
    async fn already_current(&self, ip: IpAddr) -> Result<Option<ComparisonSource>> {
        if let Some(store) = &self.state_store {
            match store.get_record(&self.record.name).await? {
                Some(entry) if self.cache_entry_usable(&entry) => {
                    if entry.last_ip == ip {
                        return Ok(Some(ComparisonSource::Cache));
                    }
                    debug!("Cache holds {} for {}, checking DNS", entry.last_ip, self.record.name);
                }
                Some(_) => debug!("Cache entry for {} ignored", self.record.name),
                None => debug!("No cache entry for {}", self.record.name),
            }
        }

        if domain_resolves_to(self.resolver.as_ref(), self.record.domain(), ip).await {
            // Resync the cache with what DNS already says; a dry run writes nothing.
            if !self.settings.dry_run {
                self.remember(ip).await;
            }
            return Ok(Some(ComparisonSource::Dns));
        }

        Ok(None)
    }

    fn cache_entry_usable(&self, entry: &StateRecord) -> bool {
        if entry.record_type != self.record.record_type || entry.zone_id != self.record.zone_id {
            return false;
        }
        match self.settings.cache_max_age_secs {
            Some(max_age) => {
                let max_age = i64::try_from(max_age)
                    .ok()
                    .and_then(chrono::Duration::try_seconds)
                    .unwrap_or(chrono::Duration::MAX);
                !entry.is_stale(max_age)
            }
            None => true,
        }
    }

    /// Record the written IP in the cache, if one is configured
    ///
    /// Failures are logged, not returned: by this point DNS already holds
    /// the right address and the next run will fall back to a lookup.
    async fn remember(&self, ip: IpAddr) {
        let Some(store) = &self.state_store else {
            return;
        };

        let entry = StateRecord::new(ip, self.record.record_type, self.record.zone_id.clone());
        let result = match store.set_record(&self.record.name, &entry).await {
            Ok(()) => store.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("Failed to update cache for {}: {}", self.record.name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_source_display() {
        assert_eq!(ComparisonSource::Cache.to_string(), "cache");
        assert_eq!(ComparisonSource::Dns.to_string(), "dns");
    }
}
