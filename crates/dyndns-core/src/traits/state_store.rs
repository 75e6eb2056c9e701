// # State Store Trait
//
// Defines the interface for the local cache of written addresses.
//
// ## Purpose
//
// The cache remembers the last IP this tool successfully wrote for a record,
// so a run can skip both the DNS lookup and the upsert when nothing changed.
// It also survives resolver caching: right after an upsert, DNS may still
// answer with the old address for up to a TTL.
//
// ## Implementations
//
// - File-based: JSON file with atomic writes
// - Memory: tests and library use
//
// ## Usage
//
// ```rust,ignore
// use dyndns_core::StateStore;
//
// let store = /* StateStore implementation */;
// if store.get_last_ip("home.example.com.").await? == Some(current_ip) {
//     return Ok(());
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;

use crate::config::RecordType;

/// Cache entry for a record set
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StateRecord {
    /// The last IP written
    pub last_ip: IpAddr,
    /// Record type the IP was written as
    pub record_type: RecordType,
    /// Zone the record lives in, if known
    #[serde(default)]
    pub zone_id: Option<String>,
    /// Timestamp of the write
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl StateRecord {
    /// Create a new cache entry stamped with the current time
    ///
    /// # Visibility
    ///
    /// `pub(crate)`: entries are only created by the engine after a
    /// successful upsert.
    pub(crate) fn new(last_ip: IpAddr, record_type: RecordType, zone_id: Option<String>) -> Self {
        Self {
            last_ip,
            record_type,
            zone_id,
            last_updated: chrono::Utc::now(),
        }
    }

    /// Check if the entry is older than the given duration
    pub fn is_stale(&self, max_age: chrono::Duration) -> bool {
        let now = chrono::Utc::now();
        now.signed_duration_since(self.last_updated) > max_age
    }
}

/// Trait for state store implementations
///
/// Keys are fully qualified record names (with the trailing dot).
///
/// # Implementation Guidelines
///
/// - **Async I/O only**: never block the runtime
/// - **Durable writes**: `set_record()` must be persisted before `flush()` returns
/// - **Corruption tolerant**: an unreadable cache must not stop a run; treat
///   it as empty and log
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get the last written IP for a record
    ///
    /// - `Ok(Some(IpAddr))`: cached IP
    /// - `Ok(None)`: no entry
    /// - `Err(Error)`: storage error
    async fn get_last_ip(&self, record_name: &str) -> Result<Option<IpAddr>, crate::Error> {
        Ok(self.get_record(record_name).await?.map(|r| r.last_ip))
    }

    /// Get the full cache entry
    async fn get_record(&self, record_name: &str) -> Result<Option<StateRecord>, crate::Error>;

    /// Create or replace the cache entry for a record
    async fn set_record(&self, record_name: &str, record: &StateRecord)
    -> Result<(), crate::Error>;

    /// List all record names in the store
    async fn list_records(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
