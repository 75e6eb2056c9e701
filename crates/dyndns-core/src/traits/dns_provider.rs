// # DNS Provider Trait
//
// Defines the interface for upserting DNS records via provider APIs.
//
// ## Implementations
//
// - Route 53: `dyndns-provider-route53` crate
// - Cloudflare: `dyndns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use dyndns_core::{DnsProvider, RecordSet, RecordType};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//     let record = RecordSet::new("home.example.com.", RecordType::A).with_zone_id("Z123");
//
//     let outcome = provider
//         .upsert_record(&record, std::net::IpAddr::from([203, 0, 113, 7]), "dyndns53")
//         .await?;
//     println!("{}", outcome);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::fmt;
use std::net::IpAddr;

use crate::config::{ProviderConfig, RecordSet};

/// What the provider reported after an upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Provider change or record identifier, if the API returns one
    pub change_id: Option<String>,
    /// Provider status string (e.g. Route 53 "PENDING")
    pub status: String,
    /// Address the record held before, if the provider reported it
    pub previous_ip: Option<IpAddr>,
}

impl UpsertOutcome {
    /// Outcome with only a status
    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            change_id: None,
            status: status.into(),
            previous_ip: None,
        }
    }
}

impl fmt::Display for UpsertOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status: {}", self.status)?;
        if let Some(id) = &self.change_id {
            write!(f, ", change id: {}", id)?;
        }
        if let Some(ip) = &self.previous_ip {
            write!(f, ", previous: {}", ip)?;
        }
        Ok(())
    }
}

/// Trait for DNS provider implementations
///
/// Providers translate one upsert into their API's terms and report what the
/// API said. They are stateless and single-shot.
///
/// # Rules
///
/// - One logical change per `upsert_record()` call
/// - No retry logic or backoff; return the error
/// - No access to the local cache
/// - Never log credentials
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Create or replace the record so it holds exactly `ip`
    ///
    /// # Parameters
    ///
    /// - `record`: The record set (name, type, TTL, zone)
    /// - `ip`: The address the record should point at
    /// - `comment`: Change comment, for providers that keep one
    async fn upsert_record(
        &self,
        record: &RecordSet,
        ip: IpAddr,
        comment: &str,
    ) -> Result<UpsertOutcome, crate::Error>;

    /// Check whether this provider can manage the given record
    fn supports_record(&self, record: &RecordSet) -> bool;

    /// Provider name for logs (e.g. "route53", "cloudflare")
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
///
/// Construction is async because some SDKs load credentials on creation.
#[async_trait]
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    async fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>, crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_display_includes_known_fields() {
        let outcome = UpsertOutcome {
            change_id: Some("/change/C1".to_string()),
            status: "PENDING".to_string(),
            previous_ip: None,
        };
        assert_eq!(outcome.to_string(), "status: PENDING, change id: /change/C1");
        assert_eq!(UpsertOutcome::with_status("UNCHANGED").to_string(), "status: UNCHANGED");
    }
}
