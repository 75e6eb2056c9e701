//! Name resolution through the operating system resolver
//!
//! Used to decide whether the record already points at the current IP.

use async_trait::async_trait;
use std::net::IpAddr;
use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::AddressResolver;

/// Resolver backed by the system's `getaddrinfo`
///
/// Answers come from whatever the host is configured to use, including its
/// caches, so a freshly upserted record may still resolve to the old address.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl SystemResolver {
    /// Create a system resolver
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AddressResolver for SystemResolver {
    async fn lookup(&self, domain: &str) -> Result<Vec<IpAddr>> {
        // Port is required by the API and otherwise ignored.
        let addrs = tokio::net::lookup_host((domain, 0))
            .await
            .map_err(|e| Error::resolve(format!("{}: {}", domain, e)))?;

        let mut ips: Vec<IpAddr> = Vec::new();
        for addr in addrs {
            if !ips.contains(&addr.ip()) {
                ips.push(addr.ip());
            }
        }
        Ok(ips)
    }
}

/// Whether `domain` currently resolves to `ip`
///
/// A failed lookup counts as "does not resolve": the usual cause is a record
/// that has not been created yet, and the upsert will create it.
pub async fn domain_resolves_to(resolver: &dyn AddressResolver, domain: &str, ip: IpAddr) -> bool {
    match resolver.lookup(domain).await {
        Ok(ips) => {
            debug!("{} resolves to {:?}", domain, ips);
            ips.contains(&ip)
        }
        Err(e) => {
            debug!("Lookup of {} failed, treating as unresolved: {}", domain, e);
            false
        }
    }
}
