// # Address Resolver Trait
//
// Answers "what does this name resolve to right now?" so a run can skip the
// upsert when the record is already current.

use async_trait::async_trait;
use std::net::IpAddr;

/// Trait for name resolution
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Resolve a domain name (without trailing dot) to all of its addresses
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<IpAddr>)`: Every address the name resolves to
    /// - `Err(Error)`: The lookup failed, including "no such name"
    async fn lookup(&self, domain: &str) -> Result<Vec<IpAddr>, crate::Error>;
}
