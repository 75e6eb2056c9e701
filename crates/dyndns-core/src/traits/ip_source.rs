// # IP Source Trait
//
// Defines the interface for discovering the caller's current public IP.
//
// ## Implementations
//
// - HTTP "what is my IP" endpoint: `dyndns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use dyndns_core::IpSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* IpSource implementation */;
//     let current_ip = source.current().await?;
//     println!("public address: {}", current_ip);
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;

use crate::config::IpVersion;

/// Trait for IP source implementations
///
/// An IP source answers one question per run: what address does the rest of
/// the internet see us as? It makes no decisions about DNS.
///
/// # Rules
///
/// - One lookup per `current()` call, no retries (a failed run is retried by
///   whoever schedules the next one)
/// - No caching across calls
/// - No background tasks
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Get the current public IP address
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: The current IP address
    /// - `Err(Error)`: If the address could not be determined
    async fn current(&self) -> Result<IpAddr, crate::Error>;

    /// Which address family this source reports
    ///
    /// Sources that may return either family report `IpVersion::Both`.
    fn version(&self) -> IpVersion {
        IpVersion::Both
    }
}

/// Helper trait for constructing IP sources from configuration
pub trait IpSourceFactory: Send + Sync {
    /// Create an IpSource instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this IP source type
    /// - `version`: Address family the managed record needs
    fn create(
        &self,
        config: &crate::config::IpSourceConfig,
        version: IpVersion,
    ) -> Result<Box<dyn IpSource>, crate::Error>;
}
