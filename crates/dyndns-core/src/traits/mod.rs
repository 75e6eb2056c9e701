//! Core traits for the updater
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`IpSource`]: Discover the current public IP
//! - [`AddressResolver`]: Resolve what a record currently points at
//! - [`DnsProvider`]: Upsert DNS records via provider APIs
//! - [`StateStore`]: Local cache of the last IP written

pub mod ip_source;
pub mod resolver;
pub mod dns_provider;
pub mod state_store;

pub use ip_source::{IpSource, IpSourceFactory};
pub use resolver::AddressResolver;
pub use dns_provider::{DnsProvider, DnsProviderFactory, UpsertOutcome};
pub use state_store::{StateRecord, StateStore};
