// # dyndns-core
//
// Core library for the single-shot dynamic DNS updater.
//
// ## Architecture Overview
//
// One run of the updater is a short pipeline:
// - **IpSource**: Reports the caller's current public IP
// - **AddressResolver**: Resolves what the record currently points at
// - **StateStore**: Optional local cache of the last IP written
// - **DnsProvider**: Upserts the record through the provider's API
// - **DdnsEngine**: Runs the pipeline once and reports the outcome
// - **ProviderRegistry**: Builds providers and IP sources from configuration
//
// ## Design Principles
//
// 1. **Single-shot**: Each invocation performs at most one upsert, then exits
// 2. **Plugin-Based**: Providers are registered by name, no hard-coded if-else
// 3. **Library-First**: The binary is a thin wrapper around `DdnsEngine`
// 4. **No retries**: Failures propagate; the scheduler invoking us is the retry loop

pub mod traits;
pub mod engine;
pub mod registry;
pub mod config;
pub mod error;
pub mod resolver;
pub mod state;

// Re-export core types for convenience
pub use traits::{AddressResolver, DnsProvider, IpSource, StateStore};
pub use engine::{DdnsEngine, SyncOutcome};
pub use registry::ProviderRegistry;
pub use config::{DdnsConfig, IpSourceConfig, ProviderConfig, RecordSet, RecordType};
pub use error::{Error, Result};
pub use resolver::SystemResolver;
pub use state::{FileStateStore, MemoryStateStore};
