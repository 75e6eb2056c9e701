// # State Store Implementations
//
// Local caches of the last IP written per record set.

pub mod file;
pub mod memory;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;

use crate::config::StateStoreConfig;
use crate::error::Result;
use crate::traits::StateStore;

/// Open the cache described by the configuration
///
/// Returns `None` when caching is disabled.
pub async fn open(config: &StateStoreConfig) -> Result<Option<Box<dyn StateStore>>> {
    match config {
        StateStoreConfig::None => Ok(None),
        StateStoreConfig::File { path } => Ok(Some(Box::new(FileStateStore::new(path).await?))),
        StateStoreConfig::Memory => Ok(Some(Box::new(MemoryStateStore::new()))),
    }
}
