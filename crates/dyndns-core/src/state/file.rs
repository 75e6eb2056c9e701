// # File State Store
//
// JSON cache file remembering the last IP written per record set.
//
// ## Crash Safety
//
// - Atomic writes: new content goes to `<path>.tmp`, then is renamed over
// - Backup: the previous file is copied to `<path>.backup` before each write
// - Recovery: an unparsable cache falls back to the backup, then to empty
//
// An empty cache only costs a DNS lookup, so recovery never fails a run.
//
// ## File Format
//
// ```json
// {
//   "version": "1",
//   "records": {
//     "home.example.com.": {
//       "last_ip": "203.0.113.7",
//       "record_type": "A",
//       "zone_id": "Z123",
//       "last_updated": "2026-01-09T12:00:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::state_store::{StateRecord, StateStore};

/// Cache file format version
const STATE_FILE_VERSION: &str = "1";

/// File-based cache store
///
/// # Example
///
/// ```rust,no_run
/// use dyndns_core::state::FileStateStore;
/// use dyndns_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/var/cache/dyndns53/state.json").await?;
///     let last = store.get_last_ip("home.example.com.").await?;
///     println!("{:?}", last);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    state: RwLock<FileState>,
}

#[derive(Debug, Default)]
struct FileState {
    records: BTreeMap<String, StateRecord>,
    dirty: bool,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct StateFileFormat {
    version: String,
    records: BTreeMap<String, StateRecord>,
}

/// Why a cache file could not be loaded
enum LoadError {
    /// Present but unparsable; recoverable from the backup
    Corrupt(Error),
    /// Could not be read at all
    Io(Error),
}

impl FileStateStore {
    /// Open (or create) a cache file
    ///
    /// Creates the parent directory if needed, loads the existing file, and
    /// falls back to the backup or an empty cache when the file is corrupt.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create cache directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let records = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: RwLock::new(FileState {
                records,
                dirty: false,
            }),
        })
    }

    /// Path of the cache file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_with_recovery(path: &Path) -> Result<BTreeMap<String, StateRecord>, Error> {
        let err = match Self::load(path).await {
            Ok(records) => {
                tracing::debug!("Loaded cache from {}: {} records", path.display(), records.len());
                return Ok(records);
            }
            Err(LoadError::Io(e)) => return Err(e),
            Err(LoadError::Corrupt(e)) => e,
        };

        tracing::warn!("Cache file appears corrupted: {}. Trying backup.", err);

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No cache backup found. Starting with empty cache.");
            return Ok(BTreeMap::new());
        }

        match Self::load(&backup_path).await {
            Ok(records) => {
                tracing::info!("Recovered cache from backup: {} records", records.len());
                if let Err(e) = fs::copy(&backup_path, path).await {
                    tracing::error!("Failed to restore cache file from backup: {}", e);
                }
                Ok(records)
            }
            Err(LoadError::Corrupt(e)) | Err(LoadError::Io(e)) => {
                tracing::error!("Cache backup unusable too: {}. Starting with empty cache.", e);
                Ok(BTreeMap::new())
            }
        }
    }

    async fn load(path: &Path) -> Result<BTreeMap<String, StateRecord>, LoadError> {
        if !path.exists() {
            tracing::debug!("Cache file does not exist: {}", path.display());
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            LoadError::Io(Error::state_store(format!(
                "Failed to read cache file {}: {}",
                path.display(),
                e
            )))
        })?;

        let file: StateFileFormat = serde_json::from_str(&content).map_err(|e| {
            LoadError::Corrupt(Error::state_store(format!(
                "Failed to parse cache file {}: {}",
                path.display(),
                e
            )))
        })?;

        if file.version != STATE_FILE_VERSION {
            tracing::warn!(
                "Cache file version mismatch: expected {}, got {}. Loading anyway.",
                STATE_FILE_VERSION,
                file.version
            );
        }

        Ok(file.records)
    }

    /// Write the cache atomically
    async fn write(&self) -> Result<(), Error> {
        let mut state = self.state.write().await;

        let file = StateFileFormat {
            version: STATE_FILE_VERSION.to_string(),
            records: state.records.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::state_store(format!("Failed to serialize cache: {}", e)))?;

        let temp_path = self.temp_path();
        let mut temp = fs::File::create(&temp_path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to create temp file {}: {}",
                temp_path.display(),
                e
            ))
        })?;
        temp.write_all(json.as_bytes()).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to write temp file {}: {}",
                temp_path.display(),
                e
            ))
        })?;
        temp.sync_all().await.map_err(|e| {
            Error::state_store(format!(
                "Failed to sync temp file {}: {}",
                temp_path.display(),
                e
            ))
        })?;
        drop(temp);

        if self.path.exists()
            && let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await
        {
            tracing::warn!("Failed to create cache backup: {}", e);
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        state.dirty = false;
        tracing::trace!("Cache written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        Self::with_suffix(&self.path, ".tmp")
    }

    fn backup_path(path: &Path) -> PathBuf {
        Self::with_suffix(path, ".backup")
    }

    /// `state.json` → `state.json<suffix>`
    fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get_record(&self, record_name: &str) -> Result<Option<StateRecord>, Error> {
        let state = self.state.read().await;
        Ok(state.records.get(record_name).cloned())
    }

    async fn set_record(&self, record_name: &str, record: &StateRecord) -> Result<(), Error> {
        {
            let mut state = self.state.write().await;
            state.records.insert(record_name.to_string(), record.clone());
            state.dirty = true;
        }

        // Written immediately; a run may be killed right after the upsert.
        self.write().await
    }

    async fn list_records(&self) -> Result<Vec<String>, Error> {
        let state = self.state.read().await;
        Ok(state.records.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        if self.state.read().await.dirty {
            self.write().await
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecordType;
    use std::net::IpAddr;
    use tempfile::tempdir;

    fn entry(ip: &str) -> StateRecord {
        StateRecord::new(ip.parse().unwrap(), RecordType::A, Some("Z123".to_string()))
    }

    #[tokio::test]
    async fn persists_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStateStore::new(&path).await.unwrap();
        assert!(store.list_records().await.unwrap().is_empty());

        store.set_record("home.example.com.", &entry("203.0.113.7")).await.unwrap();
        assert!(path.exists());

        let reopened = FileStateStore::new(&path).await.unwrap();
        let ip: IpAddr = "203.0.113.7".parse().unwrap();
        assert_eq!(reopened.get_last_ip("home.example.com.").await.unwrap(), Some(ip));
        let record = reopened.get_record("home.example.com.").await.unwrap().unwrap();
        assert_eq!(record.zone_id.as_deref(), Some("Z123"));
    }

    #[tokio::test]
    async fn creates_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("cache").join("state.json");

        let store = FileStateStore::new(&path).await.unwrap();
        store.set_record("home.example.com.", &entry("203.0.113.7")).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn recovers_previous_state_from_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStateStore::new(&path).await.unwrap();
        store.set_record("home.example.com.", &entry("203.0.113.7")).await.unwrap();
        store.set_record("home.example.com.", &entry("203.0.113.8")).await.unwrap();
        assert!(FileStateStore::backup_path(&path).exists());

        fs::write(&path, b"not json").await.unwrap();

        let recovered = FileStateStore::new(&path).await.unwrap();
        assert_eq!(
            recovered.get_last_ip("home.example.com.").await.unwrap(),
            Some("203.0.113.7".parse().unwrap())
        );
    }

    #[tokio::test]
    async fn corrupt_file_without_backup_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"{ broken").await.unwrap();

        let store = FileStateStore::new(&path).await.unwrap();
        assert!(store.list_records().await.unwrap().is_empty());
    }

    #[test]
    fn temp_and_backup_paths_append_a_suffix() {
        let store_path = Path::new("/var/cache/dyndns53/state.json");
        assert_eq!(
            FileStateStore::backup_path(store_path),
            PathBuf::from("/var/cache/dyndns53/state.json.backup")
        );

        let odd = Path::new("/var/cache/dyndns53/state.backup");
        assert_ne!(FileStateStore::backup_path(odd), odd);
        assert_ne!(FileStateStore::with_suffix(odd, ".tmp"), odd);
    }

    #[tokio::test]
    async fn cache_named_like_a_backup_survives_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.backup");

        let store = FileStateStore::new(&path).await.unwrap();
        store.set_record("home.example.com.", &entry("203.0.113.7")).await.unwrap();
        store.set_record("home.example.com.", &entry("203.0.113.8")).await.unwrap();

        let reopened = FileStateStore::new(&path).await.unwrap();
        assert_eq!(
            reopened.get_last_ip("home.example.com.").await.unwrap(),
            Some("203.0.113.8".parse().unwrap())
        );
    }

    #[tokio::test]
    async fn flush_without_changes_does_not_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStateStore::new(&path).await.unwrap();
        store.flush().await.unwrap();
        assert!(!path.exists());
    }
}
