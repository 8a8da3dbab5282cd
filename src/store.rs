//! Durable string key-value storage for one player profile.
//!
//! The core never touches disk (or the browser-equivalent) directly; every
//! component receives a [`ProfileStore`] capability instead. [`MemoryStore`]
//! backs tests and throwaway profiles, [`FileStore`] keeps the whole key
//! space in a single TOML document written atomically on every mutation.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::app_dirs;

/// Well-known keys and namespaces of the profile key space.
///
/// Store keys: `profile.skill_level`, `profile.api_credential`,
/// `profile.api_setup_done`, `profile.auth_state`, `profile.auth_user`,
/// `goals`, `matches.recent`, `stats.player`, `auth.users`, plus one
/// `datasource-<name>` entry per uploaded data file.
pub mod keys {
    pub const SKILL_LEVEL: &str = "profile.skill_level";
    pub const API_CREDENTIAL: &str = "profile.api_credential";
    pub const API_SETUP_DONE: &str = "profile.api_setup_done";
    pub const AUTH_STATE: &str = "profile.auth_state";
    pub const AUTH_USER: &str = "profile.auth_user";
    pub const GOALS: &str = "goals";
    pub const RECENT_MATCHES: &str = "matches.recent";
    pub const PLAYER_STATS: &str = "stats.player";
    pub const USERS: &str = "auth.users";
    /// Prefix for uploaded data files; the remainder of the key is the file name.
    pub const DATA_FILE_PREFIX: &str = "datasource-";

    /// Fixed keys removed by a full reset.
    pub(crate) const RESET_KEYS: &[&str] = &[
        SKILL_LEVEL,
        API_CREDENTIAL,
        API_SETUP_DONE,
        AUTH_STATE,
        AUTH_USER,
        GOALS,
        RECENT_MATCHES,
        PLAYER_STATS,
        USERS,
    ];

    /// Prefixes whose every key is removed by a full reset.
    pub(crate) const RESET_PREFIXES: &[&str] = &[DATA_FILE_PREFIX];
}

/// Errors that may occur while reading or writing the profile store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unable to create store directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid profile data at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize profile data for {path}: {source}")]
    Serialize {
        path: PathBuf,
        source: toml::ser::Error,
    },
    #[error("No suitable directory for the profile store")]
    NoStoreDir(#[from] app_dirs::AppDirError),
}

/// Synchronous string key-value storage surviving application restarts.
///
/// `list_keys` returns matches in ascending lexicographic order so that
/// listing-derived orderings downstream stay deterministic.
pub trait ProfileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// In-memory store for tests and ephemeral profiles.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// Store persisted as one TOML document on disk.
///
/// The document is loaded eagerly and written back atomically after every
/// mutation, so a crash can never leave a half-written profile behind.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store at the default profile location.
    pub fn open_default() -> Result<Self, StoreError> {
        let path = app_dirs::profile_path()?;
        Self::open_at(path)
    }

    /// Open the store at a specific path, creating an empty one if absent.
    pub fn open_at(path: PathBuf) -> Result<Self, StoreError> {
        let entries = if path.exists() {
            let data = std::fs::read_to_string(&path).map_err(|source| StoreError::Read {
                path: path.clone(),
                source,
            })?;
            toml::from_str(&data).map_err(|source| StoreError::Parse {
                path: path.clone(),
                source,
            })?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    /// Location of the backing TOML document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let data =
            toml::to_string_pretty(&self.entries).map_err(|source| StoreError::Serialize {
                path: self.path.clone(),
                source,
            })?;
        atomic_write(&self.path, data.as_bytes())
    }
}

impl ProfileStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.persist()
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.entries.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// Write the document via a temp file and rename to prevent partial writes.
fn atomic_write(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    use rand::TryRngCore;
    let dir = path.parent().ok_or_else(|| StoreError::Write {
        path: path.to_path_buf(),
        source: std::io::Error::other("store path has no parent directory"),
    })?;
    let file_name = path.file_name().ok_or_else(|| StoreError::Write {
        path: path.to_path_buf(),
        source: std::io::Error::other("store path has no file name"),
    })?;

    let mut last_err = None;
    for _ in 0..5 {
        let mut bytes = [0u8; 6];
        rand::rngs::OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|source| StoreError::Write {
                path: path.to_path_buf(),
                source: std::io::Error::other(format!(
                    "failed to generate temporary file suffix: {source}"
                )),
            })?;
        let suffix: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        let tmp_path = dir.join(format!("{}.tmp-{}", file_name.to_string_lossy(), suffix));

        let file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path);

        let mut file = match file {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                last_err = Some(err);
                continue;
            }
            Err(err) => {
                return Err(StoreError::Write {
                    path: tmp_path.clone(),
                    source: err,
                });
            }
        };

        if let Err(err) = file.write_all(data) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(StoreError::Write {
                path: tmp_path.clone(),
                source: err,
            });
        }
        if let Err(err) = file.sync_all() {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(StoreError::Write {
                path: tmp_path.clone(),
                source: err,
            });
        }
        drop(file);

        if let Err(err) = std::fs::rename(&tmp_path, path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(StoreError::Write {
                path: path.to_path_buf(),
                source: err,
            });
        }
        return Ok(());
    }

    Err(StoreError::Write {
        path: path.to_path_buf(),
        source: last_err
            .unwrap_or_else(|| std::io::Error::other("exhausted temporary file candidates")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips_values() {
        let mut store = MemoryStore::new();
        store.set("profile.skill_level", "beginner").unwrap();
        assert_eq!(
            store.get("profile.skill_level").unwrap().as_deref(),
            Some("beginner")
        );
        store.remove("profile.skill_level").unwrap();
        assert_eq!(store.get("profile.skill_level").unwrap(), None);
    }

    #[test]
    fn list_keys_filters_by_prefix_in_order() {
        let mut store = MemoryStore::new();
        store.set("datasource-b.txt", "Y").unwrap();
        store.set("datasource-a.txt", "X").unwrap();
        store.set("goals", "[]").unwrap();
        let keys = store.list_keys("datasource-").unwrap();
        assert_eq!(keys, vec!["datasource-a.txt", "datasource-b.txt"]);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.toml");
        {
            let mut store = FileStore::open_at(path.clone()).unwrap();
            store.set("profile.skill_level", "advanced").unwrap();
            store.set("datasource-notes.txt", "dropped combos").unwrap();
        }
        let store = FileStore::open_at(path).unwrap();
        assert_eq!(
            store.get("profile.skill_level").unwrap().as_deref(),
            Some("advanced")
        );
        assert_eq!(
            store.list_keys("datasource-").unwrap(),
            vec!["datasource-notes.txt"]
        );
    }

    #[test]
    fn file_store_remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.toml");
        {
            let mut store = FileStore::open_at(path.clone()).unwrap();
            store.set("goals", "[]").unwrap();
            store.remove("goals").unwrap();
        }
        let store = FileStore::open_at(path).unwrap();
        assert_eq!(store.get("goals").unwrap(), None);
    }

    #[test]
    fn keys_with_dots_and_dashes_round_trip_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.toml");
        {
            let mut store = FileStore::open_at(path.clone()).unwrap();
            store.set("matches.recent", "[]").unwrap();
            store.set("datasource-set 1.txt", "spacing notes").unwrap();
        }
        let store = FileStore::open_at(path).unwrap();
        assert_eq!(store.get("matches.recent").unwrap().as_deref(), Some("[]"));
        assert_eq!(
            store.get("datasource-set 1.txt").unwrap().as_deref(),
            Some("spacing notes")
        );
    }
}
