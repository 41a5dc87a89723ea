use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info};

use super::NickStoreError;

pub const NICK_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct NickState {
    aliases: BTreeMap<String, String>,
    dirty: bool,
}

/// Operator-assigned display aliases for Matrix users, persisted as a JSON
/// object of `user id -> alias`.
///
/// Mutations only touch memory and mark the store dirty; [`NickStore::flush`]
/// (driven by [`NickStore::run_flusher`]) rewrites the whole file through a
/// temporary sibling and a rename.
#[derive(Debug)]
pub struct NickStore {
    path: PathBuf,
    state: RwLock<NickState>,
    write_lock: AsyncMutex<()>,
}

impl NickStore {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, NickStoreError> {
        let path = path.into();
        let aliases = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<BTreeMap<String, String>>(&bytes).map_err(
                |source| NickStoreError::Corrupt {
                    path: path.clone(),
                    source,
                },
            )?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("nickname store {} does not exist yet, starting empty", path.display());
                BTreeMap::new()
            }
            Err(source) => {
                return Err(NickStoreError::Read {
                    path: path.clone(),
                    source,
                });
            }
        };

        info!(
            "loaded {} nickname aliases from {}",
            aliases.len(),
            path.display()
        );

        Ok(Self {
            path,
            state: RwLock::new(NickState {
                aliases,
                dirty: false,
            }),
            write_lock: AsyncMutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, user_id: &str) -> Option<String> {
        self.state.read().aliases.get(user_id).cloned()
    }

    pub fn set(&self, user_id: &str, alias: Option<&str>) {
        let mut state = self.state.write();
        match alias {
            Some(alias) => {
                state.aliases.insert(user_id.to_string(), alias.to_string());
            }
            None => {
                state.aliases.remove(user_id);
            }
        }
        state.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.state.read().aliases.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.state.read().dirty
    }

    /// Writes the store to disk if it changed since the last flush.
    /// Returns whether a write happened.
    pub async fn flush(&self) -> Result<bool, NickStoreError> {
        let _guard = self.write_lock.lock().await;

        let snapshot = {
            let mut state = self.state.write();
            if !state.dirty {
                return Ok(false);
            }
            state.dirty = false;
            serde_json::to_vec_pretty(&state.aliases)?
        };

        if let Err(err) = write_atomically(&self.path, &snapshot).await {
            self.state.write().dirty = true;
            return Err(err);
        }

        debug!(
            "flushed nickname store to {} ({} bytes)",
            self.path.display(),
            snapshot.len()
        );
        Ok(true)
    }

    /// Periodically flushes the store. Only returns on a write failure, which
    /// the caller treats as fatal.
    pub async fn run_flusher(&self, interval: Duration) -> Result<(), NickStoreError> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = self.flush().await {
                error!("failed to save nickname store: {}", err);
                return Err(err);
            }
        }
    }
}

async fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), NickStoreError> {
    let mut tmp_name = OsString::from(path.as_os_str());
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(|source| NickStoreError::Write {
            path: tmp_path.clone(),
            source,
        })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|source| NickStoreError::Write {
            path: path.to_path_buf(),
            source,
        })
}
