//! Local key-scoped string persistence
//!
//! The cache and the session resolver read and write through
//! [`KeyValueStore`] synchronously. A missing key is a valid state.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use heed::types::Str;
use heed::{Database, Env, EnvOpenOptions};

use crate::constants::MAP_SIZE;
use crate::error::{err, RbacError, Result};

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Returns whether the key existed.
    fn remove(&self, key: &str) -> Result<bool>;
}

// ============================================================================
// LMDB
// ============================================================================

/// LMDB-backed store: one environment, one string table.
pub struct LmdbStore {
    env: Env,
    kv: Database<Str, Str>,
}

impl LmdbStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path).map_err(err)?;
        // SAFETY: LMDB requires no other processes access this path concurrently during open.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(MAP_SIZE)
                .max_dbs(1)
                .open(path)
                .map_err(err)?
        };
        let mut tx = env.write_txn().map_err(err)?;
        let kv = env.create_database(&mut tx, Some("kv")).map_err(err)?;
        tx.commit().map_err(err)?;
        Ok(Self { env, kv })
    }

    /// Drop every key (for testing)
    pub fn clear(&self) -> Result<()> {
        let mut tx = self.env.write_txn().map_err(err)?;
        self.kv.clear(&mut tx).map_err(err)?;
        tx.commit().map_err(err)
    }
}

impl KeyValueStore for LmdbStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let tx = self.env.read_txn().map_err(err)?;
        Ok(self.kv.get(&tx, key).map_err(err)?.map(str::to_string))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut tx = self.env.write_txn().map_err(err)?;
        self.kv.put(&mut tx, key, value).map_err(err)?;
        tx.commit().map_err(err)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let mut tx = self.env.write_txn().map_err(err)?;
        let r = self.kv.delete(&mut tx, key).map_err(err)?;
        tx.commit().map_err(err)?;
        Ok(r)
    }
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.map.lock().map_err(|_| RbacError::Storage("Memory store poisoned".into()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.remove(key).is_some())
    }
}
