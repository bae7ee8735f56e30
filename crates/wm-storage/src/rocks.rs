use anyhow::{Context, Result};
use rocksdb::{DB, Options};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

use crate::IntentStore;

/// Durable store for native hosts. Opening can fail; once open, every
/// operation follows the never-fail contract of [`IntentStore`].
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
}

impl RocksDbStore {
    pub fn open_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut options = Options::default();
        options.create_if_missing(true);
        let db = DB::open(&options, path)
            .with_context(|| format!("opening session store at {}", path.display()))?;
        Ok(Self { db: Arc::new(db) })
    }

    fn key_for(key: &str) -> String {
        format!("intent:{key}")
    }
}

impl std::fmt::Debug for RocksDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksDbStore")
            .field("path", &self.db.path())
            .finish()
    }
}

impl IntentStore for RocksDbStore {
    fn read(&self, key: &str) -> Option<String> {
        let raw = match self.db.get(Self::key_for(key).as_bytes()) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!("session store read of {} failed: {}", key, err);
                return None;
            }
        };

        match String::from_utf8(raw) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("session store value for {} is not utf-8; ignoring", key);
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(err) = self.db.put(Self::key_for(key).as_bytes(), value.as_bytes()) {
            warn!("session store write of {} failed: {}", key, err);
        }
    }

    fn remove(&self, key: &str) {
        if let Err(err) = self.db.delete(Self::key_for(key).as_bytes()) {
            warn!("session store delete of {} failed: {}", key, err);
        }
    }
}
