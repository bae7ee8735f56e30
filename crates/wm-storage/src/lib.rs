use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, warn};
use wm_types::{ChainFamily, MaybeSendSync, WalletAddress};

#[cfg(not(target_arch = "wasm32"))]
mod rocks;
#[cfg(not(target_arch = "wasm32"))]
pub use rocks::RocksDbStore;

pub const DEFAULT_KEY_PREFIX: &str = "walletmesh";

/// String key-value store for session hints.
///
/// Implementations never fail: storage trouble is logged and the call
/// degrades to "absent" / dropped write, so a session behaves the same with
/// or without durable storage.
pub trait IntentStore: MaybeSendSync {
    fn read(&self, key: &str) -> Option<String>;
    fn write(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// For hosts with no durable storage at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStore;

impl IntentStore for NoopStore {
    fn read(&self, _key: &str) -> Option<String> {
        None
    }

    fn write(&self, _key: &str, _value: &str) {}

    fn remove(&self, _key: &str) {}
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            values: RwLock::new(values),
        }
    }
}

impl IntentStore for InMemoryStore {
    fn read(&self, key: &str) -> Option<String> {
        match self.values.read() {
            Ok(guard) => guard.get(key).cloned(),
            Err(_) => {
                warn!("in-memory store lock poisoned; treating {} as absent", key);
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        match self.values.write() {
            Ok(mut guard) => {
                guard.insert(key.to_owned(), value.to_owned());
            }
            Err(_) => warn!("in-memory store lock poisoned; dropping write of {}", key),
        }
    }

    fn remove(&self, key: &str) {
        match self.values.write() {
            Ok(mut guard) => {
                guard.remove(key);
            }
            Err(_) => warn!("in-memory store lock poisoned; dropping removal of {}", key),
        }
    }
}

/// Key names of the persisted intent under one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentKeys {
    pub chain: String,
    pub address: String,
}

impl IntentKeys {
    pub fn new(prefix: &str) -> Self {
        let prefix = prefix.trim();
        let prefix = if prefix.is_empty() {
            DEFAULT_KEY_PREFIX
        } else {
            prefix
        };
        Self {
            chain: format!("{prefix}-chain"),
            address: format!("{prefix}-address"),
        }
    }
}

impl Default for IntentKeys {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

/// Last chain/account the user connected with. A hint for reconnecting,
/// never a substitute for asking the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedIntent {
    pub chain_family: ChainFamily,
    pub address_hint: Option<WalletAddress>,
}

impl PersistedIntent {
    pub fn load(store: &dyn IntentStore, keys: &IntentKeys) -> Option<Self> {
        let raw_chain = store.read(&keys.chain)?;
        let chain_family = match raw_chain.parse::<ChainFamily>() {
            Ok(family) => family,
            Err(err) => {
                warn!("ignoring persisted chain family {:?}: {}", raw_chain, err);
                return None;
            }
        };

        let address_hint = store
            .read(&keys.address)
            .map(|raw| raw.trim().to_owned())
            .filter(|raw| !raw.is_empty())
            .map(WalletAddress);

        Some(Self {
            chain_family,
            address_hint,
        })
    }

    pub fn save(&self, store: &dyn IntentStore, keys: &IntentKeys) {
        debug!("persisting intent for chain family {}", self.chain_family);
        store.write(&keys.chain, self.chain_family.tag());
        match &self.address_hint {
            Some(address) => store.write(&keys.address, &address.0),
            None => store.remove(&keys.address),
        }
    }

    pub fn clear(store: &dyn IntentStore, keys: &IntentKeys) {
        store.remove(&keys.chain);
        store.remove(&keys.address);
    }
}
