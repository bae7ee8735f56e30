use std::fmt;
use std::sync::Arc;
use wm_storage::DEFAULT_KEY_PREFIX;
use wm_types::{ChainFamily, MaybeSendSync, WalletAddress};

pub const AUTO_CONNECT_ENV: &str = "WALLETMESH_AUTO_CONNECT";
pub const STORAGE_PREFIX_ENV: &str = "WALLETMESH_STORAGE_PREFIX";

#[cfg(not(target_arch = "wasm32"))]
pub(crate) type ConnectHook = Arc<dyn Fn(&WalletAddress, &ChainFamily) + Send + Sync>;
#[cfg(target_arch = "wasm32")]
pub(crate) type ConnectHook = Arc<dyn Fn(&WalletAddress, &ChainFamily)>;

#[cfg(not(target_arch = "wasm32"))]
pub(crate) type DisconnectHook = Arc<dyn Fn() + Send + Sync>;
#[cfg(target_arch = "wasm32")]
pub(crate) type DisconnectHook = Arc<dyn Fn()>;

#[cfg(not(target_arch = "wasm32"))]
pub(crate) type ErrorHook = Arc<dyn Fn(&str) + Send + Sync>;
#[cfg(target_arch = "wasm32")]
pub(crate) type ErrorHook = Arc<dyn Fn(&str)>;

#[derive(Default, Clone)]
pub(crate) struct Hooks {
    pub(crate) on_connect: Option<ConnectHook>,
    pub(crate) on_disconnect: Option<DisconnectHook>,
    pub(crate) on_error: Option<ErrorHook>,
}

/// Host-facing session options.
///
/// ```
/// use wm_session::SessionConfig;
///
/// let config = SessionConfig::new()
///     .auto_connect(true)
///     .storage_key_prefix("my-dapp")
///     .on_error(|message| eprintln!("wallet error: {message}"));
/// assert!(config.auto_connect);
/// ```
#[derive(Clone)]
pub struct SessionConfig {
    pub auto_connect: bool,
    pub storage_key_prefix: String,
    pub(crate) hooks: Hooks,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_connect: false,
            storage_key_prefix: DEFAULT_KEY_PREFIX.to_owned(),
            hooks: Hooks::default(),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `WALLETMESH_AUTO_CONNECT` and
    /// `WALLETMESH_STORAGE_PREFIX` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(AUTO_CONNECT_ENV) {
            config.auto_connect = parse_flag(&raw);
        }
        if let Ok(prefix) = std::env::var(STORAGE_PREFIX_ENV) {
            if !prefix.trim().is_empty() {
                config.storage_key_prefix = prefix.trim().to_owned();
            }
        }
        config
    }

    pub fn auto_connect(mut self, enabled: bool) -> Self {
        self.auto_connect = enabled;
        self
    }

    pub fn storage_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.storage_key_prefix = prefix.into();
        self
    }

    pub fn on_connect<F>(mut self, hook: F) -> Self
    where
        F: Fn(&WalletAddress, &ChainFamily) + MaybeSendSync + 'static,
    {
        self.hooks.on_connect = Some(Arc::new(hook));
        self
    }

    pub fn on_disconnect<F>(mut self, hook: F) -> Self
    where
        F: Fn() + MaybeSendSync + 'static,
    {
        self.hooks.on_disconnect = Some(Arc::new(hook));
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + MaybeSendSync + 'static,
    {
        self.hooks.on_error = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("auto_connect", &self.auto_connect)
            .field("storage_key_prefix", &self.storage_key_prefix)
            .field("on_connect", &self.hooks.on_connect.is_some())
            .field("on_disconnect", &self.hooks.on_disconnect.is_some())
            .field("on_error", &self.hooks.on_error.is_some())
            .finish()
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
