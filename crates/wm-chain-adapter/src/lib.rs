use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;
use wm_types::{
    ChainFamily, ChainId, ConnectedAccount, MaybeSendSync, Signature, TransactionHandle,
    TransactionRequest, WalletAddress,
};

/// Failures surfaced by adapters and by the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("user rejected the request")]
    UserRejected,
    #[error("no compatible wallet found")]
    NoWalletFound,
    #[error("wallet cannot reconnect without user interaction")]
    NoSilentReconnect,
    #[error("no wallet connected")]
    NotConnected,
    #[error("a connection attempt is already in progress")]
    AlreadyConnecting,
    #[error("unsupported chain id: {0}")]
    UnsupportedChainId(String),
    #[error("{0} is not supported by this wallet")]
    CapabilityNotSupported(String),
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("transaction failed: {0}")]
    SendFailed(String),
    #[error("wallet handshake timed out")]
    Timeout,
    #[error("no adapter registered for chain family {0}")]
    UnsupportedChainFamily(ChainFamily),
    #[error("wallet provider error: {0}")]
    Provider(String),
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UserRejected => ErrorKind::UserRejected,
            Self::NoWalletFound => ErrorKind::NoWalletFound,
            Self::NoSilentReconnect => ErrorKind::NoSilentReconnect,
            Self::NotConnected => ErrorKind::NotConnected,
            Self::AlreadyConnecting => ErrorKind::AlreadyConnecting,
            Self::UnsupportedChainId(_) => ErrorKind::UnsupportedChainId,
            Self::CapabilityNotSupported(_) => ErrorKind::CapabilityNotSupported,
            Self::InsufficientFunds => ErrorKind::InsufficientFunds,
            Self::SendFailed(_) => ErrorKind::SendFailed,
            Self::Timeout => ErrorKind::Timeout,
            Self::UnsupportedChainFamily(_) => ErrorKind::UnsupportedChainFamily,
            Self::Provider(_) => ErrorKind::Provider,
        }
    }

    pub fn capability(operation: impl Into<String>) -> Self {
        Self::CapabilityNotSupported(operation.into())
    }
}

/// Payload-free discriminant of [`WalletError`]. `Display` yields the kind
/// name (`UserRejected`), which is what the session records as `last_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UserRejected,
    NoWalletFound,
    NoSilentReconnect,
    NotConnected,
    AlreadyConnecting,
    UnsupportedChainId,
    CapabilityNotSupported,
    InsufficientFunds,
    SendFailed,
    Timeout,
    UnsupportedChainFamily,
    Provider,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::UserRejected => "UserRejected",
            Self::NoWalletFound => "NoWalletFound",
            Self::NoSilentReconnect => "NoSilentReconnect",
            Self::NotConnected => "NotConnected",
            Self::AlreadyConnecting => "AlreadyConnecting",
            Self::UnsupportedChainId => "UnsupportedChainId",
            Self::CapabilityNotSupported => "CapabilityNotSupported",
            Self::InsufficientFunds => "InsufficientFunds",
            Self::SendFailed => "SendFailed",
            Self::Timeout => "Timeout",
            Self::UnsupportedChainFamily => "UnsupportedChainFamily",
            Self::Provider => "Provider",
        }
    }

    /// Kinds the auto-reconnect path swallows instead of reporting.
    pub fn is_silent_in_reconnect(self) -> bool {
        matches!(self, Self::NoSilentReconnect | Self::NoWalletFound)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Capability contract every chain integration implements.
///
/// Adapters own their wallet-library handle and nothing else: session
/// bookkeeping and persistence belong to the session.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait ChainAdapter: MaybeSendSync {
    fn family(&self) -> ChainFamily;

    /// Interactive handshake (extension prompt, redirect, QR flow).
    async fn connect(&self) -> Result<ConnectedAccount, WalletError>;

    /// Resume an existing wallet session without prompting.
    async fn reconnect(
        &self,
        _address_hint: Option<&WalletAddress>,
    ) -> Result<ConnectedAccount, WalletError> {
        Err(WalletError::NoSilentReconnect)
    }

    /// Best effort. Implementations log and swallow their own failures.
    async fn disconnect(&self);

    async fn sign_message(&self, message: &str) -> Result<Signature, WalletError>;

    async fn send_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<TransactionHandle, WalletError>;

    async fn switch_chain_id(&self, _chain_id: &ChainId) -> Result<(), WalletError> {
        Err(WalletError::capability("switch_chain_id"))
    }

    /// `None` means unknown. Balance is advisory, so this never fails.
    async fn get_balance(&self, token_hint: Option<&str>) -> Option<String>;
}

/// Family → adapter map, frozen once built.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<ChainFamily, Arc<dyn ChainAdapter>>,
}

impl AdapterRegistry {
    pub fn builder() -> AdapterRegistryBuilder {
        AdapterRegistryBuilder::default()
    }

    pub fn adapter(&self, family: &ChainFamily) -> Option<Arc<dyn ChainAdapter>> {
        self.adapters.get(&family.canonical()).cloned()
    }

    pub fn contains(&self, family: &ChainFamily) -> bool {
        self.adapters.contains_key(&family.canonical())
    }

    pub fn families(&self) -> Vec<ChainFamily> {
        let mut families: Vec<ChainFamily> = self.adapters.keys().cloned().collect();
        families.sort_by(|a, b| a.tag().cmp(b.tag()));
        families
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("families", &self.families())
            .finish()
    }
}

#[derive(Default)]
pub struct AdapterRegistryBuilder {
    adapters: HashMap<ChainFamily, Arc<dyn ChainAdapter>>,
}

impl AdapterRegistryBuilder {
    pub fn register(mut self, adapter: Arc<dyn ChainAdapter>) -> Self {
        let family = adapter.family().canonical();
        if self.adapters.insert(family.clone(), adapter).is_some() {
            warn!("adapter for chain family {} registered twice; keeping the last one", family);
        }
        self
    }

    pub fn build(self) -> AdapterRegistry {
        AdapterRegistry {
            adapters: self.adapters,
        }
    }
}
