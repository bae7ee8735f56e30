//! Chain-agnostic wallet session.
//!
//! One [`Session`] per application instance tracks at most one active chain
//! connection, routes signing and sending to the active [`ChainAdapter`],
//! persists the last connection as a hint and replays it at startup through
//! [`AutoReconnect`].

mod config;
mod notify;
mod reconnect;
mod session;

pub use config::SessionConfig;
pub use notify::SubscriptionId;
pub use reconnect::{AutoReconnect, ReconnectOutcome};
pub use session::Session;

pub use wm_chain_adapter::{AdapterRegistry, ChainAdapter, ErrorKind, WalletError};
pub use wm_storage::{IntentStore, PersistedIntent};
pub use wm_types::{
    ChainFamily, ChainId, ConnectedAccount, ConnectionStatus, SessionSnapshot, Signature,
    TransactionHandle, TransactionRequest, WalletAddress,
};
