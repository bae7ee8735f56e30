use tracing::{debug, info, warn};
use wm_chain_adapter::{ErrorKind, WalletError};
use wm_types::ConnectedAccount;

use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// `auto_connect` is off.
    Disabled,
    /// No usable persisted intent.
    NothingToRestore,
    /// The application connected (or started connecting) first.
    Superseded,
    Restored(ConnectedAccount),
    /// The wallet needs user interaction; nothing was reported.
    Skipped(ErrorKind),
    /// Reported through `on_error` like any interactive failure.
    Failed(WalletError),
}

/// Startup replay of the persisted intent.
///
/// Hosts call [`AutoReconnect::spawn`] (native) or drive
/// [`AutoReconnect::run`] from their own executor (`spawn_local` in the
/// browser) so the first render never waits on a wallet.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoReconnect;

impl AutoReconnect {
    pub async fn run(session: &Session) -> ReconnectOutcome {
        if !session.auto_connect() {
            return ReconnectOutcome::Disabled;
        }

        let Some(intent) = session.persisted_intent() else {
            debug!("no persisted wallet intent");
            return ReconnectOutcome::NothingToRestore;
        };

        if !session.registry().contains(&intent.chain_family) {
            warn!(
                "persisted chain family {} has no registered adapter; forgetting it",
                intent.chain_family
            );
            session.forget_intent();
            return ReconnectOutcome::NothingToRestore;
        }

        info!("resuming {} wallet session", intent.chain_family);
        match session.resume(intent.chain_family, intent.address_hint).await {
            Ok(Some(account)) => ReconnectOutcome::Restored(account),
            Ok(None) => ReconnectOutcome::Superseded,
            Err(err) if err.kind().is_silent_in_reconnect() => ReconnectOutcome::Skipped(err.kind()),
            Err(err) => ReconnectOutcome::Failed(err),
        }
    }

    /// Fire-and-forget on the current tokio runtime.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn spawn(session: std::sync::Arc<Session>) -> tokio::task::JoinHandle<ReconnectOutcome> {
        tokio::spawn(async move { Self::run(&session).await })
    }
}
