use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use wm_chain_adapter::{AdapterRegistry, ChainAdapter, WalletError};
use wm_storage::{IntentKeys, IntentStore, PersistedIntent};
use wm_types::{
    ChainFamily, ChainId, ConnectedAccount, ConnectionStatus, MaybeSendSync, SessionSnapshot,
    Signature, TransactionHandle, TransactionRequest, WalletAddress,
};

use crate::config::SessionConfig;
use crate::notify::{Event, Notifier, SubscriptionId};

struct SessionState {
    snapshot: SessionSnapshot,
    active: Option<Arc<dyn ChainAdapter>>,
    /// Bumped whenever the active connection changes, so results from an
    /// adapter call that straddled a reconnect can be recognised and dropped.
    generation: u64,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Handshake {
    Interactive,
    Silent,
}

/// The single owner of "which wallet is connected".
///
/// Construct one per application and share it by reference or `Arc`. All
/// mutation goes through the async operations below; the state lock is only
/// held for check-and-transition sections, never across an adapter call.
pub struct Session {
    auto_connect: bool,
    keys: IntentKeys,
    registry: AdapterRegistry,
    store: Arc<dyn IntentStore>,
    state: Mutex<SessionState>,
    notifier: Notifier,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("auto_connect", &self.auto_connect)
            .field("keys", &self.keys)
            .field("registry", &self.registry)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl Session {
    pub fn new(config: SessionConfig, registry: AdapterRegistry, store: Arc<dyn IntentStore>) -> Self {
        let SessionConfig {
            auto_connect,
            storage_key_prefix,
            hooks,
        } = config;

        Self {
            auto_connect,
            keys: IntentKeys::new(&storage_key_prefix),
            registry,
            store,
            state: Mutex::new(SessionState {
                snapshot: SessionSnapshot::default(),
                active: None,
                generation: 0,
            }),
            notifier: Notifier::new(hooks),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn auto_connect(&self) -> bool {
        self.auto_connect
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state().snapshot.clone()
    }

    pub fn persisted_intent(&self) -> Option<PersistedIntent> {
        PersistedIntent::load(self.store.as_ref(), &self.keys)
    }

    /// Drops the persisted intent without touching the live connection.
    pub fn forget_intent(&self) {
        let _state = self.state();
        PersistedIntent::clear(self.store.as_ref(), &self.keys);
    }

    /// Registers a listener for committed transitions. Entering `Connecting`
    /// is not announced.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&SessionSnapshot) + MaybeSendSync + 'static,
    {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// Interactive connect. Any current connection, whatever its family, is
    /// torn down first.
    pub async fn connect(&self, family: ChainFamily) -> Result<ConnectedAccount, WalletError> {
        match self.establish(family, Handshake::Interactive, None).await {
            Ok(Some(account)) => Ok(account),
            Ok(None) => Err(WalletError::AlreadyConnecting),
            Err(err) => Err(err),
        }
    }

    /// Silent reconnect used at startup. `Ok(None)` means the session was
    /// already busy or connected, so there was nothing to resume.
    pub(crate) async fn resume(
        &self,
        family: ChainFamily,
        address_hint: Option<WalletAddress>,
    ) -> Result<Option<ConnectedAccount>, WalletError> {
        self.establish(family, Handshake::Silent, address_hint).await
    }

    async fn establish(
        &self,
        family: ChainFamily,
        handshake: Handshake,
        address_hint: Option<WalletAddress>,
    ) -> Result<Option<ConnectedAccount>, WalletError> {
        let family = family.canonical();
        let (adapter, previous) = {
            let mut state = self.state();
            match (handshake, state.snapshot.connection_status) {
                (Handshake::Silent, ConnectionStatus::Connected | ConnectionStatus::Connecting) => {
                    debug!("skipping silent reconnect; session already {}", state.snapshot.connection_status);
                    return Ok(None);
                }
                (Handshake::Interactive, ConnectionStatus::Connecting) => {
                    drop(state);
                    return Err(self.fail(WalletError::AlreadyConnecting));
                }
                _ => {}
            }

            let Some(adapter) = self.registry.adapter(&family) else {
                drop(state);
                return Err(self.fail(WalletError::UnsupportedChainFamily(family)));
            };

            let previous = state.active.take();
            if previous.is_some() {
                PersistedIntent::clear(self.store.as_ref(), &self.keys);
            }
            state.generation += 1;
            state.snapshot = SessionSnapshot {
                connection_status: ConnectionStatus::Connecting,
                ..SessionSnapshot::default()
            };
            (adapter, previous)
        };

        if let Some(previous) = previous {
            info!("leaving {} session before connecting {}", previous.family(), family);
            previous.disconnect().await;
        }

        debug!("connecting {} wallet", family);
        let result = match handshake {
            Handshake::Interactive => adapter.connect().await,
            Handshake::Silent => adapter.reconnect(address_hint.as_ref()).await,
        };

        {
            let mut state = self.state();
            match &result {
                Ok(account) => {
                    state.snapshot = SessionSnapshot {
                        connection_status: ConnectionStatus::Connected,
                        active_chain_family: Some(family.clone()),
                        address: Some(account.address.clone()),
                        chain_id: Some(account.chain_id.clone()),
                        balance: None,
                        last_error: None,
                    };
                    state.active = Some(adapter);

                    PersistedIntent {
                        chain_family: family.clone(),
                        address_hint: Some(account.address.clone()),
                    }
                    .save(self.store.as_ref(), &self.keys);

                    self.notifier.enqueue(Event::Changed(state.snapshot.clone()));
                    self.notifier
                        .enqueue(Event::Connected(account.address.clone(), family.clone()));
                    info!("connected {} wallet {}", family, account.address);
                }
                Err(err) if handshake == Handshake::Silent && err.kind().is_silent_in_reconnect() => {
                    state.snapshot = SessionSnapshot::default();
                    self.notifier.enqueue(Event::Changed(state.snapshot.clone()));
                    debug!("{} wallet cannot resume silently: {}", family, err);
                }
                Err(err) => {
                    let kind = err.kind().to_string();
                    state.snapshot = SessionSnapshot {
                        connection_status: ConnectionStatus::Error,
                        last_error: Some(kind.clone()),
                        ..SessionSnapshot::default()
                    };
                    self.notifier.enqueue(Event::Changed(state.snapshot.clone()));

                    state.snapshot.connection_status = ConnectionStatus::Disconnected;
                    self.notifier.enqueue(Event::Changed(state.snapshot.clone()));
                    self.notifier.enqueue(Event::Error(err.to_string()));
                    warn!("{} wallet connect failed: {}", family, kind);
                }
            }
        }
        self.notifier.flush();

        result.map(Some)
    }

    /// Always succeeds. A no-op while disconnected or while a connect is in
    /// flight.
    pub async fn disconnect(&self) {
        let previous = {
            let mut state = self.state();
            match state.snapshot.connection_status {
                ConnectionStatus::Connected => {}
                ConnectionStatus::Connecting => {
                    debug!("disconnect ignored while a connect is in flight");
                    return;
                }
                ConnectionStatus::Disconnected | ConnectionStatus::Error => return,
            }

            let previous = state.active.take();
            state.generation += 1;
            state.snapshot = SessionSnapshot::default();
            PersistedIntent::clear(self.store.as_ref(), &self.keys);

            self.notifier.enqueue(Event::Changed(state.snapshot.clone()));
            self.notifier.enqueue(Event::Disconnected);
            previous
        };
        self.notifier.flush();

        if let Some(adapter) = previous {
            info!("disconnecting {} wallet", adapter.family());
            adapter.disconnect().await;
        }
    }

    /// Network change inside the active family. State is only touched once
    /// the wallet confirms.
    pub async fn switch_chain(&self, chain_id: ChainId) -> Result<(), WalletError> {
        let (adapter, generation) = self.active_adapter().map_err(|err| self.fail(err))?;

        if let Err(err) = adapter.switch_chain_id(&chain_id).await {
            return Err(self.fail(err));
        }

        {
            let mut state = self.state();
            if state.generation == generation && state.snapshot.is_connected() {
                state.snapshot.chain_id = Some(chain_id);
                self.notifier.enqueue(Event::Changed(state.snapshot.clone()));
            } else {
                debug!("dropping chain switch result for a replaced connection");
            }
        }
        self.notifier.flush();
        Ok(())
    }

    pub async fn sign_message(&self, message: &str) -> Result<Signature, WalletError> {
        let (adapter, _) = self.active_adapter().map_err(|err| self.fail(err))?;
        adapter.sign_message(message).await.map_err(|err| self.fail(err))
    }

    pub async fn send_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<TransactionHandle, WalletError> {
        let (adapter, _) = self.active_adapter().map_err(|err| self.fail(err))?;
        adapter
            .send_transaction(request)
            .await
            .map_err(|err| self.fail(err))
    }

    /// Best-effort balance query. Only native balances (no token hint) are
    /// recorded in the snapshot; an unknown result keeps the last known value.
    pub async fn refresh_balance(&self, token_hint: Option<&str>) -> Option<String> {
        let (adapter, generation) = self.active_adapter().ok()?;
        let balance = adapter.get_balance(token_hint).await?;

        if token_hint.is_none() {
            {
                let mut state = self.state();
                let current = state.generation == generation && state.snapshot.is_connected();
                if current && state.snapshot.balance.as_deref() != Some(balance.as_str()) {
                    state.snapshot.balance = Some(balance.clone());
                    self.notifier.enqueue(Event::Changed(state.snapshot.clone()));
                }
            }
            self.notifier.flush();
        }

        Some(balance)
    }

    fn active_adapter(&self) -> Result<(Arc<dyn ChainAdapter>, u64), WalletError> {
        let state = self.state();
        match (&state.active, state.snapshot.is_connected()) {
            (Some(adapter), true) => Ok((Arc::clone(adapter), state.generation)),
            _ => Err(WalletError::NotConnected),
        }
    }

    /// Reports a failed operation to `on_error` and hands the error back.
    fn fail(&self, err: WalletError) -> WalletError {
        debug!("session operation failed: {}", err);
        self.notifier.enqueue(Event::Error(err.to_string()));
        self.notifier.flush();
        err
    }
}
