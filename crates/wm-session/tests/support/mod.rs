#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use wm_session::{
    AdapterRegistry, ChainAdapter, ChainFamily, ChainId, ConnectedAccount, IntentStore, Session,
    SessionConfig, SessionSnapshot, Signature, TransactionHandle, TransactionRequest,
    WalletAddress, WalletError,
};
use wm_storage::InMemoryStore;

/// Adapter whose answers are fixed up front and whose calls are recorded.
pub struct ScriptedAdapter {
    family: ChainFamily,
    connect: Result<ConnectedAccount, WalletError>,
    reconnect: Option<Result<ConnectedAccount, WalletError>>,
    switch: Result<(), WalletError>,
    sign: Result<Signature, WalletError>,
    send: Result<TransactionHandle, WalletError>,
    balance: Option<String>,
    gate: Option<Gate>,
    switch_gate: Option<Gate>,
    balance_gate: Option<Gate>,
    calls: Mutex<Vec<String>>,
}

/// Holds a call open until the test releases it.
#[derive(Clone, Default)]
pub struct Gate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

pub fn account(address: &str, chain_id: ChainId) -> ConnectedAccount {
    ConnectedAccount {
        address: WalletAddress(address.to_owned()),
        chain_id,
    }
}

impl ScriptedAdapter {
    pub fn connecting(family: ChainFamily, address: &str, chain_id: ChainId) -> Self {
        Self {
            family,
            connect: Ok(account(address, chain_id)),
            reconnect: None,
            switch: Ok(()),
            sign: Ok(Signature("0xsigned".to_owned())),
            send: Ok(TransactionHandle("0xtx".to_owned())),
            balance: Some("1.25".to_owned()),
            gate: None,
            switch_gate: None,
            balance_gate: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(family: ChainFamily, err: WalletError) -> Self {
        Self {
            connect: Err(err),
            ..Self::connecting(family, "unused", ChainId::Numeric(0))
        }
    }

    pub fn with_reconnect(mut self, result: Result<ConnectedAccount, WalletError>) -> Self {
        self.reconnect = Some(result);
        self
    }

    pub fn with_switch(mut self, result: Result<(), WalletError>) -> Self {
        self.switch = result;
        self
    }

    pub fn with_send(mut self, result: Result<TransactionHandle, WalletError>) -> Self {
        self.send = result;
        self
    }

    pub fn with_balance(mut self, balance: Option<&str>) -> Self {
        self.balance = balance.map(str::to_owned);
        self
    }

    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_switch_gate(mut self, gate: Gate) -> Self {
        self.switch_gate = Some(gate);
        self
    }

    pub fn with_balance_gate(mut self, gate: Gate) -> Self {
        self.balance_gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls").clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    fn record(&self, call: &str) {
        self.calls.lock().expect("calls").push(call.to_owned());
    }
}

async fn hold(gate: &Option<Gate>) {
    if let Some(gate) = gate {
        gate.entered.notify_one();
        gate.release.notified().await;
    }
}

#[async_trait]
impl ChainAdapter for ScriptedAdapter {
    fn family(&self) -> ChainFamily {
        self.family.clone()
    }

    async fn connect(&self) -> Result<ConnectedAccount, WalletError> {
        self.record("connect");
        hold(&self.gate).await;
        self.connect.clone()
    }

    async fn reconnect(
        &self,
        address_hint: Option<&WalletAddress>,
    ) -> Result<ConnectedAccount, WalletError> {
        let hint = address_hint.map(|a| a.0.as_str()).unwrap_or("-");
        self.record(&format!("reconnect:{hint}"));
        self.reconnect
            .clone()
            .unwrap_or(Err(WalletError::NoSilentReconnect))
    }

    async fn disconnect(&self) {
        self.record("disconnect");
    }

    async fn sign_message(&self, message: &str) -> Result<Signature, WalletError> {
        self.record(&format!("sign:{message}"));
        self.sign.clone()
    }

    async fn send_transaction(
        &self,
        _request: &TransactionRequest,
    ) -> Result<TransactionHandle, WalletError> {
        self.record("send");
        self.send.clone()
    }

    async fn switch_chain_id(&self, chain_id: &ChainId) -> Result<(), WalletError> {
        self.record(&format!("switch:{chain_id}"));
        hold(&self.switch_gate).await;
        self.switch.clone()
    }

    async fn get_balance(&self, token_hint: Option<&str>) -> Option<String> {
        self.record(&format!("balance:{}", token_hint.unwrap_or("native")));
        hold(&self.balance_gate).await;
        self.balance.clone()
    }
}

/// Everything a test wants to look at after driving a session.
pub struct Harness {
    pub session: Arc<Session>,
    pub store: Arc<InMemoryStore>,
    pub snapshots: Arc<Mutex<Vec<SessionSnapshot>>>,
    pub errors: Arc<Mutex<Vec<String>>>,
    pub connects: Arc<Mutex<Vec<(String, String)>>>,
    pub disconnects: Arc<Mutex<usize>>,
}

impl Harness {
    pub fn new(adapters: Vec<Arc<ScriptedAdapter>>) -> Self {
        Self::with(SessionConfig::new(), Arc::new(InMemoryStore::new()), adapters)
    }

    pub fn with(
        config: SessionConfig,
        store: Arc<InMemoryStore>,
        adapters: Vec<Arc<ScriptedAdapter>>,
    ) -> Self {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let connects = Arc::new(Mutex::new(Vec::new()));
        let disconnects = Arc::new(Mutex::new(0));

        let error_sink = Arc::clone(&errors);
        let connect_sink = Arc::clone(&connects);
        let disconnect_sink = Arc::clone(&disconnects);
        let config = config
            .on_error(move |message| error_sink.lock().expect("errors").push(message.to_owned()))
            .on_connect(move |address, family| {
                connect_sink
                    .lock()
                    .expect("connects")
                    .push((address.0.clone(), family.to_string()));
            })
            .on_disconnect(move || *disconnect_sink.lock().expect("disconnects") += 1);

        let registry = adapters
            .into_iter()
            .fold(AdapterRegistry::builder(), |builder, adapter| {
                builder.register(adapter as Arc<dyn ChainAdapter>)
            })
            .build();

        let session = Arc::new(Session::new(
            config,
            registry,
            Arc::clone(&store) as Arc<dyn IntentStore>,
        ));

        let snapshots = Arc::new(Mutex::new(Vec::new()));
        let snapshot_sink = Arc::clone(&snapshots);
        session.subscribe(move |snapshot: &SessionSnapshot| {
            snapshot_sink.lock().expect("snapshots").push(snapshot.clone());
        });

        Self {
            session,
            store,
            snapshots,
            errors,
            connects,
            disconnects,
        }
    }

    pub fn snapshots(&self) -> Vec<SessionSnapshot> {
        self.snapshots.lock().expect("snapshots").clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().expect("errors").clone()
    }

    pub fn connects(&self) -> Vec<(String, String)> {
        self.connects.lock().expect("connects").clone()
    }

    pub fn disconnects(&self) -> usize {
        *self.disconnects.lock().expect("disconnects")
    }

    pub fn stored(&self, key: &str) -> Option<String> {
        self.store.read(key)
    }
}
