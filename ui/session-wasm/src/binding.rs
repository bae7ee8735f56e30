use js_sys::{Function, Promise, Reflect};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use wm_chain_adapter::{AdapterRegistry, AdapterRegistryBuilder, ChainAdapter, WalletError};
use wm_session::{AutoReconnect, ReconnectOutcome, Session, SessionConfig, SubscriptionId};
use wm_storage::IntentStore;
use wm_types::{ChainFamily, TransactionRequest};

use crate::adapter::{JsAdapter, chain_id_of};
use crate::storage::LocalStorageStore;

#[derive(Default)]
struct Pending {
    config: SessionConfig,
    adapters: AdapterRegistryBuilder,
}

/// JavaScript face of a wallet session.
///
/// Adapters are registered first; the session itself is created by the
/// first call to anything else (usually `start()`), after which the set of
/// chain families is fixed.
#[wasm_bindgen]
pub struct WalletSession {
    pending: RefCell<Option<Pending>>,
    session: RefCell<Option<Rc<Session>>>,
}

fn js_error(message: &str) -> JsValue {
    js_sys::Error::new(message).into()
}

fn wallet_error(err: &WalletError) -> JsValue {
    let error = js_sys::Error::new(&err.to_string());
    if let Err(thrown) = Reflect::set(
        &error,
        &JsValue::from_str("kind"),
        &JsValue::from_str(err.kind().name()),
    ) {
        gloo_console::warn!("could not tag wallet error with its kind", thrown);
    }
    error.into()
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(Into::into)
}

fn option(options: &JsValue, name: &str) -> Option<JsValue> {
    if !options.is_object() {
        return None;
    }
    Reflect::get(options, &JsValue::from_str(name))
        .ok()
        .filter(|value| !value.is_undefined() && !value.is_null())
}

fn callback(options: &JsValue, name: &str) -> Option<Function> {
    option(options, name)?.dyn_into::<Function>().ok()
}

fn parse_family(family: &str) -> Result<ChainFamily, JsValue> {
    family.parse().map_err(|err: wm_types::ParseError| js_error(&err.to_string()))
}

fn config_from(options: &JsValue) -> SessionConfig {
    let mut config = SessionConfig::new();

    if let Some(enabled) = option(options, "autoConnect").and_then(|v| v.as_bool()) {
        config = config.auto_connect(enabled);
    }
    if let Some(prefix) = option(options, "storageKeyPrefix").and_then(|v| v.as_string()) {
        config = config.storage_key_prefix(prefix);
    }
    if let Some(hook) = callback(options, "onConnect") {
        config = config.on_connect(move |address, family| {
            let result = hook.call2(
                &JsValue::NULL,
                &JsValue::from_str(&address.0),
                &JsValue::from_str(family.tag()),
            );
            if let Err(thrown) = result {
                gloo_console::warn!("onConnect threw", thrown);
            }
        });
    }
    if let Some(hook) = callback(options, "onDisconnect") {
        config = config.on_disconnect(move || {
            if let Err(thrown) = hook.call0(&JsValue::NULL) {
                gloo_console::warn!("onDisconnect threw", thrown);
            }
        });
    }
    if let Some(hook) = callback(options, "onError") {
        config = config.on_error(move |message| {
            if let Err(thrown) = hook.call1(&JsValue::NULL, &JsValue::from_str(message)) {
                gloo_console::warn!("onError threw", thrown);
            }
        });
    }

    config
}

fn outcome_label(outcome: &ReconnectOutcome) -> &'static str {
    match outcome {
        ReconnectOutcome::Disabled => "disabled",
        ReconnectOutcome::NothingToRestore => "nothingToRestore",
        ReconnectOutcome::Superseded => "superseded",
        ReconnectOutcome::Restored(_) => "restored",
        ReconnectOutcome::Skipped(_) => "skipped",
        ReconnectOutcome::Failed(_) => "failed",
    }
}

impl WalletSession {
    fn session(&self) -> Rc<Session> {
        if let Some(session) = self.session.borrow().as_ref() {
            return Rc::clone(session);
        }

        let Pending { config, adapters } = self.pending.borrow_mut().take().unwrap_or_default();
        let registry: AdapterRegistry = adapters.build();
        gloo_console::debug!(format!("wallet session ready for {:?}", registry.families()));

        let store: Arc<dyn IntentStore> = Arc::new(LocalStorageStore);
        let session = Rc::new(Session::new(config, registry, store));
        *self.session.borrow_mut() = Some(Rc::clone(&session));
        session
    }
}

#[wasm_bindgen]
impl WalletSession {
    /// `options`: `{ autoConnect, storageKeyPrefix, onConnect, onDisconnect, onError }`,
    /// all optional.
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> WalletSession {
        WalletSession {
            pending: RefCell::new(Some(Pending {
                config: config_from(&options),
                adapters: AdapterRegistryBuilder::default(),
            })),
            session: RefCell::new(None),
        }
    }

    #[wasm_bindgen(js_name = registerAdapter)]
    pub fn register_adapter(&self, family: String, wallet: JsValue) -> Result<(), JsValue> {
        let family = parse_family(&family)?;
        if !wallet.is_object() {
            return Err(js_error("wallet must be an object"));
        }

        let mut pending = self.pending.borrow_mut();
        let Some(Pending { config, adapters }) = pending.take() else {
            return Err(js_error("adapters must be registered before the session starts"));
        };
        let adapter: Arc<dyn ChainAdapter> = Arc::new(JsAdapter::new(family, wallet));
        *pending = Some(Pending {
            config,
            adapters: adapters.register(adapter),
        });
        Ok(())
    }

    /// Replays the persisted intent in the background. Resolves to the
    /// outcome name (`restored`, `skipped`, `failed`, ...).
    pub fn start(&self) -> Promise {
        let session = self.session();
        future_to_promise(async move {
            let outcome = AutoReconnect::run(&session).await;
            Ok(JsValue::from_str(outcome_label(&outcome)))
        })
    }

    pub fn connect(&self, family: String) -> Promise {
        let session = self.session();
        future_to_promise(async move {
            let family = parse_family(&family)?;
            let account = session.connect(family).await.map_err(|err| wallet_error(&err))?;
            to_js(&account)
        })
    }

    pub fn disconnect(&self) -> Promise {
        let session = self.session();
        future_to_promise(async move {
            session.disconnect().await;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = switchChain)]
    pub fn switch_chain(&self, chain_id: JsValue) -> Promise {
        let session = self.session();
        future_to_promise(async move {
            let chain_id = chain_id_of(&chain_id).ok_or_else(|| js_error("invalid chain id"))?;
            session
                .switch_chain(chain_id)
                .await
                .map_err(|err| wallet_error(&err))?;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = signMessage)]
    pub fn sign_message(&self, message: String) -> Promise {
        let session = self.session();
        future_to_promise(async move {
            let signature = session
                .sign_message(&message)
                .await
                .map_err(|err| wallet_error(&err))?;
            Ok(JsValue::from_str(&signature.0))
        })
    }

    #[wasm_bindgen(js_name = sendTransaction)]
    pub fn send_transaction(&self, request: JsValue) -> Promise {
        let session = self.session();
        future_to_promise(async move {
            let request: TransactionRequest = serde_wasm_bindgen::from_value(request)?;
            let handle = session
                .send_transaction(&request)
                .await
                .map_err(|err| wallet_error(&err))?;
            Ok(JsValue::from_str(&handle.0))
        })
    }

    /// Resolves to the balance string, or `null` when unknown.
    #[wasm_bindgen(js_name = refreshBalance)]
    pub fn refresh_balance(&self, token_hint: Option<String>) -> Promise {
        let session = self.session();
        future_to_promise(async move {
            let balance = session.refresh_balance(token_hint.as_deref()).await;
            Ok(balance.map(|b| JsValue::from_str(&b)).unwrap_or(JsValue::NULL))
        })
    }

    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session().snapshot())
    }

    /// Calls `listener(snapshot)` after every committed transition. Returns
    /// an id for `unsubscribe`.
    pub fn subscribe(&self, listener: Function) -> f64 {
        let id = self.session().subscribe(move |snapshot| match to_js(snapshot) {
            Ok(value) => {
                if let Err(thrown) = listener.call1(&JsValue::NULL, &value) {
                    gloo_console::warn!("session listener threw", thrown);
                }
            }
            Err(err) => gloo_console::error!("could not convert snapshot", err),
        });
        u64::from(id) as f64
    }

    pub fn unsubscribe(&self, id: f64) -> bool {
        self.session().unsubscribe(SubscriptionId::from(id as u64))
    }
}
