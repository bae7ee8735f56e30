use async_trait::async_trait;
use js_sys::{Array, Function, Promise, Reflect};
use serde::Serialize;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use wm_chain_adapter::{ChainAdapter, WalletError};
use wm_types::{
    ChainFamily, ChainId, ConnectedAccount, Signature, TransactionHandle, TransactionRequest,
    WalletAddress,
};

use crate::convert;
use crate::errors::{self, Operation, Thrown};

/// [`ChainAdapter`] backed by a wallet object supplied from JavaScript.
///
/// The object exposes async `connect()`, `disconnect()`,
/// `signMessage(message)`, `sendTransaction(request)` and optionally
/// `reconnect(addressHint)`, `switchChain(chainId)` and
/// `getBalance(tokenHint)`. `connect`/`reconnect` resolve to
/// `{ address, chainId }`.
pub struct JsAdapter {
    family: ChainFamily,
    wallet: JsValue,
}

impl JsAdapter {
    pub fn new(family: ChainFamily, wallet: JsValue) -> Self {
        Self { family, wallet }
    }

    fn method(&self, name: &str) -> Option<Function> {
        Reflect::get(&self.wallet, &JsValue::from_str(name))
            .ok()?
            .dyn_into::<Function>()
            .ok()
    }

    /// `None` when the wallet has no such method.
    async fn invoke(&self, name: &str, args: &Array) -> Option<Result<JsValue, JsValue>> {
        let method = self.method(name)?;
        let result = match method.apply(&self.wallet, args) {
            Ok(returned) => JsFuture::from(Promise::resolve(&returned)).await,
            Err(thrown) => Err(thrown),
        };
        Some(result)
    }

    async fn call(&self, op: Operation, args: &Array) -> Result<JsValue, WalletError> {
        match self.invoke(op.method(), args).await {
            Some(result) => result.map_err(|thrown| errors::classify(thrown_parts(&thrown), op)),
            None => Err(op.missing()),
        }
    }
}

fn field(value: &JsValue, name: &str) -> Option<JsValue> {
    if !value.is_object() {
        return None;
    }
    let found = Reflect::get(value, &JsValue::from_str(name)).ok()?;
    (!found.is_undefined() && !found.is_null()).then_some(found)
}

fn thrown_parts(thrown: &JsValue) -> Thrown {
    let message = field(thrown, "message")
        .and_then(|m| m.as_string())
        .or_else(|| thrown.as_string())
        .unwrap_or_else(|| format!("{thrown:?}"));

    Thrown {
        code: convert::error_code(field(thrown, "code").and_then(|c| c.as_f64())),
        kind: field(thrown, "kind").and_then(|k| k.as_string()),
        message,
    }
}

fn text(value: &JsValue) -> Option<String> {
    value
        .as_string()
        .or_else(|| value.as_f64().map(|n| n.to_string()))
}

/// Numbers must be safe integers; strings go through `ChainId::from_str`.
pub(crate) fn chain_id_of(value: &JsValue) -> Option<ChainId> {
    match value.as_f64() {
        Some(n) => convert::chain_id_from_number(n),
        None => convert::chain_id_from_text(&value.as_string()?),
    }
}

pub(crate) fn chain_id_to_js(chain_id: &ChainId) -> JsValue {
    match convert::chain_id_as_js_number(chain_id) {
        Some(n) => JsValue::from_f64(n),
        None => JsValue::from_str(&chain_id.to_string()),
    }
}

fn account_of(value: &JsValue) -> Result<ConnectedAccount, WalletError> {
    convert::account_from_parts(
        field(value, "address").and_then(|a| a.as_string()),
        field(value, "chainId").as_ref().and_then(chain_id_of),
    )
}

#[async_trait(?Send)]
impl ChainAdapter for JsAdapter {
    fn family(&self) -> ChainFamily {
        self.family.clone()
    }

    async fn connect(&self) -> Result<ConnectedAccount, WalletError> {
        let value = self.call(Operation::Connect, &Array::new()).await?;
        account_of(&value)
    }

    async fn reconnect(
        &self,
        address_hint: Option<&WalletAddress>,
    ) -> Result<ConnectedAccount, WalletError> {
        let hint = address_hint
            .map(|a| JsValue::from_str(&a.0))
            .unwrap_or(JsValue::UNDEFINED);
        let value = self.call(Operation::Reconnect, &Array::of1(&hint)).await?;
        account_of(&value)
    }

    async fn disconnect(&self) {
        if let Some(Err(thrown)) = self.invoke("disconnect", &Array::new()).await {
            gloo_console::warn!("wallet disconnect failed", thrown);
        }
    }

    async fn sign_message(&self, message: &str) -> Result<Signature, WalletError> {
        let value = self
            .call(Operation::Sign, &Array::of1(&JsValue::from_str(message)))
            .await?;
        value
            .as_string()
            .or_else(|| field(&value, "signature").and_then(|s| s.as_string()))
            .map(Signature)
            .ok_or_else(|| WalletError::Provider("wallet returned no signature".to_owned()))
    }

    async fn send_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<TransactionHandle, WalletError> {
        let request = request
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|err| WalletError::SendFailed(err.to_string()))?;
        let value = self.call(Operation::Send, &Array::of1(&request)).await?;
        text(&value)
            .or_else(|| field(&value, "hash").as_ref().and_then(text))
            .map(TransactionHandle)
            .ok_or_else(|| WalletError::SendFailed("wallet returned no transaction hash".to_owned()))
    }

    async fn switch_chain_id(&self, chain_id: &ChainId) -> Result<(), WalletError> {
        self.call(Operation::Switch, &Array::of1(&chain_id_to_js(chain_id)))
            .await
            .map(|_| ())
    }

    async fn get_balance(&self, token_hint: Option<&str>) -> Option<String> {
        let hint = token_hint.map(JsValue::from_str).unwrap_or(JsValue::UNDEFINED);
        match self.invoke("getBalance", &Array::of1(&hint)).await? {
            Ok(value) => text(&value),
            Err(thrown) => {
                gloo_console::warn!("wallet balance query failed", thrown);
                None
            }
        }
    }
}
