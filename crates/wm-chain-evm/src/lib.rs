use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};
use wm_chain_adapter::{ChainAdapter, WalletError};
use wm_types::{
    ChainFamily, ChainId, ConnectedAccount, Signature, TransactionHandle, TransactionRequest,
    WalletAddress,
};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:1248";
pub const ENDPOINT_ENV: &str = "WALLETMESH_EVM_RPC_URL";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// EVM adapter speaking the EIP-1193 method set as JSON-RPC over HTTP, the
/// way desktop wallets such as Frame expose themselves to native apps.
///
/// Reads `WALLETMESH_EVM_RPC_URL` when no endpoint is passed
/// (default: `http://127.0.0.1:1248`). Requests that exceed the timeout
/// surface as [`WalletError::Timeout`].
pub struct EvmAdapter {
    endpoint: String,
    http: reqwest::Client,
    account: RwLock<Option<WalletAddress>>,
    next_id: AtomicU64,
}

impl Default for EvmAdapter {
    fn default() -> Self {
        Self::new(None)
    }
}

impl EvmAdapter {
    pub fn new(endpoint: Option<String>) -> Self {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(endpoint: Option<String>, timeout: Duration) -> Self {
        let endpoint = endpoint
            .or_else(|| std::env::var(ENDPOINT_ENV).ok())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|err| {
                warn!("falling back to default http client: {}", err);
                reqwest::Client::new()
            });
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http,
            account: RwLock::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn current_account(&self) -> Option<WalletAddress> {
        self.account.read().ok().and_then(|guard| guard.clone())
    }

    fn set_account(&self, account: Option<WalletAddress>) {
        if let Ok(mut guard) = self.account.write() {
            *guard = account;
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcFailure> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!("evm rpc -> {}", method);

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(RpcFailure::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RpcFailure::Malformed(format!("HTTP {status}: {text}")));
        }

        let envelope: RpcResponse = response.json().await.map_err(RpcFailure::Transport)?;
        if let Some(error) = envelope.error {
            return Err(RpcFailure::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        Ok(envelope.result.unwrap_or(Value::Null))
    }

    async fn chain_id(&self, op: Operation) -> Result<ChainId, WalletError> {
        let raw = self
            .call("eth_chainId", json!([]))
            .await
            .map_err(|failure| classify(failure, op))?;
        parse_quantity(&raw)
            .and_then(|id| u64::try_from(id).ok())
            .map(ChainId::Numeric)
            .ok_or_else(|| WalletError::Provider(format!("malformed eth_chainId result: {raw}")))
    }
}

// ── JSON-RPC envelope ────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug)]
enum RpcFailure {
    Transport(reqwest::Error),
    Rpc { code: i64, message: String },
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Connect,
    Reconnect,
    Sign,
    Send,
    Switch,
}

// EIP-1193 provider error codes.
const USER_REJECTED: i64 = 4001;
const UNAUTHORIZED: i64 = 4100;
const UNSUPPORTED_METHOD: i64 = 4200;
const DISCONNECTED: i64 = 4900;
const CHAIN_DISCONNECTED: i64 = 4901;
const UNRECOGNIZED_CHAIN: i64 = 4902;

fn classify(failure: RpcFailure, op: Operation) -> WalletError {
    match failure {
        RpcFailure::Transport(err) => {
            if err.is_timeout() {
                WalletError::Timeout
            } else if err.is_connect() {
                WalletError::NoWalletFound
            } else if op == Operation::Send {
                WalletError::SendFailed(err.to_string())
            } else {
                WalletError::Provider(err.to_string())
            }
        }
        RpcFailure::Rpc { code, message } => classify_rpc(code, message, op),
        RpcFailure::Malformed(reason) if op == Operation::Send => WalletError::SendFailed(reason),
        RpcFailure::Malformed(reason) => WalletError::Provider(reason),
    }
}

fn classify_rpc(code: i64, message: String, op: Operation) -> WalletError {
    match code {
        USER_REJECTED if op == Operation::Reconnect => WalletError::NoSilentReconnect,
        USER_REJECTED => WalletError::UserRejected,
        UNAUTHORIZED if op == Operation::Reconnect => WalletError::NoSilentReconnect,
        UNAUTHORIZED | DISCONNECTED | CHAIN_DISCONNECTED => WalletError::NotConnected,
        UNRECOGNIZED_CHAIN => WalletError::UnsupportedChainId(message),
        UNSUPPORTED_METHOD if op == Operation::Switch => {
            WalletError::capability("switch_chain_id")
        }
        UNSUPPORTED_METHOD => WalletError::capability(message),
        _ if op == Operation::Send => {
            if message.to_ascii_lowercase().contains("insufficient funds") {
                WalletError::InsufficientFunds
            } else {
                WalletError::SendFailed(message)
            }
        }
        _ => WalletError::Provider(format!("rpc error {code}: {message}")),
    }
}

#[async_trait]
impl ChainAdapter for EvmAdapter {
    fn family(&self) -> ChainFamily {
        ChainFamily::Evm
    }

    async fn connect(&self) -> Result<ConnectedAccount, WalletError> {
        let accounts = self
            .call("eth_requestAccounts", json!([]))
            .await
            .map_err(|failure| classify(failure, Operation::Connect))?;
        let Some(address) = accounts_of(&accounts).into_iter().next() else {
            return Err(WalletError::UserRejected);
        };

        let chain_id = self.chain_id(Operation::Connect).await?;
        self.set_account(Some(address.clone()));
        info!("evm wallet connected {} on chain {}", address, chain_id);

        Ok(ConnectedAccount { address, chain_id })
    }

    async fn reconnect(
        &self,
        address_hint: Option<&WalletAddress>,
    ) -> Result<ConnectedAccount, WalletError> {
        // eth_accounts never prompts; an empty list means the wallet wants a
        // fresh authorization.
        let accounts = self
            .call("eth_accounts", json!([]))
            .await
            .map_err(|failure| classify(failure, Operation::Reconnect))?;
        let accounts = accounts_of(&accounts);
        if accounts.is_empty() {
            return Err(WalletError::NoSilentReconnect);
        }

        let address = address_hint
            .and_then(|hint| {
                accounts
                    .iter()
                    .find(|candidate| candidate.0.eq_ignore_ascii_case(&hint.0))
                    .cloned()
            })
            .unwrap_or_else(|| accounts[0].clone());

        let chain_id = self.chain_id(Operation::Reconnect).await?;
        self.set_account(Some(address.clone()));
        info!("evm wallet session resumed for {}", address);

        Ok(ConnectedAccount { address, chain_id })
    }

    async fn disconnect(&self) {
        if self.current_account().is_none() {
            return;
        }
        self.set_account(None);

        if let Err(failure) = self
            .call("wallet_revokePermissions", json!([{ "eth_accounts": {} }]))
            .await
        {
            warn!("evm wallet did not revoke permissions: {:?}", failure);
        }
    }

    async fn sign_message(&self, message: &str) -> Result<Signature, WalletError> {
        let address = self.current_account().ok_or(WalletError::NotConnected)?;
        let encoded = format!("0x{}", hex_lower(message.as_bytes()));

        let raw = self
            .call("personal_sign", json!([encoded, address.0]))
            .await
            .map_err(|failure| classify(failure, Operation::Sign))?;

        raw.as_str()
            .map(|sig| Signature(sig.to_owned()))
            .ok_or_else(|| WalletError::Provider(format!("malformed personal_sign result: {raw}")))
    }

    async fn send_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<TransactionHandle, WalletError> {
        let address = self.current_account().ok_or(WalletError::NotConnected)?;
        let tx = transaction_object(&address, request)?;

        let raw = self
            .call("eth_sendTransaction", json!([tx]))
            .await
            .map_err(|failure| classify(failure, Operation::Send))?;

        raw.as_str()
            .map(|hash| TransactionHandle(hash.to_owned()))
            .ok_or_else(|| WalletError::SendFailed(format!("wallet returned no hash: {raw}")))
    }

    async fn switch_chain_id(&self, chain_id: &ChainId) -> Result<(), WalletError> {
        let Some(id) = chain_id.as_u64() else {
            return Err(WalletError::UnsupportedChainId(chain_id.to_string()));
        };

        self.call(
            "wallet_switchEthereumChain",
            json!([{ "chainId": format!("0x{id:x}") }]),
        )
        .await
        .map_err(|failure| match classify(failure, Operation::Switch) {
            WalletError::UnsupportedChainId(_) => WalletError::UnsupportedChainId(id.to_string()),
            other => other,
        })?;

        Ok(())
    }

    async fn get_balance(&self, token_hint: Option<&str>) -> Option<String> {
        if let Some(token) = token_hint {
            debug!("token balances are not queried by the evm adapter ({})", token);
            return None;
        }
        let address = self.current_account()?;

        match self.call("eth_getBalance", json!([address.0, "latest"])).await {
            Ok(raw) => parse_quantity(&raw).map(format_ether),
            Err(failure) => {
                warn!("evm balance query failed: {:?}", failure);
                None
            }
        }
    }
}

fn accounts_of(value: &Value) -> Vec<WalletAddress> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|addr| WalletAddress(addr.to_owned()))
                .collect()
        })
        .unwrap_or_default()
}

fn transaction_object(
    from: &WalletAddress,
    request: &TransactionRequest,
) -> Result<Value, WalletError> {
    if let Some(payload) = &request.payload {
        let Value::Object(mut tx) = payload.clone() else {
            return Err(WalletError::SendFailed(
                "evm transaction payload must be an object".to_owned(),
            ));
        };
        tx.entry("from").or_insert_with(|| Value::String(from.0.clone()));
        return Ok(Value::Object(tx));
    }

    let mut tx = serde_json::Map::new();
    tx.insert("from".to_owned(), Value::String(from.0.clone()));
    if let Some(to) = &request.to {
        tx.insert("to".to_owned(), Value::String(to.clone()));
    }
    if let Some(value) = &request.value {
        let wei: u128 = value
            .trim()
            .parse()
            .map_err(|_| WalletError::SendFailed(format!("invalid value: {value}")))?;
        tx.insert("value".to_owned(), Value::String(format!("0x{wei:x}")));
    }
    if let Some(data) = &request.data {
        tx.insert("data".to_owned(), Value::String(data.clone()));
    }

    if !tx.contains_key("to") && !tx.contains_key("data") {
        return Err(WalletError::SendFailed(
            "transaction needs a recipient or call data".to_owned(),
        ));
    }

    Ok(Value::Object(tx))
}

/// Parses an RPC hex quantity (`"0x1a"`).
fn parse_quantity(value: &Value) -> Option<u128> {
    let raw = value.as_str()?;
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    if digits.is_empty() {
        return Some(0);
    }
    u128::from_str_radix(digits, 16).ok()
}

fn format_ether(wei: u128) -> String {
    let whole = wei / WEI_PER_ETHER;
    let fraction = wei % WEI_PER_ETHER;
    if fraction == 0 {
        return whole.to_string();
    }
    let fraction = format!("{fraction:018}");
    format!("{whole}.{}", fraction.trim_end_matches('0'))
}

fn hex_lower(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantities_and_ether_formatting() {
        assert_eq!(parse_quantity(&json!("0x0")), Some(0));
        assert_eq!(parse_quantity(&json!("0x")), Some(0));
        assert_eq!(parse_quantity(&json!("0x89")), Some(137));
        assert_eq!(parse_quantity(&json!(12)), None);

        assert_eq!(format_ether(0), "0");
        assert_eq!(format_ether(WEI_PER_ETHER), "1");
        assert_eq!(format_ether(1_500_000_000_000_000_000), "1.5");
        assert_eq!(format_ether(1), "0.000000000000000001");
    }

    #[test]
    fn rpc_codes_map_onto_taxonomy() {
        let rejected = classify_rpc(USER_REJECTED, "denied".into(), Operation::Connect);
        assert_eq!(rejected, WalletError::UserRejected);

        let silent = classify_rpc(USER_REJECTED, "denied".into(), Operation::Reconnect);
        assert_eq!(silent, WalletError::NoSilentReconnect);

        let chain = classify_rpc(UNRECOGNIZED_CHAIN, "unknown chain".into(), Operation::Switch);
        assert!(matches!(chain, WalletError::UnsupportedChainId(_)));

        let no_switch = classify_rpc(UNSUPPORTED_METHOD, "nope".into(), Operation::Switch);
        assert_eq!(no_switch, WalletError::capability("switch_chain_id"));

        let funds = classify_rpc(
            -32000,
            "Insufficient funds for gas * price + value".into(),
            Operation::Send,
        );
        assert_eq!(funds, WalletError::InsufficientFunds);

        let other_send = classify_rpc(-32000, "nonce too low".into(), Operation::Send);
        assert_eq!(other_send, WalletError::SendFailed("nonce too low".into()));

        let sign = classify_rpc(DISCONNECTED, "gone".into(), Operation::Sign);
        assert_eq!(sign, WalletError::NotConnected);
    }

    #[test]
    fn transaction_object_from_fields_and_payload() {
        let from = WalletAddress("0xabc".to_owned());

        let request = TransactionRequest {
            to: Some("0xdef".to_owned()),
            value: Some("1000".to_owned()),
            ..TransactionRequest::default()
        };
        let tx = transaction_object(&from, &request).expect("tx");
        assert_eq!(tx["from"], "0xabc");
        assert_eq!(tx["to"], "0xdef");
        assert_eq!(tx["value"], "0x3e8");

        let payload = TransactionRequest {
            payload: Some(json!({ "to": "0x123", "gas": "0x5208" })),
            ..TransactionRequest::default()
        };
        let tx = transaction_object(&from, &payload).expect("payload tx");
        assert_eq!(tx["from"], "0xabc");
        assert_eq!(tx["gas"], "0x5208");

        let empty = transaction_object(&from, &TransactionRequest::default());
        assert!(matches!(empty, Err(WalletError::SendFailed(_))));

        let bad_value = TransactionRequest {
            to: Some("0xdef".to_owned()),
            value: Some("1.5".to_owned()),
            ..TransactionRequest::default()
        };
        assert!(matches!(
            transaction_object(&from, &bad_value),
            Err(WalletError::SendFailed(_))
        ));
    }

    #[test]
    fn endpoint_is_normalized() {
        let adapter = EvmAdapter::new(Some("http://127.0.0.1:1248/".to_owned()));
        assert_eq!(adapter.endpoint(), "http://127.0.0.1:1248");
    }
}
