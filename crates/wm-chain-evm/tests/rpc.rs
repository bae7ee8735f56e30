use axum::{Json, Router, extract::State, routing::post};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wm_chain_adapter::{ChainAdapter, ErrorKind, WalletError};
use wm_chain_evm::EvmAdapter;
use wm_types::{ChainId, TransactionRequest, WalletAddress};

/// Canned JSON-RPC wallet: `method -> {"result": ..}` or `{"error": ..}`.
#[derive(Clone, Default)]
struct MockWallet {
    replies: Arc<Mutex<HashMap<String, Value>>>,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
    delay: Option<Duration>,
}

impl MockWallet {
    fn reply(self, method: &str, reply: Value) -> Self {
        self.replies
            .lock()
            .expect("replies lock")
            .insert(method.to_owned(), reply);
        self
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|(method, _)| method).collect()
    }
}

async fn handle(State(wallet): State<MockWallet>, Json(request): Json<Value>) -> Json<Value> {
    if let Some(delay) = wallet.delay {
        tokio::time::sleep(delay).await;
    }

    let method = request["method"].as_str().unwrap_or_default().to_owned();
    wallet
        .calls
        .lock()
        .expect("calls lock")
        .push((method.clone(), request["params"].clone()));

    let reply = wallet
        .replies
        .lock()
        .expect("replies lock")
        .get(&method)
        .cloned()
        .unwrap_or_else(|| json!({ "error": { "code": -32601, "message": "method not found" } }));

    let mut body = json!({ "jsonrpc": "2.0", "id": request["id"].clone() });
    if let Some(result) = reply.get("result") {
        body["result"] = result.clone();
    }
    if let Some(error) = reply.get("error") {
        body["error"] = error.clone();
    }
    Json(body)
}

async fn serve(wallet: MockWallet) -> String {
    let app = Router::new().route("/", post(handle)).with_state(wallet);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock wallet");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve mock wallet");
    });
    format!("http://{addr}")
}

fn ok(result: Value) -> Value {
    json!({ "result": result })
}

fn rpc_error(code: i64, message: &str) -> Value {
    json!({ "error": { "code": code, "message": message } })
}

fn connected_wallet() -> MockWallet {
    MockWallet::default()
        .reply("eth_requestAccounts", ok(json!(["0xabc", "0xdef"])))
        .reply("eth_chainId", ok(json!("0x1")))
}

#[tokio::test]
async fn connect_sign_and_balance() {
    let wallet = connected_wallet()
        .reply("personal_sign", ok(json!("0xsignature")))
        .reply("eth_getBalance", ok(json!("0x14d1120d7b160000")));
    let adapter = EvmAdapter::new(Some(serve(wallet.clone()).await));

    let account = adapter.connect().await.expect("connect");
    assert_eq!(account.address, WalletAddress("0xabc".to_owned()));
    assert_eq!(account.chain_id, ChainId::Numeric(1));

    let signature = adapter.sign_message("hello").await.expect("sign");
    assert_eq!(signature.0, "0xsignature");

    let balance = adapter.get_balance(None).await;
    assert_eq!(balance.as_deref(), Some("1.5"));
    assert_eq!(adapter.get_balance(Some("USDC")).await, None);

    let calls = wallet.calls();
    let (_, sign_params) = calls
        .iter()
        .find(|(method, _)| method == "personal_sign")
        .expect("personal_sign call");
    assert_eq!(sign_params, &json!(["0x68656c6c6f", "0xabc"]));
}

#[tokio::test]
async fn user_rejection_during_connect() {
    let wallet = MockWallet::default()
        .reply("eth_requestAccounts", rpc_error(4001, "User rejected the request."));
    let adapter = EvmAdapter::new(Some(serve(wallet).await));

    assert_eq!(adapter.connect().await, Err(WalletError::UserRejected));
    assert_eq!(adapter.sign_message("hi").await, Err(WalletError::NotConnected));
}

#[tokio::test]
async fn silent_reconnect_uses_eth_accounts() {
    let empty = MockWallet::default().reply("eth_accounts", ok(json!([])));
    let adapter = EvmAdapter::new(Some(serve(empty.clone()).await));
    assert_eq!(adapter.reconnect(None).await, Err(WalletError::NoSilentReconnect));
    assert_eq!(empty.methods(), vec!["eth_accounts".to_owned()]);

    let authorized = MockWallet::default()
        .reply("eth_accounts", ok(json!(["0xAAA", "0xBBB"])))
        .reply("eth_chainId", ok(json!("0x89")));
    let adapter = EvmAdapter::new(Some(serve(authorized.clone()).await));
    let hint = WalletAddress("0xbbb".to_owned());
    let account = adapter.reconnect(Some(&hint)).await.expect("reconnect");
    assert_eq!(account.address, WalletAddress("0xBBB".to_owned()));
    assert_eq!(account.chain_id, ChainId::Numeric(137));
    assert!(!authorized.methods().contains(&"eth_requestAccounts".to_owned()));
}

#[tokio::test]
async fn switch_chain_maps_unknown_chain() {
    let wallet = connected_wallet()
        .reply("wallet_switchEthereumChain", rpc_error(4902, "Unrecognized chain ID"));
    let adapter = EvmAdapter::new(Some(serve(wallet.clone()).await));
    adapter.connect().await.expect("connect");

    let result = adapter.switch_chain_id(&ChainId::Numeric(424242)).await;
    assert_eq!(result, Err(WalletError::UnsupportedChainId("424242".to_owned())));

    let named = adapter
        .switch_chain_id(&ChainId::Named("mainnet".to_owned()))
        .await;
    assert_eq!(named.map_err(|e| e.kind()), Err(ErrorKind::UnsupportedChainId));

    let calls = wallet.calls();
    let (_, params) = calls
        .iter()
        .find(|(method, _)| method == "wallet_switchEthereumChain")
        .expect("switch call");
    assert_eq!(params, &json!([{ "chainId": "0x67932" }]));
}

#[tokio::test]
async fn send_transaction_paths() {
    let wallet = connected_wallet().reply(
        "eth_sendTransaction",
        rpc_error(-32000, "insufficient funds for gas * price + value"),
    );
    let adapter = EvmAdapter::new(Some(serve(wallet).await));
    let request = TransactionRequest {
        to: Some("0xdef".to_owned()),
        value: Some("1".to_owned()),
        ..TransactionRequest::default()
    };

    assert_eq!(
        adapter.send_transaction(&request).await,
        Err(WalletError::NotConnected)
    );

    adapter.connect().await.expect("connect");
    assert_eq!(
        adapter.send_transaction(&request).await,
        Err(WalletError::InsufficientFunds)
    );

    let happy = connected_wallet().reply("eth_sendTransaction", ok(json!("0xhash")));
    let adapter = EvmAdapter::new(Some(serve(happy).await));
    adapter.connect().await.expect("connect");
    let handle = adapter.send_transaction(&request).await.expect("send");
    assert_eq!(handle.0, "0xhash");
}

#[tokio::test]
async fn disconnect_revokes_and_swallows_failures() {
    let wallet = connected_wallet();
    let adapter = EvmAdapter::new(Some(serve(wallet.clone()).await));

    adapter.disconnect().await;
    assert!(wallet.methods().is_empty());

    adapter.connect().await.expect("connect");
    adapter.disconnect().await;
    assert_eq!(wallet.methods().last().map(String::as_str), Some("wallet_revokePermissions"));
    assert_eq!(adapter.sign_message("hi").await, Err(WalletError::NotConnected));
}

#[tokio::test]
async fn unreachable_endpoint_is_no_wallet() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let adapter = EvmAdapter::new(Some(format!("http://{addr}")));
    assert_eq!(adapter.connect().await, Err(WalletError::NoWalletFound));
    assert_eq!(adapter.reconnect(None).await, Err(WalletError::NoWalletFound));
}

#[tokio::test]
async fn slow_wallet_times_out() {
    let wallet = MockWallet {
        delay: Some(Duration::from_secs(2)),
        ..connected_wallet()
    };
    let adapter =
        EvmAdapter::with_timeout(Some(serve(wallet).await), Duration::from_millis(200));

    assert_eq!(adapter.connect().await, Err(WalletError::Timeout));
}
