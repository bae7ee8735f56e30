//! Mapping of values thrown by JavaScript wallets onto [`WalletError`].
//!
//! Wallets either throw EIP-1193 style errors carrying a numeric `code`, or
//! objects carrying a `kind` that names an [`ErrorKind`](wm_chain_adapter::ErrorKind)
//! directly. Anything else is classified by the operation that failed.

use wm_chain_adapter::WalletError;

const USER_REJECTED: i64 = 4001;
const UNAUTHORIZED: i64 = 4100;
const UNSUPPORTED_METHOD: i64 = 4200;
const DISCONNECTED: i64 = 4900;
const CHAIN_DISCONNECTED: i64 = 4901;
const UNRECOGNIZED_CHAIN: i64 = 4902;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Connect,
    Reconnect,
    Sign,
    Send,
    Switch,
}

impl Operation {
    /// Method name looked up on the JS wallet object.
    pub fn method(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Reconnect => "reconnect",
            Self::Sign => "signMessage",
            Self::Send => "sendTransaction",
            Self::Switch => "switchChain",
        }
    }

    fn capability(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Reconnect => "reconnect",
            Self::Sign => "sign_message",
            Self::Send => "send_transaction",
            Self::Switch => "switch_chain_id",
        }
    }

    /// Error for a wallet object lacking the method entirely.
    pub fn missing(self) -> WalletError {
        match self {
            Self::Reconnect => WalletError::NoSilentReconnect,
            op => WalletError::capability(op.capability()),
        }
    }
}

/// The interesting parts of a thrown JS value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Thrown {
    pub code: Option<i64>,
    pub kind: Option<String>,
    pub message: String,
}

pub fn classify(thrown: Thrown, op: Operation) -> WalletError {
    let Thrown {
        code,
        kind,
        message,
    } = thrown;

    if let Some(err) = kind.as_deref().and_then(|kind| from_kind(kind, &message, op)) {
        return silence(err, op);
    }

    let err = match code {
        Some(USER_REJECTED) => WalletError::UserRejected,
        Some(UNAUTHORIZED) if op == Operation::Reconnect => WalletError::NoSilentReconnect,
        Some(UNAUTHORIZED | DISCONNECTED | CHAIN_DISCONNECTED) => WalletError::NotConnected,
        Some(UNRECOGNIZED_CHAIN) => WalletError::UnsupportedChainId(message),
        Some(UNSUPPORTED_METHOD) => WalletError::capability(op.capability()),
        _ if message.to_ascii_lowercase().contains("insufficient funds") => {
            WalletError::InsufficientFunds
        }
        _ if op == Operation::Send => WalletError::SendFailed(message),
        Some(code) => WalletError::Provider(format!("wallet error {code}: {message}")),
        None => WalletError::Provider(message),
    };
    silence(err, op)
}

fn from_kind(kind: &str, message: &str, op: Operation) -> Option<WalletError> {
    let err = match kind {
        "UserRejected" => WalletError::UserRejected,
        "NoWalletFound" => WalletError::NoWalletFound,
        "NoSilentReconnect" => WalletError::NoSilentReconnect,
        "NotConnected" => WalletError::NotConnected,
        "UnsupportedChainId" => WalletError::UnsupportedChainId(message.to_owned()),
        "CapabilityNotSupported" => WalletError::capability(op.capability()),
        "InsufficientFunds" => WalletError::InsufficientFunds,
        "SendFailed" => WalletError::SendFailed(message.to_owned()),
        "Timeout" => WalletError::Timeout,
        "Provider" => WalletError::Provider(message.to_owned()),
        _ => return None,
    };
    Some(err)
}

/// A prompt during silent reconnect means the wallet needs the user.
fn silence(err: WalletError, op: Operation) -> WalletError {
    match err {
        WalletError::UserRejected if op == Operation::Reconnect => WalletError::NoSilentReconnect,
        err => err,
    }
}
