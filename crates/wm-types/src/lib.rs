use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `Send + Sync` on native targets, no bound on `wasm32` where wallet handles
/// are JavaScript objects pinned to the UI thread.
#[cfg(not(target_arch = "wasm32"))]
pub trait MaybeSendSync: Send + Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + Sync + ?Sized> MaybeSendSync for T {}

#[cfg(target_arch = "wasm32")]
pub trait MaybeSendSync {}
#[cfg(target_arch = "wasm32")]
impl<T: ?Sized> MaybeSendSync for T {}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("chain family tag cannot be empty")]
    EmptyFamily,
    #[error("invalid chain family tag: {0}")]
    InvalidFamily(String),
    #[error("chain id cannot be empty")]
    EmptyChainId,
}

/// Wallet-interaction family a chain belongs to.
///
/// `evm` covers Ethereum, Base, Arbitrum and friends; the network inside a
/// family is a [`ChainId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChainFamily {
    Evm,
    Solana,
    Ton,
    Aptos,
    Sui,
    Cosmos,
    Near,
    Custom(String),
}

impl ChainFamily {
    pub fn tag(&self) -> &str {
        match self {
            Self::Evm => "evm",
            Self::Solana => "solana",
            Self::Ton => "ton",
            Self::Aptos => "aptos",
            Self::Sui => "sui",
            Self::Cosmos => "cosmos",
            Self::Near => "near",
            Self::Custom(tag) => tag,
        }
    }

    /// The parsed form of this family's tag, so a hand-built
    /// `Custom("EVM")` compares equal to `Evm`. Tags that do not parse are
    /// kept as they are.
    pub fn canonical(&self) -> Self {
        self.tag().parse().unwrap_or_else(|_| self.clone())
    }
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ChainFamily {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let tag = raw.trim().to_ascii_lowercase();
        if tag.is_empty() {
            return Err(ParseError::EmptyFamily);
        }

        let family = match tag.as_str() {
            "evm" => Self::Evm,
            "solana" => Self::Solana,
            "ton" => Self::Ton,
            "aptos" => Self::Aptos,
            "sui" => Self::Sui,
            "cosmos" => Self::Cosmos,
            "near" => Self::Near,
            _ => {
                let valid = tag
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
                if !valid {
                    return Err(ParseError::InvalidFamily(raw.to_owned()));
                }
                Self::Custom(tag)
            }
        };

        Ok(family)
    }
}

impl TryFrom<String> for ChainFamily {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChainFamily> for String {
    fn from(value: ChainFamily) -> Self {
        value.tag().to_owned()
    }
}

/// Network identifier inside a chain family: numeric for EVM, named for
/// families such as Cosmos (`cosmoshub-4`) or NEAR (`mainnet`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChainId {
    Numeric(u64),
    Named(String),
}

impl ChainId {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Numeric(id) => Some(*id),
            Self::Named(_) => None,
        }
    }
}

impl From<u64> for ChainId {
    fn from(value: u64) -> Self {
        Self::Numeric(value)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{id}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

impl FromStr for ChainId {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ParseError::EmptyChainId);
        }

        if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
            if let Ok(id) = u64::from_str_radix(hex, 16) {
                return Ok(Self::Numeric(id));
            }
        } else if raw.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(id) = raw.parse::<u64>() {
                return Ok(Self::Numeric(id));
            }
        }

        Ok(Self::Named(raw.to_owned()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct WalletAddress(pub String);

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Signature(pub String);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionHandle(pub String);

/// What an adapter hands back after a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedAccount {
    pub address: WalletAddress,
    pub chain_id: ChainId,
}

/// Chain-agnostic transaction request. The session never inspects it; each
/// adapter reads the fields its wallet library understands and may take a
/// fully formed chain-specific request from `payload`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(default)]
    pub to: Option<String>,
    /// Amount in the chain's smallest unit, as a decimal string.
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// Owned copy of the session state, handed to subscribers and readers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub connection_status: ConnectionStatus,
    pub active_chain_family: Option<ChainFamily>,
    pub address: Option<WalletAddress>,
    pub chain_id: Option<ChainId>,
    pub balance: Option<String>,
    pub last_error: Option<String>,
}

impl SessionSnapshot {
    pub fn is_connected(&self) -> bool {
        self.connection_status == ConnectionStatus::Connected
    }

    /// Address, family and `Connected` status are set together or not at all.
    pub fn is_consistent(&self) -> bool {
        let address = self.address.is_some();
        let family = self.active_chain_family.is_some();
        address == family && family == self.is_connected()
    }
}
