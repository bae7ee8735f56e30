//! Pure conversions behind the JS adapter, kept free of `JsValue` so they
//! run in native tests.

use std::str::FromStr;
use wm_chain_adapter::WalletError;
use wm_types::{ChainId, ConnectedAccount, WalletAddress};

/// `Number.MAX_SAFE_INTEGER`.
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
const MAX_SAFE_U64: u64 = 9_007_199_254_740_991;

/// Non-negative safe integers only; anything else would be rounded or
/// saturated on the way to `u64`.
pub fn chain_id_from_number(n: f64) -> Option<ChainId> {
    (n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= MAX_SAFE_INTEGER)
        .then(|| ChainId::Numeric(n as u64))
}

pub fn chain_id_from_text(raw: &str) -> Option<ChainId> {
    ChainId::from_str(raw).ok()
}

/// Ids beyond the safe range cross to JS as decimal strings.
pub fn chain_id_as_js_number(chain_id: &ChainId) -> Option<f64> {
    match chain_id {
        ChainId::Numeric(id) if *id <= MAX_SAFE_U64 => Some(*id as f64),
        _ => None,
    }
}

pub fn account_from_parts(
    address: Option<String>,
    chain_id: Option<ChainId>,
) -> Result<ConnectedAccount, WalletError> {
    let address = address
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| WalletError::Provider("wallet returned no address".to_owned()))?;
    let chain_id =
        chain_id.ok_or_else(|| WalletError::Provider("wallet returned no chain id".to_owned()))?;

    Ok(ConnectedAccount {
        address: WalletAddress(address),
        chain_id,
    })
}

/// Error codes are integers; anything else is ignored.
pub fn error_code(raw: Option<f64>) -> Option<i64> {
    raw.filter(|c| c.is_finite() && c.fract() == 0.0 && c.abs() <= MAX_SAFE_INTEGER)
        .map(|c| c as i64)
}
