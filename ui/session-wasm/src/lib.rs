//! Browser binding for the wallet session.
//!
//! Exposes a `WalletSession` class to JavaScript. Chain families other than
//! the native EVM adapter are plugged in as JS wallet objects wrapped by
//! [`JsAdapter`]; the session hint lives in `localStorage`.

pub mod convert;
pub mod errors;

#[cfg(target_arch = "wasm32")]
mod adapter;
#[cfg(target_arch = "wasm32")]
mod binding;
#[cfg(target_arch = "wasm32")]
mod storage;

#[cfg(target_arch = "wasm32")]
pub use adapter::JsAdapter;
#[cfg(target_arch = "wasm32")]
pub use binding::WalletSession;
#[cfg(target_arch = "wasm32")]
pub use storage::LocalStorageStore;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}
