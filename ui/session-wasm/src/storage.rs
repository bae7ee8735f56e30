use wm_storage::IntentStore;

/// Session hints kept in `window.localStorage`.
///
/// Private browsing modes and sandboxed iframes may deny storage; reads then
/// come back absent and writes are dropped with a console warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorageStore;

fn storage() -> Option<web_sys::Storage> {
    web_sys::window()?.local_storage().ok()?
}

impl IntentStore for LocalStorageStore {
    fn read(&self, key: &str) -> Option<String> {
        storage()?.get_item(key).ok()?
    }

    fn write(&self, key: &str, value: &str) {
        let written = storage().map(|s| s.set_item(key, value).is_ok());
        if written != Some(true) {
            gloo_console::warn!("localStorage unavailable; dropping write of", key);
        }
    }

    fn remove(&self, key: &str) {
        let removed = storage().map(|s| s.remove_item(key).is_ok());
        if removed != Some(true) {
            gloo_console::warn!("localStorage unavailable; could not remove", key);
        }
    }
}
