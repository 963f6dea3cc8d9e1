mod error;
mod file;
mod memory;

pub use error::StoreError;
pub use file::FileStore;
pub use memory::MemoryStore;

pub const WINDOW_INDEX_KEY: &str = "indice";
pub const SESSION_CONFIG_KEY: &str = "simulation_config";
const PLAYBACK_INDEX_PREFIX: &str = "simulation_index";

pub fn playback_index_key(node_id: &str) -> String {
    format!("{}.{}", PLAYBACK_INDEX_PREFIX, node_id)
}

/// Durable string key/value store that survives restarts.
pub trait CursorStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Writes several keys at once. Stores with costly writes persist the
    /// whole batch in one go.
    fn set_many(&self, entries: &[(String, String)]) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}

/// Reads an integer counter; missing or malformed values count as absent.
pub fn get_u64(store: &dyn CursorStore, key: &str) -> Option<u64> {
    let raw = store.get(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("Ignoring malformed value for {}: {:?}", key, raw);
            None
        }
    }
}
