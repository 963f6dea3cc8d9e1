use std::collections::HashMap;
use std::sync::Mutex;

use super::{CursorStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CursorStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::get_u64;

    #[test]
    fn counters_parse_or_are_absent() {
        let store = MemoryStore::new();
        assert_eq!(get_u64(&store, "indice"), None);
        store.set("indice", "41").unwrap();
        assert_eq!(get_u64(&store, "indice"), Some(41));
        store.set("indice", "forty").unwrap();
        assert_eq!(get_u64(&store, "indice"), None);
    }
}
