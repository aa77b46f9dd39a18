use super::StorageArea;
use anyhow::Result;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::RwLock;

/// Volatile storage scope. Default when no file path is configured, and the
/// test double for both scopes.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<FxHashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl StorageArea for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.write().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().unwrap().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().unwrap().clear();
        Ok(())
    }
}
