use super::StorageArea;
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::RwLock;

/// One storage scope persisted as a single JSON object on disk. Every write
/// rewrites the whole file, matching the scope's replace-on-write contract.
pub struct JsonFileStore {
    path: PathBuf,
    entries: RwLock<Map<String, Value>>,
}

impl JsonFileStore {
    /// Loads the scope from `path`, starting empty if the file is missing.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse storage file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read storage file {}", path.display()))
            }
        };
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    async fn persist(&self, entries: &Map<String, Value>) -> Result<()> {
        let body = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, body)
            .await
            .with_context(|| format!("Failed to write storage file {}", self.path.display()))
    }
}

#[async_trait::async_trait]
impl StorageArea for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value);
        self.persist(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        self.persist(&entries).await
    }

    async fn clear(&self) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.clear();
        self.persist(&entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_across_reopen() {
        let path = std::env::temp_dir().join(format!("safeshield-store-{}.json", std::process::id()));
        let _ = fs::remove_file(&path).await;

        {
            let store = JsonFileStore::open(&path).await.unwrap();
            store
                .set("blacklist", serde_json::json!(["evil.com"]))
                .await
                .unwrap();
        }

        let store = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(
            store.get("blacklist").await.unwrap(),
            Some(serde_json::json!(["evil.com"]))
        );

        store.clear().await.unwrap();
        assert_eq!(store.get("blacklist").await.unwrap(), None);

        let _ = fs::remove_file(&path).await;
    }
}
