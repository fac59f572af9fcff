//! JSON-file-backed [`TrackingStore`]. The real deployment owns this data in
//! its database; the CLI keeps the same contract on disk so repeated runs
//! can tell created products from updatable ones.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use feedsync_core::contract::{CapabilityError, ProductMapping, TrackingStore};

pub struct FileTrackingStore {
    path: PathBuf,
    state: Mutex<HashMap<String, ProductMapping>>,
}

impl FileTrackingStore {
    /// Open (or initialize) the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let mappings: Vec<ProductMapping> = serde_json::from_str(&content)?;
            mappings
                .into_iter()
                .map(|m| (m.group_key.clone(), m))
                .collect()
        } else {
            HashMap::new()
        };
        info!(path = %path.display(), mappings = state.len(), "Opened tracking store");
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn persist(&self, state: &HashMap<String, ProductMapping>) -> Result<(), CapabilityError> {
        let mut mappings: Vec<&ProductMapping> = state.values().collect();
        mappings.sort_by(|a, b| a.group_key.cmp(&b.group_key));
        let content = serde_json::to_string_pretty(&mappings)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

#[async_trait]
impl TrackingStore for FileTrackingStore {
    async fn get(&self, group_key: &str) -> Result<Option<ProductMapping>, CapabilityError> {
        let state = self.state.lock().expect("tracking mutex poisoned");
        Ok(state.get(group_key).cloned())
    }

    async fn list_active(&self) -> Result<Vec<ProductMapping>, CapabilityError> {
        let state = self.state.lock().expect("tracking mutex poisoned");
        Ok(state.values().filter(|m| m.active).cloned().collect())
    }

    async fn upsert(&self, mapping: ProductMapping) -> Result<(), CapabilityError> {
        let mut state = self.state.lock().expect("tracking mutex poisoned");
        state.insert(mapping.group_key.clone(), mapping);
        self.persist(&state)
    }

    async fn mark_inactive(&self, group_key: &str) -> Result<(), CapabilityError> {
        let mut state = self.state.lock().expect("tracking mutex poisoned");
        if let Some(mapping) = state.get_mut(group_key) {
            mapping.active = false;
        }
        self.persist(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(key: &str, active: bool) -> ProductMapping {
        ProductMapping {
            group_key: key.to_string(),
            sku: Some("SKU-1".to_string()),
            remote_product_id: "gid://shopify/Product/1".to_string(),
            title: "Widget".to_string(),
            last_price: "9.99".parse().unwrap(),
            active,
        }
    }

    #[tokio::test]
    async fn upserts_survive_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracking.json");

        let store = FileTrackingStore::open(&path).unwrap();
        store.upsert(mapping("group:G1", true)).await.unwrap();
        store.upsert(mapping("item:solo", true)).await.unwrap();
        store.mark_inactive("item:solo").await.unwrap();

        let reopened = FileTrackingStore::open(&path).unwrap();
        let found = reopened.get("group:G1").await.unwrap().unwrap();
        assert_eq!(found.title, "Widget");
        assert!(found.active);

        let active = reopened.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].group_key, "group:G1");

        let inactive = reopened.get("item:solo").await.unwrap().unwrap();
        assert!(!inactive.active);
    }

    #[tokio::test]
    async fn missing_key_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTrackingStore::open(dir.path().join("t.json")).unwrap();
        assert!(store.get("group:nope").await.unwrap().is_none());
    }
}
