use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;

use crate::{
    error::StoreError,
    store::TreeStore,
    tree::{counter_value, get_at, segments, set_at, update_at},
};

/// Whole tree behind one lock, so every operation is trivially atomic.
#[derive(Default)]
pub struct MemoryStore {
    tree: Mutex<Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Value {
        self.tree.lock().await.clone()
    }
}

#[async_trait]
impl TreeStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let tree = self.tree.lock().await;

        Ok(get_at(&tree, &segments(path)).cloned())
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let mut tree = self.tree.lock().await;
        set_at(&mut tree, &segments(path), value);

        Ok(())
    }

    async fn update(&self, path: &str, children: Map<String, Value>) -> Result<(), StoreError> {
        let mut tree = self.tree.lock().await;
        update_at(&mut tree, &segments(path), children);

        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.set(path, Value::Null).await
    }

    async fn fetch_add(&self, path: &str) -> Result<u64, StoreError> {
        let mut tree = self.tree.lock().await;
        let segments = segments(path);

        let current = counter_value(get_at(&tree, &segments), path)?;
        set_at(&mut tree, &segments, json!(current + 1));

        Ok(current)
    }
}
