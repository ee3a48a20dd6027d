//! # Tree Store
//!
//! Hierarchical document database addressed by slash separated paths.
//!
//! ## Backends
//!
//! Picked by the scheme of `STORE_URL`:
//! - `https://<project>.firebaseio.com`: Firebase Realtime Database REST API, see [`FirebaseStore`]
//! - `redis://host:6379`: one JSON document per root node, see [`RedisStore`]
//! - `memory://`: process local tree, used for tests and local runs, see [`MemoryStore`]
//!
//! ## Counters
//!
//! [`TreeStore::fetch_add`] is the only atomic operation. Everything else is a plain read or write,
//! so check-then-write sequences built on top of it can race.
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::StoreError;

pub use crate::{database::RedisStore, firebase::FirebaseStore, memory::MemoryStore};

#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Value at `path`, `None` when absent.
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Replaces the node at `path`.
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Writes each child under `path`, leaving siblings untouched.
    async fn update(&self, path: &str, children: Map<String, Value>) -> Result<(), StoreError>;

    async fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// Atomically increments the counter at `path` and returns the value it held before.
    async fn fetch_add(&self, path: &str) -> Result<u64, StoreError>;

    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        Ok(self.get(path).await?.is_some())
    }
}

pub async fn get_as<T: DeserializeOwned>(
    store: &dyn TreeStore,
    path: &str,
) -> Result<Option<T>, StoreError> {
    store
        .get(path)
        .await?
        .map(serde_json::from_value)
        .transpose()
        .map_err(StoreError::from)
}

pub async fn set_as<T: Serialize>(
    store: &dyn TreeStore,
    path: &str,
    value: &T,
) -> Result<(), StoreError> {
    store.set(path, serde_json::to_value(value)?).await
}

pub async fn connect(url: &str, secret: Option<&str>) -> Result<Arc<dyn TreeStore>, StoreError> {
    let store: Arc<dyn TreeStore> = match url.split_once("://") {
        Some(("memory", _)) => Arc::new(MemoryStore::new()),
        Some(("redis" | "rediss", _)) => Arc::new(RedisStore::connect(url).await?),
        Some(("http" | "https", _)) => Arc::new(FirebaseStore::new(url, secret)?),
        _ => return Err(StoreError::UnsupportedUrl(url.to_string())),
    };

    info!("Connected to store at {}", redact(url));

    Ok(store)
}

fn redact(url: &str) -> &str {
    url.split_once('@').map(|(_, host)| host).unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::User;

    #[tokio::test]
    async fn test_connect_memory() {
        let store = connect("memory://", None).await.unwrap();
        assert!(!store.exists("users/alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_connect_rejects_unknown_scheme() {
        let result = connect("ftp://example.com", None).await;
        assert!(matches!(result, Err(StoreError::UnsupportedUrl(_))));
    }

    #[tokio::test]
    async fn test_typed_round_trip() {
        let store = MemoryStore::new();
        let user = User {
            name: "Alice".into(),
            decks: vec![1, 2],
        };

        set_as(&store, "users/alice", &user).await.unwrap();
        let read: Option<User> = get_as(&store, "users/alice").await.unwrap();
        assert_eq!(read, Some(user));

        let missing: Option<User> = get_as(&store, "users/bob").await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_typed_read_of_wrong_shape_fails() {
        let store = MemoryStore::new();
        store.set("users/alice", json!(42)).await.unwrap();

        let result: Result<Option<User>, _> = get_as(&store, "users/alice").await;
        assert!(matches!(result, Err(StoreError::Json(_))));
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact("redis://:hunter2@cache:6379"), "cache:6379");
        assert_eq!(redact("memory://"), "memory://");
    }
}
