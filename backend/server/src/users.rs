use tracing::{info, warn};

use crate::{
    error::StoreError,
    model::{USER_COUNTER, USERS, User},
    store::{TreeStore, get_as, set_as},
    utils::path,
};

/// Writes a fresh user node. An existing node under the same id is overwritten.
pub async fn add_user(
    store: &dyn TreeStore,
    user_id: &str,
    name: &str,
) -> Result<String, StoreError> {
    let user = User::new(name);
    set_as(store, &path([USERS, user_id]), &user).await?;

    info!("New user {} added with ID {user_id}", user.name);
    Ok(user_id.to_string())
}

/// Mints the next id from `user_counter`, starting at 1, then adds the user.
pub async fn register_user(store: &dyn TreeStore, name: &str) -> Result<String, StoreError> {
    let user_id = (store.fetch_add(USER_COUNTER).await? + 1).to_string();

    add_user(store, &user_id, name).await
}

pub async fn get_user(store: &dyn TreeStore, user_id: &str) -> Result<Option<User>, StoreError> {
    get_as(store, &path([USERS, user_id])).await
}

pub async fn verify_user_exists(store: &dyn TreeStore, user_id: &str) -> Result<bool, StoreError> {
    store.exists(&path([USERS, user_id])).await
}

/// Removes the user node only. Decks owned by the user are left in place.
pub async fn delete_user(
    store: &dyn TreeStore,
    user_id: &str,
) -> Result<Option<String>, StoreError> {
    let user_path = path([USERS, user_id]);

    if !store.exists(&user_path).await? {
        warn!("User {user_id} does not exist");
        return Ok(None);
    }

    store.delete(&user_path).await?;

    info!("User {user_id} has been deleted");
    Ok(Some(user_id.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_add_user() {
        let store = MemoryStore::new();

        let user_id = add_user(&store, "alice", "Alice").await.unwrap();
        assert_eq!(user_id, "alice");

        let user = get_user(&store, "alice").await.unwrap().unwrap();
        assert_eq!(user.name, "Alice");
        assert!(user.decks.is_empty());
    }

    #[tokio::test]
    async fn test_add_user_truncates_name() {
        let store = MemoryStore::new();
        add_user(&store, "alice", &"A".repeat(45)).await.unwrap();

        let user = get_user(&store, "alice").await.unwrap().unwrap();
        assert_eq!(user.name.len(), 30);
    }

    #[tokio::test]
    async fn test_add_user_overwrites() {
        let store = MemoryStore::new();
        add_user(&store, "alice", "Alice").await.unwrap();
        store.set("users/alice/decks", json!([1, 2])).await.unwrap();

        add_user(&store, "alice", "Alice Again").await.unwrap();

        let user = get_user(&store, "alice").await.unwrap().unwrap();
        assert_eq!(user.name, "Alice Again");
        assert!(user.decks.is_empty());
    }

    #[tokio::test]
    async fn test_register_user_mints_ids() {
        let store = MemoryStore::new();

        assert_eq!(register_user(&store, "First").await.unwrap(), "1");
        assert_eq!(register_user(&store, "Second").await.unwrap(), "2");
        assert!(verify_user_exists(&store, "2").await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_user_exists() {
        let store = MemoryStore::new();
        assert!(!verify_user_exists(&store, "alice").await.unwrap());

        add_user(&store, "alice", "Alice").await.unwrap();
        assert!(verify_user_exists(&store, "alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_user() {
        let store = MemoryStore::new();
        add_user(&store, "alice", "Alice").await.unwrap();

        assert_eq!(
            delete_user(&store, "alice").await.unwrap(),
            Some("alice".to_string())
        );
        assert!(!verify_user_exists(&store, "alice").await.unwrap());
        assert_eq!(delete_user(&store, "alice").await.unwrap(), None);
    }
}
