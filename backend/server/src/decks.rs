//! # Decks
//!
//! Deck lifecycle and the ownership check every deck scoped request goes through.
//!
//! ## Consistency
//!
//! - Deck ids come from `deck_counter` through [`TreeStore::fetch_add`], never reused
//! - A user's deck list is rewritten whole, concurrent edits of the same list are last writer wins
//! - Deleting a deck drops it from its owner's list, deleting a user leaves its decks orphaned
//! - Ids in a user's list whose deck is gone are pruned the next time the list is read
use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::{
    error::StoreError,
    model::{DECK_COUNTER, DECK_NAME_LIMIT, DECKS, Deck, DeckSummary, USERS},
    store::{TreeStore, get_as, set_as},
    users::get_user,
    utils::{path, truncate},
};

pub fn deck_path(deck_id: u64) -> String {
    path([DECKS, deck_id.to_string().as_str()])
}

fn decks_of(user_id: &str) -> String {
    path([USERS, user_id, DECKS])
}

/// Creates an empty deck owned by `owner_id`. Deck ids start at 1.
pub async fn create_deck(
    store: &dyn TreeStore,
    owner_id: &str,
    name: &str,
    description: &str,
) -> Result<u64, StoreError> {
    let deck_id = store.fetch_add(DECK_COUNTER).await? + 1;

    let deck = Deck::new(owner_id, name, description);
    set_as(store, &deck_path(deck_id), &deck).await?;

    info!("Deck {deck_id} '{}' created for user {owner_id}", deck.name);
    Ok(deck_id)
}

pub async fn get_deck(store: &dyn TreeStore, deck_id: u64) -> Result<Option<Deck>, StoreError> {
    get_as(store, &deck_path(deck_id)).await
}

/// Rewrites name and description. Ownership is the caller's concern.
pub async fn modify_deck(
    store: &dyn TreeStore,
    deck_id: u64,
    name: &str,
    description: &str,
) -> Result<Option<u64>, StoreError> {
    let deck_path = deck_path(deck_id);

    if !store.exists(&deck_path).await? {
        warn!("Deck {deck_id} does not exist");
        return Ok(None);
    }

    let mut children = Map::new();
    children.insert("name".into(), Value::from(truncate(name, DECK_NAME_LIMIT)));
    children.insert("description".into(), Value::from(description));
    store.update(&deck_path, children).await?;

    info!("Deck {deck_id} has been modified");
    Ok(Some(deck_id))
}

/// Deletes the deck node and drops the id from its owner's deck list.
pub async fn delete_deck(store: &dyn TreeStore, deck_id: u64) -> Result<Option<u64>, StoreError> {
    let Some(deck) = get_deck(store, deck_id).await? else {
        warn!("Deck {deck_id} does not exist");
        return Ok(None);
    };

    store.delete(&deck_path(deck_id)).await?;
    remove_deck_from_user(store, &deck.owner, deck_id).await?;

    info!("Deck {deck_id} and its flashcards have been deleted");
    Ok(Some(deck_id))
}

/// Appends `deck_id` to the user's list unless already listed.
pub async fn add_deck_to_user(
    store: &dyn TreeStore,
    user_id: &str,
    deck_id: u64,
) -> Result<Option<u64>, StoreError> {
    let Some(mut user) = get_user(store, user_id).await? else {
        warn!("User {user_id} does not exist");
        return Ok(None);
    };

    if user.decks.contains(&deck_id) {
        info!("Deck {deck_id} already listed for user {user_id}");
        return Ok(Some(deck_id));
    }

    user.decks.push(deck_id);
    set_as(store, &decks_of(user_id), &user.decks).await?;

    info!("Deck {deck_id} added to user {user_id}");
    Ok(Some(deck_id))
}

pub async fn remove_deck_from_user(
    store: &dyn TreeStore,
    user_id: &str,
    deck_id: u64,
) -> Result<Option<u64>, StoreError> {
    let Some(mut user) = get_user(store, user_id).await? else {
        warn!("User {user_id} does not exist");
        return Ok(None);
    };

    if !user.decks.contains(&deck_id) {
        warn!("Deck {deck_id} is not listed for user {user_id}");
        return Ok(None);
    }

    user.decks.retain(|id| *id != deck_id);
    set_as(store, &decks_of(user_id), &user.decks).await?;

    info!("Deck {deck_id} removed from user {user_id}");
    Ok(Some(deck_id))
}

/// True iff the deck is in the user's list and the deck names the user as owner.
pub async fn verify_user_has_deck(
    store: &dyn TreeStore,
    user_id: &str,
    deck_id: u64,
) -> Result<bool, StoreError> {
    let Some(user) = get_user(store, user_id).await? else {
        return Ok(false);
    };

    if !user.decks.contains(&deck_id) {
        return Ok(false);
    }

    let owner: Option<String> = get_as(store, &path([deck_path(deck_id).as_str(), "owner"])).await?;

    Ok(owner.as_deref() == Some(user_id))
}

/// Summaries of every live deck in the user's list, keyed by deck id.
///
/// Listed ids whose deck no longer exists are removed from the list in a single write.
pub async fn get_decks(
    store: &dyn TreeStore,
    user_id: &str,
) -> Result<Option<BTreeMap<u64, DeckSummary>>, StoreError> {
    let Some(user) = get_user(store, user_id).await? else {
        warn!("User {user_id} does not exist");
        return Ok(None);
    };

    let mut decks = BTreeMap::new();
    let mut live = Vec::with_capacity(user.decks.len());

    for deck_id in user.decks.iter().copied() {
        match get_deck(store, deck_id).await? {
            Some(deck) => {
                decks.insert(deck_id, deck.summary());
                live.push(deck_id);
            }
            None => warn!("Deck {deck_id} listed for user {user_id} no longer exists, pruning"),
        }
    }

    if live.len() != user.decks.len() {
        set_as(store, &decks_of(user_id), &live).await?;
    }

    Ok(Some(decks))
}
