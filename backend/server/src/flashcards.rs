use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::{
    decks::{deck_path, get_deck},
    error::StoreError,
    model::{CARD_COUNTER, FLASHCARDS, Flashcard},
    store::{TreeStore, set_as},
    utils::path,
};

fn flashcard_path(deck_id: u64, flashcard_id: u64) -> String {
    path([
        deck_path(deck_id).as_str(),
        FLASHCARDS,
        flashcard_id.to_string().as_str(),
    ])
}

/// Stores `flashcard` under the next id of the deck's card counter, starting at 0.
pub async fn add_flashcard(
    store: &dyn TreeStore,
    deck_id: u64,
    flashcard: &Flashcard,
) -> Result<Option<u64>, StoreError> {
    let deck_path = deck_path(deck_id);

    if !store.exists(&deck_path).await? {
        warn!("Deck {deck_id} does not exist");
        return Ok(None);
    }

    // minted before the write, a failed write leaves a gap rather than a reused id
    let flashcard_id = store.fetch_add(&path([deck_path.as_str(), CARD_COUNTER])).await?;
    set_as(store, &flashcard_path(deck_id, flashcard_id), flashcard).await?;

    info!("Added new flashcard with ID {flashcard_id} to deck {deck_id}");
    Ok(Some(flashcard_id))
}

/// Replaces the whole flashcard, keeping its id.
pub async fn edit_flashcard(
    store: &dyn TreeStore,
    deck_id: u64,
    flashcard_id: u64,
    flashcard: &Flashcard,
) -> Result<Option<u64>, StoreError> {
    let flashcard_path = flashcard_path(deck_id, flashcard_id);

    if !store.exists(&flashcard_path).await? {
        warn!("Flashcard {flashcard_id} in deck {deck_id} does not exist");
        return Ok(None);
    }

    set_as(store, &flashcard_path, flashcard).await?;

    info!("Flashcard {flashcard_id} in deck {deck_id} has been updated");
    Ok(Some(flashcard_id))
}

pub async fn delete_flashcard(
    store: &dyn TreeStore,
    deck_id: u64,
    flashcard_id: u64,
) -> Result<Option<u64>, StoreError> {
    let flashcard_path = flashcard_path(deck_id, flashcard_id);

    if !store.exists(&flashcard_path).await? {
        warn!("Flashcard {flashcard_id} in deck {deck_id} does not exist or has already been deleted");
        return Ok(None);
    }

    store.delete(&flashcard_path).await?;

    info!("Flashcard {flashcard_id} in deck {deck_id} has been deleted");
    Ok(Some(flashcard_id))
}

/// Every flashcard in the deck, `None` when the deck itself does not exist.
pub async fn get_flashcards(
    store: &dyn TreeStore,
    deck_id: u64,
) -> Result<Option<BTreeMap<u64, Flashcard>>, StoreError> {
    match get_deck(store, deck_id).await? {
        Some(deck) => Ok(Some(deck.flashcards)),
        None => {
            warn!("Deck {deck_id} does not exist");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        decks::{add_deck_to_user, create_deck},
        model::{IMAGE_TEXT_LIMIT, TEXT_LIMIT, TITLE_LENGTH_LIMIT},
        store::MemoryStore,
        users::add_user,
    };

    async fn store_with_deck() -> (MemoryStore, u64) {
        let store = MemoryStore::new();
        add_user(&store, "alice", "alice").await.unwrap();
        let deck_id = create_deck(&store, "alice", "Math", "").await.unwrap();
        add_deck_to_user(&store, "alice", deck_id).await.unwrap();

        (store, deck_id)
    }

    fn card(title: &str, front: &str, back: &str) -> Flashcard {
        Flashcard::new(title, front, back, None, None)
    }

    #[tokio::test]
    async fn test_first_ids_are_zero_then_one() {
        let (store, deck_id) = store_with_deck().await;

        let first = add_flashcard(&store, deck_id, &card("Add", "1+1", "2")).await.unwrap();
        let second = add_flashcard(&store, deck_id, &card("Sub", "2-1", "1")).await.unwrap();

        assert_eq!(first, Some(0));
        assert_eq!(second, Some(1));

        let deck = get_deck(&store, deck_id).await.unwrap().unwrap();
        assert_eq!(deck.card_counter, 2);
        assert_eq!(deck.flashcards[&0].title(), "Add");
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_delete() {
        let (store, deck_id) = store_with_deck().await;

        add_flashcard(&store, deck_id, &card("a", "b", "c")).await.unwrap();
        let second = add_flashcard(&store, deck_id, &card("d", "e", "f")).await.unwrap().unwrap();
        delete_flashcard(&store, deck_id, second).await.unwrap();

        let third = add_flashcard(&store, deck_id, &card("g", "h", "i")).await.unwrap().unwrap();
        assert_eq!(third, 2);
    }

    #[tokio::test]
    async fn test_add_to_missing_deck() {
        let store = MemoryStore::new();

        assert_eq!(add_flashcard(&store, 5, &card("a", "b", "c")).await.unwrap(), None);
        assert!(!store.exists("decks/5").await.unwrap());
    }

    #[tokio::test]
    async fn test_stored_text_respects_limits() {
        let (store, deck_id) = store_with_deck().await;
        let long = "z".repeat(400);

        let plain = Flashcard::new(&long, &long, &long, None, None);
        let pictured = Flashcard::new(
            &long,
            &long,
            &long,
            Some("https://img.example/f.png".into()),
            Some("https://img.example/b.png".into()),
        );

        add_flashcard(&store, deck_id, &plain).await.unwrap();
        add_flashcard(&store, deck_id, &pictured).await.unwrap();

        let flashcards = get_flashcards(&store, deck_id).await.unwrap().unwrap();
        assert_eq!(flashcards[&0].title().len(), TITLE_LENGTH_LIMIT);
        assert_eq!(flashcards[&0].front().len(), TEXT_LIMIT);
        assert_eq!(flashcards[&1].front().len(), IMAGE_TEXT_LIMIT);
        assert_eq!(flashcards[&1].back().len(), IMAGE_TEXT_LIMIT);
    }

    #[tokio::test]
    async fn test_edit_flashcard() {
        let (store, deck_id) = store_with_deck().await;
        let id = add_flashcard(&store, deck_id, &card("Add", "1+1", "2")).await.unwrap().unwrap();

        let replacement = Flashcard::new("Mul", "2*3", "6", Some("https://img.example/x.png".into()), None);
        assert_eq!(edit_flashcard(&store, deck_id, id, &replacement).await.unwrap(), Some(id));

        let flashcards = get_flashcards(&store, deck_id).await.unwrap().unwrap();
        assert_eq!(flashcards.len(), 1);
        assert_eq!(flashcards[&id], replacement);
    }

    #[tokio::test]
    async fn test_edit_missing_flashcard() {
        let (store, deck_id) = store_with_deck().await;

        assert_eq!(edit_flashcard(&store, deck_id, 3, &card("a", "b", "c")).await.unwrap(), None);
        assert!(get_flashcards(&store, deck_id).await.unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_flashcard() {
        let (store, deck_id) = store_with_deck().await;
        let id = add_flashcard(&store, deck_id, &card("a", "b", "c")).await.unwrap().unwrap();

        assert_eq!(delete_flashcard(&store, deck_id, id).await.unwrap(), Some(id));
        assert_eq!(delete_flashcard(&store, deck_id, id).await.unwrap(), None);

        // the deck survives losing its last card
        assert_eq!(get_flashcards(&store, deck_id).await.unwrap(), Some(BTreeMap::new()));
    }

    #[tokio::test]
    async fn test_get_flashcards_of_unknown_deck() {
        let store = MemoryStore::new();
        assert_eq!(get_flashcards(&store, 12).await.unwrap(), None);
    }
}
