//! # Model
//!
//! Records persisted in the tree store.
//!
//! ## Layout
//!
//! - `users/{id}`: name (**string**, max 30 chars), decks (**list of deck ids**)
//! - `decks/{id}`: owner (**user id**), name (**string**, max 30 chars), description (**string**),
//!   flashcards (**map** of flashcard id to flashcard), card_counter (**int**)
//! - `user_counter`, `deck_counter`: bare **int** nodes, last minted id
//!
//! ## Flashcard Limits
//!
//! - Title: 50 chars
//! - Front/back: 200 chars, or 100 chars when that side carries an image
//!
//! Oversized text is truncated, never rejected. Image urls are assigned before the text
//! is clamped since the limit depends on them.
use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Deserializer, Serialize, de::Error};

use crate::utils::truncate;

pub const TITLE_LENGTH_LIMIT: usize = 50;
pub const TEXT_LIMIT: usize = 200;
pub const IMAGE_TEXT_LIMIT: usize = 100;
pub const USER_NAME_LIMIT: usize = 30;
pub const DECK_NAME_LIMIT: usize = 30;

pub const USERS: &str = "users";
pub const DECKS: &str = "decks";
pub const FLASHCARDS: &str = "flashcards";
pub const CARD_COUNTER: &str = "card_counter";
pub const USER_COUNTER: &str = "user_counter";
pub const DECK_COUNTER: &str = "deck_counter";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub decks: Vec<u64>,
}

impl User {
    pub fn new(name: &str) -> Self {
        Self {
            name: truncate(name, USER_NAME_LIMIT),
            decks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "flashcard_map")]
    pub flashcards: BTreeMap<u64, Flashcard>,
    #[serde(default)]
    pub card_counter: u64,
}

impl Deck {
    pub fn new(owner: &str, name: &str, description: &str) -> Self {
        Self {
            owner: owner.to_string(),
            name: truncate(name, DECK_NAME_LIMIT),
            description: description.to_string(),
            flashcards: BTreeMap::new(),
            card_counter: 0,
        }
    }

    pub fn summary(&self) -> DeckSummary {
        DeckSummary {
            owner: self.owner.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckSummary {
    pub owner: String,
    pub name: String,
    pub description: String,
}

/// A single card. Every constructor, setter and deserialization clamps the text fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FlashcardFields")]
pub struct Flashcard {
    title: String,
    front: String,
    back: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    front_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    back_image_url: Option<String>,
}

#[derive(Deserialize)]
struct FlashcardFields {
    title: String,
    front: String,
    back: String,
    #[serde(default)]
    front_image_url: Option<String>,
    #[serde(default)]
    back_image_url: Option<String>,
}

impl From<FlashcardFields> for Flashcard {
    fn from(fields: FlashcardFields) -> Self {
        Flashcard::new(
            &fields.title,
            &fields.front,
            &fields.back,
            fields.front_image_url,
            fields.back_image_url,
        )
    }
}

impl Flashcard {
    pub fn new(
        title: &str,
        front: &str,
        back: &str,
        front_image_url: Option<String>,
        back_image_url: Option<String>,
    ) -> Self {
        // images first, the text limits depend on them
        let mut flashcard = Self {
            title: String::new(),
            front: String::new(),
            back: String::new(),
            front_image_url,
            back_image_url,
        };

        flashcard.update_title(title);
        flashcard.update_front(front);
        flashcard.update_back(back);

        flashcard
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn front(&self) -> &str {
        &self.front
    }

    pub fn back(&self) -> &str {
        &self.back
    }

    pub fn front_image_url(&self) -> Option<&str> {
        self.front_image_url.as_deref()
    }

    pub fn back_image_url(&self) -> Option<&str> {
        self.back_image_url.as_deref()
    }

    pub fn update_title(&mut self, title: &str) {
        self.title = truncate(title, TITLE_LENGTH_LIMIT);
    }

    pub fn update_front(&mut self, front: &str) {
        self.front = truncate(front, side_limit(&self.front_image_url));
    }

    pub fn update_back(&mut self, back: &str) {
        self.back = truncate(back, side_limit(&self.back_image_url));
    }

    pub fn update_front_image_url(&mut self, front_image_url: Option<String>) {
        self.front_image_url = front_image_url;
        let front = std::mem::take(&mut self.front);
        self.update_front(&front);
    }

    pub fn update_back_image_url(&mut self, back_image_url: Option<String>) {
        self.back_image_url = back_image_url;
        let back = std::mem::take(&mut self.back);
        self.update_back(&back);
    }
}

impl fmt::Display for Flashcard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Flashcard")?;
        writeln!(f, "Title: {}", self.title)?;
        writeln!(f, "Front: {}", self.front)?;
        writeln!(f, "Back: {}", self.back)?;
        writeln!(f, "Front Image: {}", self.front_image_url().unwrap_or_default())?;
        write!(f, "Back Image: {}", self.back_image_url().unwrap_or_default())
    }
}

fn side_limit(image_url: &Option<String>) -> usize {
    match image_url {
        Some(url) if !url.is_empty() => IMAGE_TEXT_LIMIT,
        _ => TEXT_LIMIT,
    }
}

/// Accepts either a map keyed by id or the array Firebase returns for dense integer keys.
fn flashcard_map<'de, D>(deserializer: D) -> Result<BTreeMap<u64, Flashcard>, D::Error>
where
    D: Deserializer<'de>,
{
    // untagged buffering turns keys into strings, parse them by hand
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Shape {
        Map(BTreeMap<String, Option<Flashcard>>),
        List(Vec<Option<Flashcard>>),
    }

    match Option::<Shape>::deserialize(deserializer)? {
        None => Ok(BTreeMap::new()),
        Some(Shape::Map(map)) => map
            .into_iter()
            .filter_map(|(key, flashcard)| flashcard.map(|flashcard| (key, flashcard)))
            .map(|(key, flashcard)| {
                key.parse::<u64>()
                    .map(|id| (id, flashcard))
                    .map_err(|_| D::Error::custom(format!("invalid flashcard id {key}")))
            })
            .collect(),
        Some(Shape::List(list)) => Ok(list
            .into_iter()
            .enumerate()
            .filter_map(|(id, flashcard)| flashcard.map(|flashcard| (id as u64, flashcard)))
            .collect()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_title_clamped() {
        let flashcard = Flashcard::new(&"t".repeat(80), "front", "back", None, None);
        assert_eq!(flashcard.title().chars().count(), TITLE_LENGTH_LIMIT);
    }

    #[test]
    fn test_text_limit_without_images() {
        let long = "x".repeat(500);
        let flashcard = Flashcard::new("title", &long, &long, None, None);
        assert_eq!(flashcard.front().len(), TEXT_LIMIT);
        assert_eq!(flashcard.back().len(), TEXT_LIMIT);
    }

    #[test]
    fn test_text_limit_per_side_image() {
        let long = "x".repeat(500);
        let flashcard = Flashcard::new(
            "title",
            &long,
            &long,
            Some("https://img.example/front.png".to_string()),
            None,
        );
        assert_eq!(flashcard.front().len(), IMAGE_TEXT_LIMIT);
        assert_eq!(flashcard.back().len(), TEXT_LIMIT);
    }

    #[test]
    fn test_empty_image_url_is_no_image() {
        let long = "x".repeat(500);
        let flashcard = Flashcard::new("t", &long, &long, Some(String::new()), Some(String::new()));
        assert_eq!(flashcard.front().len(), TEXT_LIMIT);
        assert_eq!(flashcard.back().len(), TEXT_LIMIT);
    }

    #[test]
    fn test_setting_image_reclamps_text() {
        let long = "y".repeat(150);
        let mut flashcard = Flashcard::new("t", &long, &long, None, None);
        assert_eq!(flashcard.back().len(), 150);

        flashcard.update_back_image_url(Some("https://img.example/back.png".to_string()));
        assert_eq!(flashcard.back().len(), IMAGE_TEXT_LIMIT);
        assert_eq!(flashcard.front().len(), 150);
    }

    #[test]
    fn test_deserialize_normalizes() {
        let payload = json!({
            "title": "a".repeat(60),
            "front": "b".repeat(300),
            "back": "c".repeat(300),
            "back_image_url": "https://img.example/b.png",
        });

        let flashcard: Flashcard = serde_json::from_value(payload).unwrap();
        assert_eq!(flashcard.title().len(), TITLE_LENGTH_LIMIT);
        assert_eq!(flashcard.front().len(), TEXT_LIMIT);
        assert_eq!(flashcard.back().len(), IMAGE_TEXT_LIMIT);
        assert_eq!(flashcard.front_image_url(), None);
    }

    #[test]
    fn test_deserialize_missing_field_fails() {
        let result = serde_json::from_value::<Flashcard>(json!({ "title": "only a title" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let flashcard = Flashcard::new(
            "Add",
            "1+1",
            "2",
            Some("https://img.example/plus.png".to_string()),
            None,
        );

        let json = flashcard.to_json().unwrap();
        assert!(!json.contains("back_image_url"));
        assert_eq!(Flashcard::from_json(&json).unwrap(), flashcard);
    }

    #[test]
    fn test_deck_reads_map_and_list_shapes() {
        let card = json!({ "title": "t", "front": "f", "back": "b" });

        let from_map: Deck = serde_json::from_value(json!({
            "owner": "alice",
            "name": "Math",
            "flashcards": { "0": card.clone(), "3": card.clone() },
            "card_counter": 4,
        }))
        .unwrap();
        assert_eq!(from_map.flashcards.keys().copied().collect::<Vec<_>>(), vec![0, 3]);

        let from_list: Deck = serde_json::from_value(json!({
            "owner": "alice",
            "name": "Math",
            "flashcards": [card.clone(), null, card],
            "card_counter": 3,
        }))
        .unwrap();
        assert_eq!(from_list.flashcards.keys().copied().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(from_list.description, "");
    }

    #[test]
    fn test_deck_without_flashcards() {
        let deck: Deck = serde_json::from_value(json!({ "owner": "bob", "card_counter": 0 })).unwrap();
        assert!(deck.flashcards.is_empty());
    }

    #[test]
    fn test_names_clamped() {
        assert_eq!(User::new(&"n".repeat(40)).name.len(), USER_NAME_LIMIT);
        assert_eq!(Deck::new("o", &"d".repeat(40), "desc").name.len(), DECK_NAME_LIMIT);
    }
}
