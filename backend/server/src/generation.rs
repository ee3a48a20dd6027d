//! # Generation
//!
//! Asks the completion provider for a batch of flashcards.
//!
//! ## Input Modes
//!
//! Checked in order, the first non-empty one wins:
//! 1. topic: cards about a subject
//! 2. reference: more cards in the style of existing ones
//! 3. text: cards covering a passage
//!
//! The returned cards are passed through as the model wrote them. Neither the count nor
//! the text limits are enforced here, cards are clamped once stored.
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::{
    completion::{CompletionProvider, ResponseSchema},
    error::{AppError, CompletionError},
    model::{TEXT_LIMIT, TITLE_LENGTH_LIMIT},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationInput {
    Topic(String),
    Reference(String),
    Text(String),
}

impl GenerationInput {
    pub fn select(
        topic: Option<String>,
        reference: Option<String>,
        text: Option<String>,
    ) -> Result<Self, AppError> {
        let non_empty = |value: Option<String>| value.filter(|value| !value.trim().is_empty());

        non_empty(topic)
            .map(GenerationInput::Topic)
            .or_else(|| non_empty(reference).map(GenerationInput::Reference))
            .or_else(|| non_empty(text).map(GenerationInput::Text))
            .ok_or_else(|| {
                AppError::Validation("one of topic, reference or text is required".to_string())
            })
    }

    pub fn prompt(&self, n: u32) -> String {
        let limits = format!(
            "Make sure the title is <={TITLE_LENGTH_LIMIT} chars and the front and back are <={TEXT_LIMIT} chars long."
        );

        match self {
            GenerationInput::Topic(topic) => {
                format!("Generate {n} flashcards on the topic of {topic}. {limits}\n")
            }
            GenerationInput::Reference(reference) => format!(
                "Generate {n} additional flashcards based on the following reference: \n{reference}\n{limits}"
            ),
            GenerationInput::Text(text) => format!(
                "Generate {n} flashcards covering the key facts in the following text: \n{text}\n{limits}"
            ),
        }
    }
}

/// A card as the model produced it, before any clamping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFlashcard {
    pub id: i64,
    pub title: String,
    pub front: String,
    pub back: String,
    pub front_image_url: String,
    pub back_image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardCollection {
    pub flashcards: Vec<GeneratedFlashcard>,
}

pub fn flashcard_collection_schema() -> ResponseSchema {
    let string = json!({ "type": "string" });

    ResponseSchema {
        name: "FlashcardCollection",
        schema: json!({
            "type": "object",
            "properties": {
                "flashcards": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer" },
                            "title": string,
                            "front": string,
                            "back": string,
                            "front_image_url": string,
                            "back_image_url": string,
                        },
                        "required": ["id", "title", "front", "back", "front_image_url", "back_image_url"],
                        "additionalProperties": false,
                    }
                }
            },
            "required": ["flashcards"],
            "additionalProperties": false,
        }),
    }
}

pub async fn generate_flashcards(
    provider: &dyn CompletionProvider,
    n: u32,
    input: &GenerationInput,
) -> Result<Vec<GeneratedFlashcard>, CompletionError> {
    let output = provider
        .complete(&input.prompt(n), &flashcard_collection_schema())
        .await?;

    let collection: FlashcardCollection = serde_json::from_value(output)?;

    info!("Generated {} of {n} requested flashcards", collection.flashcards.len());
    Ok(collection.flashcards)
}
