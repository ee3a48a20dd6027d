use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    decks::{
        add_deck_to_user, create_deck, delete_deck, get_decks, modify_deck,
        remove_deck_from_user, verify_user_has_deck,
    },
    error::AppError,
    flashcards::{add_flashcard, delete_flashcard, edit_flashcard, get_flashcards},
    generation::{GenerationInput, generate_flashcards},
    model::Flashcard,
    state::State as AppState,
    users::{add_user, delete_user, register_user, verify_user_exists},
    utils::validate_key,
};

type Shared = State<Arc<AppState>>;

#[derive(Deserialize)]
pub struct AddUser {
    user_id: Option<String>,
    name: String,
}

#[derive(Deserialize)]
pub struct UserRequest {
    user_id: String,
}

#[derive(Deserialize)]
pub struct CreateDeck {
    user_id: String,
    deck_name: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
pub struct ModifyDeck {
    user_id: String,
    deck_id: u64,
    deck_name: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
pub struct DeckRequest {
    user_id: String,
    deck_id: u64,
}

#[derive(Deserialize)]
pub struct DeckQuery {
    deck_id: u64,
}

#[derive(Deserialize)]
pub struct AddFlashcard {
    user_id: String,
    deck_id: u64,
    flashcard: Flashcard,
}

#[derive(Deserialize)]
pub struct EditFlashcard {
    user_id: String,
    deck_id: u64,
    flashcard_id: u64,
    flashcard: Flashcard,
}

#[derive(Deserialize)]
pub struct DeleteFlashcard {
    user_id: String,
    deck_id: u64,
    flashcard_id: u64,
}

#[derive(Deserialize)]
pub struct GenerateRequest {
    user_id: String,
    n: u32,
    topic: Option<String>,
    reference: Option<String>,
    text: Option<String>,
}

async fn require_user(state: &AppState, user_id: &str) -> Result<(), AppError> {
    validate_key("user_id", user_id)?;

    if !verify_user_exists(state.store.as_ref(), user_id).await? {
        return Err(AppError::Unauthorized(user_id.to_string()));
    }

    Ok(())
}

async fn require_deck(state: &AppState, user_id: &str, deck_id: u64) -> Result<(), AppError> {
    require_user(state, user_id).await?;

    if !verify_user_has_deck(state.store.as_ref(), user_id, deck_id).await? {
        return Err(AppError::Forbidden {
            user_id: user_id.to_string(),
            deck_id,
        });
    }

    Ok(())
}

fn ok(body: serde_json::Value) -> Result<Response, AppError> {
    Ok((StatusCode::OK, Json(body)).into_response())
}

pub async fn hello_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "hello": "world" })))
}

pub async fn add_user_handler(
    State(state): Shared,
    payload: Result<Json<AddUser>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(payload) = payload?;
    let store = state.store.as_ref();

    let user_id = match payload.user_id {
        Some(user_id) => {
            validate_key("user_id", &user_id)?;
            add_user(store, &user_id, &payload.name).await?
        }
        None => register_user(store, &payload.name).await?,
    };

    ok(json!({ "user_id": user_id }))
}

pub async fn delete_user_handler(
    State(state): Shared,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(payload) = payload?;
    require_user(&state, &payload.user_id).await?;

    let user_id = delete_user(state.store.as_ref(), &payload.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized(payload.user_id.clone()))?;

    ok(json!({ "user_id": user_id }))
}

pub async fn create_deck_handler(
    State(state): Shared,
    payload: Result<Json<CreateDeck>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(payload) = payload?;
    require_user(&state, &payload.user_id).await?;
    let store = state.store.as_ref();

    let deck_id = create_deck(store, &payload.user_id, &payload.deck_name, &payload.description).await?;
    add_deck_to_user(store, &payload.user_id, deck_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized(payload.user_id.clone()))?;

    ok(json!({ "deck_id": deck_id }))
}

pub async fn modify_deck_handler(
    State(state): Shared,
    payload: Result<Json<ModifyDeck>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(payload) = payload?;
    require_deck(&state, &payload.user_id, payload.deck_id).await?;

    let deck_id = modify_deck(
        state.store.as_ref(),
        payload.deck_id,
        &payload.deck_name,
        &payload.description,
    )
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Deck {}", payload.deck_id)))?;

    ok(json!({ "deck_id": deck_id }))
}

pub async fn delete_deck_handler(
    State(state): Shared,
    payload: Result<Json<DeckRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(payload) = payload?;
    require_deck(&state, &payload.user_id, payload.deck_id).await?;

    let deck_id = delete_deck(state.store.as_ref(), payload.deck_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Deck {}", payload.deck_id)))?;

    ok(json!({ "deck_id": deck_id }))
}

pub async fn add_deck_to_user_handler(
    State(state): Shared,
    payload: Result<Json<DeckRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(payload) = payload?;
    require_user(&state, &payload.user_id).await?;

    // listing grants nothing, ownership is checked when the deck is used
    let deck_id = add_deck_to_user(state.store.as_ref(), &payload.user_id, payload.deck_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized(payload.user_id.clone()))?;

    ok(json!({ "deck_id": deck_id }))
}

pub async fn remove_deck_from_user_handler(
    State(state): Shared,
    payload: Result<Json<DeckRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(payload) = payload?;
    require_user(&state, &payload.user_id).await?;

    let deck_id = remove_deck_from_user(state.store.as_ref(), &payload.user_id, payload.deck_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Deck {} in the list of user {}",
                payload.deck_id, payload.user_id
            ))
        })?;

    ok(json!({ "deck_id": deck_id }))
}

pub async fn get_decks_handler(
    State(state): Shared,
    query: Result<Query<UserRequest>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(query) = query?;
    validate_key("user_id", &query.user_id)?;

    let decks = get_decks(state.store.as_ref(), &query.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized(query.user_id.clone()))?;

    ok(json!({ "decks": decks }))
}

pub async fn get_flashcards_handler(
    State(state): Shared,
    query: Result<Query<DeckQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(query) = query?;

    let flashcards = get_flashcards(state.store.as_ref(), query.deck_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Deck {}", query.deck_id)))?;

    ok(json!({ "flashcards": flashcards }))
}

pub async fn add_flashcard_handler(
    State(state): Shared,
    payload: Result<Json<AddFlashcard>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(payload) = payload?;
    require_deck(&state, &payload.user_id, payload.deck_id).await?;

    let flashcard_id = add_flashcard(state.store.as_ref(), payload.deck_id, &payload.flashcard)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Deck {}", payload.deck_id)))?;

    ok(json!({ "flashcard_id": flashcard_id }))
}

pub async fn edit_flashcard_handler(
    State(state): Shared,
    payload: Result<Json<EditFlashcard>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(payload) = payload?;
    require_deck(&state, &payload.user_id, payload.deck_id).await?;

    let flashcard_id = edit_flashcard(
        state.store.as_ref(),
        payload.deck_id,
        payload.flashcard_id,
        &payload.flashcard,
    )
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Flashcard {}", payload.flashcard_id)))?;

    ok(json!({ "flashcard_id": flashcard_id }))
}

pub async fn delete_flashcard_handler(
    State(state): Shared,
    payload: Result<Json<DeleteFlashcard>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(payload) = payload?;
    require_deck(&state, &payload.user_id, payload.deck_id).await?;

    let flashcard_id = delete_flashcard(state.store.as_ref(), payload.deck_id, payload.flashcard_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Flashcard {}", payload.flashcard_id)))?;

    ok(json!({ "flashcard_id": flashcard_id }))
}

pub async fn generate_flashcards_handler(
    State(state): Shared,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(payload) = payload?;
    require_user(&state, &payload.user_id).await?;

    let input = GenerationInput::select(payload.topic, payload.reference, payload.text)?;
    let provider = state
        .completion
        .as_deref()
        .ok_or(AppError::GenerationUnavailable)?;

    let flashcards = generate_flashcards(provider, payload.n, &input).await?;

    ok(json!({ "flashcards": flashcards }))
}
