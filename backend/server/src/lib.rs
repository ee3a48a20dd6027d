//! Documentation of a flashcard deck backend.
//!
//! Users own decks, decks hold flashcards, and flashcards can be drafted by a language model.
//!
//!
//!
//! # General Infrastructure
//! - Clients talk JSON over HTTP to a single axum server
//! - All state lives in a remote tree store, the server itself keeps nothing between requests
//! - Store and completion clients are built once at startup and shared through [`state::State`]
//!
//!
//!
//! # Endpoints
//!
//! | Route | Body / Query | Response |
//! |---|---|---|
//! | `POST /hello` | | `{hello}` |
//! | `POST /add-user` | `{user_id?, name}` | `{user_id}` |
//! | `POST /delete-user` | `{user_id}` | `{user_id}` |
//! | `POST /create-deck` | `{user_id, deck_name, description}` | `{deck_id}` |
//! | `POST /modify-deck` | `{user_id, deck_id, deck_name, description}` | `{deck_id}` |
//! | `POST /delete-deck` | `{user_id, deck_id}` | `{deck_id}` |
//! | `POST /add-deck-to-user` | `{user_id, deck_id}` | `{deck_id}` |
//! | `POST /remove-deck-from-user` | `{user_id, deck_id}` | `{deck_id}` |
//! | `GET /get-decks` | `?user_id=` | `{decks}` |
//! | `GET /get-flashcards` | `?deck_id=` | `{flashcards}` |
//! | `POST /add-flashcard` | `{user_id, deck_id, flashcard}` | `{flashcard_id}` |
//! | `POST /edit-flashcard` | `{user_id, deck_id, flashcard_id, flashcard}` | `{flashcard_id}` |
//! | `POST /delete-flashcard` | `{user_id, deck_id, flashcard_id}` | `{flashcard_id}` |
//! | `POST /generate-flashcards` | `{user_id, n, topic \| reference \| text}` | `{flashcards}` |
//!
//! Failures answer `{error}` with 400 (malformed), 401 (unknown user), 403 (not the deck owner),
//! 404 (missing deck or flashcard), 503 (generation not configured) or 5xx (store/provider).
//!
//!
//!
//! # Notes
//!
//! ## Races
//! Only id counters are atomic. Authorization is checked with separate reads before the write,
//! so a deck deleted between the check and the write is not noticed, and two requests editing the
//! same user's deck list can lose one of the edits. Serializing requests per deck id would close
//! both gaps.
//!
//!
//!
//! # Setup
//!
//! Run against the in-memory store.
//! ```sh
//! RUST_LOG=info cargo run -p flashcards
//! ```
//!
//! Run against Firebase with generation enabled.
//! ```sh
//! STORE_URL=https://<project>.firebaseio.com \
//! STORE_SECRET=<database secret> \
//! OPENAI_API_KEY=<key> \
//! cargo run -p flashcards
//! ```
//!
//! Secrets are read from `/run/secrets/<NAME>` first, then the environment.
use std::{future::pending, sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod completion;
pub mod config;
pub mod database;
pub mod decks;
pub mod error;
pub mod firebase;
pub mod flashcards;
pub mod generation;
pub mod memory;
pub mod model;
pub mod routes;
pub mod state;
pub mod store;
pub mod tree;
pub mod users;
pub mod utils;

use error::AppError;
use routes::{
    add_deck_to_user_handler, add_flashcard_handler, add_user_handler, create_deck_handler,
    delete_deck_handler, delete_flashcard_handler, delete_user_handler, edit_flashcard_handler,
    generate_flashcards_handler, get_decks_handler, get_flashcards_handler, hello_handler,
    modify_deck_handler, remove_deck_from_user_handler,
};
use state::State;

pub fn app(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/hello", post(hello_handler))
        .route("/add-user", post(add_user_handler))
        .route("/delete-user", post(delete_user_handler))
        .route("/create-deck", post(create_deck_handler))
        .route("/modify-deck", post(modify_deck_handler))
        .route("/delete-deck", post(delete_deck_handler))
        .route("/add-deck-to-user", post(add_deck_to_user_handler))
        .route("/remove-deck-from-user", post(remove_deck_from_user_handler))
        .route("/get-decks", get(get_decks_handler))
        .route("/get-flashcards", get(get_flashcards_handler))
        .route("/add-flashcard", post(add_flashcard_handler))
        .route("/edit-flashcard", post(edit_flashcard_handler))
        .route("/delete-flashcard", post(delete_flashcard_handler))
        .route("/generate-flashcards", post(generate_flashcards_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> Result<(), AppError> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = State::new().await?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM. A listener that cannot be installed never fires.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(error) = ctrl_c().await {
            warn!("Ctrl+C listener unavailable: {error}");
            pending::<()>().await;
        }

        "Ctrl+C"
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                warn!("SIGTERM listener unavailable: {error}");
                pending::<()>().await;
            }
        }

        "SIGTERM"
    };

    #[cfg(not(unix))]
    let terminate = pending::<&str>();

    let received = tokio::select! {
        name = interrupt => name,
        name = terminate => name,
    };

    info!("Received {received}, shutting down");
}
