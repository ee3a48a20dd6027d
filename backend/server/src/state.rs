use std::sync::Arc;

use tracing::{info, warn};

use super::{
    completion::{CompletionProvider, OpenAiProvider},
    config::Config,
    error::AppError,
    store::{TreeStore, connect},
};

pub struct State {
    pub config: Config,
    pub store: Arc<dyn TreeStore>,
    pub completion: Option<Arc<dyn CompletionProvider>>,
}

impl State {
    pub async fn new() -> Result<Arc<Self>, AppError> {
        let config = Config::load()?;

        let store = connect(&config.store_url, config.store_secret.as_deref()).await?;

        let completion: Option<Arc<dyn CompletionProvider>> = match &config.completion_key {
            Some(api_key) => {
                info!("Flashcard generation enabled with {}", config.completion_model);

                Some(Arc::new(OpenAiProvider::new(
                    &config.completion_url,
                    api_key,
                    &config.completion_model,
                    config.completion_timeout,
                )?))
            }
            None => {
                warn!("OPENAI_API_KEY not set, flashcard generation disabled");
                None
            }
        };

        Ok(Self::with_parts(config, store, completion))
    }

    pub fn with_parts(
        config: Config,
        store: Arc<dyn TreeStore>,
        completion: Option<Arc<dyn CompletionProvider>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            store,
            completion,
        })
    }
}
