use std::sync::Arc;

use crate::config::Config;
use crate::storage::{AzureBlobStore, ObjectStore};
use crate::submission::TranslationSubmissionHandler;
use crate::translate::{DocumentTranslator, TranslationService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub submissions: Arc<TranslationSubmissionHandler>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let store = Arc::new(AzureBlobStore::new(&config.storage)?);
        let translator = Arc::new(DocumentTranslator::new(&config.translator)?);
        Ok(Self::with_collaborators(config, store, translator))
    }

    pub fn with_collaborators(
        config: Config,
        store: Arc<dyn ObjectStore>,
        translator: Arc<dyn TranslationService>,
    ) -> Self {
        let submissions = Arc::new(TranslationSubmissionHandler::new(store, translator, &config));

        Self {
            config: Arc::new(config),
            submissions,
        }
    }
}
