use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use super::interface::{
    SubmissionResponse, TranslationJobRequest, TranslationService, TranslatorError,
};
use crate::config::TranslatorConfig;

/// Client for the Azure Document Translation batch endpoint
pub struct DocumentTranslator {
    client: Client,
    endpoint: String,
    key: String,
    region: String,
}

impl DocumentTranslator {
    pub fn new(config: &TranslatorConfig) -> Result<Self, TranslatorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        info!(
            "Initialized DocumentTranslator: endpoint={}, region={}",
            config.endpoint, config.region
        );

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            key: config.key.clone(),
            region: config.region.clone(),
        })
    }
}

#[async_trait]
impl TranslationService for DocumentTranslator {
    async fn submit(
        &self,
        request: &TranslationJobRequest,
    ) -> Result<SubmissionResponse, TranslatorError> {
        debug!("Submitting translation job to {}", self.endpoint);

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .json(request);
        if !self.region.is_empty() {
            builder = builder.header("Ocp-Apim-Subscription-Region", &self.region);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let operation_location = response
            .headers()
            .get("operation-location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        debug!("Translation API responded with {}", status);

        Ok(SubmissionResponse {
            status,
            operation_location,
            body,
        })
    }
}
