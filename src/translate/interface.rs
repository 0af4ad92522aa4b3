//! Document translation batch request types and the service seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranslatorError {
    #[error("Translation request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Body of a batch submission: one input document, one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationJobRequest {
    pub inputs: Vec<BatchInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchInput {
    pub storage_type: String,
    pub source: SourceInput,
    pub targets: Vec<TargetInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInput {
    pub source_url: String,
    /// Absent means the service auto-detects the language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInput {
    pub target_url: String,
    pub language: String,
}

impl TranslationJobRequest {
    /// Single-file job. `source_lang` of `None`, empty, or `auto` requests auto-detection.
    pub fn single_file(
        source_url: &str,
        source_lang: Option<&str>,
        target_url: &str,
        target_lang: &str,
    ) -> Self {
        let language = source_lang
            .map(str::trim)
            .filter(|lang| !lang.is_empty() && !lang.eq_ignore_ascii_case("auto"))
            .map(str::to_string);

        Self {
            inputs: vec![BatchInput {
                storage_type: "File".to_string(),
                source: SourceInput {
                    source_url: source_url.to_string(),
                    language,
                },
                targets: vec![TargetInput {
                    target_url: target_url.to_string(),
                    language: target_lang.to_string(),
                }],
            }],
        }
    }
}

/// Raw outcome of a submission; status interpretation is left to the caller.
#[derive(Debug, Clone)]
pub struct SubmissionResponse {
    pub status: u16,
    pub operation_location: Option<String>,
    pub body: String,
}

impl SubmissionResponse {
    pub fn is_accepted(&self) -> bool {
        matches!(self.status, 200 | 202)
    }

    /// Job URL from the `operation-location` header, else the body's `operationUrl`.
    pub fn operation_url(&self) -> Option<String> {
        self.operation_location
            .clone()
            .filter(|url| !url.is_empty())
            .or_else(|| {
                serde_json::from_str::<serde_json::Value>(&self.body)
                    .ok()?
                    .get("operationUrl")?
                    .as_str()
                    .filter(|url| !url.is_empty())
                    .map(str::to_string)
            })
    }
}

#[async_trait]
pub trait TranslationService: Send + Sync {
    /// Submit a batch job. Exactly one HTTP attempt, no retries.
    async fn submit(
        &self,
        request: &TranslationJobRequest,
    ) -> Result<SubmissionResponse, TranslatorError>;
}
