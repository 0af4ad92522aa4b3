pub mod dedup;

use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::SubmissionError;
use crate::storage::ObjectStore;
use crate::translate::{TranslationJobRequest, TranslationService};
use dedup::SubmissionGuard;

/// A document received from a client, alive for one request.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub content: Bytes,
    pub source_lang: Option<String>,
    pub target_lang: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobStatus {
    Submitted,
    OutputFileExists,
}

impl JobStatus {
    pub fn message(&self) -> &'static str {
        match self {
            JobStatus::Submitted => "Translation job submitted",
            JobStatus::OutputFileExists => "Translation already completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationJobHandle {
    /// Pollable job URL; `None` when the output already existed.
    pub operation_url: Option<String>,
    pub target_url: String,
    pub status: JobStatus,
}

/// Runs the exists / upload / submit sequence for one uploaded document.
pub struct TranslationSubmissionHandler {
    store: Arc<dyn ObjectStore>,
    translator: Arc<dyn TranslationService>,
    source_container: String,
    target_container: String,
    guard: SubmissionGuard,
}

impl TranslationSubmissionHandler {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        translator: Arc<dyn TranslationService>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            translator,
            source_container: config.storage.source_container.clone(),
            target_container: config.storage.target_container.clone(),
            guard: SubmissionGuard::new(Duration::from_secs(config.submission.dedup_ttl_secs)),
        }
    }

    pub async fn submit(
        &self,
        request: UploadRequest,
    ) -> Result<TranslationJobHandle, SubmissionError> {
        if request.file_name.is_empty() {
            return Err(SubmissionError::InvalidRequest("No selected file".to_string()));
        }
        if request.target_lang.trim().is_empty() {
            return Err(SubmissionError::InvalidRequest(
                "targetLang is required".to_string(),
            ));
        }

        let target_blob = target_blob_name(&request.file_name, &request.target_lang);

        let mut slot = self.guard.acquire(&target_blob).await;
        if let Some(handle) = slot.recent() {
            info!(
                "Translation for {} already submitted, reusing job {:?}",
                target_blob, handle.operation_url
            );
            return Ok(handle);
        }

        let handle = self.run(request, &target_blob).await?;
        if handle.status == JobStatus::Submitted {
            slot.remember(handle.clone());
        }
        Ok(handle)
    }

    async fn run(
        &self,
        request: UploadRequest,
        target_blob: &str,
    ) -> Result<TranslationJobHandle, SubmissionError> {
        let target = self.store.locator(&self.target_container, target_blob)?;

        if self.store.exists(&self.target_container, target_blob).await? {
            info!(
                "Output file {} already exists in {}",
                target_blob, self.target_container
            );
            return Ok(TranslationJobHandle {
                operation_url: None,
                target_url: target.to_string(),
                status: JobStatus::OutputFileExists,
            });
        }

        let size = request.content.len();
        self.store
            .upload(&self.source_container, &request.file_name, request.content)
            .await?;
        let source = self.store.locator(&self.source_container, &request.file_name)?;
        info!(
            "Uploaded {} ({} bytes) to {}",
            request.file_name, size, self.source_container
        );

        let job = TranslationJobRequest::single_file(
            source.as_str(),
            request.source_lang.as_deref(),
            target.as_str(),
            &request.target_lang,
        );
        debug!(
            "Submitting translation {} -> {} ({:?} -> {})",
            source.redacted(),
            target.redacted(),
            request.source_lang,
            request.target_lang
        );

        let response = self.translator.submit(&job).await?;
        if !response.is_accepted() {
            error!("Translation API error: {} {}", response.status, response.body);
            return Err(SubmissionError::TranslationService {
                status: response.status,
                body: response.body,
            });
        }

        let operation_url = response.operation_url().ok_or_else(|| {
            SubmissionError::TranslationService {
                status: response.status,
                body: format!(
                    "Translation API accepted the job without an operation URL: {}",
                    response.body
                ),
            }
        })?;

        info!("Translation started. Operation URL: {}", operation_url);

        Ok(TranslationJobHandle {
            operation_url: Some(operation_url),
            target_url: target.to_string(),
            status: JobStatus::Submitted,
        })
    }
}

/// `report.docx` + `es` -> `report-es.docx`
pub fn target_blob_name(file_name: &str, target_lang: &str) -> String {
    let (base, ext) = split_extension(file_name);
    format!("{}-{}{}", base, target_lang, ext)
}

// Only the last path segment is searched. Leading dots belong to the name,
// so `.env` has no extension.
fn split_extension(file_name: &str) -> (&str, &str) {
    let name_start = file_name.rfind(&['/', '\\'][..]).map_or(0, |idx| idx + 1);
    let name = &file_name[name_start..];
    match name.rfind('.') {
        Some(idx) if !name[..idx].chars().all(|c| c == '.') => {
            let split = name_start + idx;
            (&file_name[..split], &file_name[split..])
        }
        _ => (file_name, ""),
    }
}
