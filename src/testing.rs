//! In-memory collaborators shared by the unit tests.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::{
    Config, LoggingConfig, ServerConfig, StorageConfig, SubmissionConfig, TranslatorConfig,
};
use crate::storage::{ObjectStore, StorageError, StorageLocator};
use crate::translate::{
    SubmissionResponse, TranslationJobRequest, TranslationService, TranslatorError,
};

pub const TEST_ACCOUNT_URL: &str = "https://docsacct.blob.core.windows.net";

pub fn test_config() -> Config {
    Config {
        server: ServerConfig::default(),
        storage: StorageConfig {
            connection_string: None,
            account_url: Some(TEST_ACCOUNT_URL.to_string()),
            source_container: "source-docs".to_string(),
            target_container: "translated-docs".to_string(),
            source_sas_token: "sig=source".to_string(),
            target_sas_token: "sig=target".to_string(),
            timeout_secs: 5,
        },
        translator: TranslatorConfig {
            endpoint: "https://translator.example/translator/document/batches".to_string(),
            key: "test-key".to_string(),
            region: "eastus2".to_string(),
            timeout_secs: 5,
        },
        submission: SubmissionConfig { dedup_ttl_secs: 60 },
        logging: LoggingConfig::default(),
    }
}

#[derive(Default)]
pub struct FakeStore {
    existing: Mutex<HashSet<(String, String)>>,
    uploads: Mutex<Vec<(String, String, Bytes)>>,
    exists_calls: AtomicUsize,
    fail_exists: bool,
    fail_upload: bool,
}

impl FakeStore {
    pub fn failing_exists() -> Self {
        Self {
            fail_exists: true,
            ..Self::default()
        }
    }

    pub fn failing_upload() -> Self {
        Self {
            fail_upload: true,
            ..Self::default()
        }
    }

    pub fn add_existing(&self, container: &str, blob_name: &str) {
        self.existing
            .lock()
            .unwrap()
            .insert((container.to_string(), blob_name.to_string()));
    }

    pub fn uploads(&self) -> Vec<(String, String, Bytes)> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn exists(&self, container: &str, blob_name: &str) -> Result<bool, StorageError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_exists {
            return Err(StorageError::UnexpectedStatus {
                operation: "exists",
                status: 403,
                body: String::new(),
            });
        }
        Ok(self
            .existing
            .lock()
            .unwrap()
            .contains(&(container.to_string(), blob_name.to_string())))
    }

    async fn upload(
        &self,
        container: &str,
        blob_name: &str,
        content: Bytes,
    ) -> Result<(), StorageError> {
        if self.fail_upload {
            return Err(StorageError::UnexpectedStatus {
                operation: "upload",
                status: 403,
                body: "AuthenticationFailed".to_string(),
            });
        }
        self.uploads
            .lock()
            .unwrap()
            .push((container.to_string(), blob_name.to_string(), content));
        Ok(())
    }

    fn locator(&self, container: &str, blob_name: &str) -> Result<StorageLocator, StorageError> {
        let sas = if container == "source-docs" {
            "sig=source"
        } else {
            "sig=target"
        };
        StorageLocator::new(TEST_ACCOUNT_URL, container, blob_name, sas)
    }
}

pub struct FakeTranslator {
    response: SubmissionResponse,
    requests: Mutex<Vec<TranslationJobRequest>>,
    delay: Duration,
    unreachable: bool,
}

impl FakeTranslator {
    pub fn accepting(operation_url: &str) -> Self {
        Self::responding(SubmissionResponse {
            status: 202,
            operation_location: Some(operation_url.to_string()),
            body: String::new(),
        })
    }

    pub fn responding(response: SubmissionResponse) -> Self {
        Self {
            response,
            requests: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            unreachable: false,
        }
    }

    /// A translator whose requests never reach the service.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::accepting("https://translator/unused")
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<TranslationJobRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranslationService for FakeTranslator {
    async fn submit(
        &self,
        request: &TranslationJobRequest,
    ) -> Result<SubmissionResponse, TranslatorError> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.unreachable {
            // A relative URL fails inside reqwest before any I/O.
            let err = reqwest::Client::new()
                .post("translator.invalid/batches")
                .send()
                .await
                .unwrap_err();
            return Err(TranslatorError::Request(err));
        }
        Ok(self.response.clone())
    }
}
