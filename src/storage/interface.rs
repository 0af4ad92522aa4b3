use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Blob storage request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Blob storage {operation} returned HTTP {status}: {body}")]
    UnexpectedStatus {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("Invalid blob URL: {0}")]
    InvalidUrl(String),

    #[error("Storage configuration error: {0}")]
    Config(String),
}

/// URL of a single blob, carrying the container's SAS token as its query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocator {
    url: Url,
}

impl StorageLocator {
    pub fn new(
        account_url: &str,
        container: &str,
        blob_name: &str,
        sas_token: &str,
    ) -> Result<Self, StorageError> {
        let mut url = Url::parse(account_url)
            .map_err(|e| StorageError::InvalidUrl(format!("{}: {}", account_url, e)))?;

        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidUrl(format!("{} cannot be a base", account_url)))?
            .pop_if_empty()
            .push(container)
            .push(blob_name);

        let sas = sas_token.trim().trim_start_matches('?');
        url.set_query(if sas.is_empty() { None } else { Some(sas) });

        Ok(Self { url })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The locator without its access token, safe to log.
    pub fn redacted(&self) -> String {
        let mut url = self.url.clone();
        url.set_query(None);
        url.to_string()
    }
}

impl fmt::Display for StorageLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Blob store operations the submission workflow depends on.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether `blob_name` exists in `container`.
    async fn exists(&self, container: &str, blob_name: &str) -> Result<bool, StorageError>;

    /// Write `content` to `container/blob_name`, replacing any existing blob.
    async fn upload(
        &self,
        container: &str,
        blob_name: &str,
        content: Bytes,
    ) -> Result<(), StorageError>;

    /// Access URL for a blob, handed to the translation service.
    fn locator(&self, container: &str, blob_name: &str) -> Result<StorageLocator, StorageError>;
}
