//! Azure Blob Storage backend over the Blob REST API.
//!
//! Credentials come from the connection string: an `AccountKey` signs each
//! request with Shared Key, a `SharedAccessSignature` is appended as an
//! account SAS. Without either, the per-container SAS tokens from the
//! configuration authorise the calls.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use bytes::Bytes;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use sha2::Sha256;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

use super::interface::{ObjectStore, StorageError, StorageLocator};
use crate::config::StorageConfig;

/// Azure REST API version sent with every request.
const AZURE_API_VERSION: &str = "2023-11-03";

const DEV_STORAGE_URL: &str = "http://127.0.0.1:10000/devstoreaccount1";

/// How requests to the blob service are authorised.
enum AzureAuth {
    SharedKey { account: String, key_bytes: Vec<u8> },
    AccountSas { token: String },
    ContainerSas,
}

impl AzureAuth {
    fn describe(&self) -> &'static str {
        match self {
            AzureAuth::SharedKey { .. } => "shared key",
            AzureAuth::AccountSas { .. } => "account SAS",
            AzureAuth::ContainerSas => "container SAS",
        }
    }
}

pub struct AzureBlobStore {
    client: Client,
    account_url: String,
    auth: AzureAuth,
    sas_tokens: HashMap<String, String>,
}

impl AzureBlobStore {
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let account_url = resolve_account_url(
            config.account_url.as_deref(),
            config.connection_string.as_deref(),
        )?;
        let auth = resolve_auth(config.connection_string.as_deref())?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let mut sas_tokens = HashMap::new();
        sas_tokens.insert(config.source_container.clone(), config.source_sas_token.clone());
        sas_tokens.insert(config.target_container.clone(), config.target_sas_token.clone());

        info!(
            "Azure blob store initialized: account_url={} auth={} source={} target={}",
            account_url,
            auth.describe(),
            config.source_container,
            config.target_container
        );

        Ok(Self {
            client,
            account_url,
            auth,
            sas_tokens,
        })
    }

    fn sas_for(&self, container: &str) -> &str {
        self.sas_tokens.get(container).map(String::as_str).unwrap_or("")
    }

    /// Build an authorised request for one blob.
    fn request(
        &self,
        method: Method,
        container: &str,
        blob_name: &str,
        content_length: Option<usize>,
        content_type: &str,
        extra_headers: &[(&str, &str)],
    ) -> Result<RequestBuilder, StorageError> {
        let sas = match &self.auth {
            AzureAuth::SharedKey { .. } => "",
            AzureAuth::AccountSas { token } => token.as_str(),
            AzureAuth::ContainerSas => self.sas_for(container),
        };
        let target = StorageLocator::new(&self.account_url, container, blob_name, sas)?;
        let date = httpdate::fmt_http_date(SystemTime::now());

        let mut req = self
            .client
            .request(method.clone(), target.url().clone())
            .header("x-ms-date", &date)
            .header("x-ms-version", AZURE_API_VERSION);
        for (name, value) in extra_headers {
            req = req.header(*name, *value);
        }
        if !content_type.is_empty() {
            req = req.header("Content-Type", content_type);
        }

        if let AzureAuth::SharedKey { account, key_bytes } = &self.auth {
            let mut ms_headers = vec![
                ("x-ms-date", date.as_str()),
                ("x-ms-version", AZURE_API_VERSION),
            ];
            ms_headers.extend(
                extra_headers
                    .iter()
                    .filter(|(name, _)| name.to_lowercase().starts_with("x-ms-"))
                    .copied(),
            );
            let resource = format!("/{}{}", account, target.url().path());
            let to_sign = string_to_sign(
                method.as_str(),
                content_length,
                content_type,
                &ms_headers,
                &resource,
            );
            let signature = sign(key_bytes, &to_sign)?;
            req = req.header("Authorization", format!("SharedKey {}:{}", account, signature));
        }

        Ok(req)
    }
}

#[async_trait]
impl ObjectStore for AzureBlobStore {
    async fn exists(&self, container: &str, blob_name: &str) -> Result<bool, StorageError> {
        let resp = self
            .request(Method::HEAD, container, blob_name, None, "", &[])?
            .send()
            .await?;

        match resp.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(StorageError::UnexpectedStatus {
                operation: "exists",
                status: status.as_u16(),
                body: String::new(),
            }),
        }
    }

    async fn upload(
        &self,
        container: &str,
        blob_name: &str,
        content: Bytes,
    ) -> Result<(), StorageError> {
        debug!("Uploading {} bytes to {}/{}", content.len(), container, blob_name);

        let resp = self
            .request(
                Method::PUT,
                container,
                blob_name,
                Some(content.len()),
                "application/octet-stream",
                &[("x-ms-blob-type", "BlockBlob")],
            )?
            .body(content)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::UnexpectedStatus {
                operation: "upload",
                status,
                body,
            });
        }

        Ok(())
    }

    fn locator(&self, container: &str, blob_name: &str) -> Result<StorageLocator, StorageError> {
        StorageLocator::new(&self.account_url, container, blob_name, self.sas_for(container))
    }
}

/// Work out the blob service endpoint.
///
/// An explicit URL wins, then the connection string's `BlobEndpoint`, then
/// one assembled from `AccountName` and `EndpointSuffix`.
pub fn resolve_account_url(
    account_url: Option<&str>,
    connection_string: Option<&str>,
) -> Result<String, StorageError> {
    if let Some(url) = account_url.map(str::trim).filter(|u| !u.is_empty()) {
        return Ok(url.trim_end_matches('/').to_string());
    }

    let conn_str = connection_string
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| {
            StorageError::Config(
                "Set either a storage account URL or a storage connection string".to_string(),
            )
        })?;

    let parts = parse_connection_string(conn_str);

    if parts
        .get("UseDevelopmentStorage")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    {
        return Ok(DEV_STORAGE_URL.to_string());
    }

    if let Some(endpoint) = parts.get("BlobEndpoint") {
        return Ok(endpoint.trim_end_matches('/').to_string());
    }

    let account = parts.get("AccountName").ok_or_else(|| {
        StorageError::Config(
            "Connection string has neither BlobEndpoint nor AccountName".to_string(),
        )
    })?;
    let protocol = parts
        .get("DefaultEndpointsProtocol")
        .map(String::as_str)
        .unwrap_or("https");
    let suffix = parts
        .get("EndpointSuffix")
        .map(String::as_str)
        .unwrap_or("core.windows.net");

    Ok(format!("{}://{}.blob.{}", protocol, account, suffix))
}

/// Pick the credential: `AccountKey`, then `SharedAccessSignature`, then
/// the container SAS tokens.
fn resolve_auth(connection_string: Option<&str>) -> Result<AzureAuth, StorageError> {
    let parts = connection_string
        .map(parse_connection_string)
        .unwrap_or_default();

    if let Some(key) = parts.get("AccountKey").filter(|k| !k.is_empty()) {
        let account = parts
            .get("AccountName")
            .filter(|a| !a.is_empty())
            .ok_or_else(|| {
                StorageError::Config(
                    "Connection string has AccountKey but no AccountName".to_string(),
                )
            })?;
        let key_bytes = BASE64_STANDARD.decode(key).map_err(|e| {
            StorageError::Config(format!("Invalid AccountKey in connection string: {}", e))
        })?;
        return Ok(AzureAuth::SharedKey {
            account: account.clone(),
            key_bytes,
        });
    }

    if let Some(sas) = parts.get("SharedAccessSignature").filter(|s| !s.is_empty()) {
        return Ok(AzureAuth::AccountSas {
            token: sas.trim_start_matches('?').to_string(),
        });
    }

    Ok(AzureAuth::ContainerSas)
}

fn parse_connection_string(conn_str: &str) -> HashMap<String, String> {
    conn_str
        .split(';')
        .filter_map(|part| part.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

/// Shared Key string-to-sign for blob requests.
///
/// ```text
/// VERB\nContent-Encoding\nContent-Language\nContent-Length\nContent-MD5\n
/// Content-Type\nDate\nIf-Modified-Since\nIf-Match\nIf-None-Match\n
/// If-Unmodified-Since\nRange\nCanonicalizedHeaders\nCanonicalizedResource
/// ```
fn string_to_sign(
    method: &str,
    content_length: Option<usize>,
    content_type: &str,
    ms_headers: &[(&str, &str)],
    resource: &str,
) -> String {
    // Zero length is signed as empty.
    let content_length = match content_length {
        Some(0) | None => String::new(),
        Some(len) => len.to_string(),
    };

    let mut headers: Vec<(String, &str)> = ms_headers
        .iter()
        .map(|(name, value)| (name.to_lowercase(), *value))
        .collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));
    let canonicalized_headers = headers
        .iter()
        .map(|(name, value)| format!("{}:{}", name, value))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}\n\n\n{}\n\n{}\n\n\n\n\n\n\n{}\n{}",
        method, content_length, content_type, canonicalized_headers, resource
    )
}

fn sign(key_bytes: &[u8], string_to_sign: &str) -> Result<String, StorageError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key_bytes)
        .map_err(|e| StorageError::Config(format!("HMAC key error: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}
