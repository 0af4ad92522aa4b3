//! Submission errors and their HTTP rendering.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::storage::StorageError;
use crate::translate::TranslatorError;

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Only POST allowed")]
    MethodNotAllowed,

    #[error("File exceeds the upload limit of {0} bytes")]
    PayloadTooLarge(usize),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Translation API error: HTTP {status}")]
    TranslationService { status: u16, body: String },

    #[error(transparent)]
    Unhandled(#[from] anyhow::Error),
}

impl From<TranslatorError> for SubmissionError {
    fn from(err: TranslatorError) -> Self {
        SubmissionError::Unhandled(err.into())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl SubmissionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SubmissionError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            SubmissionError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            SubmissionError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            SubmissionError::Storage(_)
            | SubmissionError::TranslationService { .. }
            | SubmissionError::Unhandled(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn to_body(&self) -> ErrorResponse {
        match self {
            SubmissionError::InvalidRequest(msg) => ErrorResponse {
                error: msg.clone(),
                details: None,
            },
            SubmissionError::MethodNotAllowed | SubmissionError::PayloadTooLarge(_) => {
                ErrorResponse {
                    error: self.to_string(),
                    details: None,
                }
            }
            SubmissionError::Storage(err) => ErrorResponse {
                error: "Blob storage operation failed".to_string(),
                details: Some(err.to_string()),
            },
            SubmissionError::TranslationService { body, .. } => ErrorResponse {
                error: "Translation API error".to_string(),
                details: Some(body.clone()),
            },
            SubmissionError::Unhandled(err) => ErrorResponse {
                error: "Upload or translation failed".to_string(),
                details: Some(format!("{:#}", err)),
            },
        }
    }
}

impl IntoResponse for SubmissionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {:?}", self);
        } else {
            warn!("Rejected request: {}", self);
        }
        (status, Json(self.to_body())).into_response()
    }
}
