use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::error::SubmissionError;
use crate::state::AppState;
use crate::submission::{JobStatus, TranslationJobHandle, UploadRequest};

pub fn create_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // Health check
        .route("/api/health", get(health_check))
        .route(
            "/api/upload-and-translate",
            post(upload_and_translate).fallback(method_not_allowed),
        )
        .layer(DefaultBodyLimit::max(state.config.server.max_upload_bytes))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_url: Option<String>,
    pub target_url: String,
    pub status: JobStatus,
}

impl From<TranslationJobHandle> for SubmitResponse {
    fn from(handle: TranslationJobHandle) -> Self {
        Self {
            result: handle.status.message(),
            operation_url: handle.operation_url,
            target_url: handle.target_url,
            status: handle.status,
        }
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn method_not_allowed() -> SubmissionError {
    SubmissionError::MethodNotAllowed
}

async fn upload_and_translate(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<SubmitResponse>, SubmissionError> {
    let span = info_span!("upload_and_translate", request_id = %Uuid::new_v4());

    async move {
        let multipart = multipart.map_err(|e| {
            SubmissionError::InvalidRequest(format!(
                "Expected multipart form data: {}",
                e.body_text()
            ))
        })?;
        let request = read_upload(multipart, state.config.server.max_upload_bytes).await?;
        info!(
            "Received {} ({} bytes), {:?} -> {}",
            request.file_name,
            request.content.len(),
            request.source_lang,
            request.target_lang
        );

        let handle = state.submissions.submit(request).await?;
        Ok(Json(SubmitResponse::from(handle)))
    }
    .instrument(span)
    .await
}

async fn read_upload(
    mut multipart: Multipart,
    max_upload_bytes: usize,
) -> Result<UploadRequest, SubmissionError> {
    let malformed = |e: MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            SubmissionError::PayloadTooLarge(max_upload_bytes)
        } else {
            SubmissionError::InvalidRequest(format!("Malformed multipart body: {}", e.body_text()))
        }
    };

    let mut file = None;
    let mut source_lang = None;
    let mut target_lang = None;

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content = field.bytes().await.map_err(malformed)?;
                file = Some((file_name, content));
            }
            "sourceLang" => source_lang = Some(field.text().await.map_err(malformed)?),
            "targetLang" => target_lang = Some(field.text().await.map_err(malformed)?),
            _ => {}
        }
    }

    let (file_name, content) =
        file.ok_or_else(|| SubmissionError::InvalidRequest("No file uploaded".to_string()))?;

    Ok(UploadRequest {
        file_name,
        content,
        source_lang: Some(source_lang.unwrap_or_else(|| "auto".to_string())),
        target_lang: target_lang.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::testing::{test_config, FakeStore, FakeTranslator};
    use crate::translate::SubmissionResponse;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-DOC-TRANSLATE-BOUNDARY";

    fn app(store: &Arc<FakeStore>, translator: &Arc<FakeTranslator>) -> Router {
        app_with_config(test_config(), store, translator)
    }

    fn app_with_config(
        config: Config,
        store: &Arc<FakeStore>,
        translator: &Arc<FakeTranslator>,
    ) -> Router {
        let state = AppState::with_collaborators(config, store.clone(), translator.clone());
        create_routes(&state).with_state(state)
    }

    fn multipart_body(file: Option<(&str, &str)>, fields: &[(&str, &str)]) -> String {
        let mut body = String::new();
        if let Some((file_name, content)) = file {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n{content}\r\n"
            ));
        }
        for (name, value) in fields {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    fn upload_request(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/upload-and-translate")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_upload_submits_translation() {
        let store = Arc::new(FakeStore::default());
        let translator = Arc::new(FakeTranslator::accepting("https://translator/batches/9"));

        let body = multipart_body(
            Some(("mission.txt", "We translate documents.")),
            &[("sourceLang", "auto"), ("targetLang", "en")],
        );
        let (status, json) = send(app(&store, &translator), upload_request(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "Submitted");
        assert_eq!(json["result"], "Translation job submitted");
        assert_eq!(json["operationUrl"], "https://translator/batches/9");
        assert_eq!(
            json["targetUrl"],
            "https://docsacct.blob.core.windows.net/translated-docs/mission-en.txt?sig=target"
        );

        let uploads = store.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(&uploads[0].2[..], b"We translate documents.");
    }

    #[tokio::test]
    async fn test_existing_output_returns_target() {
        let store = Arc::new(FakeStore::default());
        store.add_existing("translated-docs", "report-es.docx");
        let translator = Arc::new(FakeTranslator::accepting("https://translator/batches/9"));

        let body = multipart_body(Some(("report.docx", "docx-bytes")), &[("targetLang", "es")]);
        let (status, json) = send(app(&store, &translator), upload_request(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "OutputFileExists");
        assert_eq!(json["result"], "Translation already completed");
        assert!(json.get("operationUrl").is_none());
        assert!(store.uploads().is_empty());
        assert!(translator.requests().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_bad_request() {
        let store = Arc::new(FakeStore::default());
        let translator = Arc::new(FakeTranslator::accepting("https://translator/batches/9"));

        let body = multipart_body(None, &[("targetLang", "en")]);
        let (status, json) = send(app(&store, &translator), upload_request(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No file uploaded");
        assert_eq!(store.exists_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_file_name_is_bad_request() {
        let store = Arc::new(FakeStore::default());
        let translator = Arc::new(FakeTranslator::accepting("https://translator/batches/9"));

        let body = multipart_body(Some(("", "data")), &[("targetLang", "en")]);
        let (status, json) = send(app(&store, &translator), upload_request(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn test_non_multipart_body_is_bad_request() {
        let store = Arc::new(FakeStore::default());
        let translator = Arc::new(FakeTranslator::accepting("https://translator/batches/9"));

        let request = Request::builder()
            .method("POST")
            .uri("/api/upload-and-translate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let (status, json) = send(app(&store, &translator), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn test_other_methods_are_not_allowed() {
        for method in ["GET", "PUT", "DELETE"] {
            let store = Arc::new(FakeStore::default());
            let translator = Arc::new(FakeTranslator::accepting("https://translator/batches/9"));

            let request = Request::builder()
                .method(method)
                .uri("/api/upload-and-translate")
                .body(Body::empty())
                .unwrap();
            let (status, json) = send(app(&store, &translator), request).await;

            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "method {}", method);
            assert_eq!(json["error"], "Only POST allowed");
        }
    }

    #[tokio::test]
    async fn test_translation_outage_is_server_error() {
        let store = Arc::new(FakeStore::default());
        let translator = Arc::new(FakeTranslator::responding(SubmissionResponse {
            status: 503,
            operation_location: None,
            body: "Service Unavailable".to_string(),
        }));

        let body = multipart_body(Some(("report.docx", "docx-bytes")), &[("targetLang", "es")]);
        let (status, json) = send(app(&store, &translator), upload_request(body)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Translation API error");
        assert_eq!(json["details"], "Service Unavailable");
        assert!(json.get("operationUrl").is_none());
    }

    #[tokio::test]
    async fn test_storage_failure_is_server_error() {
        let store = Arc::new(FakeStore::failing_exists());
        let translator = Arc::new(FakeTranslator::accepting("https://translator/batches/9"));

        let body = multipart_body(Some(("report.docx", "docx-bytes")), &[("targetLang", "es")]);
        let (status, json) = send(app(&store, &translator), upload_request(body)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Blob storage operation failed");
        assert!(json["details"].as_str().unwrap().contains("403"));
    }

    #[tokio::test]
    async fn test_oversized_upload_is_payload_too_large() {
        let store = Arc::new(FakeStore::default());
        let translator = Arc::new(FakeTranslator::accepting("https://translator/batches/9"));
        let mut config = test_config();
        config.server.max_upload_bytes = 64;

        let content = "x".repeat(1000);
        let body = multipart_body(Some(("big.txt", &content)), &[("targetLang", "en")]);
        let (status, json) = send(
            app_with_config(config, &store, &translator),
            upload_request(body),
        )
        .await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json["error"], "File exceeds the upload limit of 64 bytes");
        assert_eq!(store.exists_calls(), 0);
        assert!(translator.requests().is_empty());
    }

    #[tokio::test]
    async fn test_upload_failure_is_server_error() {
        let store = Arc::new(FakeStore::failing_upload());
        let translator = Arc::new(FakeTranslator::accepting("https://translator/batches/9"));

        let body = multipart_body(Some(("report.docx", "docx-bytes")), &[("targetLang", "es")]);
        let (status, json) = send(app(&store, &translator), upload_request(body)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Blob storage operation failed");
        let details = json["details"].as_str().unwrap();
        assert!(details.contains("upload"), "Got: {}", details);
        assert!(details.contains("AuthenticationFailed"), "Got: {}", details);
        assert!(json.get("operationUrl").is_none());
        assert!(translator.requests().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_translator_is_unhandled_error() {
        let store = Arc::new(FakeStore::default());
        let translator = Arc::new(FakeTranslator::unreachable());

        let body = multipart_body(Some(("report.docx", "docx-bytes")), &[("targetLang", "es")]);
        let (status, json) = send(app(&store, &translator), upload_request(body)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Upload or translation failed");
        assert!(!json["details"].as_str().unwrap().is_empty());
        assert!(json.get("operationUrl").is_none());
        assert!(json.get("targetUrl").is_none());
        assert_eq!(store.uploads().len(), 1);
    }

    #[tokio::test]
    async fn test_health_check() {
        let store = Arc::new(FakeStore::default());
        let translator = Arc::new(FakeTranslator::accepting("https://translator/batches/9"));

        let request = Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(app(&store, &translator), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }
}
