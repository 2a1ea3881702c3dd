//! CSF Extractor - tax-status certificate field extraction over Google Document AI.

mod config;
mod docai;
mod error;
mod extract;
mod mime;
mod retry;
mod schema;
mod upload_store;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use config::{CredentialSource, Settings};
use docai::auth::{Credentials, ServiceAccount};
use docai::google::GoogleDocumentAi;
use docai::FileRequest;
use extract::Extractor;
use retry::RetryPolicy;
use schema::{ExtractionResult, Strategy};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use upload_store::UploadStore;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    extractor: Arc<Extractor>,
    default_strategy: Strategy,
    store: UploadStore,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "csf_extractor=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;

    let credentials = match &settings.credentials {
        CredentialSource::KeyFile(path) => {
            let sa = ServiceAccount::from_file(path)?;
            info!("Using service account {}", sa.client_email());
            Credentials::ServiceAccount(sa)
        }
        CredentialSource::AccessToken(token) => {
            info!("Using static access token from GOOGLE_ACCESS_TOKEN");
            Credentials::AccessToken(token.clone())
        }
    };

    let http = GoogleDocumentAi::http_client(settings.upstream_timeout)?;
    let retry = RetryPolicy::new(settings.max_retries, settings.retry_backoff_ms);

    let mut extractor = Extractor::new();
    for (strategy, processor) in [
        (Strategy::Scan, &settings.scan_processor),
        (Strategy::Structured, &settings.structured_processor),
    ] {
        if let Some(processor) = processor {
            let client = GoogleDocumentAi::new(
                http.clone(),
                credentials.clone(),
                &settings.project_id,
                processor,
                settings.endpoint.as_deref(),
                retry.clone(),
            );
            info!("Strategy '{}' -> {}", strategy, docai::DocumentProcessor::name(&client));
            extractor = extractor.with_processor(strategy, Arc::new(client));
        }
    }

    let state = AppState {
        extractor: Arc::new(extractor),
        default_strategy: settings.default_strategy,
        store: UploadStore::new(settings.upload_dir.clone()),
    };
    info!(
        "Default strategy: {}, uploads stored in {:?}",
        state.default_strategy,
        state.store.dir()
    );

    let app = router(state, settings.max_upload_bytes);

    // Run server
    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    info!("Server listening on http://{}", settings.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/upload", post(upload_document))
        .route("/store", post(store_document))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

#[derive(serde::Deserialize)]
struct UploadQuery {
    strategy: Option<String>,
}

/// Upload a certificate and extract its fields.
async fn upload_document(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    multipart: Multipart,
) -> Result<Json<ExtractionResult>, (StatusCode, String)> {
    let strategy = match query.strategy.as_deref() {
        Some(s) => Strategy::from_str(s).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                format!("Unknown strategy: {}. Available: scan, structured", s),
            )
        })?,
        None => state.default_strategy,
    };
    if !state.extractor.supports(strategy) {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Strategy '{}' is not configured on this server", strategy),
        ));
    }

    let (filename, content) = read_file_field(multipart).await?;
    let mime_type = mime::detect(&content).to_string();

    info!(
        "Received file: {} ({} bytes), detected MIME type: {}",
        filename.as_deref().unwrap_or("document"),
        content.len(),
        mime_type
    );

    let request = FileRequest { content, mime_type };
    let result = state.extractor.extract(&request, strategy).await.map_err(|e| {
        error!("Extraction failed: {}", e);
        (e.status_code(), format!("Extraction failed: {}", e))
    })?;

    Ok(Json(result))
}

/// Persist an upload to the upload directory.
async fn store_document(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<String, (StatusCode, String)> {
    let (filename, content) = read_file_field(multipart).await?;

    let stored = state
        .store
        .save(filename.as_deref(), &content)
        .await
        .map_err(|e| {
            error!("Failed to store upload: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to store file: {}", e),
            )
        })?;

    info!("Stored upload {} ({} bytes)", stored, content.len());
    Ok(format!("File {} uploaded successfully\n", stored))
}

// ============================================================================
// Helper functions
// ============================================================================

/// Read the `file` field of a multipart body. Missing or empty files are rejected.
async fn read_file_field(
    mut multipart: Multipart,
) -> Result<(Option<String>, Vec<u8>), (StatusCode, String)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (e.status(), format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().map(str::to_string);
            // Over-limit bodies surface here as 413.
            let data = field
                .bytes()
                .await
                .map_err(|e| (e.status(), format!("Failed to read file: {}", e)))?;

            if data.is_empty() {
                return Err((StatusCode::BAD_REQUEST, "Uploaded file is empty".to_string()));
            }
            return Ok((filename, data.to_vec()));
        }
    }

    Err((StatusCode::BAD_REQUEST, "No file uploaded".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docai::{Entity, ProcessedDocument};
    use crate::error::DocumentAiError;
    use crate::extract::tests::{certificate_text, FakeProcessor};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;

    const BOUNDARY: &str = "csf-test-boundary";

    fn multipart_body(field: &str, filename: &str, data: &[u8]) -> Body {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, field, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        Body::from(body)
    }

    fn post(uri: &str, body: Body) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(body)
            .unwrap()
    }

    fn app_with(extractor: Extractor, upload_dir: std::path::PathBuf) -> Router {
        limited_app(extractor, upload_dir, 1024 * 1024)
    }

    fn limited_app(extractor: Extractor, upload_dir: std::path::PathBuf, limit: usize) -> Router {
        let state = AppState {
            extractor: Arc::new(extractor),
            default_strategy: Strategy::Scan,
            store: UploadStore::new(upload_dir),
        };
        router(state, limit)
    }

    fn app(processor: Arc<FakeProcessor>) -> Router {
        app_with(
            Extractor::new().with_processor(Strategy::Scan, processor),
            std::env::temp_dir().join("csf-unused"),
        )
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_upload_returns_extraction_json() {
        let processor = FakeProcessor::returning(ProcessedDocument {
            text: certificate_text(),
            entities: Vec::new(),
        });
        let response = app(processor.clone())
            .oneshot(post("/upload", multipart_body("file", "csf.pdf", b"%PDF-1.7\n...")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["rfc"], "RFC123");
        assert_eq!(json["social_name"], "ACME SA");
        assert_eq!(json["comercial_name"], "ACME");
        assert_eq!(json["status"], "ACTIVO");
        assert_eq!(json["address"]["postal_code"], "44100");
        assert_eq!(json["activity"], serde_json::json!([]));

        let seen = processor.seen.lock().unwrap();
        assert_eq!(seen[0].mime_type, "application/pdf");
        assert_eq!(seen[0].content, b"%PDF-1.7\n...");
    }

    #[tokio::test]
    async fn test_upload_structured_strategy_query() {
        let structured = FakeProcessor::returning(ProcessedDocument {
            text: String::new(),
            entities: vec![
                Entity::new("RFC", "RFC123"),
                Entity::new("Obligaciones", "Declaración anual"),
            ],
        });
        let extractor = Extractor::new()
            .with_processor(Strategy::Scan, FakeProcessor::returning(ProcessedDocument::default()))
            .with_processor(Strategy::Structured, structured);

        let response = app_with(extractor, std::env::temp_dir())
            .oneshot(post(
                "/upload?strategy=structured",
                multipart_body("file", "csf.png", b"\x89PNG\r\n\x1a\n"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["rfc"], "RFC123");
        assert_eq!(json["obligations"], serde_json::json!(["Declaración anual"]));
    }

    #[tokio::test]
    async fn test_unknown_strategy_is_bad_request() {
        let response = app(FakeProcessor::returning(ProcessedDocument::default()))
            .oneshot(post("/upload?strategy=llm", multipart_body("file", "a.pdf", b"%PDF-")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unconfigured_strategy_is_bad_request() {
        let response = app(FakeProcessor::returning(ProcessedDocument::default()))
            .oneshot(post(
                "/upload?strategy=structured",
                multipart_body("file", "a.pdf", b"%PDF-"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_file_field() {
        let processor = FakeProcessor::returning(ProcessedDocument::default());
        let response = app(processor.clone())
            .oneshot(post("/upload", multipart_body("document", "a.pdf", b"%PDF-")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "No file uploaded");
        assert!(processor.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_file_rejected() {
        let response = app(FakeProcessor::returning(ProcessedDocument::default()))
            .oneshot(post("/upload", multipart_body("file", "a.pdf", b"")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_non_multipart_body_rejected() {
        let request = Request::builder()
            .method("POST")
            .uri("/upload")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let response = app(FakeProcessor::returning(ProcessedDocument::default()))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_upload_is_payload_too_large() {
        let processor = FakeProcessor::returning(ProcessedDocument::default());
        let extractor = Extractor::new().with_processor(Strategy::Scan, processor.clone());
        let mut data = b"%PDF-1.7\n".to_vec();
        data.resize(4096, b'x');

        let response = limited_app(extractor, std::env::temp_dir(), 1024)
            .oneshot(post("/upload", multipart_body("file", "big.pdf", &data)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(processor.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_method() {
        let request = Request::builder()
            .method("GET")
            .uri("/upload")
            .body(Body::empty())
            .unwrap();
        let response = app(FakeProcessor::returning(ProcessedDocument::default()))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_upstream_errors_map_to_status() {
        let cases: [(fn() -> DocumentAiError, StatusCode); 3] = [
            (
                || DocumentAiError::ServiceUnavailable("outage".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                || DocumentAiError::AuthenticationFailed("denied".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                || DocumentAiError::InvalidInput("unsupported".into()),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (error, expected) in cases {
            let response = app(FakeProcessor::failing(error))
                .oneshot(post("/upload", multipart_body("file", "a.pdf", b"%PDF-")))
                .await
                .unwrap();
            assert_eq!(response.status(), expected);
            assert!(body_string(response).await.starts_with("Extraction failed:"));
        }
    }

    #[tokio::test]
    async fn test_store_writes_file() {
        let dir = std::env::temp_dir().join(format!("csf-upload-{}", uuid::Uuid::new_v4()));
        let response = app_with(Extractor::new(), dir.clone())
            .oneshot(post("/store", multipart_body("file", "constancia.pdf", b"%PDF-1.7")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_string(response).await,
            "File constancia.pdf uploaded successfully\n"
        );
        assert_eq!(std::fs::read(dir.join("constancia.pdf")).unwrap(), b"%PDF-1.7");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_store_missing_file() {
        let response = app_with(Extractor::new(), std::env::temp_dir())
            .oneshot(post("/store", multipart_body("other", "a.pdf", b"%PDF-")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app(FakeProcessor::returning(ProcessedDocument::default()))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "ok");
    }
}
