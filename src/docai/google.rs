//! Google Document AI processor (REST `:process` endpoint).

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::auth::Credentials;
use super::{DocumentProcessor, Entity, FileRequest, ProcessedDocument};
use crate::config::ProcessorConfig;
use crate::error::DocumentAiError;
use crate::retry::RetryPolicy;

pub struct GoogleDocumentAi {
    client: reqwest::Client,
    credentials: Credentials,
    processor_name: String,
    url: String,
    retry: RetryPolicy,
}

impl GoogleDocumentAi {
    /// `endpoint` overrides the regional `https://{location}-documentai.googleapis.com` host.
    pub fn new(
        client: reqwest::Client,
        credentials: Credentials,
        project_id: &str,
        processor: &ProcessorConfig,
        endpoint: Option<&str>,
        retry: RetryPolicy,
    ) -> Self {
        let processor_name = format!(
            "projects/{}/locations/{}/processors/{}",
            project_id, processor.location, processor.processor_id
        );
        let base = endpoint
            .map(|e| e.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("https://{}-documentai.googleapis.com", processor.location));
        let url = format!("{}/v1/{}:process", base, processor_name);

        Self {
            client,
            credentials,
            processor_name,
            url,
            retry,
        }
    }

    /// Build the shared HTTP client with a per-call timeout.
    pub fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
        Ok(reqwest::Client::builder().timeout(timeout).build()?)
    }

    async fn call_once(&self, body: &ProcessRequest<'_>) -> Result<ProcessedDocument, DocumentAiError> {
        let token = self.credentials.access_token(&self.client).await?;

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(DocumentAiError::from_status(status.as_u16(), text));
        }

        let parsed: ProcessResponse = resp.json().await?;
        debug!(
            "Document AI returned {} chars, {} entities",
            parsed.document.text.len(),
            parsed.document.entities.len()
        );

        Ok(ProcessedDocument {
            text: parsed.document.text,
            entities: parsed
                .document
                .entities
                .into_iter()
                .map(|e| Entity::new(e.entity_type, e.mention_text))
                .collect(),
        })
    }
}

// ── Document AI request/response types ──────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest<'a> {
    raw_document: RawDocument<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument<'a> {
    content: String,
    mime_type: &'a str,
}

#[derive(Deserialize)]
struct ProcessResponse {
    #[serde(default)]
    document: ApiDocument,
}

#[derive(Deserialize, Default)]
struct ApiDocument {
    #[serde(default)]
    text: String,
    #[serde(default)]
    entities: Vec<ApiEntity>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEntity {
    #[serde(default, rename = "type")]
    entity_type: String,
    #[serde(default)]
    mention_text: String,
}

// ── Processor implementation ────────────────────────────────────────────────

#[async_trait::async_trait]
impl DocumentProcessor for GoogleDocumentAi {
    fn name(&self) -> &str {
        &self.processor_name
    }

    async fn process(&self, request: &FileRequest) -> Result<ProcessedDocument, DocumentAiError> {
        if request.content.is_empty() {
            return Err(DocumentAiError::InvalidInput("document is empty".to_string()));
        }

        let body = ProcessRequest {
            raw_document: RawDocument {
                content: BASE64.encode(&request.content),
                mime_type: &request.mime_type,
            },
        };

        info!(
            "GoogleDocumentAi: processing {} bytes ({}) with {}",
            request.content.len(),
            request.mime_type,
            self.processor_name
        );

        self.retry
            .retry_if("documentai.process", DocumentAiError::is_transient, || {
                self.call_once(&body)
            })
            .await
    }
}
