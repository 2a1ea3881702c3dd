//! Document processing abstraction.
//!
//! Defines the [`DocumentProcessor`] trait and the unified document types so
//! the extraction strategies can run against Google Document AI or a test fake.

pub mod auth;
pub mod google;

/// Raw upload handed to a processor.
#[derive(Debug, Clone)]
pub struct FileRequest {
    pub content: Vec<u8>,
    pub mime_type: String,
}

/// A typed span reported by the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub entity_type: String,
    pub mention_text: String,
}

impl Entity {
    pub fn new(entity_type: impl Into<String>, mention_text: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            mention_text: mention_text.into(),
        }
    }
}

/// Processor output: the full OCR text plus entities in service order.
#[derive(Debug, Clone, Default)]
pub struct ProcessedDocument {
    pub text: String,
    pub entities: Vec<Entity>,
}

/// Async trait implemented by each processing backend.
#[async_trait::async_trait]
pub trait DocumentProcessor: Send + Sync {
    fn name(&self) -> &str;
    async fn process(
        &self,
        request: &FileRequest,
    ) -> Result<ProcessedDocument, crate::error::DocumentAiError>;
}
