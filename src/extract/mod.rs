//! Extraction pipeline: one processor call, then the chosen strategy.

pub mod entities;
pub mod scan;

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::info;

use crate::docai::{DocumentProcessor, FileRequest};
use crate::error::ExtractError;
use crate::schema::{ExtractionResult, Strategy};

/// Extraction pipeline orchestrator.
///
/// The strategies run against different processors: an OCR processor for
/// the scan strategy and a custom extractor for the structured one.
#[derive(Clone, Default)]
pub struct Extractor {
    scan: Option<Arc<dyn DocumentProcessor>>,
    structured: Option<Arc<dyn DocumentProcessor>>,
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_processor(mut self, strategy: Strategy, processor: Arc<dyn DocumentProcessor>) -> Self {
        match strategy {
            Strategy::Scan => self.scan = Some(processor),
            Strategy::Structured => self.structured = Some(processor),
        }
        self
    }

    pub fn supports(&self, strategy: Strategy) -> bool {
        self.processor(strategy).is_some()
    }

    fn processor(&self, strategy: Strategy) -> Option<&Arc<dyn DocumentProcessor>> {
        match strategy {
            Strategy::Scan => self.scan.as_ref(),
            Strategy::Structured => self.structured.as_ref(),
        }
    }

    /// Process `request` and extract the business record with `strategy`.
    pub async fn extract(
        &self,
        request: &FileRequest,
        strategy: Strategy,
    ) -> Result<ExtractionResult, ExtractError> {
        let processor = self
            .processor(strategy)
            .ok_or(ExtractError::StrategyNotConfigured(strategy))?;

        let content_hash = {
            let mut hasher = Sha256::new();
            hasher.update(&request.content);
            format!("{:x}", hasher.finalize())
        };

        info!(
            "Starting extraction: {} bytes ({}), sha256={}, strategy={}, processor={}",
            request.content.len(),
            request.mime_type,
            content_hash,
            strategy,
            processor.name()
        );

        let document = processor.process(request).await?;

        let result = match strategy {
            Strategy::Scan => scan::extract(&document.text),
            Strategy::Structured => entities::extract(&document.entities),
        };

        info!(
            "Extraction complete: {} fields filled ({} chars, {} entities)",
            result.filled_count(),
            document.text.len(),
            document.entities.len()
        );

        Ok(result)
    }
}
