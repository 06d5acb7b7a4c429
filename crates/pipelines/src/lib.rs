//! # Book Gateway Pipelines
//!
//! Background job pipelines: batch enrichment, bookshelf photo scanning,
//! and CSV import. Each composes an [`book_gateway_engine::EnrichmentEngine`]
//! for metadata lookups and a [`book_gateway_coordinator::CoordinatorHandle`]
//! for progress/state, following the same shape: validate the request,
//! reserve a job, hand the caller a token immediately, then drive the job
//! to completion from a spawned task.
//!
//! The vision model used for bookshelf photos and the extraction model used
//! for messy CSV rows are both external collaborators this crate only
//! talks to through a typed request/response contract ([`VisionScanner`],
//! [`RowExtractor`]) — no model call is implemented here.

pub mod batch_enrichment;
pub mod bookshelf_scan;
pub mod csv_import;

use async_trait::async_trait;
use book_gateway_core::error::GatewayError;
use serde::{Deserialize, Serialize};

pub use batch_enrichment::{BatchEnrichmentOutcome, BatchEnrichmentPipeline, BatchEnrichmentRequest, BookQuery};
pub use bookshelf_scan::{
    BatchScanOutcome, BatchScanRequest, BookshelfScanPipeline, ScanImage, ScanOutcome, ScanRequest,
};
pub use csv_import::{CsvImportOutcome, CsvImportPipeline, CsvImportRequest, HeuristicRowExtractor, RowExtractor};

/// A book title/author pair as detected in a photo by the vision model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedBook {
    pub title: String,
    pub author: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VisionScanRequest {
    pub image: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct VisionScanResponse {
    pub books: Vec<DetectedBook>,
    pub model_used: Option<String>,
}

/// The request/response contract for a bookshelf photo's AI vision call.
/// Implementations live outside this crate; this trait is the seam.
#[async_trait]
pub trait VisionScanner: Send + Sync {
    async fn scan(&self, request: VisionScanRequest) -> Result<VisionScanResponse, GatewayError>;
}

/// A field set an extractor recovered from one CSV row. Any field left
/// `None` is simply not enriched against.
#[derive(Debug, Clone, Default)]
pub struct ExtractedRecord {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
}

impl ExtractedRecord {
    fn is_empty(&self) -> bool {
        self.title.is_none() && self.author.is_none() && self.isbn.is_none()
    }
}

const MAX_TITLE_LEN: usize = 500;
const MAX_AUTHOR_LEN: usize = 300;
const MAX_ISBN_LEN: usize = 17;

/// Trims and length-caps a free-text field crossing the pipeline boundary.
/// `None`/empty-after-trim collapses to `None`.
fn sanitize_field(input: Option<&str>, max_len: usize) -> Option<String> {
    let trimmed = book_gateway_core::sanitization::sanitize_text(input?.trim(), max_len);
    let trimmed = trimmed.trim().to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn sanitize_title(input: Option<&str>) -> Option<String> {
    sanitize_field(input, MAX_TITLE_LEN)
}

fn sanitize_author(input: Option<&str>) -> Option<String> {
    sanitize_field(input, MAX_AUTHOR_LEN)
}

fn sanitize_isbn(input: Option<&str>) -> Option<String> {
    sanitize_field(input, MAX_ISBN_LEN).map(|s| s.chars().filter(|c| c.is_ascii_alphanumeric()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_field_trims_and_caps_length() {
        let long = "x".repeat(600);
        let result = sanitize_title(Some(&long)).unwrap();
        assert_eq!(result.len(), MAX_TITLE_LEN);
    }

    #[test]
    fn sanitize_field_collapses_blank_to_none() {
        assert!(sanitize_author(Some("   ")).is_none());
        assert!(sanitize_author(None).is_none());
    }

    #[test]
    fn sanitize_isbn_strips_punctuation() {
        let isbn = sanitize_isbn(Some("978-0-441-01359-3")).unwrap();
        assert_eq!(isbn, "9780441013593");
    }
}
