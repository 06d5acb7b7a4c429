//! Shared application state handed to every route handler behind
//! `web::Data`.

use std::sync::Arc;

use book_gateway_coordinator::CoordinatorRegistry;
use book_gateway_core::config::GatewayConfig;
use book_gateway_engine::EnrichmentEngine;
use book_gateway_pipelines::{BatchEnrichmentPipeline, BookshelfScanPipeline, CsvImportPipeline};
use book_gateway_ratelimit::RateLimiter;

pub struct AppState {
    pub config: GatewayConfig,
    pub engine: Arc<EnrichmentEngine>,
    pub registry: Arc<CoordinatorRegistry>,
    pub limiter: Arc<RateLimiter>,
    pub batch_enrichment: Arc<BatchEnrichmentPipeline>,
    pub bookshelf_scan: Arc<BookshelfScanPipeline>,
    pub csv_import: Arc<CsvImportPipeline>,
}
