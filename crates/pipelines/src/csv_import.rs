//! CSV import: parse rows, extract a title/author/isbn per row through a
//! pluggable [`RowExtractor`] (a heuristic header-matcher by default; an
//! AI-assisted extractor for messy exports is a second implementation of
//! the same trait, not something this crate calls out to directly), then
//! enrich each extracted row.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use book_gateway_core::error::GatewayError;
use book_gateway_core::models::{AuthToken, Pipeline};
use book_gateway_coordinator::{CoordinatorHandle, CoordinatorRegistry};
use book_gateway_engine::{EnrichQuery, EnrichmentEngine};
use book_gateway_ratelimit::RateLimiter;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::{sanitize_author, sanitize_isbn, sanitize_title, ExtractedRecord};

#[async_trait]
pub trait RowExtractor: Send + Sync {
    async fn extract(&self, headers: &[String], row: &[String]) -> Result<ExtractedRecord, GatewayError>;
}

/// Matches columns by header name (case-insensitive, a handful of common
/// aliases); used when the CSV already carries recognizable columns and
/// no AI-assisted extraction is configured.
pub struct HeuristicRowExtractor;

fn find_column<'a>(headers: &[String], row: &'a [String], aliases: &[&str]) -> Option<&'a str> {
    headers
        .iter()
        .position(|h| aliases.contains(&h.to_lowercase().trim()))
        .and_then(|i| row.get(i))
        .map(|s| s.as_str())
        .filter(|s| !s.trim().is_empty())
}

#[async_trait]
impl RowExtractor for HeuristicRowExtractor {
    async fn extract(&self, headers: &[String], row: &[String]) -> Result<ExtractedRecord, GatewayError> {
        Ok(ExtractedRecord {
            title: find_column(headers, row, &["title", "book title", "name"]).map(String::from),
            author: find_column(headers, row, &["author", "author name", "by"]).map(String::from),
            isbn: find_column(headers, row, &["isbn", "isbn13", "isbn-13", "isbn10"]).map(String::from),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CsvImportRequest {
    pub csv_bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CsvImportOutcome {
    pub job_id: Uuid,
    pub token: AuthToken,
}

pub struct CsvImportPipeline {
    engine: Arc<EnrichmentEngine>,
    registry: Arc<CoordinatorRegistry>,
    limiter: Arc<RateLimiter>,
    extractor: Arc<dyn RowExtractor>,
    max_csv_bytes: usize,
    concurrency: usize,
}

impl CsvImportPipeline {
    pub fn new(
        engine: Arc<EnrichmentEngine>,
        registry: Arc<CoordinatorRegistry>,
        limiter: Arc<RateLimiter>,
        extractor: Arc<dyn RowExtractor>,
        max_csv_bytes: usize,
        concurrency: usize,
    ) -> Self {
        Self {
            engine,
            registry,
            limiter,
            extractor,
            max_csv_bytes,
            concurrency,
        }
    }

    pub async fn start(&self, client_id: &str, request: CsvImportRequest) -> Result<CsvImportOutcome, GatewayError> {
        let decision = self.limiter.check_and_increment(client_id);
        if !decision.allowed {
            return Err(GatewayError::RateLimited {
                retry_after_secs: decision.retry_after.map(|d| d.as_secs()).unwrap_or(60),
            });
        }
        if request.csv_bytes.len() > self.max_csv_bytes {
            return Err(GatewayError::Validation(format!(
                "csv exceeds max size of {} bytes",
                self.max_csv_bytes
            )));
        }

        // Total row count isn't known until the header/body is parsed in
        // the background task; the job starts at 0 and `push_progress`
        // updates `processed` as rows are counted.
        let handle = self.registry.init(Pipeline::CsvImport, 0);
        let token = AuthToken::new(Utc::now());
        handle.set_auth_token(token.clone()).await?;

        let engine = self.engine.clone();
        let extractor = self.extractor.clone();
        let concurrency = self.concurrency;
        let job_handle = handle.clone();
        tokio::spawn(async move {
            run(engine, extractor, job_handle, request.csv_bytes, concurrency).await;
        });

        Ok(CsvImportOutcome {
            job_id: handle.job_id(),
            token,
        })
    }
}

async fn run(
    engine: Arc<EnrichmentEngine>,
    extractor: Arc<dyn RowExtractor>,
    handle: CoordinatorHandle,
    csv_bytes: Vec<u8>,
    concurrency: usize,
) {
    if !handle.wait_for_ready(Duration::from_secs(30)).await {
        let _ = handle.fail("client never attached before timeout").await;
        return;
    }

    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(csv_bytes.as_slice());
    let headers: Vec<String> = match reader.headers() {
        Ok(h) => h.iter().map(String::from).collect(),
        Err(err) => {
            let _ = handle.fail(format!("unreadable csv header: {err}")).await;
            return;
        }
    };

    let rows: Vec<Vec<String>> = match reader.records().collect::<Result<Vec<_>, _>>() {
        Ok(records) => records.into_iter().map(|r| r.iter().map(String::from).collect()).collect(),
        Err(err) => {
            let _ = handle.fail(format!("malformed csv body: {err}")).await;
            return;
        }
    };

    let total = rows.len();
    let mut valid_records = Vec::new();
    let mut invalid_rows = 0usize;
    let mut errors = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        if handle.is_canceled().await {
            return;
        }
        let _ = handle
            .push_progress(index, json!({ "label": format!("Parsing row {}/{}", index + 1, total) }))
            .await;

        match extractor.extract(&headers, row).await {
            Ok(record) if !record.is_empty() => valid_records.push(ExtractedRecord {
                title: sanitize_title(record.title.as_deref()),
                author: sanitize_author(record.author.as_deref()),
                isbn: sanitize_isbn(record.isbn.as_deref()),
            }),
            Ok(_) => {
                invalid_rows += 1;
                errors.push(json!({ "row": index + 1, "reason": "no recognizable title/author/isbn" }));
            }
            Err(err) => {
                invalid_rows += 1;
                errors.push(json!({ "row": index + 1, "reason": err.to_string() }));
            }
        }
    }

    let items: Vec<book_gateway_engine::batch::BatchItem<ExtractedRecord>> = valid_records
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            let label = format!(
                "Enriching {}/{}",
                i + 1,
                total.saturating_sub(invalid_rows).max(1)
            );
            book_gateway_engine::batch::BatchItem::new(label, record)
        })
        .collect();
    let valid_rows = items.len();

    let progress_handle = handle.clone();
    let cancel_handle = handle.clone();
    let results = book_gateway_engine::batch::run_batch(
        items,
        concurrency,
        move |record: ExtractedRecord| {
            let engine = engine.clone();
            let cancel_handle = cancel_handle.clone();
            async move {
                if cancel_handle.is_canceled().await {
                    return Err(GatewayError::Cancellation("job canceled".to_string()));
                }
                let query = EnrichQuery {
                    isbn: record.isbn,
                    title: record.title,
                    author: record.author,
                };
                engine.enrich_one(&query).await
            }
        },
        move |completed, total, label, had_error| {
            tracing::debug!(completed, total, label, had_error, "csv import enrichment progress");
            let handle = progress_handle.clone();
            let payload = json!({ "label": label, "completed": completed, "total": total });
            tokio::spawn(async move {
                let _ = handle.push_progress(completed, payload).await;
            });
        },
    )
    .await;

    let enriched: Vec<serde_json::Value> = results
        .into_iter()
        .filter_map(|r| match r {
            Ok(Some(work)) => serde_json::to_value(work).ok(),
            _ => None,
        })
        .collect();

    if handle.is_canceled().await {
        return;
    }

    let payload = json!({
        "validRows": valid_rows,
        "invalidRows": invalid_rows,
        "errors": errors,
        "enriched": enriched,
    });
    let _ = handle.push_final_progress(total, payload.clone()).await;
    let _ = handle.complete(payload).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn heuristic_extractor_matches_known_headers() {
        let extractor = HeuristicRowExtractor;
        let headers = vec!["Title".to_string(), "Author".to_string(), "ISBN".to_string()];
        let row = vec!["Dune".to_string(), "Frank Herbert".to_string(), "9780441013593".to_string()];
        let record = extractor.extract(&headers, &row).await.unwrap();
        assert_eq!(record.title.as_deref(), Some("Dune"));
        assert_eq!(record.author.as_deref(), Some("Frank Herbert"));
    }

    #[tokio::test]
    async fn heuristic_extractor_returns_empty_record_for_unknown_headers() {
        let extractor = HeuristicRowExtractor;
        let headers = vec!["col1".to_string(), "col2".to_string()];
        let row = vec!["x".to_string(), "y".to_string()];
        let record = extractor.extract(&headers, &row).await.unwrap();
        assert!(record.is_empty());
    }
}
