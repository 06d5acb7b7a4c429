//! Bookshelf photo scanning: a quality gate, a vision-model call behind
//! [`crate::VisionScanner`], then per-detected-title enrichment. The batch
//! variant repeats this per photo, sequentially, with per-photo status
//! tracked on the job record.

use std::sync::Arc;
use std::time::Duration;

use book_gateway_core::error::GatewayError;
use book_gateway_core::models::{AuthToken, Pipeline, PhotoStatus};
use book_gateway_coordinator::{CoordinatorHandle, CoordinatorRegistry};
use book_gateway_engine::{EnrichQuery, EnrichmentEngine};
use book_gateway_ratelimit::RateLimiter;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{sanitize_author, sanitize_title, DetectedBook, VisionScanRequest, VisionScanner};

const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];
const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Rejects images too small to plausibly contain a bookshelf photo, or
/// that aren't recognizable JPEG/PNG. A real quality check (blur, glare,
/// resolution) would live here too; this is the part that doesn't need a
/// model call.
fn quality_check(image: &[u8]) -> Result<(), &'static str> {
    if image.len() < 1024 {
        return Err("low_image_quality");
    }
    let is_jpeg = image.starts_with(&JPEG_MAGIC);
    let is_png = image.len() >= PNG_MAGIC.len() && image.starts_with(&PNG_MAGIC);
    if !is_jpeg && !is_png {
        return Err("low_image_quality");
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub image: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub job_id: Uuid,
    pub token: AuthToken,
}

#[derive(Debug, Clone)]
pub struct ScanImage {
    pub image: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct BatchScanRequest {
    pub images: Vec<ScanImage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchScanOutcome {
    pub job_id: Uuid,
    pub token: AuthToken,
    pub total_count: usize,
}

pub struct BookshelfScanPipeline {
    engine: Arc<EnrichmentEngine>,
    registry: Arc<CoordinatorRegistry>,
    limiter: Arc<RateLimiter>,
    vision: Arc<dyn VisionScanner>,
    max_image_bytes: usize,
    max_batch_photos: usize,
}

impl BookshelfScanPipeline {
    pub fn new(
        engine: Arc<EnrichmentEngine>,
        registry: Arc<CoordinatorRegistry>,
        limiter: Arc<RateLimiter>,
        vision: Arc<dyn VisionScanner>,
        max_image_bytes: usize,
        max_batch_photos: usize,
    ) -> Self {
        Self {
            engine,
            registry,
            limiter,
            vision,
            max_image_bytes,
            max_batch_photos,
        }
    }

    pub async fn start_single(&self, client_id: &str, request: ScanRequest) -> Result<ScanOutcome, GatewayError> {
        let decision = self.limiter.check_and_increment(client_id);
        if !decision.allowed {
            return Err(GatewayError::RateLimited {
                retry_after_secs: decision.retry_after.map(|d| d.as_secs()).unwrap_or(60),
            });
        }
        if request.image.len() > self.max_image_bytes {
            return Err(GatewayError::Validation(format!(
                "image exceeds max size of {} bytes",
                self.max_image_bytes
            )));
        }

        let handle = self.registry.init(Pipeline::AiScan, 1);
        let token = AuthToken::new(Utc::now());
        handle.set_auth_token(token.clone()).await?;

        let engine = self.engine.clone();
        let vision = self.vision.clone();
        let job_handle = handle.clone();
        tokio::spawn(async move {
            run_single(engine, vision, job_handle, request).await;
        });

        Ok(ScanOutcome {
            job_id: handle.job_id(),
            token,
        })
    }

    pub async fn start_batch(
        &self,
        client_id: &str,
        request: BatchScanRequest,
    ) -> Result<BatchScanOutcome, GatewayError> {
        let decision = self.limiter.check_and_increment(client_id);
        if !decision.allowed {
            return Err(GatewayError::RateLimited {
                retry_after_secs: decision.retry_after.map(|d| d.as_secs()).unwrap_or(60),
            });
        }
        if request.images.is_empty() || request.images.len() > self.max_batch_photos {
            return Err(GatewayError::Validation(format!(
                "images must number between 1 and {}",
                self.max_batch_photos
            )));
        }
        for image in &request.images {
            if image.image.len() > self.max_image_bytes {
                return Err(GatewayError::Validation(format!(
                    "image exceeds max size of {} bytes",
                    self.max_image_bytes
                )));
            }
        }

        let total = request.images.len();
        let handle = self.registry.init(Pipeline::BatchAiScan, total);
        let token = AuthToken::new(Utc::now());
        handle.set_auth_token(token.clone()).await?;

        let engine = self.engine.clone();
        let vision = self.vision.clone();
        let job_handle = handle.clone();
        tokio::spawn(async move {
            run_batch(engine, vision, job_handle, request.images).await;
        });

        Ok(BatchScanOutcome {
            job_id: handle.job_id(),
            token,
            total_count: total,
        })
    }
}

/// Runs the quality-check -> vision-call -> enrichment chain for one
/// photo and returns the books it found, or the failure reason.
async fn scan_one_photo(
    engine: &EnrichmentEngine,
    vision: &dyn VisionScanner,
    image: Vec<u8>,
    content_type: String,
) -> Result<(Vec<serde_json::Value>, Option<String>), &'static str> {
    quality_check(&image)?;

    let response = vision
        .scan(VisionScanRequest { image, content_type })
        .await
        .map_err(|_| "ai_unavailable")?;

    let mut books = Vec::new();
    for DetectedBook { title, author } in response.books {
        let query = EnrichQuery {
            isbn: None,
            title: sanitize_title(Some(&title)),
            author: sanitize_author(author.as_deref()),
        };
        if query.title.is_none() {
            continue;
        }
        match engine.enrich_one(&query).await {
            Ok(Some(work)) => books.push(serde_json::to_value(work).unwrap_or(serde_json::Value::Null)),
            Ok(None) => {}
            Err(err) => tracing::warn!(error = %err, title, "enrichment failed for detected title"),
        }
    }

    Ok((books, response.model_used))
}

async fn run_single(
    engine: Arc<EnrichmentEngine>,
    vision: Arc<dyn VisionScanner>,
    handle: CoordinatorHandle,
    request: ScanRequest,
) {
    if !handle.wait_for_ready(Duration::from_secs(30)).await {
        let _ = handle.fail("client never attached before timeout").await;
        return;
    }

    let _ = handle
        .push_progress(0, json!({ "stage": "quality_check", "percent": 10 }))
        .await;

    match scan_one_photo(&engine, vision.as_ref(), request.image, request.content_type).await {
        Ok((books, model_used)) => {
            let _ = handle
                .push_progress(0, json!({ "stage": "metadata_enrichment", "percent": 70 }))
                .await;
            let model_used = model_used.unwrap_or_else(|| "unknown".to_string());
            let payload = json!({
                "modelUsed": model_used,
                "booksFound": books.len(),
                "books": books,
            });
            let _ = handle
                .push_final_progress(1, json!({ "stage": "metadata_enrichment", "percent": 100 }))
                .await;
            let _ = handle.complete(payload).await;
        }
        Err(reason) => {
            let _ = handle.fail(reason).await;
        }
    }
}

async fn run_batch(
    engine: Arc<EnrichmentEngine>,
    vision: Arc<dyn VisionScanner>,
    handle: CoordinatorHandle,
    images: Vec<ScanImage>,
) {
    if !handle.wait_for_ready(Duration::from_secs(30)).await {
        let _ = handle.fail("client never attached before timeout").await;
        return;
    }

    let total = images.len();
    let mut total_books_found = 0usize;
    let mut photo_results = Vec::with_capacity(total);
    let mut all_books = Vec::new();

    for (index, photo) in images.into_iter().enumerate() {
        if handle.is_canceled().await {
            return;
        }
        let _ = handle.update_photo(index, PhotoStatus::Processing, None, None).await;

        match scan_one_photo(&engine, vision.as_ref(), photo.image, photo.content_type).await {
            Ok((books, _model_used)) => {
                total_books_found += books.len();
                let _ = handle
                    .update_photo(index, PhotoStatus::Complete, Some(books.len()), None)
                    .await;
                photo_results.push(json!({ "index": index, "status": "complete", "booksFound": books.len() }));
                all_books.extend(books);
            }
            Err(reason) => {
                let _ = handle
                    .update_photo(index, PhotoStatus::Error, Some(0), Some(reason.to_string()))
                    .await;
                photo_results.push(json!({ "index": index, "status": "error", "error": reason }));
            }
        }

        let processed = index + 1;
        let payload = json!({ "label": format!("Scanning photo {processed}/{total}") });
        if processed == total {
            let _ = handle.push_final_progress(processed, payload).await;
        } else {
            let _ = handle.push_progress(processed, payload).await;
        }
    }

    let payload = json!({
        "total_books_found": total_books_found,
        "photoResults": photo_results,
        "books": all_books,
    });
    let _ = handle.complete(payload).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_check_rejects_tiny_payload() {
        assert!(quality_check(&[0u8; 10]).is_err());
    }

    #[test]
    fn quality_check_accepts_jpeg_magic_bytes() {
        let mut image = JPEG_MAGIC.to_vec();
        image.extend(std::iter::repeat(0u8).take(2000));
        assert!(quality_check(&image).is_ok());
    }

    #[test]
    fn quality_check_rejects_unrecognized_format() {
        let image = vec![0u8; 2000];
        assert!(quality_check(&image).is_err());
    }
}
