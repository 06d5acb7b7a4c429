//! Bookshelf photo scanning: `POST /api/scan-bookshelf` for a single image
//! body, `POST /api/scan-bookshelf/batch` for up to five images as JSON.

use actix_web::{web, HttpRequest, HttpResponse};
use book_gateway_core::envelope::{EnvelopeMetadata, HttpEnvelope};
use book_gateway_core::error::GatewayError;
use book_gateway_pipelines::bookshelf_scan::{BatchScanRequest, ScanImage, ScanRequest};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::util::client_id;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::post().to(scan_single))
        .route("/batch", web::post().to(scan_batch));
}

#[derive(Debug, Deserialize)]
struct ScanSingleQuery {
    #[serde(rename = "jobId")]
    #[allow(dead_code)]
    job_id: Option<uuid::Uuid>,
}

async fn scan_single(
    req: HttpRequest,
    _query: web::Query<ScanSingleQuery>,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let content_type = req
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !content_type.starts_with("image/") {
        return Err(ApiError(GatewayError::Validation(format!(
            "unsupported content-type {content_type}, expected image/*"
        ))));
    }

    let request = ScanRequest {
        image: body.to_vec(),
        content_type,
    };
    let outcome = state.bookshelf_scan.start_single(&client_id(&req), request).await?;
    Ok(HttpResponse::Accepted().json(HttpEnvelope::success(outcome, EnvelopeMetadata::default())))
}

#[derive(Debug, Deserialize)]
struct BatchScanImagePayload {
    #[allow(dead_code)]
    index: usize,
    data: String,
    #[serde(rename = "contentType", default = "default_image_content_type")]
    content_type: String,
}

fn default_image_content_type() -> String {
    "image/jpeg".to_string()
}

#[derive(Debug, Deserialize)]
struct BatchScanPayload {
    images: Vec<BatchScanImagePayload>,
}

async fn scan_batch(
    req: HttpRequest,
    body: web::Json<BatchScanPayload>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let mut images = Vec::with_capacity(body.images.len());
    for item in &body.images {
        let data = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &item.data)
            .map_err(|e| ApiError(GatewayError::Validation(format!("image data is not valid base64: {e}"))))?;
        images.push(ScanImage {
            image: data,
            content_type: item.content_type.clone(),
        });
    }

    let outcome = state
        .bookshelf_scan
        .start_batch(&client_id(&req), BatchScanRequest { images })
        .await?;
    Ok(HttpResponse::Accepted().json(HttpEnvelope::success(outcome, EnvelopeMetadata::default())))
}
