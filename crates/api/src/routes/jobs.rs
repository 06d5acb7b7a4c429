//! Job lifecycle endpoints that don't go through a pipeline: token refresh
//! and the reconnect snapshot.

use actix_web::{web, HttpResponse};
use book_gateway_core::envelope::{EnvelopeMetadata, HttpEnvelope};
use book_gateway_core::error::GatewayError;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/token/refresh", web::post().to(refresh_token))
        .route("/job-state/{job_id}", web::get().to(job_state));
}

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    #[serde(rename = "jobId")]
    job_id: Uuid,
    token: Uuid,
}

async fn refresh_token(body: web::Json<RefreshRequest>, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let handle = state.registry.get(body.job_id).ok_or(ApiError(GatewayError::NotFound))?;
    let refreshed = handle.refresh_auth_token(body.token).await?;
    Ok(HttpResponse::Ok().json(HttpEnvelope::success(refreshed, EnvelopeMetadata::default())))
}

async fn job_state(path: web::Path<Uuid>, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let job_id = path.into_inner();
    let snapshot = state.registry.snapshot_or_reload(job_id).await?;
    Ok(HttpResponse::Ok().json(HttpEnvelope::success(snapshot, EnvelopeMetadata::default())))
}
