//! `POST /v1/enrichment/batch`: enqueue a batch-enrichment job, returning
//! `202` with the job id, auth token, and total count immediately.

use actix_web::{web, HttpRequest, HttpResponse};
use book_gateway_core::envelope::{EnvelopeMetadata, HttpEnvelope};
use book_gateway_pipelines::BatchEnrichmentRequest;

use crate::error::ApiResult;
use crate::state::AppState;
use crate::util::client_id;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/batch", web::post().to(enqueue_batch));
}

async fn enqueue_batch(
    req: HttpRequest,
    body: web::Json<BatchEnrichmentRequest>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let outcome = state.batch_enrichment.start(&client_id(&req), body.into_inner()).await?;
    Ok(HttpResponse::Accepted().json(HttpEnvelope::success(outcome, EnvelopeMetadata::default())))
}
