//! `POST /api/import/csv-gemini`: upload a CSV of book rows, enqueue an
//! import job, return `202` immediately.

use actix_web::{web, HttpRequest, HttpResponse};
use book_gateway_core::envelope::{EnvelopeMetadata, HttpEnvelope};
use book_gateway_pipelines::csv_import::CsvImportRequest;

use crate::error::ApiResult;
use crate::state::AppState;
use crate::util::client_id;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/csv-gemini", web::post().to(import_csv));
}

async fn import_csv(req: HttpRequest, body: web::Bytes, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let outcome = state
        .csv_import
        .start(&client_id(&req), CsvImportRequest { csv_bytes: body.to_vec() })
        .await?;
    Ok(HttpResponse::Accepted().json(HttpEnvelope::success(outcome, EnvelopeMetadata::default())))
}
