//! Synchronous search endpoints: title, ISBN, and combined title+author
//! lookups against the enrichment engine's cache-first provider chain.

use actix_web::{web, HttpRequest, HttpResponse};
use book_gateway_core::envelope::{EnvelopeMetadata, HttpEnvelope};
use book_gateway_core::error::GatewayError;
use book_gateway_core::isbn;
use book_gateway_engine::EnrichQuery;
use serde::Deserialize;
use std::time::Instant;

use crate::error::{ApiError, ApiResult};
use crate::util::client_id;
use crate::state::AppState;

const DEFAULT_MAX_RESULTS: usize = 10;
const MAX_RESULTS_CAP: usize = 50;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/title", web::get().to(search_by_title))
        .route("/isbn", web::get().to(search_by_isbn))
        .route("/advanced", web::get().to(search_advanced));
}

#[derive(Debug, Deserialize)]
struct TitleQuery {
    q: String,
    #[serde(rename = "maxResults")]
    max_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct IsbnQuery {
    isbn: String,
}

#[derive(Debug, Deserialize)]
struct AdvancedQuery {
    title: Option<String>,
    author: Option<String>,
}

fn check_rate_limit(state: &AppState, req: &HttpRequest) -> Result<(), GatewayError> {
    let decision = state.limiter.check_and_increment(&client_id(req));
    if decision.allowed {
        Ok(())
    } else {
        Err(GatewayError::RateLimited {
            retry_after_secs: decision.retry_after.map(|d| d.as_secs()).unwrap_or(60),
        })
    }
}

async fn search_by_title(
    req: HttpRequest,
    query: web::Query<TitleQuery>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    check_rate_limit(&state, &req)?;
    let title = query.q.trim();
    if title.is_empty() {
        return Err(ApiError(GatewayError::Validation("q must not be empty".to_string())));
    }
    let max = query.max_results.unwrap_or(DEFAULT_MAX_RESULTS).clamp(1, MAX_RESULTS_CAP);

    let started = Instant::now();
    let result = state.engine.enrich_many(&EnrichQuery::by_title(title), max).await?;
    Ok(ok_response(serde_json::json!({ "works": result.works }), started))
}

async fn search_by_isbn(
    req: HttpRequest,
    query: web::Query<IsbnQuery>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    check_rate_limit(&state, &req)?;
    if !isbn::is_valid(&query.isbn) {
        return Err(ApiError(GatewayError::Validation("isbn failed checksum validation".to_string())));
    }

    let started = Instant::now();
    match state.engine.enrich_one(&EnrichQuery::by_isbn(query.isbn.clone())).await? {
        Some(work) => Ok(ok_response(serde_json::to_value(work).unwrap_or_default(), started)),
        None => Err(ApiError(GatewayError::NotFound)),
    }
}

async fn search_advanced(
    req: HttpRequest,
    query: web::Query<AdvancedQuery>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    check_rate_limit(&state, &req)?;
    if query.title.is_none() && query.author.is_none() {
        return Err(ApiError(GatewayError::Validation(
            "advanced search requires title and/or author".to_string(),
        )));
    }

    let enrich_query = EnrichQuery {
        isbn: None,
        title: query.title.clone(),
        author: query.author.clone(),
    };
    let started = Instant::now();
    let result = state.engine.enrich_many(&enrich_query, DEFAULT_MAX_RESULTS).await?;
    Ok(ok_response(serde_json::json!({ "works": result.works }), started))
}

fn ok_response(data: serde_json::Value, started: Instant) -> HttpResponse {
    let metadata = EnvelopeMetadata {
        processing_time_ms: Some(started.elapsed().as_millis() as u64),
        ..Default::default()
    };
    HttpResponse::Ok().json(HttpEnvelope::success(data, metadata))
}
