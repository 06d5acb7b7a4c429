//! `GET /health`: liveness plus a listing of the served endpoints, so an
//! operator hitting the gateway cold can see its surface without a spec
//! in hand.

use actix_web::HttpResponse;

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "alive",
        "service": "book-gateway-api",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "GET /v1/search/title",
            "GET /v1/search/isbn",
            "GET /v1/search/advanced",
            "POST /v1/enrichment/batch",
            "POST /api/scan-bookshelf",
            "POST /api/scan-bookshelf/batch",
            "POST /api/import/csv-gemini",
            "POST /api/token/refresh",
            "GET /api/job-state/{jobId}",
            "GET /ws/progress",
            "GET /health",
        ],
    }))
}
