pub mod csv_import;
pub mod enrichment;
pub mod health;
pub mod jobs;
pub mod scan;
pub mod search;
pub mod ws;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/v1/search").configure(search::configure))
        .service(web::scope("/v1/enrichment").configure(enrichment::configure))
        .service(web::scope("/api/scan-bookshelf").configure(scan::configure))
        .service(web::scope("/api/import").configure(csv_import::configure))
        .service(web::scope("/api").configure(jobs::configure))
        .service(web::scope("/ws").configure(ws::configure));
}
