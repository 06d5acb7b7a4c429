use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use book_gateway_api::middleware::SecurityHeaders;
use book_gateway_api::state::AppState;
use book_gateway_api::{routes, UnavailableVisionScanner};
use book_gateway_cache::durable::{DurableStore, InMemoryDurableStore, RedisStore};
use book_gateway_cache::UnifiedCache;
use book_gateway_coordinator::job_store::{InMemoryJobStore, JobStore, RedisJobStore};
use book_gateway_coordinator::CoordinatorRegistry;
use book_gateway_core::config::GatewayConfig;
use book_gateway_core::http::build_shared_client;
use book_gateway_core::secrets::SecretSource;
use book_gateway_engine::EnrichmentEngine;
use book_gateway_pipelines::csv_import::HeuristicRowExtractor;
use book_gateway_pipelines::{BatchEnrichmentPipeline, BookshelfScanPipeline, CsvImportPipeline};
use book_gateway_providers::circuit_breaker::CircuitBreakerManager;
use book_gateway_providers::clients::{GoogleBooksClient, IsbndbClient, OpenLibraryClient};
use book_gateway_queue::consumer::CacheWarmingConsumer;
use book_gateway_queue::kafka::KafkaQueueSource;
use book_gateway_queue::memory::InMemoryQueueSource;
use book_gateway_queue::QueueSource;
use book_gateway_ratelimit::RateLimiter;
use tokio::signal;
use tracing::{info, warn};

const CIRCUIT_BREAKER_FAILURE_THRESHOLD: u32 = 5;
const CIRCUIT_BREAKER_TIMEOUT: Duration = Duration::from_secs(30);
const CACHE_EDGE_MAX_CAPACITY: u64 = 50_000;
const CACHE_EDGE_TTL: Duration = Duration::from_secs(300);
const QUEUE_CONSUMER_IDLE_BACKOFF: Duration = Duration::from_secs(2);

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .json()
        .init();

    let config = GatewayConfig::load().expect("configuration failed to load");

    let http_client = build_shared_client();
    let breaker = Arc::new(CircuitBreakerManager::new(
        CIRCUIT_BREAKER_FAILURE_THRESHOLD,
        CIRCUIT_BREAKER_TIMEOUT,
    ));
    let provider_timeout = config.provider.timeout();

    let google_books_key = SecretSource::raw(std::env::var("GOOGLE_BOOKS_API_KEY").unwrap_or_default());
    let isbndb_key = SecretSource::raw(std::env::var("ISBNDB_API_KEY").unwrap_or_default());

    let google_books = Arc::new(GoogleBooksClient::new(
        Arc::clone(&http_client),
        std::env::var("GOOGLE_BOOKS_BASE_URL")
            .unwrap_or_else(|_| "https://www.googleapis.com/books/v1".to_string()),
        google_books_key,
        provider_timeout,
        Arc::clone(&breaker),
    ));
    let open_library = Arc::new(OpenLibraryClient::new(
        Arc::clone(&http_client),
        std::env::var("OPEN_LIBRARY_BASE_URL").unwrap_or_else(|_| "https://openlibrary.org".to_string()),
        provider_timeout,
        Arc::clone(&breaker),
    ));
    let isbndb = Arc::new(IsbndbClient::new(
        Arc::clone(&http_client),
        std::env::var("ISBNDB_BASE_URL").unwrap_or_else(|_| "https://api2.isbndb.com".to_string()),
        isbndb_key,
        provider_timeout,
        Arc::clone(&breaker),
    ));

    let durable_store: Arc<dyn DurableStore> = match std::env::var("REDIS_URL") {
        Ok(url) => match RedisStore::connect(&url).await {
            Ok(store) => Arc::new(store),
            Err(err) => {
                warn!(%err, "redis cache unreachable, falling back to in-memory cache");
                Arc::new(InMemoryDurableStore::new())
            }
        },
        Err(_) => {
            warn!("REDIS_URL not set, using in-memory cache");
            Arc::new(InMemoryDurableStore::new())
        }
    };
    let cache = Arc::new(UnifiedCache::new(durable_store, CACHE_EDGE_MAX_CAPACITY, CACHE_EDGE_TTL));

    let engine = Arc::new(EnrichmentEngine::new(
        google_books,
        open_library,
        isbndb,
        Arc::clone(&cache),
        config.ttl.clone(),
    ));

    let job_store: Arc<dyn JobStore> = match std::env::var("REDIS_URL") {
        Ok(url) => match RedisJobStore::connect(&url).await {
            Ok(store) => Arc::new(store),
            Err(err) => {
                warn!(%err, "redis job store unreachable, falling back to in-memory job store");
                Arc::new(InMemoryJobStore::new())
            }
        },
        Err(_) => Arc::new(InMemoryJobStore::new()),
    };
    let registry = Arc::new(CoordinatorRegistry::new(job_store));

    let limiter = Arc::new(RateLimiter::with_limits(
        Duration::from_secs(config.rate_limit.window_seconds),
        config.rate_limit.max_requests,
    ));

    let batch_enrichment = Arc::new(BatchEnrichmentPipeline::new(
        Arc::clone(&engine),
        Arc::clone(&registry),
        Arc::clone(&limiter),
        config.batch.max_batch_books,
        config.batch.concurrency,
    ));
    let bookshelf_scan = Arc::new(BookshelfScanPipeline::new(
        Arc::clone(&engine),
        Arc::clone(&registry),
        Arc::clone(&limiter),
        Arc::new(UnavailableVisionScanner),
        config.batch.max_image_bytes,
        config.batch.max_batch_photos,
    ));
    let csv_import = Arc::new(CsvImportPipeline::new(
        Arc::clone(&engine),
        Arc::clone(&registry),
        Arc::clone(&limiter),
        Arc::new(HeuristicRowExtractor),
        config.batch.max_csv_bytes,
        config.batch.concurrency,
    ));

    spawn_cache_warming_consumer(Arc::clone(&engine), Arc::clone(&cache));

    let state = web::Data::new(AppState {
        config: config.clone(),
        engine,
        registry,
        limiter,
        batch_enrichment,
        bookshelf_scan,
        csv_import,
    });

    info!(host = %config.server.host, port = config.server.port, "starting book gateway");

    let bind_addr = (config.server.host.clone(), config.server.port);
    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(SecurityHeaders)
            .wrap(tracing_actix_web::TracingLogger::default())
            .wrap(Cors::permissive())
            .route("/health", web::get().to(routes::health::health_check))
            .configure(routes::configure)
    })
    .bind(bind_addr)?
    .shutdown_timeout(30);

    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }

    let server = server.run();
    let server_handle = server.handle();

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, draining in-flight requests");
        server_handle.stop(true).await;
    });

    server.await
}

fn spawn_cache_warming_consumer(engine: Arc<EnrichmentEngine>, cache: Arc<UnifiedCache>) {
    let source: Arc<dyn QueueSource> = match std::env::var("KAFKA_BROKERS") {
        Ok(brokers) => {
            let group_id = std::env::var("KAFKA_GROUP_ID").unwrap_or_else(|_| "book-gateway-cache-warmer".to_string());
            let topic = std::env::var("KAFKA_CACHE_WARM_TOPIC").unwrap_or_else(|_| "book-gateway.cache-warm".to_string());
            let dead_letter_topic = std::env::var("KAFKA_DEAD_LETTER_TOPIC")
                .unwrap_or_else(|_| "book-gateway.cache-warm.dead-letter".to_string());
            match KafkaQueueSource::new(&brokers, &group_id, &topic, dead_letter_topic) {
                Ok(source) => Arc::new(source),
                Err(err) => {
                    warn!(%err, "kafka cache-warming source unavailable, falling back to in-memory queue");
                    Arc::new(InMemoryQueueSource::new())
                }
            }
        }
        Err(_) => Arc::new(InMemoryQueueSource::new()),
    };

    let consumer = CacheWarmingConsumer::new(source, engine, cache);
    tokio::spawn(async move {
        loop {
            match consumer.run_once().await {
                Ok(0) => tokio::time::sleep(QUEUE_CONSUMER_IDLE_BACKOFF).await,
                Ok(_) => {}
                Err(err) => {
                    warn!(%err, "cache-warming consumer iteration failed");
                    tokio::time::sleep(QUEUE_CONSUMER_IDLE_BACKOFF).await;
                }
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl+c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
