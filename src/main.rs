use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use travel_match::config::{LoggingSettings, Settings, StorageBackend};
use travel_match::core::{CompatibilityScorer, MatchingEngine, MatchingOptions};
use travel_match::models::ScoringWeights;
use travel_match::routes::{self, AppState, JwtVerifier};
use travel_match::services::{
    CacheManager, CachedUserDirectory, HttpNotificationSink, InMemoryStore, LogNotificationSink,
    MatchRequestStore, NotificationSink, PgStore, PlanStore, UserServiceClient,
};

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "VALIDATION_ERROR".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "VALIDATION_ERROR".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle malformed path segments such as non-UUID ids
pub fn handle_path_error(err: error::PathError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "VALIDATION_ERROR".to_string(),
        message: format!("Invalid path: {}", err),
        status_code: 400,
    }
    .into()
}

fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if logging.format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn io_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return Err(io_error("Configuration error", e));
        }
    };

    init_tracing(&settings.logging);

    info!("Starting TravelMate matching service...");

    // Plan and request storage
    let (plans, requests, database): (
        Arc<dyn PlanStore>,
        Arc<dyn MatchRequestStore>,
        Option<Arc<PgStore>>,
    ) = match settings.storage.backend {
        StorageBackend::Postgres => {
            let db_max_conn = settings.database.max_connections.unwrap_or(10);
            let store = PgStore::from_settings(
                &settings.database.url,
                Some(db_max_conn),
                settings.database.min_connections,
                settings.database.acquire_timeout_secs,
                settings.database.idle_timeout_secs,
            )
            .await
            .map_err(|e| {
                error!("Failed to connect to PostgreSQL: {}", e);
                io_error("PostgreSQL connection error", e)
            })?;
            info!("PostgreSQL store initialized (max: {} connections)", db_max_conn);

            let store = Arc::new(store);
            (
                store.clone() as Arc<dyn PlanStore>,
                store.clone() as Arc<dyn MatchRequestStore>,
                Some(store),
            )
        }
        StorageBackend::Memory => {
            info!("Using in-memory store; data is lost on restart");
            let store = Arc::new(InMemoryStore::new());
            (
                store.clone() as Arc<dyn PlanStore>,
                store as Arc<dyn MatchRequestStore>,
                None,
            )
        }
    };

    // User directory with a moka L1 and optional redis L2 in front
    let cache_ttl = settings.cache.ttl_secs.unwrap_or(300);
    let l1_cache_size = settings.cache.l1_cache_size.unwrap_or(1000);

    let cache = match &settings.cache.redis_url {
        Some(url) => match CacheManager::new(url, l1_cache_size, cache_ttl).await {
            Ok(c) => {
                info!("Cache manager initialized (L1: {} entries, TTL: {}s, redis)", l1_cache_size, cache_ttl);
                c
            }
            Err(e) => {
                error!("Failed to connect to Redis ({}), using in-process cache only", e);
                CacheManager::l1_only(l1_cache_size, cache_ttl)
            }
        },
        None => CacheManager::l1_only(l1_cache_size, cache_ttl),
    };

    let user_client = UserServiceClient::new(
        settings.user_service.base_url.clone(),
        settings.user_service.api_key.clone(),
        Duration::from_secs(settings.user_service.timeout_secs),
    )
    .map_err(|e| io_error("User service client error", e))?;
    let users = Arc::new(CachedUserDirectory::new(user_client, cache));

    let notifier: Arc<dyn NotificationSink> = if settings.notifications.enabled {
        Arc::new(
            HttpNotificationSink::new(
                settings.notifications.base_url.clone(),
                settings.notifications.api_key.clone(),
                Duration::from_secs(settings.notifications.timeout_secs),
            )
            .map_err(|e| io_error("Notification client error", e))?,
        )
    } else {
        info!("Notification delivery disabled, alerts are logged only");
        Arc::new(LogNotificationSink)
    };

    // Engine with configured weights and thresholds
    let weights = ScoringWeights::from(&settings.scoring.weights);
    let options = MatchingOptions::from(&settings.matching);

    let engine = MatchingEngine::new(plans, requests, users, notifier)
        .with_scorer(CompatibilityScorer::new(weights))
        .with_options(options);

    info!("Matching engine initialized with weights: {:?}, options: {:?}", weights, options);

    let app_state = AppState {
        engine: Arc::new(engine),
        jwt: Arc::new(JwtVerifier::new(
            &settings.auth.jwt_secret,
            settings.auth.issuer.clone(),
        )),
        database,
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .app_data(web::PathConfig::default().error_handler(handle_path_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
