#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for LA neighborhood crime aggregations.
//!
//! A thin HTTP layer over [`AggregationService`]: every read goes through
//! its cache, and `POST /api/aggregation/refresh` forces a rebuild.

mod handlers;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use la_crime_cache::service::AggregationService;
use la_crime_cache::settings::Settings;

/// Shared application state.
pub struct AppState {
    /// The process-wide query service.
    pub service: AggregationService,
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/categories", web::get().to(handlers::categories))
            .route("/aggregation", web::get().to(handlers::aggregation))
            .route("/aggregation/refresh", web::post().to(handlers::refresh)),
    );
}

/// Starts the API server.
///
/// Loads neighborhood boundaries and builds the upstream client from
/// `settings`, then serves on `BIND_ADDR`:`PORT` (default
/// `127.0.0.1:8080`). The caller provides the async runtime (e.g. via
/// `#[actix_web::main]`) and initializes logging.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the service cannot be assembled,
/// or the HTTP server fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server(settings: Settings) -> std::io::Result<()> {
    log::info!("Loading neighborhoods from {}", settings.neighborhoods.path.display());
    let service = AggregationService::from_settings(&settings)
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    let state = web::Data::new(AppState { service });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
