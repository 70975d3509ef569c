//! MeterBill server
//!
//! Serves the customer, meter, reading and bill API over HTTP, backed by
//! PostgreSQL or, for local development, by process memory.

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpServer};
use meterbill_api::{configure_routes, json_config, path_config};
use meterbill_core::config::LoggingConfig;
use meterbill_core::{AppConfig, AppError};
use meterbill_db::{create_pool, run_migrations, EntityStore};
use std::io;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
fn init_tracing(logging: &LoggingConfig) {
    let level = &logging.level;
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "meterbill={},meterbill_api={},meterbill_db={},meterbill_core={},actix_web=info,sqlx=warn",
            level, level, level, level
        ))
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    if logging.json {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init();
    }
}

/// Build the entity store the configuration asks for
async fn build_store(config: &AppConfig) -> Result<EntityStore, AppError> {
    if config.database.in_memory {
        warn!("Using in-memory storage; records are lost on shutdown");
        return Ok(EntityStore::in_memory());
    }

    info!("Connecting to database...");
    let pool = create_pool(&config.database).await?;

    if config.database.run_migrations {
        run_migrations(&pool).await?;
    }

    Ok(EntityStore::postgres(pool))
}

fn startup_error(err: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().map_err(|e| {
        eprintln!("Invalid configuration: {}", e);
        startup_error(e)
    })?;

    init_tracing(&config.logging);

    info!("Starting MeterBill v{}", env!("CARGO_PKG_VERSION"));

    let store = build_store(&config).await.map_err(|e| {
        error!("Startup failed: {}", e);
        startup_error(e)
    })?;

    let bind_addr = config.server_addr();
    let workers = config.server.workers;
    let json_limit = config.server.json_limit_bytes;
    let cors_config = config.cors.clone();

    info!(
        "Starting HTTP server on {} with {} workers",
        bind_addr, workers
    );

    HttpServer::new(move || {
        let cors = cors_config
            .allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .max_age(cors_config.max_age_secs);

        App::new()
            .app_data(web::Data::new(store.clone()))
            .app_data(json_config(json_limit))
            .app_data(path_config())
            // Middleware
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::NormalizePath::trim())
            // Configure routes
            .configure(configure_routes)
    })
    .workers(workers)
    .bind(&bind_addr)?
    .run()
    .await
}
