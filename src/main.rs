use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use dotenvy::dotenv;
use std::sync::Arc;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod routes;
mod service;
mod store;
mod utils;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::routes::RateLimiters;
use crate::service::Services;
use crate::service::clock::SystemClock;
use crate::store::mysql::MySqlAttendanceStore;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Clinic attendance service"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(
        utc_offset_minutes = config.clinic_utc_offset_minutes,
        require_location = config.require_location,
        "Server starting..."
    );

    let pool = init_db(&config).await?;

    let store = Arc::new(MySqlAttendanceStore::new(pool));
    let clock = Arc::new(SystemClock::with_offset_minutes(config.clinic_utc_offset_minutes));
    let services = Services::new(store, clock, &config);
    let limiters = RateLimiters::from_config(&config)?;

    let server_addr = config.server_addr.clone();
    let config_data = Data::new(config);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard also serves the UI assets
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(config_data.clone())
            .configure(|cfg| services.register(cfg))
            .service(index)
            // Protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, &config_data.api_prefix, limiters.clone()))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
