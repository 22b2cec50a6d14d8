use std::time::Duration;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;

use taskdeck::{
    auth::{AuthMiddleware, UsedTokenStore},
    config::Config,
    error::AppError,
    mailer::Mailer,
    routes, sweep,
    weather::WeatherCache,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    let mailer = Mailer::from_config(&config).expect("Failed to configure email backend");
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to build HTTP client");

    sweep::spawn_sweeper(pool.clone(), config.sweep_interval);

    let server_url = config.server_url();
    let bind_addr = (config.server_host.clone(), config.server_port);

    // Shared application state. Data wraps an Arc, cloning it per worker is
    // cheap.
    let pool_data = web::Data::new(pool);
    let config_data = web::Data::new(config);
    let mailer_data = web::Data::new(mailer);
    let client_data = web::Data::new(http_client);
    let cache_data = web::Data::new(WeatherCache::new());
    let used_tokens_data = web::Data::new(UsedTokenStore::default());

    log::info!("starting server at {}", server_url);

    HttpServer::new(move || {
        App::new()
            .app_data(pool_data.clone())
            .app_data(config_data.clone())
            .app_data(mailer_data.clone())
            .app_data(client_data.clone())
            .app_data(cache_data.clone())
            .app_data(used_tokens_data.clone())
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                AppError::Validation(err.to_string()).into()
            }))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                AppError::Validation(err.to_string()).into()
            }))
            .app_data(web::PathConfig::default().error_handler(|_err, _req| {
                AppError::NotFound("Record not found".into()).into()
            }))
            // Middleware registered last runs first, so requests pass through
            // CORS, then the logger, then credential resolution.
            .wrap(AuthMiddleware)
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .configure(routes::config)
    })
    .bind(bind_addr)?
    .run()
    .await
}
