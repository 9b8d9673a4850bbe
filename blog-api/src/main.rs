use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;

mod application;
mod data;
mod domain;
mod infrastructure;
mod presentation;
#[cfg(test)]
mod test_utils;

use application::{PostService, UserService};
use data::{Database, PgDatabase};
use infrastructure::{
    config::AppConfig,
    database::{create_pool, run_migrations},
    logging::init_logging,
    obo::OnBehalfOfClient,
    oidc::TokenValidator,
};
use presentation::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    let config = AppConfig::from_env()?;

    init_logging(config.environment);

    tracing::info!(
        "Starting {} in {} environment",
        config.project_name,
        config.environment
    );
    tracing::info!("HTTP server will listen on {}", config.http_addr());
    tracing::debug!("Configuration: {:?}", config);

    // Initialize database connection pool
    tracing::info!("Connecting to database...");
    let pool = create_pool(&config.database).await?;

    tracing::info!("Running database migrations...");
    run_migrations(&pool).await?;

    // Outbound HTTP for the identity provider and Graph
    let http = reqwest::Client::builder()
        .timeout(config.http_client_timeout)
        .connect_timeout(Duration::from_secs(5))
        .build()?;

    tracing::info!("Initializing services...");

    let token_validator = Arc::new(TokenValidator::discover(http.clone(), &config.identity).await?);
    let obo_client = Arc::new(OnBehalfOfClient::new(http, &config.identity));

    let db: Arc<dyn Database> = Arc::new(PgDatabase::new(pool));
    let user_service = Arc::new(UserService::new(
        config.user_delete_policy,
        config.max_page_size,
    ));
    let post_service = Arc::new(PostService::new(config.max_page_size));

    tracing::info!("Services initialized successfully");

    let bind_addr = config.http_addr();
    // Разрешенные CORS домены из конфигурации
    let cors_allowed_origins = config.cors_allowed_origins.clone();

    let state = AppState {
        config: actix_web::web::Data::new(config),
        db,
        user_service,
        post_service,
        token_validator,
        obo_client,
    };

    run_http_server(bind_addr, state, cors_allowed_origins).await?;

    tracing::info!("Shutting down...");
    Ok(())
}

/// Configure CORS for the HTTP server with the configured origins
fn configure_cors(allowed_origins: &[String]) -> actix_cors::Cors {
    use actix_cors::Cors;
    use actix_web::http::header;

    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::ACCEPT,
            header::CONTENT_TYPE,
        ])
        .supports_credentials()
        .max_age(3600);

    // Добавляем каждый разрешенный origin
    for origin in allowed_origins {
        cors = cors.allowed_origin(origin);
    }

    cors
}

async fn run_http_server(
    addr: String,
    state: AppState,
    cors_allowed_origins: Vec<String>,
) -> anyhow::Result<()> {
    use actix_web::{middleware::Logger, App, HttpServer};

    tracing::info!(
        "CORS allowed origins: {}",
        cors_allowed_origins.join(", ")
    );

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(configure_cors(&cors_allowed_origins))
            .configure(routes::configure(state.clone()))
    })
    .bind(&addr)?
    .run();

    tracing::info!("HTTP server listening on {}", addr);

    server.await?;
    Ok(())
}
