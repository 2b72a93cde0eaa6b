mod config;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod services;
mod utils;

#[cfg(test)]
mod test_utils;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{
    http::header,
    middleware::{Compress, Logger, NormalizePath},
    web, App, HttpResponse, HttpServer,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::routes::create_routes;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    dotenvy::dotenv().ok();

    let log_level = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info".to_string())
        .parse()
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting recipe book backend");

    let config = Config::from_env()?;
    info!("Configuration loaded from environment");

    let db = Database::new(&config.database_url, config.db_max_connections).await?;
    info!("Database connected");

    db.run_migrations().await?;

    std::fs::create_dir_all(&config.media_root)?;
    info!("Serving media from {} at {}", config.media_root, config.media_url);

    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));
    let config = Arc::new(config);
    let state = web::Data::new(AppState {
        db,
        config: config.clone(),
    });

    info!("Server running at http://{}", addr);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(build_cors(&config.cors_allow_origin))
            .wrap(Compress::default())
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .configure(configure_app)
            .service(Files::new(&config.media_url, &config.media_root))
    })
    .bind(addr)?
    .run()
    .await?;

    Ok(())
}

// "*" still has to echo the origin, otherwise browsers drop the session cookie
fn build_cors(allow_origin: &str) -> Cors {
    let cors = if allow_origin == "*" {
        Cors::default().allowed_origin_fn(|_origin, _req_head| true)
    } else {
        allow_origin
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };

    cors.allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::COOKIE,
        ])
        .expose_headers(vec![header::SET_COOKIE, header::CONTENT_DISPOSITION])
        .supports_credentials()
        .max_age(3600)
}

/// Everything except the middleware stack and static media, shared with the
/// route tests.
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .route("/health", web::get().to(health_check))
    .route("/health/db", web::get().to(health_check_db))
    .service(web::scope("/api").configure(create_routes));
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": true }))
}

async fn health_check_db(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    state.db.ping().await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": true })))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{init_app, send_request, test_state};
    use actix_web::{http::StatusCode, test};
    use serde_json::Value;

    #[actix_web::test]
    async fn test_health() {
        let state = test_state().await;
        let app = init_app!(state).await;

        for uri in ["/health", "/health/db"] {
            let (status, body) = send_request!(app, test::TestRequest::get().uri(uri));
            assert_eq!(status, StatusCode::OK);
            let body: Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(body["status"], true);
        }
    }

    #[actix_web::test]
    async fn test_malformed_json_gets_a_detail() {
        let state = test_state().await;
        let app = init_app!(state).await;

        let (status, body) = send_request!(
            app,
            test::TestRequest::post()
                .uri("/api/users/")
                .insert_header(("content-type", "application/json"))
                .set_payload("{not json")
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert!(body["detail"].is_string());
    }
}
