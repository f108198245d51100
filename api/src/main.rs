use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use api::routes::routes;
use api::state::{AppOptions, AppState};
use axum::Router;
use common::Config;
use db::models::connection_status;
use services::gateway::{GatewayClient, GatewayConfig, HttpGatewayClient};
use services::mailer::SmtpMailer;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_appender::rolling;

#[tokio::main]
async fn main() {
    let config = Config::get();
    let _log_guard = init_logging(&config.log_file, &config.log_level);

    let db = db::connect(&config.database_url).await;

    let gateway: Arc<dyn GatewayClient> = Arc::new(HttpGatewayClient::new(GatewayConfig {
        base_url: config.gateway_base_url.clone(),
        token: config.gateway_token.clone(),
        secret: config.gateway_secret.clone(),
        device_id: config.gateway_device_id.clone(),
    }));
    let mailer = Arc::new(
        SmtpMailer::new(
            &config.smtp_host,
            &config.smtp_username,
            &config.smtp_password,
            &config.email_from_name,
        )
        .expect("Failed to build SMTP mailer"),
    );

    let app_state = AppState::new(
        db,
        gateway.clone(),
        mailer,
        AppOptions {
            school_name: config.school_name.clone(),
            default_language: config.default_language.clone(),
            country_code: config.default_country_code.clone(),
            max_send_retries: config.max_send_retries,
            device_id: config.gateway_device_id.clone(),
            webhook_token: config.webhook_token.clone(),
        },
    );

    spawn_retry_sweeper(app_state.clone());
    spawn_device_probe(app_state.clone());
    spawn_log_retention(app_state.clone());

    let cors = CorsLayer::very_permissive();
    let app = Router::new()
        .nest("/api", routes(app_state.clone()))
        .layer(cors)
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid address");

    println!(
        "Starting {} on http://{}:{}",
        config.project_name, config.host, config.port
    );

    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app,
    )
    .await
    .expect("Server crashed");
}

fn init_logging(log_file: &str, log_level: &str) -> tracing_appender::non_blocking::WorkerGuard {
    use std::fs;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    fs::create_dir_all("logs").ok();

    let file_appender = rolling::daily("logs", log_file);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true);

    let stdout_layer = fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with(file_layer)
        .with(stdout_layer)
        .init();

    guard
}

/// Periodically retries failed sends still under the retry limit.
fn spawn_retry_sweeper(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(300));
        ticker.tick().await; // skip the immediate first tick
        loop {
            ticker.tick().await;
            match state.dispatcher().retry_sweep().await {
                Ok(summary) if summary.attempted > 0 => {
                    info!(
                        "Retry sweep: {} attempted, {} recovered, {} still failed",
                        summary.attempted, summary.recovered, summary.still_failed
                    );
                }
                Ok(_) => {}
                Err(e) => warn!("Retry sweep failed: {}", e),
            }
        }
    });
}

/// Daily retention sweep over the notification log.
fn spawn_log_retention(state: AppState) {
    const RETENTION_DAYS: i64 = 90;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
        loop {
            ticker.tick().await;
            let cutoff = chrono::Utc::now() - chrono::Duration::days(RETENTION_DAYS);
            match db::models::notification_log::Model::purge_older_than(state.db(), cutoff).await {
                Ok(0) => {}
                Ok(purged) => info!("Retention sweep removed {} notification log rows", purged),
                Err(e) => warn!("Retention sweep failed: {}", e),
            }
        }
    });
}

/// Periodic gateway health probe feeding the connection_status table.
fn spawn_device_probe(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            match state.gateway().check_device_status().await {
                Ok(device_state) => {
                    if let Err(e) = connection_status::Model::record_state(
                        state.db(),
                        state.device_id(),
                        device_state,
                        None,
                        None,
                    )
                    .await
                    {
                        warn!("Failed to record device state: {}", e);
                    }
                }
                Err(e) => {
                    warn!("Device status probe failed: {}", e);
                    let _ = connection_status::Model::record_state(
                        state.db(),
                        state.device_id(),
                        db::models::connection_status::DeviceState::Error,
                        None,
                        Some(&e.to_string()),
                    )
                    .await;
                }
            }
        }
    });
}
