use api::routes::routes;
use api::{auth::middleware::log_request, ws::ws_routes};
use axum::{Router, http::header::CONTENT_TYPE, middleware::from_fn};
use chrono::Utc;
use migration::Migrator;
use sea_orm_migration::MigratorTrait;
use services::qr_session::QrSessionService;
use services::settings::AttendanceSettings;
use std::{net::SocketAddr, time::Duration};
use tower_http::cors::CorsLayer;
use tracing_appender::rolling;
use util::{config::AppConfig, state::AppState, ws::WebSocketManager};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cfg = AppConfig::global().clone();
    let _log_guard = init_logging(&cfg);

    // Bad secret or class start aborts startup
    let settings = AttendanceSettings::from_config(&cfg).expect("Invalid attendance configuration");

    let db = db::connect().await;
    Migrator::up(&db, None)
        .await
        .expect("Failed to apply database migrations");

    let app_state = AppState::new(db, WebSocketManager::new());

    spawn_session_purger(
        QrSessionService::new(app_state.db().clone(), settings),
        Duration::from_secs(cfg.qr_purge_interval_seconds.max(1)),
    );

    let cors = CorsLayer::very_permissive().expose_headers([CONTENT_TYPE]);

    let app = Router::new()
        .nest("/api", routes(app_state.clone()))
        .nest("/ws", ws_routes(app_state.clone()))
        .layer(from_fn(log_request))
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .expect("Invalid address");

    tracing::info!("Starting {} on http://{}", cfg.project_name, addr);

    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server crashed");
}

fn init_logging(cfg: &AppConfig) -> tracing_appender::non_blocking::WorkerGuard {
    use std::fs;
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    fs::create_dir_all("logs").ok();

    let file_appender = rolling::daily("logs", &cfg.log_file);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(true)
        .with_thread_ids(true);

    let env_filter = EnvFilter::try_new(&cfg.log_level)
        .unwrap_or_else(|_| EnvFilter::new("api=info,services=info,attendance=info"));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    if cfg.log_to_stdout {
        registry.with(stdout_layer).init();
    } else {
        registry.init();
    }

    guard
}

/// Housekeeping only; expired sessions are already unusable.
fn spawn_session_purger(sessions: QrSessionService, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = sessions.purge_expired(Utc::now()).await {
                tracing::warn!(error = %e, "Expired session purge failed");
            }
        }
    });
}
