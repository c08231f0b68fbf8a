//! Push Gateway Server - relays homeserver notifications to push providers.

use std::sync::Arc;

use color_eyre::eyre::{OptionExt as _, WrapErr as _};
use pushgate_server::config::{Config, LogConfig};
use tower_http::trace::TraceLayer;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;

    let config = Config::load().wrap_err("failed to load config")?;

    // Flushes the log file on drop
    let _guard = init_logging(&config.log)?;

    tracing::info!(config = %Config::config_path().display(), "pushgate starting");

    // Initialize storage
    let storage = pushgate_storage::SqliteStorage::new(&config.db.dbfile)
        .wrap_err("failed to initialize storage")?;

    storage
        .run_migrations()
        .wrap_err("failed to run migrations")?;

    let registry = pushgate_server::build_registry(&config, storage)?;

    // Build router
    let app = pushgate_http::gateway_router(Arc::new(registry)).layer(TraceLayer::new_for_http());

    // Start server
    let addr = (config.http.bind_address.as_str(), config.http.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err("failed to bind")?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    if let Some(port) = config.metrics.port {
        let addr = (config.metrics.bind_address.as_str(), port);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .wrap_err("failed to bind metrics listener")?;

        tracing::info!(addr = %listener.local_addr()?, "serving metrics");

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, pushgate_http::metrics_router()).await {
                tracing::error!(error = %e, "metrics server error");
            }
        });
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("server error")?;

    tracing::info!("pushgate stopped");

    Ok(())
}

fn init_logging(log: &LogConfig) -> color_eyre::eyre::Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));

    let Some(path) = &log.logfile else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(None);
    };

    let file_name = path.file_name().ok_or_eyre("log.logfile must name a file")?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => std::path::Path::new("."),
    };
    std::fs::create_dir_all(dir).wrap_err("failed to create log directory")?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .init();

    Ok(Some(guard))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }

    tracing::info!("shutting down");
}
