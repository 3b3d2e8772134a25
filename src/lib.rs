pub mod api;
pub mod config;
pub mod crypto;
pub mod db;
pub mod domain;
pub mod entities;
pub mod services;
pub mod slug;
pub mod state;

use std::sync::Arc;
use tokio::signal;

use anyhow::Context;
pub use config::Config;
use state::SharedState;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber described by `[log]`.
fn init_tracing(config: &config::LogConfig) -> anyhow::Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let writer = match &config.path {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {path}"))?;
            fmt::writer::BoxMakeWriter::new(Arc::new(file))
        }
        None => fmt::writer::BoxMakeWriter::new(std::io::stdout),
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_writer(writer))
            .init();
    } else {
        registry
            .with(fmt::layer().with_ansi(config.path.is_none()).with_writer(writer))
            .init();
    }

    Ok(())
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut config = Config::load()?;
    config.validate()?;

    init_tracing(&config.log)?;

    if config.server.tls {
        anyhow::bail!(
            "server.tls is set, but TLS is not terminated in-process; put a reverse proxy in front and set server.domain to its https URL"
        );
    }

    config.ensure_csrf_key()?;

    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        Some(handle)
    } else {
        None
    };

    info!("quillpress v{} starting...", env!("CARGO_PKG_VERSION"));

    let shared = Arc::new(SharedState::new(config).await?);

    if let Some((admin, password)) = shared.users.bootstrap_admin().await? {
        warn!(
            username = %admin.username,
            password = %password.as_str(),
            "Created the initial administrator account; change this password after the first login"
        );
    }

    let sweeper = shared
        .sessions
        .spawn_sweeper(shared.config.session.gc_interval());

    let addr = shared.config.server.listen_address();
    let app = api::router(api::AppState::new(shared.clone(), prometheus_handle));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Web server running at http://{addr}");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    sweeper.abort();

    if let Err(e) = served {
        error!(error = %e, "Web server error");
        return Err(e.into());
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!(error = %e, "Error listening for shutdown"),
    }
}
