use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::serve;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use tts_quota_gate::limits::{HttpLimitsProvider, StaticLimitsProvider};
use tts_quota_gate::storage::SqliteUsageStore;
use tts_quota_gate::{
    create_router, ApiState, ConfigCache, LimitsProvider, QuotaGate, QuotaGateConfig, UsageStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = QuotaGateConfig::from_env().context("failed to load configuration")?;
    init_tracing(&config);

    info!(
        policy = config.policy.name(),
        failure_mode = %config.failure_mode,
        data_dir = %config.data_dir.display(),
        "tts-quota-gate starting"
    );

    let store: Arc<dyn UsageStore> = Arc::new(
        SqliteUsageStore::new(config.data_dir.clone(), config.store_busy_timeout())
            .context("failed to open usage database")?,
    );

    let provider: Arc<dyn LimitsProvider> = match &config.limits_url {
        Some(url) => Arc::new(
            HttpLimitsProvider::new(
                url.clone(),
                config.limits_token.clone(),
                config.limits_fetch_timeout(),
            )
            .context("failed to build limits provider")?,
        ),
        None => Arc::new(StaticLimitsProvider::new(config.default_limits)),
    };

    let cache = Arc::new(ConfigCache::new(config.default_limits, provider));
    let refresh_task = if config.limits_url.is_some() {
        Some(cache.start(config.refresh_interval()))
    } else {
        info!("LIMITS_URL not set, serving default limits without refresh");
        None
    };

    let gate = Arc::new(QuotaGate::new(Arc::clone(&cache), store, config.policy));
    let addr: SocketAddr = config
        .listen_addr()
        .parse()
        .context("invalid server bind address")?;
    let state = Arc::new(ApiState::new(gate, config));
    let router = create_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .context("failed to bind TCP listener")?;
    let local_addr = listener
        .local_addr()
        .context("failed to read bound address")?;
    info!(%local_addr, "tts-quota-gate listening");

    serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server encountered an unrecoverable error")?;

    if let Some(task) = refresh_task {
        task.stop().await;
    }

    info!("tts-quota-gate shutdown complete");
    Ok(())
}

fn init_tracing(config: &QuotaGateConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
