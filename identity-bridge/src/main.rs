use identity_bridge::{
    build_router,
    config::{BridgeConfig, EmailProviderKind, StorageMode},
    db,
    services::{ConsoleEmailService, Database, EmailProvider, IdentityStore, MemoryStore, SmtpEmailService},
    AppState,
};
use service_core::error::AppError;
use service_core::observability::{init_metrics, init_tracing};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = BridgeConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;
    init_metrics()?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        storage = ?config.storage,
        issuer = %config.idp.issuer_uri,
        "Starting identity bridge"
    );

    let store: Arc<dyn IdentityStore> = match config.storage {
        StorageMode::Postgres => {
            let pool = db::create_pool(&config.database)
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?;
            db::run_migrations(&pool)
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
            Arc::new(Database::new(pool))
        }
        StorageMode::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let email: Arc<dyn EmailProvider> = match config.email.provider {
        EmailProviderKind::Smtp => Arc::new(SmtpEmailService::new(&config.email)?),
        EmailProviderKind::Console => Arc::new(ConsoleEmailService),
    };
    tracing::info!(provider = ?config.email.provider, "Email service initialized");

    let state = AppState::new(config, store, email)?;
    spawn_reset_token_reaper(&state);

    let app = build_router(state.clone());

    let addr = state.config.common.socket_addr();
    let grace = Duration::from_secs(state.config.common.shutdown_grace_seconds);

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(grace))
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

/// Periodically delete expired password reset tokens.
fn spawn_reset_token_reaper(state: &AppState) {
    let password_reset = state.password_reset.clone();
    let period = Duration::from_secs(state.config.reset.purge_interval_seconds);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if let Err(e) = password_reset.purge_expired().await {
                tracing::error!(error = %e, "Failed to purge expired reset tokens");
            }
        }
    });
}

async fn shutdown_signal(grace: Duration) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    // Let in-flight requests finish
    tokio::time::sleep(grace).await;
}
