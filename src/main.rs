use std::sync::Arc;

use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod config;
mod database;
mod dtos;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;
#[cfg(test)]
mod testing;

use config::AppConfig;
use database::connection::get_db_pool;
use database::otp_store::PgOtpStore;
use services::mail_service::{LogMailer, MailSender, SmtpMailer};
use services::otp_service::OtpService;
use services::sweeper::spawn_expired_sweeper;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;
    let pool = get_db_pool(&config).await?;
    let mailer = build_mailer(&config)?;

    let otp_service = OtpService::new(
        Arc::new(PgOtpStore::new(pool.clone())),
        mailer,
        config.otp.clone(),
    );
    tracing::info!(
        "✅ OTP service ready (ttl {}s, max {} attempts)",
        config.otp.ttl.num_seconds(),
        config.otp.max_attempts
    );

    let shutdown = CancellationToken::new();
    let sweeper = spawn_expired_sweeper(
        otp_service.clone(),
        config.sweep_interval_secs,
        shutdown.clone(),
    );

    let app = routes::build_router(AppState::new(otp_service));
    let served = start_server(app, &config, shutdown.clone()).await;

    // Teardown runs even if the server failed
    shutdown.cancel();
    if let Some(handle) = sweeper {
        if let Err(e) = handle.await {
            tracing::warn!("Sweeper task ended abnormally: {}", e);
        }
    }
    pool.close().await;
    tracing::info!("👋 Shutdown complete");

    served
}

fn build_mailer(config: &AppConfig) -> anyhow::Result<Arc<dyn MailSender>> {
    match &config.smtp {
        Some(smtp) => {
            let mailer = SmtpMailer::new(smtp, &config.mail_from)?;
            tracing::info!("✅ SMTP mailer configured for {}:{}", smtp.host, smtp.port);
            Ok(Arc::new(mailer))
        }
        None => {
            tracing::warn!("SMTP_HOST not set, OTP emails will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

async fn start_server(app: Router, config: &AppConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    tracing::info!("🚀 Server starting on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = shutdown.cancelled() => {},
    }

    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
