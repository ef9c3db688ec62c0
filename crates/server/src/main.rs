use std::sync::Arc;

use anyhow::Context;
use secrecy::ExposeSecret;
use server::{AppState, config::ServerConfig, file_logging, routes};
use services::services::{
    auth::AuthService, crypto::CredentialCipher, invitations::InvitationService,
    mailer::LoggingMailer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // The guard flushes file logs on drop and must outlive the server.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let _file_log_guard = file_logging::init_logging(&log_level);

    let config = ServerConfig::from_env().context("invalid server configuration")?;

    let pool = db::create_pool(config.database_url.expose_secret())
        .await
        .context("failed to connect to the database")?;
    db::migrate(&pool).await.context("failed to run migrations")?;

    let cipher = CredentialCipher::from_base64(config.encryption_key.expose_secret())
        .context("ENCRYPTION_KEY must be a base64 encoded 32-byte key")?;
    let invitations = InvitationService::new(
        Arc::new(LoggingMailer),
        config.public_base_url.clone(),
        config.invitation_ttl(),
    );
    let auth = AuthService::new(&config.auth());
    let addr = config.listen_addr()?;

    let state = AppState::new(pool.clone(), auth, cipher, invitations, config);
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, version = utils::build_info::BUILD_INFO.version, "Taskosaur API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Closing database connection pool...");
    pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let terminate = async {
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
            } else {
                tracing::error!("Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
