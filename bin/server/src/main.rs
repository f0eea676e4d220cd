use radius_access_server::{config::ServerConfig, startup};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(server_id = %config.server_id, "loaded configuration");

    let (services, database) = match startup::bootstrap(&config).await {
        Ok(started) => started,
        Err(e) => {
            tracing::error!(error = %e, "failed to start");
            return ExitCode::FAILURE;
        }
    };

    match services.resolver.allowed_users().await {
        Ok(users) => {
            tracing::info!(cached_grants = users.len(), "authorization core ready");
        }
        Err(e) => {
            tracing::warn!(error = %e, "authorization core ready, could not count grants");
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }

    tracing::info!("shutting down");
    database.close().await;
    ExitCode::SUCCESS
}
