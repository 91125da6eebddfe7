//! Gateway server: load configuration, verify every database, serve.
//!
//! Run from repo root: `cargo run -p gateway_server`
//! Settings come from the environment (see `.env.example`).

use crud_gateway::{app, load_config_file, AppState, Settings};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("crud_gateway=info,gateway_server=info")),
        )
        .init();

    let settings = Settings::from_env();
    let config = load_config_file(&settings.config_path)?;
    let state = AppState::initialize(&config)?;
    // Declared and physical tables must agree before any request is served.
    state.verify().await?;

    let router = app(state, settings.body_limit);
    let listener = TcpListener::bind(settings.socket_addr()?).await?;
    tracing::info!("gateway listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
