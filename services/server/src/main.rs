use std::env;

use server::config;
use server::state::ServerState;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = env::var("SERVER_CONFIG").unwrap_or_else(|_| "server.toml".to_owned());
    let mut cfg = config::load_config_from_path(std::path::Path::new(&config_path))
        .unwrap_or_else(|_| config::ServerConfig::default());
    if let Ok(bind) = env::var("TUNNEL_BIND") {
        cfg.bind = bind;
    }

    let state = ServerState::new();
    let bind = server::normalize_bind(&cfg.bind);
    info!(bind = %bind, "starting tunnel server");

    tokio::select! {
        result = server::serve(&bind, state) => {
            if let Err(err) = result {
                error!(error = %err, "server exited with error");
            }
        }
        _ = shutdown_signal() => {
            info!("shutting down");
        }
    }
}

/// Waits for SIGTERM or Ctrl-C (SIGINT) and returns to trigger shutdown.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C"); },
        _ = terminate => { info!("received SIGTERM"); },
    }
}
