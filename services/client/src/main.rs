use std::env;

use client::config;
use client::TunnelClient;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tunnel_cache::Cache;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = env::var("CLIENT_CONFIG").unwrap_or_else(|_| "client.toml".to_owned());
    let mut cfg = config::load_config_from_path(std::path::Path::new(&config_path))
        .unwrap_or_else(|_| config::ClientConfig::default());
    if let Ok(backend) = env::var("TUNNEL_BACKEND") {
        cfg.backend = backend;
    }
    if let Ok(http_bind) = env::var("HTTP_BIND") {
        cfg.http_bind = http_bind;
    }

    let cache = Cache::new();
    let tunnel_client = match TunnelClient::connect(&cfg.backend, cache).await {
        Ok(client) => client,
        Err(err) => {
            error!(error = %err, "failed to connect to tunnel server");
            std::process::exit(1);
        }
    };

    let http_bind = client::normalize_bind(&cfg.http_bind);
    info!(backend = %cfg.backend, http = %http_bind, "starting tunnel client");

    tokio::select! {
        result = client::local_proxy::serve(&http_bind, tunnel_client) => {
            if let Err(err) = result {
                error!(error = %err, "proxy front-end exited with error");
            }
        }
        _ = shutdown_signal() => {
            info!("shutting down");
        }
    }
}

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
