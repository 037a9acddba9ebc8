//! `dtunnel`: the operational CLI that drives the client and server halves
//! of the tunnel. Not part of the engineering core — a thin external
//! collaborator wiring flags onto the library crates.

use clap::{Arg, Command};
use tracing::{error, info};

mod keypair;

const DEFAULT_HTTP: &str = ":8080";
const DEFAULT_BACKEND: &str = "127.0.0.1:8081";
const DEFAULT_TUNNEL: &str = "*:8081";

fn cli() -> Command {
    Command::new("dtunnel")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Isaac Wismer")
        .about("Diff-aware HTTP tunnel: client and server halves of a caching proxy")
        .subcommand_required(true)
        .subcommand(
            Command::new("client")
                .about("Run the local HTTP proxy that tunnels traffic to a remote server")
                .arg(
                    Arg::new("http")
                        .long("http")
                        .help("Address the local HTTP proxy listens on")
                        .default_value(DEFAULT_HTTP),
                )
                .arg(
                    Arg::new("backend")
                        .long("backend")
                        .help("Address of the remote tunnel server to dial")
                        .default_value(DEFAULT_BACKEND),
                ),
        )
        .subcommand(
            Command::new("server")
                .about("Run the tunnel server that performs origin fetches")
                .arg(
                    Arg::new("tunnel")
                        .long("tunnel")
                        .help("Address the tunnel server listens on")
                        .default_value(DEFAULT_TUNNEL),
                ),
        )
        .subcommand(
            Command::new("proxy")
                .about("Run client and server in one process over an in-process transport")
                .arg(
                    Arg::new("http")
                        .long("http")
                        .help("Address the local HTTP proxy listens on")
                        .default_value(DEFAULT_HTTP),
                ),
        )
        .subcommand(
            Command::new("genkey")
                .about("Generate a NAME.pub / NAME.key key-pair file")
                .arg(Arg::new("name").help("Base name for the key-pair files").required(true)),
        )
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let matches = cli().get_matches();

    let result = match matches.subcommand() {
        Some(("client", sub)) => {
            let http = sub.get_one::<String>("http").expect("has default");
            let backend = sub.get_one::<String>("backend").expect("has default");
            run_client(http, backend).await.map_err(|e| e.to_string())
        }
        Some(("server", sub)) => {
            let tunnel = sub.get_one::<String>("tunnel").expect("has default");
            run_server(tunnel).await.map_err(|e| e.to_string())
        }
        Some(("proxy", sub)) => {
            let http = sub.get_one::<String>("http").expect("has default");
            run_proxy(http).await.map_err(|e| e.to_string())
        }
        Some(("genkey", sub)) => {
            let name = sub.get_one::<String>("name").expect("required");
            keypair::generate(name).map_err(|e| e.to_string())
        }
        _ => unreachable!("subcommand_required"),
    };

    if let Err(err) = result {
        error!(error = %err, "dtunnel exited with error");
        std::process::exit(1);
    }
}

async fn run_client(http: &str, backend: &str) -> Result<(), Box<dyn std::error::Error>> {
    let cache = tunnel_cache::Cache::new();
    let tunnel_client = client::TunnelClient::connect(backend, cache).await?;
    let http_addr = client::normalize_bind(http);
    info!(%http_addr, %backend, "client ready");
    client::local_proxy::serve(&http_addr, tunnel_client).await?;
    Ok(())
}

async fn run_server(tunnel: &str) -> Result<(), Box<dyn std::error::Error>> {
    let state = server::ServerState::new();
    let tunnel_addr = server::normalize_bind(tunnel);
    server::serve(&tunnel_addr, state).await?;
    Ok(())
}

/// Runs both halves in one process. The server binds an ephemeral loopback
/// port of its own choosing; the client dials that port directly, so
/// `--backend` and `--tunnel` play no role here.
async fn run_proxy(http: &str) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let tunnel_addr = listener.local_addr()?.to_string();
    let state = server::ServerState::new();
    tokio::spawn(async move {
        if let Err(err) = server::serve_on(listener, state).await {
            error!(error = %err, "in-process tunnel server exited");
        }
    });

    let cache = tunnel_cache::Cache::new();
    let tunnel_client = client::TunnelClient::connect(&tunnel_addr, cache).await?;
    let http_addr = client::normalize_bind(http);
    info!(%http_addr, %tunnel_addr, "proxy ready (in-process transport)");
    client::local_proxy::serve(&http_addr, tunnel_client).await?;
    Ok(())
}
