use gossip_ring::node::handlers::protocol_router;
use gossip_ring::transport::http::HttpTransport;
use gossip_ring::{RingConfig, RingNode};

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!(
            "Usage: {} --bind <addr:port> --app <name> [--hosts <addr:port,addr:port,...>] [--hosts-file <path>]",
            args[0]
        );
        eprintln!("Example: {} --bind 127.0.0.1:3000 --app search", args[0]);
        eprintln!(
            "Example: {} --bind 127.0.0.1:3001 --app search --hosts 127.0.0.1:3000,127.0.0.1:3001",
            args[0]
        );
        std::process::exit(1);
    }

    let mut bind: Option<String> = None;
    let mut app: Option<String> = None;
    let mut hosts: Option<Vec<String>> = None;
    let mut hosts_file: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" => {
                bind = Some(args[i + 1].clone());
                i += 2;
            }
            "--app" => {
                app = Some(args[i + 1].clone());
                i += 2;
            }
            "--hosts" => {
                hosts = Some(args[i + 1].split(',').map(str::to_string).collect());
                i += 2;
            }
            "--hosts-file" => {
                hosts_file = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let bind = bind.expect("--bind is required");
    let app = app.expect("--app is required");
    let bind_addr: SocketAddr = bind.parse()?;

    let mut config = RingConfig::new(app, bind.clone());
    config.bootstrap_hosts = hosts;
    config.bootstrap_file = hosts_file;

    let transport = Arc::new(HttpTransport::new());
    let node = RingNode::new(config, transport)?;

    tracing::info!("starting node on {}", bind);

    let router = protocol_router(node.clone());
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;

    // Bootstrap in the background so the protocol endpoints are already
    // serving while we join; peers bootstrapping concurrently need them.
    let bootstrapping = node.clone();
    tokio::spawn(async move {
        match bootstrapping.bootstrap().await {
            Ok(()) => {
                tracing::info!(
                    "ready; {} member(s) known",
                    bootstrapping.members().len()
                );
            }
            Err(e) => tracing::error!("bootstrap failed: {}", e),
        }
    });

    tracing::info!("protocol endpoints listening on {}", bind_addr);
    tracing::info!("Press Ctrl+C to shutdown");
    axum::serve(listener, router).await?;

    Ok(())
}
