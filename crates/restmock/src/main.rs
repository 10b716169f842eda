use anyhow::Context;
use clap::Parser;
use restmock::config::MockServerConfig;
use restmock::server::MockServer;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "restmock")]
#[command(author, version, about = "Serve REST mock services from a config file", long_about = None)]
struct Args {
    /// Path to the mock services config (YAML, or JSON with a .json extension)
    #[arg(short, long, env = "RESTMOCK_CONFIG")]
    config: PathBuf,

    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(short, long, env = "RESTMOCK_PORT", default_value = "8080")]
    port: u16,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("restmock={}", args.log_level))),
        )
        .init();

    let config = MockServerConfig::from_file(&args.config)?;
    let server = Arc::new(MockServer::from_config(&config)?);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    server
        .serve(listener, async {
            tokio::signal::ctrl_c().await.ok();
            info!("Received Ctrl+C");
        })
        .await
}
