use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Use JSON logs in production (DIDSERVER_LOG_JSON=1), human-readable otherwise.
    let json_logs = std::env::var("DIDSERVER_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::from_default_env().add_directive("didserver=info".parse()?);
    if json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = didserver::config::ServerConfig::parse();
    tracing::info!(bind_addr = %config.bind_addr, "starting didserver");

    let server = didserver::server::Server::new(config)?;
    server.run().await
}
