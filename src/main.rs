use rawhttp::config::Config;
use rawhttp::routes::route;
use tokio::net::TcpStream;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .init();

    let server = rawhttp::serve(cfg.port, route::<TcpStream>).await?;
    tracing::info!("Server started on port {}", cfg.port);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    server.close().await?;
    tracing::info!("Server gracefully stopped");

    Ok(())
}
