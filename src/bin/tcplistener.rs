//! Debug listener: accepts connections one at a time and prints each parsed
//! request to stdout.

use rawhttp::config::Config;
use rawhttp::http::parser::read_request;
use rawhttp::http::request::Request;
use tokio::net::TcpListener;
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

    let listener = TcpListener::bind(("0.0.0.0", cfg.port)).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        tracing::info!("Connection accepted from {}", peer);

        match read_request(&mut socket).await {
            Ok(request) => println!("{}", describe(&request)),
            Err(e) => tracing::warn!(peer = %peer, error = %e, "Failed to parse request"),
        }

        tracing::info!("Connection from {} closed", peer);
    }
}

fn describe(request: &Request) -> String {
    let line = &request.request_line;
    let mut out = format!(
        "Request line:\n- Method: {}\n- Target: {}\n- Version: {}\nHeaders:\n",
        line.method, line.target, line.http_version
    );

    let mut headers: Vec<_> = request.headers.iter().collect();
    headers.sort_unstable();
    for (name, value) in headers {
        out.push_str(&format!("- {name}: {value}\n"));
    }

    out.push_str("Body:\n");
    out.push_str(&String::from_utf8_lossy(&request.body));
    out
}
