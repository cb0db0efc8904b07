//! Boost launcher: `.env` application, tracing init, HTTP server.

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "boost", about = "OpenAI-compatible inference proxy gateway")]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = serve::DEFAULT_ADDR)]
    addr: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = config::load_and_apply(None) {
        tracing::warn!("failed to apply .env: {e}");
    }

    serve::run_serve(Some(&cli.addr)).await
}
