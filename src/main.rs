//! Server entry point: parse configuration, bind, serve.

use std::net::{Ipv4Addr, SocketAddr};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use roulette_signaling::serve;

#[derive(Parser, Debug)]
#[command(name = "roulette-signaling")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long)]
    port: u16,

    /// Browser origin allowed to connect ('*' disables the check)
    #[arg(short = 'o', long)]
    allowed_origin: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, args.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, allowed_origin = %args.allowed_origin, "signaling server listening");

    serve(listener, args.allowed_origin).await;
    Ok(())
}
