//! Routegate permission authority server
//!
//! Run with: cargo run --release --bin routegate-server -- --data-dir ./data
//!
//! Configuration comes from defaults, then `--config <file>`, then
//! `ROUTEGATE_*` environment variables, then the flags below.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use routegate::{server, Config, LocalAuthority};

#[derive(Debug, Parser)]
#[command(name = "routegate-server", version, about = "Route permission authority over HTTP")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "ROUTEGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory; the authority lives in <DATA_DIR>/authority
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Listen address
    #[arg(short, long)]
    bind: Option<String>,
}

fn load_config(args: &Args) -> routegate::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?.with_env()?,
        None => Config::from_env()?,
    };
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(bind) = &args.bind {
        config.bind = bind.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("routegate=info,tower_http=info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = match load_config(&args) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let dir = config.authority_dir();
    let authority = match LocalAuthority::open(&dir) {
        Ok(a) => Arc::new(a),
        Err(e) => {
            error!(path = %dir.display(), error = %e, "failed to open authority");
            return ExitCode::FAILURE;
        }
    };
    info!(path = %dir.display(), "authority opened");

    let listener = match tokio::net::TcpListener::bind(&config.bind).await {
        Ok(l) => l,
        Err(e) => {
            error!(bind = %config.bind, error = %e, "failed to bind");
            return ExitCode::FAILURE;
        }
    };
    info!(version = env!("CARGO_PKG_VERSION"), bind = %config.bind, "routegate-server listening");

    if let Err(e) = axum::serve(listener, server::router(authority)).await {
        error!(error = %e, "server error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
