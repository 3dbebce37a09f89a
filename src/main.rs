//!
//! velo server binary
//! ------------------
//! Command-line entry point. Configuration comes from CLI flags and
//! environment variables; see `--help`.

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

use velo::config::{has_flag, ServerConfig, USAGE};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    // Init logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let cfg = ServerConfig::from_process()?;
    tracing::info!(
        target: "startup",
        "Using bind={}, http_port={}, root={}",
        cfg.bind, cfg.http_port, cfg.root.display()
    );
    velo::server::run_with_config(cfg).await
}
