//! Slicer server binary. Usage: `slicer [config.toml]` (defaults to `slicer.toml` when present).

use slicer_server::{load_config, run_server};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("slicer_server=info")),
        )
        .init();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = load_config(config_path.as_deref()).await?;
    if let Err(e) = run_server(config).await {
        tracing::error!(error = %e, "server stopped");
        return Err(e.into());
    }
    Ok(())
}
