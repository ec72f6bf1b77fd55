//! Entry point for the Salon Planner binary.
//!
//! Running this binary starts an HTTP server exposing the planner API.
//! Configuration comes from the environment (see [`salon_planner::config`]);
//! log verbosity follows `RUST_LOG` and defaults to `info`.

use anyhow::Result;
use salon_planner::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    salon_planner::api::serve(config).await
}
