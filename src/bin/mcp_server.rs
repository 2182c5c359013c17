//! Golden Sapphire MCP tool server
//!
//! Run with: cargo run --bin mcp_server -- --bind 0.0.0.0:9999

use anyhow::Result;
use clap::Parser;
use sapphire_agents::config::Settings;
use sapphire_agents::mcp::{self, AppState};
use sapphire_agents::{logging, RewriteMode};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "mcp_server")]
#[command(about = "Serve the Golden Sapphire agents over HTTP")]
struct Args {
    /// Listen address (overrides MCP_BIND_ADDR)
    #[arg(long)]
    bind: Option<String>,

    /// Rewrite mode for the query tool (overrides QUERY_REWRITE_MODE)
    #[arg(long, value_enum)]
    mode: Option<RewriteMode>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init();

    let args = Args::parse();
    let mut settings = Settings::from_env()?;
    if let Some(mode) = args.mode {
        settings.rewrite_mode = mode;
    }
    let bind_addr = args.bind.unwrap_or_else(|| settings.bind_addr.clone());

    info!("Starting {} (rewrite mode {:?})", mcp::SERVER_NAME, settings.rewrite_mode);
    let context = Arc::new(settings.schema_context().await?);
    let state = AppState::from_settings(&settings, context)?;
    mcp::serve(state, &bind_addr).await?;
    Ok(())
}
