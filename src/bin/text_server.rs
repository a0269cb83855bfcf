//! Reference MCP tool server on stdio: summarize, extract_keywords and translate.

use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use rmcp::ServiceExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mcp_agent::config::{self, Settings};
use mcp_agent::server::{TextOps, TextServer};
use mcp_agent::OpenAiProvider;

#[derive(Parser)]
#[command(name = "text-server", about = "MCP server offering text operations over stdio")]
struct Args {
    /// Model used by the text operations (overrides AGENT_MODEL)
    #[arg(short, long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    // stdout carries the MCP transport
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    config::load_dotenv();
    let settings = Settings::from_env()?;
    let model = args.model.unwrap_or_else(|| settings.model.clone());
    let provider = Arc::new(OpenAiProvider::from_settings(&settings));

    info!(model = %model, "Serving text tools on stdio");
    let service = TextServer::new(TextOps::new(provider, model))
        .serve(rmcp::transport::stdio())
        .await?;
    let reason = service.waiting().await?;
    info!(?reason, "Text server stopped");

    Ok(())
}
