//! Interactive chat client.
//!
//! Connects every server in the config file, discovers their tools, then runs a
//! read-eval-print loop on one conversation thread, printing answer fragments as
//! they arrive. All sessions are closed on exit.

use std::error::Error;
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use mcp_agent::agent::FragmentStream;
use mcp_agent::config::{self, CONFIG_FILE};
use mcp_agent::{
    Agent, AgentBuilder, ConversationStore, JsonlStore, MemoryStore, ServerConfigFile, SessionSet,
    Settings, ThreadId, ToolRegistry,
};

#[derive(Parser)]
#[command(name = "mcp-chat", about = "Chat with a tool-calling agent backed by MCP servers")]
struct Args {
    /// Server configuration file
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Conversation thread id
    #[arg(short, long, default_value = "chat-1")]
    thread: String,

    /// Model identifier (overrides AGENT_MODEL)
    #[arg(short, long)]
    model: Option<String>,

    /// Keep history as JSONL files in this directory instead of in memory
    #[arg(long)]
    history_dir: Option<PathBuf>,
}

fn flush() {
    let _ = std::io::stdout().flush();
}

#[derive(Debug)]
enum Relay {
    Finished,
    Failed(mcp_agent::Error),
    Interrupted,
}

async fn interrupt() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Writes fragments to `out` until the turn ends or `interrupted` resolves.
///
/// The stream is dropped on return, which cancels any in-flight model or tool call.
async fn relay<W: Write>(
    mut fragments: FragmentStream,
    interrupted: impl Future<Output = ()>,
    out: &mut W,
) -> std::io::Result<Relay> {
    tokio::pin!(interrupted);
    loop {
        let fragment = tokio::select! {
            fragment = fragments.next() => fragment,
            _ = &mut interrupted => return Ok(Relay::Interrupted),
        };
        match fragment {
            Some(Ok(text)) => {
                write!(out, "{}", text)?;
                out.flush()?;
            }
            Some(Err(e)) => return Ok(Relay::Failed(e)),
            None => return Ok(Relay::Finished),
        }
    }
}

async fn chat(agent: &Agent, thread: &ThreadId) -> mcp_agent::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\n\nUSER: ");
        flush();

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "quit" | "exit") {
            break;
        }

        println!("\nASSISTANT:\n");
        let fragments = agent.submit_turn(thread, input);
        match relay(fragments, interrupt(), &mut std::io::stdout()).await? {
            Relay::Finished => {}
            Relay::Failed(e) => eprintln!("\nError: {}", e),
            Relay::Interrupted => eprintln!("\n[interrupted]"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    config::load_dotenv();
    let settings = Settings::from_env()?;
    let servers = ServerConfigFile::load(&args.config)?;
    let store: Arc<dyn ConversationStore> = match &args.history_dir {
        Some(dir) => Arc::new(JsonlStore::open(dir).await?),
        None => Arc::new(MemoryStore::new()),
    };

    let sessions = SessionSet::connect(&servers).await?;
    sessions
        .scoped(|sessions| async move {
            let tools = ToolRegistry::discover_all(&sessions).await?;
            println!("Loaded tools: {:?}", tools.names().collect::<Vec<_>>());

            let mut builder = AgentBuilder::from_settings(&settings)
                .store(store)
                .tools(Arc::new(tools));
            if let Some(model) = args.model {
                builder = builder.model(model);
            }
            let agent = builder.build()?;

            chat(&agent, &ThreadId::from(args.thread)).await
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use futures::stream;

    use super::*;

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_interrupt_stops_stalled_turn() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());
        let fragments: FragmentStream = Box::pin(
            stream::iter(vec![Ok("Bon".to_string())])
                .chain(stream::pending())
                .map(move |item| {
                    let _ = &flag;
                    item
                }),
        );

        let mut out = Vec::new();
        let outcome = relay(fragments, tokio::time::sleep(Duration::from_millis(50)), &mut out)
            .await
            .unwrap();

        assert!(matches!(outcome, Relay::Interrupted));
        assert_eq!(out, b"Bon");
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_relay_reports_turn_error() {
        let fragments: FragmentStream = Box::pin(stream::iter(vec![
            Ok("partial".to_string()),
            Err(mcp_agent::Error::CycleLimit { limit: 1 }),
        ]));

        let mut out = Vec::new();
        let outcome = relay(fragments, std::future::pending(), &mut out).await.unwrap();

        assert!(matches!(outcome, Relay::Failed(mcp_agent::Error::CycleLimit { limit: 1 })));
        assert_eq!(out, b"partial");
    }
}
