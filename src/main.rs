use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, EnvFilter};

mod chat;
mod config;
mod history;
mod message;
mod provider;
mod server;
mod session;
mod settings;
mod storage;

use chat::{ChatState, SendOutcome};
use config::{AppConfig, ConfigOverrides, ProviderKind};
use history::HistoryStore;
use provider::RequestShape;
use session::FileRef;
use settings::{Settings, SettingsStore};
use storage::{KeyValueStore, SqliteKeyValueStore};

#[derive(Debug, Parser)]
#[command(name = "multi_agent_chat")]
#[command(about = "Terminal client for a multi-agent chat backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Interactive chat on stdin
    Chat {
        #[arg(long, value_enum)]
        provider: Option<ProviderKind>,
        #[arg(long)]
        backend_url: Option<String>,
        #[arg(long, value_enum)]
        shape: Option<RequestShape>,
        #[arg(long)]
        database_url: Option<String>,
        #[arg(long)]
        settings_file: Option<PathBuf>,
        /// Reply delay of the simulated provider
        #[arg(long)]
        delay_ms: Option<u64>,
    },
    /// Run the stub backend
    Serve {
        #[arg(long, default_value = "127.0.0.1:7171")]
        listen: String,
    },
    /// Inspect or clear archived chats
    History {
        #[arg(long)]
        database_url: Option<String>,
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Debug, Subcommand)]
enum HistoryAction {
    List,
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Chat { provider, backend_url, shape, database_url, settings_file, delay_ms } => {
            let cfg = AppConfig::resolve(ConfigOverrides { provider, backend_url, shape, database_url, settings_file, delay_ms })?;
            run_chat(cfg).await?;
        }
        Commands::Serve { listen } => {
            let addr: SocketAddr = listen.parse()?;
            server::serve(addr).await?;
        }
        Commands::History { database_url, action } => {
            let database_url = config::resolve_database_url(database_url, |key| std::env::var(key).ok());
            let storage: Arc<dyn KeyValueStore> = Arc::new(SqliteKeyValueStore::initialize(database_url).await?);
            let mut history = HistoryStore::load(storage).await;
            match action {
                HistoryAction::List => print_history(&history),
                HistoryAction::Clear => {
                    history.clear_all().await?;
                    println!("history cleared");
                }
            }
        }
    }
    Ok(())
}

async fn run_chat(cfg: AppConfig) -> anyhow::Result<()> {
    let storage: Arc<dyn KeyValueStore> = Arc::new(SqliteKeyValueStore::initialize(cfg.database_url.clone()).await?);
    let history = HistoryStore::load(storage).await;
    let settings = match &cfg.settings_file {
        Some(path) => Settings::from_json_file(path)?,
        None => Settings::default(),
    };
    let state = ChatState::new(history, SettingsStore::new(settings), cfg.build_provider()?);
    tracing::info!(provider = state.provider_name(), "chat started");
    println!("{}: type /help for commands", state.session.lock().await.title());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(command) = line.strip_prefix('/') else {
            match state.send(line).await {
                SendOutcome::Replied(reply) => println!("{reply}"),
                SendOutcome::Failed { shown, .. } => println!("{shown}"),
                SendOutcome::Dropped => println!("(still waiting for the previous reply)"),
            }
            continue;
        };
        let (name, arg) = command.split_once(' ').map_or((command, ""), |(n, a)| (n, a.trim()));
        // persistence errors are reported, never fatal
        if let Err(e) = run_command(&state, name, arg).await {
            tracing::warn!(error = %e, command = name, "command failed");
            println!("error: {e}");
        }
        if name == "quit" {
            break;
        }
    }
    Ok(())
}

async fn run_command(state: &ChatState, name: &str, arg: &str) -> anyhow::Result<()> {
    match name {
        "new" => {
            let archived = state.new_chat().await?;
            println!("archived \"{}\", started a new chat", archived.title);
        }
        "title" => {
            state.rename(arg).await;
            println!("title: {arg}");
        }
        "attach" => {
            let files: Vec<FileRef> = arg.split_whitespace().map(FileRef::from_path).collect();
            println!("attached {} file(s)", files.len());
            state.attach(files).await;
        }
        "history" => print_history(&*state.history.lock().await),
        "open" => {
            let id = history_id(state, arg).await?;
            if state.open_history(id).await? {
                let session = state.session.lock().await;
                println!("opened \"{}\"", session.title());
                for m in session.messages() {
                    println!("[{}] {}", m.timestamp, m.text());
                }
            }
        }
        "remove" => {
            let id = history_id(state, arg).await?;
            state.history.lock().await.remove(id).await?;
        }
        "remove-title" => {
            let n = state.history.lock().await.remove_by_title(arg).await?;
            println!("removed {n} chat(s)");
        }
        "clear-history" => {
            state.history.lock().await.clear_all().await?;
            println!("history cleared");
        }
        "settings" => {
            state.toggle_settings().await;
            let settings = state.settings.read().await;
            println!("{}", serde_json::to_string_pretty(settings.settings())?);
        }
        "quit" => {}
        _ => println!(
            "commands: /new /title <text> /attach <path>... /history /open <n> /remove <n> \
             /remove-title <text> /clear-history /settings /quit"
        ),
    }
    Ok(())
}

/// Maps the 1-based position shown by `/history` to an entry id.
async fn history_id(state: &ChatState, arg: &str) -> anyhow::Result<uuid::Uuid> {
    let n: usize = arg.parse()?;
    let history = state.history.lock().await;
    n.checked_sub(1)
        .and_then(|i| history.entries().get(i))
        .map(|e| e.id)
        .ok_or_else(|| anyhow::anyhow!("no history entry {n}"))
}

fn print_history(history: &HistoryStore) {
    if history.is_empty() {
        println!("no archived chats");
        return;
    }
    println!("{} archived chat(s)", history.len());
    for (i, entry) in history.entries().iter().enumerate() {
        println!(
            "{:>3}. {} ({} messages, {})",
            i + 1,
            entry.title,
            entry.messages.len(),
            entry.timestamp.format("%Y-%m-%d %H:%M")
        );
    }
}
