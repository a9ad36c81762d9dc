//! confab command implementations

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use confab_catalog::{workspace_provider, CatalogOptions, EnableSpec, ToolCatalogManager};
use confab_checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
use confab_config::{self, CheckpointBackend, Config, ProviderEntry};
use confab_engine::{ConversationEngine, EngineConfig, EngineError, SystemPrompt};
use confab_provider::{Message, OpenAiCompatProvider};

type Engine = ConversationEngine<OpenAiCompatProvider>;

/// Initialize config and workspace
pub async fn init_command() -> Result<()> {
    println!("Initializing confab...");

    let config = confab_config::init().await?;

    println!("\nConfig:    {}", confab_config::config_path().display());
    println!("Model:     {} at {}", config.model.model, config.model.api_base);
    println!("\nNext steps:");
    println!("  1. Start a local OpenAI-compatible server (LM Studio, llama.cpp, vLLM, ...)");
    println!("  2. Start chatting: confab chat -m \"Hello!\"");
    Ok(())
}

/// Register every configured provider with its enable list
fn build_catalog(config: &Config) -> Result<ToolCatalogManager> {
    let mut spec = EnableSpec::new();
    for (provider, names) in config.enabled_tools() {
        spec.enable(provider, names);
    }
    let options = CatalogOptions {
        prefix_tool_names: config.tools.prefix_tool_names,
        max_concurrency: config.tools.max_concurrency,
        tool_timeout: Duration::from_secs(config.tools.timeout_secs),
    };

    let mut manager = ToolCatalogManager::with_options(spec, options);
    if !config.tools.enabled {
        return Ok(manager);
    }
    for (name, entry) in &config.tools.providers {
        match entry {
            ProviderEntry::Workspace { root } => {
                let root = confab_config::expand_tilde(root);
                manager
                    .register(workspace_provider(name.clone(), root))
                    .with_context(|| format!("registering tool provider '{}'", name))?;
            }
        }
    }
    Ok(manager)
}

/// Discover tools; failure leaves the catalog empty
async fn discover_tools(config: &Config, manager: &ToolCatalogManager) {
    if !config.tools.enabled {
        info!("tools disabled by config, chat-only mode");
        return;
    }
    if let Err(e) = manager.discover().await {
        println!("Tools unavailable ({}); chatting without tools.", e);
    }
}

fn open_store(config: &Config) -> Result<Arc<dyn CheckpointStore>> {
    Ok(match config.checkpoint.backend {
        CheckpointBackend::Memory => Arc::new(MemoryCheckpointStore::new()),
        CheckpointBackend::File => {
            let dir = config.checkpoint_dir();
            Arc::new(
                FileCheckpointStore::new(&dir)
                    .with_context(|| format!("opening thread store at {}", dir.display()))?,
            )
        }
    })
}

async fn build_engine(config: &Config) -> Result<Engine> {
    let provider = OpenAiCompatProvider::new(
        config.model.api_key.clone(),
        Some(config.model.api_base.clone()),
        Some(config.model.model.clone()),
    );

    let manager = build_catalog(config)?;
    discover_tools(config, &manager).await;

    let engine_config = EngineConfig {
        model: Some(config.model.model.clone()),
        temperature: config.model.temperature,
        max_tokens: config.model.max_tokens,
        max_round_trips: config.engine.max_round_trips,
        parallel_tool_calls: config.engine.parallel_tool_calls,
    };

    Ok(ConversationEngine::with_config(
        provider,
        Arc::new(manager),
        open_store(config)?,
        SystemPrompt::default(),
        engine_config,
    ))
}

/// One line of interactive input
#[derive(Debug, PartialEq)]
enum Input {
    Empty,
    Quit,
    NewThread,
    History,
    Tools,
    Help,
    Unknown(String),
    Message(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if !line.starts_with('/') {
        return Input::Message(line.to_string());
    }
    match line.to_ascii_lowercase().as_str() {
        "/quit" | "/exit" => Input::Quit,
        "/new" => Input::NewThread,
        "/history" => Input::History,
        "/tools" => Input::Tools,
        "/help" => Input::Help,
        _ => Input::Unknown(line.to_string()),
    }
}

const HELP: &str = "Commands:
  /new      start a new thread
  /history  show this thread's messages
  /tools    list enabled tools
  /help     show this help
  /quit     leave (also /exit)";

/// Render one history entry for the terminal
fn format_message(message: &Message) -> String {
    match message {
        Message::System { text } => format!("system: {}", text),
        Message::User { text } => format!("you: {}", text),
        Message::Assistant { text, invocations } => {
            let mut out = format!("assistant: {}", text);
            for call in invocations {
                out.push_str(&format!(
                    "\n  -> {}({}) [{}]",
                    call.tool, call.arguments, call.id
                ));
            }
            out
        }
        Message::ToolResult {
            invocation_id,
            tool,
            content,
            is_error,
        } => format!(
            "{} [{}]{}: {}",
            tool,
            invocation_id,
            if *is_error { " (error)" } else { "" },
            content
        ),
    }
}

fn print_history(messages: &[Message]) {
    if messages.is_empty() {
        println!("(no messages)");
    }
    for message in messages {
        println!("{}", format_message(message));
    }
}

fn print_tools(engine: &Engine) {
    let tools = engine.enabled_tools();
    if tools.is_empty() {
        println!("No tools enabled.");
        return;
    }
    println!("Enabled tools:");
    for tool in tools {
        println!("  {} - {}", tool.name, tool.description);
    }
}

/// Run one turn, cancelling it on Ctrl-C
async fn run_turn(engine: &Engine, thread: &str, text: &str) -> Result<String, EngineError> {
    let cancel = CancellationToken::new();
    let turn = engine.submit_with_cancel(thread, text, &cancel);
    tokio::pin!(turn);
    tokio::select! {
        result = &mut turn => result,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            turn.await
        }
    }
}

/// Chat with the model
pub async fn chat_command(message: Option<String>, thread: Option<String>) -> Result<()> {
    let config = Config::load().await?;
    let engine = build_engine(&config).await?;

    let mut thread = match thread {
        Some(thread) => thread,
        None => engine.new_thread().await?,
    };

    if let Some(message) = message {
        let reply = engine.submit(&thread, &message).await?;
        println!("{}", reply);
        return Ok(());
    }

    println!(
        "confab - model {}, {} tools enabled",
        engine.model(),
        engine.status().enabled
    );
    println!("Thread {} (type /help for commands)", thread);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        // Ctrl-C at the prompt leaves like /quit
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        let Some(line) = line else {
            break;
        };

        match parse_input(&line) {
            Input::Empty => continue,
            Input::Quit => break,
            Input::Help => println!("{}", HELP),
            Input::Tools => print_tools(&engine),
            Input::History => print_history(&engine.get_history(&thread).await?),
            Input::NewThread => {
                thread = engine.new_thread().await?;
                println!("Thread {}", thread);
            }
            Input::Unknown(command) => println!("Unknown command {}; try /help", command),
            Input::Message(text) => match run_turn(&engine, &thread, &text).await {
                Ok(reply) => println!("\n{}\n", reply),
                Err(EngineError::Cancelled) => println!("\n(cancelled)\n"),
                Err(e @ EngineError::TurnLimitExceeded { .. }) => {
                    warn!("{}", e);
                    println!("\n({}; send another message to continue)\n", e);
                }
                Err(e) => println!("\nError: {}\n", e),
            },
        }
    }

    println!("Thread {} saved.", thread);
    Ok(())
}

/// Show config and tool catalog status
pub async fn status_command() -> Result<()> {
    let config_path = confab_config::config_path();
    println!("confab status");
    println!(
        "Config:     {} {}",
        config_path.display(),
        if config_path.exists() { "[OK]" } else { "[Missing]" }
    );

    let config = Config::load().await?;
    println!("Model:      {}", config.model.model);
    println!("Endpoint:   {}", config.model.api_base);
    println!(
        "Threads:    {}",
        match config.checkpoint.backend {
            CheckpointBackend::Memory => "in memory".to_string(),
            CheckpointBackend::File => config.checkpoint_dir().display().to_string(),
        }
    );

    if !config.tools.enabled {
        println!("Tools:      disabled");
        return Ok(());
    }

    let manager = build_catalog(&config)?;
    discover_tools(&config, &manager).await;
    let status = manager.status();
    println!("Tools:      {}", status.summary());
    for (provider, detail) in &status.providers {
        println!(
            "  {} ({}): {}",
            provider,
            detail.enabled_count,
            if detail.enabled_tools.is_empty() {
                "-".to_string()
            } else {
                detail.enabled_tools.join(", ")
            }
        );
    }
    for provider in &status.unreachable {
        println!("  {} unreachable", provider);
    }
    Ok(())
}

/// Print the messages of a thread
pub async fn history_command(thread: String) -> Result<()> {
    let config = Config::load().await?;
    if config.checkpoint.backend == CheckpointBackend::Memory {
        println!("Threads are kept in memory; nothing is saved between runs.");
        return Ok(());
    }
    let store = open_store(&config)?;
    print_history(&store.load(&thread).await?);
    Ok(())
}

/// List saved threads
pub async fn threads_command() -> Result<()> {
    let config = Config::load().await?;
    let store = open_store(&config)?;
    let threads = store.list_threads().await?;
    if threads.is_empty() {
        println!("No threads");
    }
    for thread in threads {
        println!("{}", thread);
    }
    Ok(())
}
