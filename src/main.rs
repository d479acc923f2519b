use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use scai::chat::{conversation_to_wire, extract_text, new_chat_id, upload_files};
use scai::cli::{Cli, Commands};
use scai::config::{self, AppConfig};
use scai::run::transport::build_http_client;
use scai::run::{AgentRunner, ChatMessage, HttpTransport, RunEvent, RunJournal, RunStatus};
use scai::terminal::{SessionEnd, StdoutSurface, attach};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The dashboard owns the screen, so only warnings get through by default.
    let default_level = match cli.command {
        Commands::Dashboard { .. } => "warn",
        _ => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = config::load_config(&cli.backend)?;
    tracing::debug!(backend = %config.backend_url, terminal = %config.terminal_url, "Config loaded");

    match &cli.command {
        Commands::Run {
            no_terminal,
            conversation,
            ..
        } => {
            let prompt = cli.command.prompt().unwrap_or_default();
            let history = load_history(conversation.as_deref())?;
            run_headless(&config, prompt, history, *no_terminal).await?;
        }
        Commands::Dashboard { conversation, .. } => {
            let prompt = cli.command.prompt().unwrap_or_default();
            let history = load_history(conversation.as_deref())?;
            scai::tui::run_dashboard(&config, prompt, history).await?;
        }
        Commands::Terminal => attach_console(&config).await?,
        Commands::Upload { chat_id, files } => {
            let chat_id = chat_id.clone().unwrap_or_else(new_chat_id);
            let client = build_http_client(&config)?;
            let uploaded = upload_files(&client, &config.backend_url, &chat_id, files).await?;

            println!("Chat {chat_id}: {} file(s) uploaded", uploaded.len());
            for file in uploaded {
                println!("  {} -> {}", file.name, file.path);
            }
        }
        Commands::Extract { file } => print_extracted(file)?,
    }

    Ok(())
}

/// Read a saved conversation to send ahead of the prompt.
fn load_history(path: Option<&Path>) -> anyhow::Result<Vec<ChatMessage>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let conversation = read_json(path)?;
    let history = conversation_to_wire(&conversation);
    tracing::debug!(path = %path.display(), messages = history.len(), "Conversation loaded");
    Ok(history)
}

/// Stream a run to the console. Ctrl+C cancels it.
async fn run_headless(
    config: &AppConfig,
    prompt: String,
    mut history: Vec<ChatMessage>,
    no_terminal: bool,
) -> anyhow::Result<()> {
    let transport = HttpTransport::new(config)?;
    let runner = Arc::new(AgentRunner::new(transport, CancellationToken::new()));

    let terminal = (!no_terminal).then(|| attach(config, StdoutSurface::inline()));

    let mut journal = match &config.run_log_dir {
        Some(dir) => {
            let mut journal = RunJournal::create(dir)?;
            journal.run_start(&config.backend_url, &prompt)?;
            eprintln!("Journal: {}", journal.path().display());
            Some(journal)
        }
        None => None,
    };

    let interrupt = {
        let runner = Arc::clone(&runner);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nCancelling run...");
                if let Err(e) = runner.cancel_run().await {
                    tracing::warn!(error = %e, "Cancel failed");
                }
            }
        })
    };

    eprintln!("Starting run against {}", config.backend_url);
    history.push(ChatMessage::user(prompt));
    let result = runner
        .start_run_with(&history, |event| {
            if let Some(journal) = journal.as_mut() {
                if let Err(e) = journal.event(event) {
                    tracing::warn!(error = %e, "Failed to write journal entry");
                }
            }
            print_event(event);
        })
        .await;
    interrupt.abort();

    if let Some(terminal) = terminal {
        terminal.detach();
    }

    let state = runner.snapshot();
    if let Some(journal) = journal.as_mut() {
        journal.run_end(state.run_id.as_deref(), state.status, state.error.as_deref())?;
    }

    let run_id = result?;
    eprintln!(
        "Run {run_id} {}: {} tool call(s), {} decision(s)",
        state.status.to_string().to_lowercase(),
        state.traces.len(),
        state.decisions.len()
    );

    if state.status == RunStatus::Failed {
        anyhow::bail!("Run failed: {}", state.error.unwrap_or_default());
    }
    Ok(())
}

fn print_event(event: &RunEvent) {
    match event {
        RunEvent::AgentThinking { text } => eprintln!("\u{25CB} {text}"),
        RunEvent::ToolStart { tool, .. } => eprintln!("\u{25B6} {tool}"),
        RunEvent::ToolEnd {
            tool,
            exit_code,
            success,
            duration,
            ..
        } => {
            let mark = if *success { "\u{2714}" } else { "\u{2718}" };
            let exit = exit_code.map_or_else(|| "-".to_string(), |c| c.to_string());
            eprintln!("{mark} {tool} exit {exit} ({duration:.0} ms)");
        }
        RunEvent::AgentDecision { decision, .. } => eprintln!("\u{25C6} {decision}"),
        RunEvent::AgentPause { guidance } => {
            eprintln!("\u{23F8} paused: {}", guidance.as_deref().unwrap_or("waiting for guidance"));
        }
        RunEvent::AgentFinish { summary } => {
            eprintln!("\u{2605} finished: {}", summary.as_deref().unwrap_or(""));
        }
        RunEvent::AgentError { error } => {
            eprintln!("\u{2716} error: {}", error.as_deref().unwrap_or("unknown agent error"));
        }
        RunEvent::Unknown => {}
    }
}

/// Bridge the backend terminal to this console until the socket ends.
///
/// Input is line-buffered by the local tty; newlines are sent as carriage
/// returns the way a terminal's Enter key does.
async fn attach_console(config: &AppConfig) -> anyhow::Result<()> {
    let handle = attach(config, StdoutSurface::fullscreen());
    let mut stdin = tokio::io::stdin();
    let mut buf = [0u8; 1024];

    let end = loop {
        tokio::select! {
            read = stdin.read(&mut buf) => {
                let n = read.context("reading stdin")?;
                if n == 0 {
                    handle.detach();
                    break handle.join().await;
                }
                let text = String::from_utf8_lossy(&buf[..n]).replace('\n', "\r");
                if handle.send_input(text).is_err() {
                    break handle.join().await;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                handle.detach();
                break handle.join().await;
            }
        }
    };

    match end {
        SessionEnd::Failed(e) => Err(e.into()),
        SessionEnd::Closed | SessionEnd::Detached => Ok(()),
    }
}

fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn print_extracted(path: &Path) -> anyhow::Result<()> {
    println!("{}", extract_text(&read_json(path)?));
    Ok(())
}
