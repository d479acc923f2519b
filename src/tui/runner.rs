//! Dashboard main loop: terminal lifecycle, event multiplexing, render tick.
//!
//! [`run_dashboard`] starts the agent run on a background task, attaches the
//! agent terminal, and runs a `tokio::select!` loop over run events, terminal
//! output, keyboard input, control results and render ticks.

use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{Event, EventStream};
use futures::StreamExt;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::run::{AgentRunner, ChatMessage, HttpTransport, RunJournal, RunStatus};
use crate::terminal::{ChannelSurface, SessionKey, TerminalSessions};
use crate::tui::app_state::AppState;
use crate::tui::event::{ControlSignal, DashboardEvent};
use crate::tui::input::handle_key_event;
use crate::tui::ui::render_ui;

type Runner = AgentRunner<HttpTransport>;

/// Run the dashboard until the user quits.
///
/// The terminal is restored on normal exit and on panic (ratatui's hook).
/// Quitting cancels a live run before returning.
pub async fn run_dashboard(
    config: &AppConfig,
    prompt: String,
    history: Vec<ChatMessage>,
) -> anyhow::Result<()> {
    let transport = HttpTransport::new(config)?;
    let root_cancel = CancellationToken::new();
    let runner = Arc::new(AgentRunner::new(transport, root_cancel.clone()));

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<DashboardEvent>();
    let (control_tx, mut control_rx) = mpsc::unbounded_channel::<ControlSignal>();
    let (surface_tx, mut surface_rx) = mpsc::unbounded_channel();

    let sessions = TerminalSessions::new();
    sessions.attach(SessionKey::AgentRun, config, ChannelSurface::new(surface_tx));

    spawn_run(Arc::clone(&runner), config, prompt, history, event_tx.clone());

    let mut terminal = ratatui::init();
    let mut app_state = AppState::new();
    let mut key_stream = EventStream::new();
    let mut tick_interval = tokio::time::interval(Duration::from_millis(50));

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                app_state.apply_event(event);
            }

            Some(update) = surface_rx.recv() => {
                app_state.apply_event(DashboardEvent::Terminal(update));
            }

            Some(signal) = control_rx.recv() => {
                if signal == ControlSignal::Quit {
                    break;
                }
                dispatch_control(signal, &runner, &sessions, &event_tx);
            }

            Some(Ok(term_event)) = key_stream.next() => match term_event {
                Event::Key(key) => {
                    if handle_key_event(key, &mut app_state, &control_tx) {
                        break;
                    }
                }
                Event::Resize(cols, rows) => {
                    if let Err(e) = sessions.resize(&SessionKey::AgentRun, cols, rows) {
                        tracing::debug!(error = %e, "Terminal resize not sent");
                    }
                }
                _ => {}
            },

            _ = tick_interval.tick() => {
                app_state.sync_run(&runner.snapshot());
                terminal.draw(|frame| render_ui(&app_state, frame))?;
            }
        }
    }

    ratatui::restore();

    if let Err(e) = runner.cancel_run().await {
        tracing::warn!(error = %e, "Cancel on quit failed");
    }
    root_cancel.cancel();
    sessions.detach_all();

    Ok(())
}

/// Start the run on a background task, forwarding its events to the loop.
fn spawn_run(
    runner: Arc<Runner>,
    config: &AppConfig,
    prompt: String,
    mut history: Vec<ChatMessage>,
    event_tx: UnboundedSender<DashboardEvent>,
) {
    let backend = config.backend_url.clone();
    let mut journal = config.run_log_dir.as_deref().and_then(|dir| {
        RunJournal::create(dir)
            .inspect_err(|e| tracing::warn!(error = %e, "Run journal disabled"))
            .ok()
    });

    tokio::spawn(async move {
        if let Some(journal) = journal.as_mut() {
            if let Err(e) = journal.run_start(&backend, &prompt) {
                tracing::warn!(error = %e, "Failed to write journal entry");
            }
        }
        let _ = event_tx.send(DashboardEvent::notice(format!("Starting run against {backend}")));

        history.push(ChatMessage::user(prompt));
        let result = runner
            .start_run_with(&history, |event| {
                if let Some(journal) = journal.as_mut() {
                    if let Err(e) = journal.event(event) {
                        tracing::warn!(error = %e, "Failed to write journal entry");
                    }
                }
                let _ = event_tx.send(DashboardEvent::Run(event.clone()));
            })
            .await;

        let state = runner.snapshot();
        if let Some(journal) = journal.as_mut() {
            if let Err(e) =
                journal.run_end(state.run_id.as_deref(), state.status, state.error.as_deref())
            {
                tracing::warn!(error = %e, "Failed to write journal entry");
            }
        }

        let notice = match result {
            Ok(_) if state.status == RunStatus::Failed => {
                DashboardEvent::error(format!("Run failed: {}", state.error.unwrap_or_default()))
            }
            Ok(_) => DashboardEvent::notice(format!("Run {}", state.status.to_string().to_lowercase())),
            Err(e) => DashboardEvent::error(format!("Run error: {e}")),
        };
        let _ = event_tx.send(notice);
    });
}

/// Carry out a control signal without blocking the render loop.
fn dispatch_control(
    signal: ControlSignal,
    runner: &Arc<Runner>,
    sessions: &TerminalSessions,
    event_tx: &UnboundedSender<DashboardEvent>,
) {
    if let ControlSignal::TerminalInput(data) = signal {
        if let Err(e) = sessions.send_input(&SessionKey::AgentRun, &data) {
            let _ = event_tx.send(DashboardEvent::error(e.to_string()));
        }
        return;
    }

    let runner = Arc::clone(runner);
    let event_tx = event_tx.clone();
    tokio::spawn(async move {
        let outcome = match signal {
            ControlSignal::Pause => runner.pause_run().await.map(|guidance| match guidance {
                Some(g) => format!("Paused: {g}"),
                None => "Paused".to_string(),
            }),
            ControlSignal::Resume => runner.resume_run().await.map(|()| "Resumed".to_string()),
            ControlSignal::Cancel => runner.cancel_run().await.map(|()| "Cancelled".to_string()),
            ControlSignal::TerminalInput(_) | ControlSignal::Quit => return,
        };

        let event = match outcome {
            Ok(message) => DashboardEvent::notice(message),
            Err(e) => DashboardEvent::error(e.to_string()),
        };
        let _ = event_tx.send(event);
    });
}
