//! The agent run tracker.
//!
//! [`AgentRunner`] owns exactly one run at a time. It opens the run stream
//! through an injected [`RunTransport`], applies each decoded frame to the
//! shared [`RunState`], and hands every event to a caller-supplied callback.
//!
//! **Cancellation model:** each run gets a child of the root
//! [`CancellationToken`] passed to [`AgentRunner::new`]. Firing it makes the
//! pending read (or the pending request) lose its `select!`, and the run is
//! marked cancelled. The backend is told separately and never awaited for
//! confirmation.
//!
//! **Superseding:** starting a new run bumps a generation counter and cancels
//! the previous token. A stale stream that is still unwinding cannot touch
//! the new run's state because every update is checked against the
//! generation it was started with.

use std::pin::pin;
use std::sync::{Mutex, MutexGuard};

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::sse::frames;
use super::state::RunState;
use super::transport::RunTransport;
use super::types::{ChatMessage, Frame, RunEvent, RunId, RunStatus};
use crate::error::RunError;

struct RunnerInner {
    state: RunState,
    generation: u64,
    cancel: Option<CancellationToken>,
}

/// Tracks a single streamed agent run. Wrap in `Arc` to drive control
/// operations from another task while a run streams.
pub struct AgentRunner<T: RunTransport> {
    transport: T,
    root_cancel: CancellationToken,
    inner: Mutex<RunnerInner>,
}

impl<T: RunTransport> AgentRunner<T> {
    /// Create a runner over `transport`. Cancelling `root_cancel` cancels
    /// whatever run is in flight.
    pub fn new(transport: T, root_cancel: CancellationToken) -> Self {
        Self {
            transport,
            root_cancel,
            inner: Mutex::new(RunnerInner {
                state: RunState::default(),
                generation: 0,
                cancel: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunnerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply `f` to the run state if `generation` is still current.
    fn update(&self, generation: u64, f: impl FnOnce(&mut RunState)) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        f(&mut inner.state);
        true
    }

    /// Clone of the current run state.
    pub fn snapshot(&self) -> RunState {
        self.lock().state.clone()
    }

    pub fn status(&self) -> RunStatus {
        self.lock().state.status
    }

    pub fn run_id(&self) -> Option<RunId> {
        self.lock().state.run_id.clone()
    }

    /// [`Self::start_run_with`] without an event callback.
    pub async fn start_run(&self, messages: &[ChatMessage]) -> Result<RunId, RunError> {
        self.start_run_with(messages, |_| {}).await
    }

    /// Start a new run and stream it to completion.
    ///
    /// Resets all run state, sends `messages`, records the run id from the
    /// response, then reads the body incrementally. Every parsed event is
    /// applied to the state first and then passed to `on_event`.
    ///
    /// Returns the run id once the stream has been opened, whatever status the
    /// run ends in. Fails with [`RunError::Cancelled`] if cancelled before the
    /// stream opened, [`RunError::MissingRunId`] if the backend sent no id, and
    /// [`RunError::Transport`] on any network failure (status becomes failed).
    pub async fn start_run_with<F>(
        &self,
        messages: &[ChatMessage],
        mut on_event: F,
    ) -> Result<RunId, RunError>
    where
        F: FnMut(&RunEvent) + Send,
    {
        let (generation, token) = {
            let mut inner = self.lock();
            if let Some(previous) = inner.cancel.take() {
                previous.cancel();
            }
            inner.generation += 1;
            inner.state = RunState::running();
            let token = self.root_cancel.child_token();
            inner.cancel = Some(token.clone());
            (inner.generation, token)
        };

        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => {
                self.update(generation, |s| {
                    s.transition(RunStatus::Cancelled);
                });
                tracing::info!("Run cancelled before the stream opened");
                return Err(RunError::Cancelled);
            }
            opened = self.transport.start(messages) => opened,
        };

        let response = match opened {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to start run");
                self.update(generation, |s| {
                    s.fail(e.to_string());
                });
                return Err(e.into());
            }
        };

        let Some(run_id) = response.run_id else {
            tracing::warn!("Run response carried no run id");
            self.update(generation, |s| {
                s.fail(RunError::MissingRunId.to_string());
            });
            return Err(RunError::MissingRunId);
        };

        self.update(generation, |s| s.run_id = Some(run_id.clone()));
        tracing::info!(run_id = %run_id, "Run stream opened");

        let mut stream = pin!(frames(response.body));
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    self.update(generation, |s| {
                        s.transition(RunStatus::Cancelled);
                    });
                    tracing::info!(run_id = %run_id, "Run stream cancelled");
                    break;
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(frame)) => {
                    if !self.update(generation, |s| s.apply_frame(&frame)) {
                        tracing::debug!(run_id = %run_id, "Run superseded, dropping stream");
                        break;
                    }
                    match frame {
                        Frame::Event(event) => {
                            tracing::debug!(run_id = %run_id, kind = event.kind(), "Run event");
                            on_event(&event);
                        }
                        Frame::Done => break,
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(run_id = %run_id, error = %e, "Run stream failed");
                    self.update(generation, |s| {
                        s.fail(e.to_string());
                    });
                    self.release(generation);
                    return Err(e.into());
                }
                None => {
                    // Body ended without the sentinel; treat it as one.
                    self.update(generation, |s| s.apply_frame(&Frame::Done));
                    break;
                }
            }
        }

        self.release(generation);
        tracing::info!(run_id = %run_id, status = %self.status(), "Run stream closed");
        Ok(run_id)
    }

    /// Drop the run's token once its stream is over, if it is still current.
    fn release(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation {
            inner.cancel = None;
        }
    }

    /// Ask the backend to pause the run.
    ///
    /// On success the run moves to paused and the returned guidance is stored
    /// and returned. A rejected or failed request leaves state unchanged.
    pub async fn pause_run(&self) -> Result<Option<String>, RunError> {
        let (run_id, generation) = self.current()?;
        let reply = self.transport.pause(&run_id).await?;
        if !reply.success {
            return Err(RunError::Rejected {
                action: "pause",
                run_id,
            });
        }

        self.update(generation, |s| {
            s.pause(reply.guidance.clone());
        });
        tracing::info!(run_id = %run_id, "Run paused");
        Ok(reply.guidance)
    }

    /// Ask the backend to resume a paused run; clears guidance on success.
    pub async fn resume_run(&self) -> Result<(), RunError> {
        let (run_id, generation) = self.current()?;
        let reply = self.transport.resume(&run_id).await?;
        if !reply.success {
            return Err(RunError::Rejected {
                action: "resume",
                run_id,
            });
        }

        self.update(generation, |s| {
            s.resume();
        });
        tracing::info!(run_id = %run_id, "Run resumed");
        Ok(())
    }

    /// Cancel the current run.
    ///
    /// With no run id this is an immediate no-op that leaves the runner idle
    /// (a start still waiting for its response is abandoned). Otherwise the
    /// run is marked cancelled locally, the in-flight read is aborted, and
    /// the backend is notified; a failed notification is only logged.
    pub async fn cancel_run(&self) -> Result<(), RunError> {
        let (run_id, token) = {
            let mut inner = self.lock();
            let token = inner.cancel.take();

            let Some(run_id) = inner.state.run_id.clone() else {
                if let Some(token) = token {
                    token.cancel();
                }
                inner.generation += 1;
                inner.state = RunState::default();
                return Ok(());
            };

            if !inner.state.transition(RunStatus::Cancelled) {
                // Already finished, failed or cancelled.
                return Ok(());
            }
            (run_id, token)
        };

        if let Some(token) = token {
            token.cancel();
        }

        match self.transport.cancel(&run_id).await {
            Ok(reply) if reply.success => {
                tracing::info!(run_id = %run_id, "Run cancelled");
            }
            Ok(_) => {
                tracing::warn!(run_id = %run_id, "Backend did not confirm cancellation");
            }
            Err(e) => {
                tracing::warn!(run_id = %run_id, error = %e, "Cancel request failed");
            }
        }
        Ok(())
    }

    fn current(&self) -> Result<(RunId, u64), RunError> {
        let inner = self.lock();
        inner
            .state
            .run_id
            .clone()
            .map(|id| (id, inner.generation))
            .ok_or(RunError::NoActiveRun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use bytes::Bytes;
    use futures::stream;

    use crate::error::TransportError;
    use crate::run::sse::ByteStream;
    use crate::run::transport::{ControlReply, PauseReply, RunResponse};

    /// In-memory transport: serves one canned body per start call.
    struct FakeTransport {
        run_id: Option<String>,
        bodies: Mutex<Vec<ByteStream>>,
        guidance: Option<String>,
        cancels: AtomicUsize,
    }

    impl FakeTransport {
        fn new(bodies: Vec<ByteStream>) -> Self {
            Self {
                run_id: Some("run-1".into()),
                bodies: Mutex::new(bodies),
                guidance: Some("Upload the DDL first".into()),
                cancels: AtomicUsize::new(0),
            }
        }
    }

    impl RunTransport for FakeTransport {
        async fn start(&self, _messages: &[ChatMessage]) -> Result<RunResponse, TransportError> {
            let body = self
                .bodies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Box::pin(stream::empty()));
            Ok(RunResponse {
                run_id: self.run_id.clone(),
                body,
            })
        }

        async fn pause(&self, _run_id: &str) -> Result<PauseReply, TransportError> {
            Ok(PauseReply {
                success: true,
                guidance: self.guidance.clone(),
            })
        }

        async fn resume(&self, _run_id: &str) -> Result<ControlReply, TransportError> {
            Ok(ControlReply { success: true })
        }

        async fn cancel(&self, _run_id: &str) -> Result<ControlReply, TransportError> {
            self.cancels.fetch_add(1, Ordering::SeqCst);
            Ok(ControlReply { success: true })
        }
    }

    fn body(text: &str) -> ByteStream {
        Box::pin(stream::iter(vec![Ok(Bytes::from(text.to_string()))]))
    }

    /// A body that sends one record and then stalls forever.
    fn stalled(text: &str) -> ByteStream {
        Box::pin(
            stream::iter(vec![Ok(Bytes::from(text.to_string()))]).chain(stream::pending()),
        )
    }

    fn runner(bodies: Vec<ByteStream>) -> AgentRunner<FakeTransport> {
        AgentRunner::new(FakeTransport::new(bodies), CancellationToken::new())
    }

    async fn wait_for(runner: &AgentRunner<FakeTransport>, f: impl Fn(&RunState) -> bool) {
        for _ in 0..200 {
            if f(&runner.snapshot()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached: {:?}", runner.snapshot());
    }

    #[tokio::test]
    async fn tool_end_then_done_finishes() {
        let runner = runner(vec![body(
            "data: {\"type\":\"tool-end\",\"tool\":\"convert\",\"exitCode\":0,\"success\":true,\"duration\":120}\n\ndata: [DONE]\n\n",
        )]);

        let run_id = runner.start_run(&[ChatMessage::user("go")]).await.unwrap();
        let state = runner.snapshot();

        assert_eq!(run_id, "run-1");
        assert_eq!(state.status, RunStatus::Finished);
        assert_eq!(state.traces.len(), 1);
        assert_eq!(state.traces[0].tool, "convert");
        assert!(state.traces[0].success);
        assert_eq!(state.traces[0].exit_code, Some(0));
    }

    #[tokio::test]
    async fn callback_sees_every_event_in_order() {
        let runner = runner(vec![body(concat!(
            "data: {\"type\":\"agent-thinking\",\"text\":\"Deciding next action...\"}\n",
            "data: {\"type\":\"agent-decision\",\"decision\":{\"action\":\"finish\"}}\n",
            "data: {\"type\":\"agent-finish\",\"summary\":\"done\"}\n",
            "data: [DONE]\n",
        ))]);

        let mut kinds = Vec::new();
        runner
            .start_run_with(&[ChatMessage::user("go")], |e| kinds.push(e.kind()))
            .await
            .unwrap();

        assert_eq!(kinds, vec!["agent-thinking", "agent-decision", "agent-finish"]);
        assert_eq!(runner.snapshot().summary.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn agent_error_before_done_fails() {
        let runner = runner(vec![body(
            "data: {\"type\":\"agent-error\",\"error\":\"LLM call failed\"}\n\ndata: [DONE]\n\n",
        )]);

        runner.start_run(&[]).await.unwrap();
        let state = runner.snapshot();
        assert_eq!(state.status, RunStatus::Failed);
        assert_eq!(state.error.as_deref(), Some("LLM call failed"));
    }

    #[tokio::test]
    async fn missing_run_id_fails() {
        let mut transport = FakeTransport::new(vec![body("data: [DONE]\n")]);
        transport.run_id = None;
        let runner = AgentRunner::new(transport, CancellationToken::new());

        let err = runner.start_run(&[]).await.unwrap_err();
        assert!(matches!(err, RunError::MissingRunId));
        assert_eq!(runner.status(), RunStatus::Failed);
    }

    #[tokio::test]
    async fn body_without_sentinel_finishes() {
        let runner = runner(vec![body("data: {\"type\":\"agent-thinking\",\"text\":\"x\"}\n")]);
        runner.start_run(&[]).await.unwrap();
        assert_eq!(runner.status(), RunStatus::Finished);
    }

    #[tokio::test]
    async fn new_run_clears_previous_lists() {
        let runner = runner(vec![
            body("data: [DONE]\n"),
            body("data: {\"type\":\"tool-end\",\"tool\":\"a\",\"success\":true}\ndata: [DONE]\n"),
        ]);

        runner.start_run(&[]).await.unwrap();
        assert_eq!(runner.snapshot().traces.len(), 1);

        runner.start_run(&[]).await.unwrap();
        assert!(runner.snapshot().traces.is_empty());
    }

    #[tokio::test]
    async fn cancel_without_run_is_idle() {
        let runner = runner(vec![]);
        runner.cancel_run().await.unwrap();
        assert_eq!(runner.snapshot(), RunState::default());
        assert_eq!(runner.transport.cancels.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancel_aborts_stalled_stream() {
        let runner = Arc::new(runner(vec![stalled(
            "data: {\"type\":\"tool-end\",\"tool\":\"convert\",\"success\":true}\n",
        )]));

        let task = {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move { runner.start_run(&[]).await })
        };
        wait_for(&runner, |s| s.traces.len() == 1).await;

        runner.cancel_run().await.unwrap();
        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("stream should stop after cancel")
            .unwrap();

        assert_eq!(result.unwrap(), "run-1");
        let state = runner.snapshot();
        assert_eq!(state.status, RunStatus::Cancelled);
        assert_eq!(state.traces.len(), 1);
        assert_eq!(runner.transport.cancels.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_after_finish_is_noop() {
        let runner = runner(vec![body("data: [DONE]\n")]);
        runner.start_run(&[]).await.unwrap();

        runner.cancel_run().await.unwrap();
        assert_eq!(runner.status(), RunStatus::Finished);
        assert_eq!(runner.transport.cancels.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pause_and_resume_round_trip() {
        let runner = Arc::new(runner(vec![stalled(
            "data: {\"type\":\"agent-thinking\",\"text\":\"x\"}\n",
        )]));
        let task = {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move { runner.start_run(&[]).await })
        };
        wait_for(&runner, |s| s.run_id.is_some()).await;

        let guidance = runner.pause_run().await.unwrap();
        assert_eq!(guidance.as_deref(), Some("Upload the DDL first"));
        let state = runner.snapshot();
        assert_eq!(state.status, RunStatus::Paused);
        assert_eq!(state.guidance.as_deref(), Some("Upload the DDL first"));

        runner.resume_run().await.unwrap();
        let state = runner.snapshot();
        assert_eq!(state.status, RunStatus::Running);
        assert!(state.guidance.is_none());

        runner.cancel_run().await.unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn control_without_run_errors() {
        let runner = runner(vec![]);
        assert!(matches!(runner.pause_run().await, Err(RunError::NoActiveRun)));
        assert!(matches!(runner.resume_run().await, Err(RunError::NoActiveRun)));
    }

    #[tokio::test]
    async fn root_cancel_stops_run() {
        let root = CancellationToken::new();
        let runner = Arc::new(AgentRunner::new(
            FakeTransport::new(vec![stalled("data: {\"type\":\"agent-thinking\",\"text\":\"x\"}\n")]),
            root.clone(),
        ));
        let task = {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move { runner.start_run(&[]).await })
        };
        wait_for(&runner, |s| s.run_id.is_some()).await;

        root.cancel();
        task.await.unwrap().unwrap();
        assert_eq!(runner.status(), RunStatus::Cancelled);
    }
}
