use mockito::Matcher;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use scai::config::{AppConfig, PartialConfig};
use scai::error::{RunError, TransportError};
use scai::run::{AgentRunner, ChatMessage, HttpTransport, RunStatus, RunTransport};

// ─── Helper ───────────────────────────────────────────────────────────

fn test_config(url: &str) -> AppConfig {
    PartialConfig {
        backend_url: Some(url.to_string()),
        session_id: Some("sess-123".to_string()),
        ..PartialConfig::default()
    }
    .finalize()
}

fn runner_for(url: &str) -> AgentRunner<HttpTransport> {
    let transport = HttpTransport::new(&test_config(url)).expect("client builds");
    AgentRunner::new(transport, CancellationToken::new())
}

// ============================================================
// Run stream over HTTP
// ============================================================

#[tokio::test]
async fn test_run_streams_tool_end_then_done() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/agent/run")
        .match_header("cookie", "snowflake_session_id=sess-123")
        .match_body(Matcher::PartialJson(json!({
            "messages": [{"role": "user", "content": "convert load.bteq"}]
        })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_header("x-run-id", "run-42")
        .with_body(concat!(
            ": ping\n\n",
            "data: {\"type\":\"tool-end\",\"tool\":\"convert\",\"args\":{},\"exitCode\":0,\"success\":true,\"duration\":120}\n\n",
            "data: [DONE]\n\n",
        ))
        .create_async()
        .await;

    let runner = runner_for(&server.url());
    let run_id = runner
        .start_run(&[ChatMessage::user("convert load.bteq")])
        .await
        .unwrap();

    let state = runner.snapshot();
    assert_eq!(run_id, "run-42");
    assert_eq!(state.run_id.as_deref(), Some("run-42"));
    assert_eq!(state.status, RunStatus::Finished);
    assert_eq!(state.traces.len(), 1);
    assert_eq!(state.traces[0].tool, "convert");
    assert!(state.traces[0].success);
    assert!((state.traces[0].duration_ms - 120.0).abs() < f64::EPSILON);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_run_records_decisions_and_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/agent/run")
        .with_status(200)
        .with_header("x-run-id", "run-7")
        .with_body(concat!(
            "data: {\"type\":\"agent-decision\",\"decision\":{\"action\":\"run_command\"},\"rawResponse\":\"{}\"}\n\n",
            "data: {not json}\n\n",
            "data: {\"type\":\"agent-decision\",\"decision\":{\"action\":\"finish\"}}\n\n",
            "data: {\"type\":\"agent-error\",\"error\":\"LLM call failed\"}\n\n",
            "data: [DONE]\n\n",
        ))
        .create_async()
        .await;

    let runner = runner_for(&server.url());
    runner.start_run(&[ChatMessage::user("go")]).await.unwrap();

    let state = runner.snapshot();
    assert_eq!(state.decisions.len(), 2);
    assert_eq!(state.decisions[0].decision["action"], "run_command");
    assert_eq!(state.decisions[1].decision["action"], "finish");
    assert_eq!(state.status, RunStatus::Failed);
    assert_eq!(state.error.as_deref(), Some("LLM call failed"));
}

#[tokio::test]
async fn test_run_without_run_id_header_fails() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/agent/run")
        .with_status(200)
        .with_body("data: [DONE]\n\n")
        .create_async()
        .await;

    let runner = runner_for(&server.url());
    let err = runner.start_run(&[]).await.unwrap_err();

    assert!(matches!(err, RunError::MissingRunId));
    assert_eq!(runner.status(), RunStatus::Failed);
}

#[tokio::test]
async fn test_run_http_error_is_surfaced_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/agent/run")
        .with_status(503)
        .with_body("backend busy")
        .expect(1)
        .create_async()
        .await;

    let runner = runner_for(&server.url());
    let err = runner.start_run(&[]).await.unwrap_err();

    match err {
        RunError::Transport(TransportError::Status { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "backend busy");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let state = runner.snapshot();
    assert_eq!(state.status, RunStatus::Failed);
    assert!(state.error.unwrap().contains("503"));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_backend_fails_run() {
    // Nothing listens on the discard port.
    let runner = runner_for("http://127.0.0.1:9");
    let err = runner.start_run(&[]).await.unwrap_err();

    assert!(matches!(err, RunError::Transport(TransportError::Request { .. })));
    assert_eq!(runner.status(), RunStatus::Failed);
}

// ============================================================
// Control endpoints
// ============================================================

#[tokio::test]
async fn test_pause_returns_guidance() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/agent/run-42/pause")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": true, "guidance": "Upload the DDL for STAGING"}"#)
        .create_async()
        .await;

    let transport = HttpTransport::new(&test_config(&server.url())).unwrap();
    let reply = transport.pause("run-42").await.unwrap();

    assert!(reply.success);
    assert_eq!(reply.guidance.as_deref(), Some("Upload the DDL for STAGING"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_resume_and_cancel_post_to_run() {
    let mut server = mockito::Server::new_async().await;
    let resume = server
        .mock("POST", "/api/agent/run-42/resume")
        .with_status(200)
        .with_body(r#"{"success": true}"#)
        .create_async()
        .await;
    let cancel = server
        .mock("POST", "/api/agent/run-42/cancel")
        .with_status(200)
        .with_body(r#"{"success": false}"#)
        .create_async()
        .await;

    let transport = HttpTransport::new(&test_config(&server.url())).unwrap();
    assert!(transport.resume("run-42").await.unwrap().success);
    assert!(!transport.cancel("run-42").await.unwrap().success);

    resume.assert_async().await;
    cancel.assert_async().await;
}

#[tokio::test]
async fn test_control_with_bad_body_is_decode_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/agent/run-1/resume")
        .with_status(200)
        .with_body("<html>oops</html>")
        .create_async()
        .await;

    let transport = HttpTransport::new(&test_config(&server.url())).unwrap();
    let err = transport.resume("run-1").await.unwrap_err();
    assert!(matches!(err, TransportError::Decode(_)));
}

#[tokio::test]
async fn test_rejected_pause_leaves_status() {
    let mut server = mockito::Server::new_async().await;
    let _run = server
        .mock("POST", "/api/agent/run")
        .with_status(200)
        .with_header("x-run-id", "run-5")
        .with_body("data: [DONE]\n\n")
        .create_async()
        .await;
    let _pause = server
        .mock("POST", "/api/agent/run-5/pause")
        .with_status(200)
        .with_body(r#"{"success": false}"#)
        .create_async()
        .await;

    let runner = runner_for(&server.url());
    runner.start_run(&[]).await.unwrap();

    let err = runner.pause_run().await.unwrap_err();
    assert!(matches!(err, RunError::Rejected { action: "pause", .. }));
    assert_eq!(runner.status(), RunStatus::Finished);
}
