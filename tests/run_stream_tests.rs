use std::io::BufRead;
use std::sync::Mutex;

use bytes::Bytes;
use futures::stream;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use scai::error::TransportError;
use scai::run::{
    AgentRunner, ByteStream, ChatMessage, ControlReply, PauseReply, RunJournal, RunResponse,
    RunStatus, RunTransport,
};

// ─── Helper ───────────────────────────────────────────────────────────

/// Serves a fixed body split into the given chunks.
struct ChunkedTransport {
    chunks: Mutex<Option<Vec<Vec<u8>>>>,
}

impl ChunkedTransport {
    fn new(body: &str, chunk_size: usize) -> Self {
        let chunks = body.as_bytes().chunks(chunk_size).map(<[u8]>::to_vec).collect();
        Self {
            chunks: Mutex::new(Some(chunks)),
        }
    }
}

impl RunTransport for ChunkedTransport {
    async fn start(&self, _messages: &[ChatMessage]) -> Result<RunResponse, TransportError> {
        let chunks = self.chunks.lock().unwrap().take().unwrap_or_default();
        let body: ByteStream = Box::pin(stream::iter(
            chunks.into_iter().map(|c| Ok(Bytes::from(c))),
        ));
        Ok(RunResponse {
            run_id: Some("run-1".into()),
            body,
        })
    }

    async fn pause(&self, _run_id: &str) -> Result<PauseReply, TransportError> {
        Ok(PauseReply::default())
    }

    async fn resume(&self, _run_id: &str) -> Result<ControlReply, TransportError> {
        Ok(ControlReply::default())
    }

    async fn cancel(&self, _run_id: &str) -> Result<ControlReply, TransportError> {
        Ok(ControlReply { success: true })
    }
}

fn tool_end_line(tool: &str, exit_code: i32) -> String {
    format!(
        "data: {{\"type\":\"tool-end\",\"tool\":\"{tool}\",\"args\":{{\"file\":\"{tool}.sql\"}},\"exitCode\":{exit_code},\"success\":{},\"duration\":{}}}\n\n",
        exit_code == 0,
        exit_code * 10 + 5
    )
}

// ============================================================
// Stream properties
// ============================================================

#[tokio::test]
async fn test_traces_match_records_regardless_of_chunking() {
    let mut body: String = ["convert", "validate", "deploy"]
        .iter()
        .enumerate()
        .map(|(i, tool)| tool_end_line(tool, i as i32))
        .collect();
    body.push_str("data: [DONE]\n\n");

    for chunk_size in [1, 3, 7, 64, body.len()] {
        let runner = AgentRunner::new(ChunkedTransport::new(&body, chunk_size), CancellationToken::new());
        runner.start_run(&[ChatMessage::user("go")]).await.unwrap();

        let state = runner.snapshot();
        assert_eq!(state.status, RunStatus::Finished, "chunk size {chunk_size}");
        let tools: Vec<_> = state.traces.iter().map(|t| t.tool.as_str()).collect();
        assert_eq!(tools, ["convert", "validate", "deploy"], "chunk size {chunk_size}");
        assert_eq!(state.traces[1].exit_code, Some(1));
        assert!(!state.traces[1].success);
        assert_eq!(state.traces[2].args["file"], "deploy.sql");
    }
}

#[tokio::test]
async fn test_tool_end_with_null_fields_still_counts() {
    let body = concat!(
        "data: {\"type\":\"tool-end\",\"tool\":\"convert\",\"success\":true,\"duration\":null}\n\n",
        "data: {\"type\":\"tool-end\",\"tool\":null,\"success\":false,\"duration\":40}\n\n",
        "data: {\"type\":\"tool-end\",\"tool\":\"pwsh\",\"success\":false,\"exitCode\":3221225477}\n\n",
        "data: [DONE]\n\n",
    );
    let runner = AgentRunner::new(ChunkedTransport::new(body, 16), CancellationToken::new());
    runner.start_run(&[]).await.unwrap();

    let state = runner.snapshot();
    assert_eq!(state.traces.len(), 3);
    assert_eq!(state.traces[0].duration_ms, 0.0);
    assert_eq!(state.traces[1].tool, "");
    assert_eq!(state.traces[2].exit_code, Some(3_221_225_477));
}

#[tokio::test]
async fn test_crlf_and_comments_are_tolerated() {
    let body = ": ping\r\n\r\nevent: message\r\ndata: {\"type\":\"agent-finish\",\"summary\":\"3 files converted\"}\r\n\r\ndata: [DONE]\r\n\r\n";
    let runner = AgentRunner::new(ChunkedTransport::new(body, 5), CancellationToken::new());
    runner.start_run(&[]).await.unwrap();

    let state = runner.snapshot();
    assert_eq!(state.status, RunStatus::Finished);
    assert_eq!(state.summary.as_deref(), Some("3 files converted"));
}

#[tokio::test]
async fn test_records_after_done_are_ignored() {
    let body = format!("data: [DONE]\n\n{}", tool_end_line("late", 0));
    let runner = AgentRunner::new(ChunkedTransport::new(&body, 4), CancellationToken::new());
    runner.start_run(&[]).await.unwrap();
    assert!(runner.snapshot().traces.is_empty());
}

#[tokio::test]
async fn test_cancel_before_any_run_is_idle() {
    let runner = AgentRunner::new(ChunkedTransport::new("", 1), CancellationToken::new());
    runner.cancel_run().await.unwrap();
    assert_eq!(runner.status(), RunStatus::Idle);
    assert!(runner.run_id().is_none());
}

// ============================================================
// Journal
// ============================================================

#[tokio::test]
async fn test_journal_records_dispatched_events() {
    let tmp = TempDir::new().unwrap();
    let mut journal = RunJournal::create(tmp.path()).unwrap();
    let body = format!("{}data: [DONE]\n\n", tool_end_line("convert", 0));
    let runner = AgentRunner::new(ChunkedTransport::new(&body, 16), CancellationToken::new());

    journal.run_start("http://localhost:8000", "convert").unwrap();
    runner
        .start_run_with(&[ChatMessage::user("convert")], |event| {
            journal.event(event).unwrap();
        })
        .await
        .unwrap();
    let state = runner.snapshot();
    journal
        .run_end(state.run_id.as_deref(), state.status, None)
        .unwrap();

    let file = std::fs::File::open(journal.path()).unwrap();
    let entries: Vec<serde_json::Value> = std::io::BufReader::new(file)
        .lines()
        .map(|l| serde_json::from_str(&l.unwrap()).unwrap())
        .collect();

    assert_eq!(entries.len(), 3);
    assert_eq!(entries[1]["event"]["tool"], "convert");
    assert_eq!(entries[2]["run_id"], "run-1");
    assert_eq!(entries[2]["status"], "finished");
}
