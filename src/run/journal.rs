//! JSONL run journal for replaying what a run streamed.
//!
//! Writes one JSON object per line to `{log_dir}/run-{timestamp}.jsonl`.
//! Uses synchronous `std::fs` since writes are small and flushed after each
//! entry; the journal is fed from the runner's per-event callback.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use super::types::{RunEvent, RunStatus};

/// Returns the current UTC time as an ISO 8601 string with milliseconds.
fn now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// A journal line, tagged with `entry` so each line is self-describing.
#[derive(Debug, Serialize)]
#[serde(tag = "entry")]
pub enum JournalEntry<'a> {
    #[serde(rename = "run_start")]
    RunStart {
        timestamp: String,
        backend: &'a str,
        prompt: &'a str,
    },

    /// One event exactly as the runner dispatched it.
    #[serde(rename = "event")]
    Event {
        timestamp: String,
        event: &'a RunEvent,
    },

    #[serde(rename = "run_end")]
    RunEnd {
        timestamp: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        run_id: Option<&'a str>,
        status: RunStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<&'a str>,
    },
}

/// Append-only JSONL writer for one run.
pub struct RunJournal {
    writer: BufWriter<fs::File>,
    path: PathBuf,
}

impl RunJournal {
    /// Create `log_dir` if needed and open a fresh journal file in it.
    pub fn create(log_dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(log_dir)?;

        let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S%.3f").to_string();
        let path = log_dir.join(format!("run-{stamp}.jsonl"));

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize an entry as a single JSON line and flush.
    pub fn write(&mut self, entry: &JournalEntry<'_>) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.writer, entry)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn run_start(&mut self, backend: &str, prompt: &str) -> anyhow::Result<()> {
        self.write(&JournalEntry::RunStart {
            timestamp: now_iso(),
            backend,
            prompt,
        })
    }

    pub fn event(&mut self, event: &RunEvent) -> anyhow::Result<()> {
        self.write(&JournalEntry::Event {
            timestamp: now_iso(),
            event,
        })
    }

    pub fn run_end(
        &mut self,
        run_id: Option<&str>,
        status: RunStatus,
        error: Option<&str>,
    ) -> anyhow::Result<()> {
        self.write(&JournalEntry::RunEnd {
            timestamp: now_iso(),
            run_id,
            status,
            error,
        })
    }
}
