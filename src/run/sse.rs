//! Run stream decoding: bytes to lines, lines to frames.
//!
//! The backend answers a run request with a body of newline-delimited
//! `data: <json>` records terminated by `data: [DONE]`. Decoding is split into
//! two stages so each can be tested alone:
//!
//! 1. [`LineDecoder`] buffers raw chunks and yields complete lines.
//! 2. [`parse_line`] turns one line into a [`Frame`], or nothing.
//!
//! [`frames`] composes both over a chunk stream into a finite lazy stream of
//! frames. Applying frames to run state is the caller's job.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use super::types::{Frame, RunEvent};
use crate::error::TransportError;

/// Prefix marking an event-data line.
const DATA_PREFIX: &str = "data:";

/// Sentinel payload that ends the stream.
const DONE_SENTINEL: &str = "[DONE]";

/// Incremental splitter from byte chunks to text lines.
///
/// Bytes are buffered until a `\n` arrives, so multi-byte UTF-8 sequences
/// split across chunks are decoded intact. A trailing `\r` is stripped.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        // Only the new chunk can hold a newline; earlier bytes were scanned.
        let mut start = 0;
        let mut scan = self.buffer.len() - chunk.len();
        let mut lines = Vec::new();
        while let Some(offset) = self.buffer[scan..].iter().position(|&b| b == b'\n') {
            let end = scan + offset;
            lines.push(decode_line(&self.buffer[start..end]));
            start = end + 1;
            scan = start;
        }
        self.buffer.drain(..start);
        lines
    }

    /// Flush the unterminated tail left at end of body, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.buffer);
        Some(decode_line(&raw))
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Parse one line of the run stream.
///
/// Returns `None` for lines that carry nothing: non-data lines (blank
/// separators, `: ping` comments, `event:` fields) and data lines whose JSON is
/// malformed. Malformed records are dropped, never fatal.
pub fn parse_line(line: &str) -> Option<Frame> {
    let payload = line.strip_prefix(DATA_PREFIX)?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload).trim_end();

    if payload == DONE_SENTINEL {
        return Some(Frame::Done);
    }

    match serde_json::from_str::<RunEvent>(payload) {
        Ok(event) => Some(Frame::Event(event)),
        Err(e) => {
            tracing::debug!(error = %e, payload, "Skipping malformed run event");
            None
        }
    }
}

/// Boxed chunk stream as produced by a transport.
pub type ByteStream =
    std::pin::Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

struct FrameState {
    body: ByteStream,
    decoder: LineDecoder,
    pending: std::collections::VecDeque<Frame>,
    body_done: bool,
    finished: bool,
}

/// Lazily decode a chunk stream into frames.
///
/// The stream ends right after `[DONE]` (later bytes are never read) or when
/// the body ends. A transport error is yielded once, then the stream ends.
pub fn frames(body: ByteStream) -> impl Stream<Item = Result<Frame, TransportError>> + Send {
    let state = FrameState {
        body,
        decoder: LineDecoder::new(),
        pending: std::collections::VecDeque::new(),
        body_done: false,
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if st.finished {
                return None;
            }

            if let Some(frame) = st.pending.pop_front() {
                if frame == Frame::Done {
                    st.finished = true;
                }
                return Some((Ok(frame), st));
            }

            if st.body_done {
                return None;
            }

            match st.body.next().await {
                Some(Ok(chunk)) => {
                    let parsed = st.decoder.push(&chunk).into_iter().filter_map(|l| parse_line(&l));
                    st.pending.extend(parsed);
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(e), st));
                }
                None => {
                    st.body_done = true;
                    if let Some(frame) = st.decoder.finish().as_deref().and_then(parse_line) {
                        st.pending.push_back(frame);
                    }
                }
            }
        }
    })
}
