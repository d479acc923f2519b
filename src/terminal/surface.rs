//! Display surfaces a terminal session renders into.

use std::io::Write;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

/// Something that shows terminal output.
///
/// Writes are pre-rendered text that may contain ANSI escapes. A surface must
/// never fail the session, so write errors are the surface's own business.
pub trait TerminalSurface: Send + 'static {
    fn clear(&mut self);
    fn write(&mut self, text: &str);
}

/// One change to a surface, as forwarded by [`ChannelSurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceUpdate {
    Clear,
    Write(String),
}

/// Writes straight to the process's stdout.
#[derive(Debug)]
pub struct StdoutSurface {
    clear_screen: bool,
}

impl StdoutSurface {
    /// A surface that owns the whole screen and clears it on connect.
    pub fn fullscreen() -> Self {
        Self { clear_screen: true }
    }

    /// A surface sharing the console with other output; never clears it.
    pub fn inline() -> Self {
        Self {
            clear_screen: false,
        }
    }
}

impl TerminalSurface for StdoutSurface {
    fn clear(&mut self) {
        if self.clear_screen {
            self.write("\x1b[2J\x1b[H");
        }
    }

    fn write(&mut self, text: &str) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
            tracing::debug!(error = %e, "Failed to write terminal output");
        }
    }
}

/// Forwards updates over a channel, e.g. to the dashboard's event loop.
#[derive(Debug, Clone)]
pub struct ChannelSurface {
    tx: mpsc::UnboundedSender<SurfaceUpdate>,
}

impl ChannelSurface {
    pub fn new(tx: mpsc::UnboundedSender<SurfaceUpdate>) -> Self {
        Self { tx }
    }
}

impl TerminalSurface for ChannelSurface {
    fn clear(&mut self) {
        let _ = self.tx.send(SurfaceUpdate::Clear);
    }

    fn write(&mut self, text: &str) {
        let _ = self.tx.send(SurfaceUpdate::Write(text.to_string()));
    }
}

/// Keeps every update in memory. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    updates: Arc<Mutex<Vec<SurfaceUpdate>>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<SurfaceUpdate> {
        self.updates
            .lock()
            .map(|u| u.clone())
            .unwrap_or_default()
    }

    /// Text written since the last clear.
    pub fn contents(&self) -> String {
        let mut text = String::new();
        for update in self.updates() {
            match update {
                SurfaceUpdate::Clear => text.clear(),
                SurfaceUpdate::Write(s) => text.push_str(&s),
            }
        }
        text
    }

    fn push(&self, update: SurfaceUpdate) {
        if let Ok(mut updates) = self.updates.lock() {
            updates.push(update);
        }
    }
}

impl TerminalSurface for RecordingSurface {
    fn clear(&mut self) {
        self.push(SurfaceUpdate::Clear);
    }

    fn write(&mut self, text: &str) {
        self.push(SurfaceUpdate::Write(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_contents_reset_on_clear() {
        let mut surface = RecordingSurface::new();
        let view = surface.clone();

        surface.write("old");
        surface.clear();
        surface.write("new ");
        surface.write("text");

        assert_eq!(view.contents(), "new text");
        assert_eq!(view.updates().len(), 4);
    }

    #[test]
    fn channel_surface_forwards_updates() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut surface = ChannelSurface::new(tx);
        surface.clear();
        surface.write("hi");

        assert_eq!(rx.try_recv().unwrap(), SurfaceUpdate::Clear);
        assert_eq!(rx.try_recv().unwrap(), SurfaceUpdate::Write("hi".into()));
    }
}
