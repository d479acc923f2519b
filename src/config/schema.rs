use serde::Deserialize;
use std::path::PathBuf;

/// The TOML file structure for scai.toml.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    pub backend: Option<BackendConfig>,
    pub terminal: Option<TerminalConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub session_id: Option<String>,
    pub session_cookie: Option<String>,
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct TerminalConfig {
    pub url: Option<String>,
    pub cols: Option<u16>,
    pub rows: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Directory for per-run JSONL journals. Journaling is off when unset.
    pub run_log_dir: Option<String>,
}

impl ConfigFile {
    /// Flatten the sectioned file layout into a mergeable partial config.
    pub fn to_partial(self) -> PartialConfig {
        let backend = self.backend;
        let terminal = self.terminal;
        let logging = self.logging;

        let (backend_url, session_id, session_cookie, connect_timeout_secs) = match backend {
            Some(b) => (b.url, b.session_id, b.session_cookie, b.connect_timeout_secs),
            None => (None, None, None, None),
        };
        let (terminal_url, terminal_cols, terminal_rows) = match terminal {
            Some(t) => (t.url, t.cols, t.rows),
            None => (None, None, None),
        };

        PartialConfig {
            backend_url,
            session_id,
            session_cookie,
            connect_timeout_secs,
            terminal_url,
            terminal_cols,
            terminal_rows,
            run_log_dir: logging.and_then(|l| l.run_log_dir).map(PathBuf::from),
        }
    }
}

/// Fully-resolved runtime configuration. All required fields have values.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Backend base URL without a trailing slash.
    pub backend_url: String,
    pub session_id: Option<String>,
    pub session_cookie: String,
    pub connect_timeout_secs: u64,
    /// Terminal socket URL, including the initial `cols`/`rows` query.
    pub terminal_url: String,
    pub terminal_cols: u16,
    pub terminal_rows: u16,
    pub run_log_dir: Option<PathBuf>,
}

/// Partial config used during merge. All fields are Option so that
/// missing fields don't override lower-priority values.
#[derive(Debug, Clone, Default)]
pub struct PartialConfig {
    pub backend_url: Option<String>,
    pub session_id: Option<String>,
    pub session_cookie: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub terminal_url: Option<String>,
    pub terminal_cols: Option<u16>,
    pub terminal_rows: Option<u16>,
    pub run_log_dir: Option<PathBuf>,
}
