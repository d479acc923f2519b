use super::schema::{AppConfig, PartialConfig};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_SESSION_COOKIE: &str = "snowflake_session_id";

impl PartialConfig {
    /// Merge self with a lower-priority fallback.
    /// Self's non-None values take precedence.
    pub fn with_fallback(self, fallback: PartialConfig) -> PartialConfig {
        PartialConfig {
            backend_url: self.backend_url.or(fallback.backend_url),
            session_id: self.session_id.or(fallback.session_id),
            session_cookie: self.session_cookie.or(fallback.session_cookie),
            connect_timeout_secs: self.connect_timeout_secs.or(fallback.connect_timeout_secs),
            terminal_url: self.terminal_url.or(fallback.terminal_url),
            terminal_cols: self.terminal_cols.or(fallback.terminal_cols),
            terminal_rows: self.terminal_rows.or(fallback.terminal_rows),
            run_log_dir: self.run_log_dir.or(fallback.run_log_dir),
        }
    }

    /// Convert to AppConfig, filling any remaining gaps with defaults.
    ///
    /// When no terminal URL is configured it is derived from the backend URL
    /// (`http` -> `ws`, `https` -> `wss`) with the `/ws/terminal` path.
    pub fn finalize(self) -> AppConfig {
        let backend_url = self
            .backend_url
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let terminal_cols = self.terminal_cols.unwrap_or(80);
        let terminal_rows = self.terminal_rows.unwrap_or(24);

        let terminal_base = self
            .terminal_url
            .unwrap_or_else(|| format!("{}/ws/terminal", websocket_origin(&backend_url)));

        AppConfig {
            terminal_url: with_size_query(&terminal_base, terminal_cols, terminal_rows),
            backend_url,
            session_id: self.session_id,
            session_cookie: self
                .session_cookie
                .unwrap_or_else(|| DEFAULT_SESSION_COOKIE.to_string()),
            connect_timeout_secs: self.connect_timeout_secs.unwrap_or(10),
            terminal_cols,
            terminal_rows,
            run_log_dir: self.run_log_dir,
        }
    }
}

/// Swap the HTTP scheme of a backend URL for its WebSocket counterpart.
fn websocket_origin(backend_url: &str) -> String {
    if let Some(rest) = backend_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = backend_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        backend_url.to_string()
    }
}

/// Append the initial terminal size unless the URL already carries a query.
fn with_size_query(url: &str, cols: u16, rows: u16) -> String {
    if url.contains('?') {
        url.to_string()
    } else {
        format!("{url}?cols={cols}&rows={rows}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_every_field() {
        let config = PartialConfig::default().finalize();
        assert_eq!(config.backend_url, "http://localhost:8000");
        assert_eq!(config.session_cookie, "snowflake_session_id");
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.terminal_url, "ws://localhost:8000/ws/terminal?cols=80&rows=24");
        assert!(config.session_id.is_none());
        assert!(config.run_log_dir.is_none());
    }

    #[test]
    fn higher_priority_wins() {
        let cli = PartialConfig {
            backend_url: Some("https://migrate.example.com/".into()),
            ..Default::default()
        };
        let file = PartialConfig {
            backend_url: Some("http://other:9000".into()),
            terminal_cols: Some(120),
            ..Default::default()
        };

        let config = cli.with_fallback(file).finalize();
        assert_eq!(config.backend_url, "https://migrate.example.com");
        assert_eq!(config.terminal_cols, 120);
        assert_eq!(
            config.terminal_url,
            "wss://migrate.example.com/ws/terminal?cols=120&rows=24"
        );
    }

    #[test]
    fn explicit_terminal_query_is_kept() {
        let config = PartialConfig {
            terminal_url: Some("ws://pty:7000/socket?token=abc".into()),
            ..Default::default()
        }
        .finalize();
        assert_eq!(config.terminal_url, "ws://pty:7000/socket?token=abc");
    }
}
