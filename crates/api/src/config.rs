//! Application configuration loaded from environment variables.

use messaging::SagaSubjects;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `pretty` or `json` (default: `pretty`)
/// - `DATABASE_URL` — PostgreSQL URL; in-memory stores when unset
/// - `NATS_URL` — NATS server; in-memory broker when unset
/// - `HANDLER_WORKERS` — competing consumers per saga participant (default: `4`)
/// - `PURCHASE_COMMAND_SUBJECT`, `PURCHASE_REPLY_SUBJECT` — see [`SagaSubjects`]
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub handler_workers: usize,
    pub subjects: SagaSubjects,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: std::env::var("LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or(defaults.log_format),
            database_url: non_empty_var("DATABASE_URL"),
            nats_url: non_empty_var("NATS_URL"),
            handler_workers: std::env::var("HANDLER_WORKERS")
                .ok()
                .and_then(|w| w.parse().ok())
                .filter(|w| *w > 0)
                .unwrap_or(defaults.handler_workers),
            subjects: SagaSubjects::from_env(),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            nats_url: None,
            handler_workers: 4,
            subjects: SagaSubjects::default(),
        }
    }
}
