//! Relay configuration.
//!
//! Runtime settings are env-driven; the endpoint list comes from a text
//! file, one `"<host>, <port>"` pair per line. Line order is significant:
//! the endpoint on line `i` is served by the UDP listener on
//! `base_port + i`.

use std::num::ParseIntError;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use thiserror::Error;

use crate::relay::Endpoint;

/// Default UDP port of the first listener.
pub const DEFAULT_BASE_PORT: u16 = 51000;

/// Default endpoint list file, looked up in the working directory.
pub const DEFAULT_ENDPOINTS_FILE: &str = "addr_list.txt";

/// Endpoint list errors. All of these are fatal at startup: running with
/// partial relay coverage is worse than a clean failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Endpoint list file could not be read.
    #[error("cannot read endpoint list {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Line is not of the form `<host>, <port>`.
    #[error("endpoint list line {line}: expected \"<host>, <port>\", got {text:?}")]
    MalformedLine { line: usize, text: String },

    /// Port field is not an integer port number.
    #[error("endpoint list line {line}: invalid port {text:?}")]
    InvalidPort {
        line: usize,
        text: String,
        #[source]
        source: ParseIntError,
    },
}

/// Relay configuration (env-driven).
#[derive(Debug, Clone)]
pub struct Config {
    /// UDP port of the first listener; listener `i` binds `base_port + i`.
    pub base_port: u16,

    /// Path to the endpoint list file.
    pub endpoints_file: PathBuf,

    /// Deadline covering one whole delivery attempt (connect, send, reply).
    pub attempt_timeout: Duration,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let base_port: u16 = std::env::var("RELAY_BASE_PORT")
            .ok()
            .map(|v| v.parse())
            .transpose()
            .context("RELAY_BASE_PORT must be a port number.")?
            .unwrap_or(DEFAULT_BASE_PORT);

        let endpoints_file = std::env::var("RELAY_ENDPOINTS_FILE")
            .ok()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ENDPOINTS_FILE));

        let attempt_timeout_ms: u64 = std::env::var("RELAY_ATTEMPT_TIMEOUT_MS")
            .ok()
            .map(|v| v.parse())
            .transpose()
            .context("RELAY_ATTEMPT_TIMEOUT_MS must be an integer (milliseconds).")?
            .unwrap_or(1000);
        let attempt_timeout = Duration::from_millis(attempt_timeout_ms.max(50));

        let log_level = std::env::var("RELAY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            base_port,
            endpoints_file,
            attempt_timeout,
            log_level,
        })
    }
}

/// Load the endpoint list from `path`, preserving file order.
pub fn load_endpoints(path: &Path) -> Result<Vec<Endpoint>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    parse_endpoints(&text)
}

/// Parse endpoint list text: one `"<host>, <port>"` per line,
/// blank/whitespace-only lines skipped, anything else fatal.
fn parse_endpoints(text: &str) -> Result<Vec<Endpoint>, ConfigError> {
    let mut endpoints = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_no = idx + 1;

        let (host, port_text) = line.split_once(", ").ok_or_else(|| ConfigError::MalformedLine {
            line: line_no,
            text: line.to_string(),
        })?;

        let port = port_text
            .trim()
            .parse()
            .map_err(|source| ConfigError::InvalidPort {
                line: line_no,
                text: port_text.to_string(),
                source,
            })?;

        endpoints.push(Endpoint::new(host, port));
    }

    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_ordered_endpoint_list() {
        let endpoints = parse_endpoints("127.0.0.1, 9000\n10.0.0.7, 53000\n").unwrap();
        assert_eq!(
            endpoints,
            vec![
                Endpoint::new("127.0.0.1", 9000),
                Endpoint::new("10.0.0.7", 53000),
            ]
        );
    }

    #[test]
    fn skips_blank_and_whitespace_lines() {
        let endpoints = parse_endpoints("\n  \n127.0.0.1, 9000\n\t\n").unwrap();
        assert_eq!(endpoints, vec![Endpoint::new("127.0.0.1", 9000)]);
    }

    #[test]
    fn empty_list_is_allowed() {
        assert!(parse_endpoints("").unwrap().is_empty());
    }

    #[test]
    fn missing_separator_is_fatal() {
        let err = parse_endpoints("127.0.0.1:9000\n").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedLine { line: 1, .. }));
    }

    #[test]
    fn non_integer_port_is_fatal() {
        let err = parse_endpoints("127.0.0.1, 9000\nqlab.local, go\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort { line: 2, .. }));
    }

    #[test]
    fn loads_endpoints_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "192.168.1.20, 53000\n").unwrap();

        let endpoints = load_endpoints(file.path()).unwrap();
        assert_eq!(endpoints, vec![Endpoint::new("192.168.1.20", 53000)]);
    }

    #[test]
    fn missing_file_is_surfaced() {
        let err = load_endpoints(Path::new("/nonexistent/addr_list.txt")).unwrap_err();
        assert!(matches!(err, ConfigError::Unreadable { .. }));
    }
}
