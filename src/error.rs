use std::path::PathBuf;
use thiserror::Error;

/// A single binary frame that could not be decoded.
///
/// The offending frame is dropped by the worker; these never terminate a connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("too short: {len} bytes")]
    TooShort { len: usize },

    #[error("bad dims: {columns}x{rows}")]
    InvalidDimensions { columns: u16, rows: u16 },

    #[error("bad v{version} size: got {got} expected {}", format_expected(.expected))]
    SizeMismatch {
        version: u8,
        got: usize,
        expected: Vec<usize>,
    },

    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),
}

fn format_expected(expected: &[usize]) -> String {
    match expected {
        [new, old] => format!("{} (new) or {} (old)", new, old),
        _ => expected
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(" or "),
    }
}

/// Connection-level failures. Always retried after the reconnect delay.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connect to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("connection closed by peer")]
    Closed,

    #[error("no pong within {0:?}")]
    KeepaliveTimeout(std::time::Duration),
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("sink {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sink {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("sink {0} lock poisoned")]
    Poisoned(String),

    #[error("flush task failed: {0}")]
    FlushTask(String),
}

/// Startup problems. Fatal: the process halts before any worker runs.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("duplicate endpoint name: {0}")]
    DuplicateEndpoint(String),

    #[error("sink {sink} claimed by both {first} and {second}")]
    SinkClaimedTwice {
        sink: String,
        first: String,
        second: String,
    },

    #[error("endpoint {endpoint} is bound to non-thermal sink {sink}")]
    NotThermal { endpoint: String, sink: String },

    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot open sink: {0}")]
    Sink(#[from] SinkError),
}

/// The only way a connection worker stops with an error.
///
/// Transport and decode failures are handled inside the worker and never show up here.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("[{endpoint}] {source}")]
    Sink {
        endpoint: String,
        #[source]
        source: SinkError,
    },
}

/// Why the whole logger stopped.
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error("worker task failed: {0}")]
    Panicked(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_mismatch_lists_both_layouts() {
        let err = DecodeError::SizeMismatch {
            version: 1,
            got: 100,
            expected: vec![6182, 6166],
        };
        assert_eq!(
            err.to_string(),
            "bad v1 size: got 100 expected 6182 (new) or 6166 (old)"
        );
    }

    #[test]
    fn test_size_mismatch_single_layout() {
        let err = DecodeError::SizeMismatch {
            version: 2,
            got: 10,
            expected: vec![3078],
        };
        assert_eq!(err.to_string(), "bad v2 size: got 10 expected 3078");
    }
}
