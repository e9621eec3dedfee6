//! Error types for the Sparkplug edge node runtime.

use thiserror::Error;

/// Result type alias for edge-node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the edge-node runtime.
///
/// Propagation policy: `Validation` is fatal at construction time.
/// `Transport` is logged and the main loop exits, leaving reconnection
/// to an outer supervisor or the MQTT client's own policy. `Decode` and
/// `Write` are logged and the offending NCMD entry is skipped; other
/// entries in the same command still process. `Persistence` during a
/// tag load is logged as a warning and the tag keeps its
/// constructor-supplied initial value.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid node construction: bad group id, forbidden control-metric
    /// name, empty broker list, or a duplicate alias.
    #[error("validation failed: {0}")]
    Validation(String),

    /// MQTT connect, disconnect, or publish failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// A received payload could not be decoded, or was missing a
    /// required field.
    #[error("decode error: {0}")]
    Decode(String),

    /// A write to a metric failed: non-writable target, coercion
    /// failure, or validator rejection.
    #[error("write to '{metric}' failed: {reason}")]
    Write {
        /// Name of the metric the write was attempted against.
        metric: String,
        /// Why the write was rejected.
        reason: String,
    },

    /// A persistence file (memory-tag value store or node config) could
    /// not be read or contained invalid data.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Underlying I/O failure while reading or writing a persistence
    /// file.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A persistence file existed but was not valid JSON.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}
