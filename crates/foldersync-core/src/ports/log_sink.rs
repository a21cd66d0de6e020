//! Log sink port
//!
//! The operation log is written through an injected sink with append-line
//! semantics. The core never decides where lines end up (file, console or
//! both); adapters in `foldersync-audit` do.
//!
//! Unlike diagnostic tracing, a failing sink is fatal: the log is the only
//! record of what the mirror did, so the scheduler stops rather than keep
//! changing the replica unrecorded.

use thiserror::Error;

/// Errors raised by a log sink
#[derive(Debug, Error)]
pub enum SinkError {
    /// The underlying writer failed
    #[error("log sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded in the configured format
    #[error("log record encoding failed: {0}")]
    Encode(String),

    /// The sink can no longer accept lines
    #[error("log sink closed: {0}")]
    Closed(String),
}

/// Port trait for the operation log
///
/// Implementations must be safe to share between tasks; a line is either
/// appended in full or an error is returned.
pub trait ILogSink: Send + Sync {
    /// Appends one line (without trailing newline)
    fn append_line(&self, line: &str) -> Result<(), SinkError>;
}
