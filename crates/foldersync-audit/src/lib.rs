//! foldersync Audit - Operation log
//!
//! Provides:
//! - `AuditLogger`: Formats cycle markers, operation records and summaries
//! - `ReasonCode`: Structured reason codes for failed operations
//! - Log sinks: `FileLogSink`, `ConsoleLogSink`, `FanOutSink`, `MemoryLogSink`

pub mod logger;
pub mod reason;
pub mod sink;

pub use logger::AuditLogger;
pub use reason::ReasonCode;
pub use sink::{ConsoleLogSink, FanOutSink, FileLogSink, MemoryLogSink};
