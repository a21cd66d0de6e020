//! AuditLogger - operation log service
//!
//! Formats cycle markers, operation records and cycle summaries and appends
//! them to an [`ILogSink`]. Each record is mirrored as a `tracing` event so
//! diagnostics and the operation log line up.
//!
//! Sink failures are propagated, never swallowed: the caller stops the
//! scheduler when the log cannot be written.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use foldersync_core::{
    domain::{CycleId, CycleStatus, CycleSummary, OperationOutcome, OperationRecord, RecordFormat},
    ports::{ILogSink, SinkError},
};
use serde::Serialize;
use serde_json::{json, Value};

/// Writes operation log lines through an injected sink
#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn ILogSink>,
    format: RecordFormat,
}

impl AuditLogger {
    /// Creates a new `AuditLogger` writing `format` lines to `sink`.
    pub fn new(sink: Arc<dyn ILogSink>, format: RecordFormat) -> Self {
        Self { sink, format }
    }

    pub fn format(&self) -> RecordFormat {
        self.format
    }

    // ========================================================================
    // Cycle lifecycle
    // ========================================================================

    /// Log the start of a sync cycle.
    pub fn log_cycle_start(
        &self,
        cycle_id: CycleId,
        started_at: DateTime<Utc>,
    ) -> Result<(), SinkError> {
        tracing::info!(cycle_id = %cycle_id, "Sync cycle started");

        let line = match self.format {
            RecordFormat::Text => format!(
                "{} CYCLE {} started",
                started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                cycle_id
            ),
            RecordFormat::Json => json!({
                "event": "cycle_start",
                "timestamp": started_at,
                "cycle_id": cycle_id,
            })
            .to_string(),
        };
        self.sink.append_line(&line)
    }

    /// Log the end of a sync cycle, whether it completed or aborted.
    pub fn log_cycle_summary(&self, summary: &CycleSummary) -> Result<(), SinkError> {
        match &summary.status {
            CycleStatus::Completed => tracing::info!(
                cycle_id = %summary.cycle_id,
                created = summary.counts.created,
                updated = summary.counts.updated,
                deleted = summary.counts.deleted,
                failed = summary.counts.failed,
                duration_ms = summary.duration_ms(),
                "Sync cycle completed"
            ),
            CycleStatus::Aborted { reason } => tracing::error!(
                cycle_id = %summary.cycle_id,
                reason = %reason,
                "Sync cycle aborted"
            ),
        }

        let line = match self.format {
            RecordFormat::Text => summary.to_string(),
            RecordFormat::Json => {
                let mut value = to_value(summary)?;
                value["event"] = json!("cycle_summary");
                value["duration_ms"] = json!(summary.duration_ms());
                value.to_string()
            }
        };
        self.sink.append_line(&line)
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Log the outcome of one applied operation.
    pub fn log_operation(&self, record: &OperationRecord) -> Result<(), SinkError> {
        match record.outcome() {
            OperationOutcome::Success => tracing::info!(
                cycle_id = %record.cycle_id(),
                operation = %record.operation(),
                kind = %record.entry_kind(),
                path = %record.path(),
                "Operation applied"
            ),
            OperationOutcome::Failed { code, message } => tracing::warn!(
                cycle_id = %record.cycle_id(),
                operation = %record.operation(),
                kind = %record.entry_kind(),
                path = %record.path(),
                code = %code,
                error = %message,
                "Operation failed"
            ),
        }

        let line = match self.format {
            RecordFormat::Text => record.to_string(),
            RecordFormat::Json => {
                let mut value = to_value(record)?;
                value["event"] = json!("operation");
                value.to_string()
            }
        };
        self.sink.append_line(&line)
    }
}

fn to_value<T: Serialize>(item: &T) -> Result<Value, SinkError> {
    serde_json::to_value(item).map_err(|e| SinkError::Encode(e.to_string()))
}
