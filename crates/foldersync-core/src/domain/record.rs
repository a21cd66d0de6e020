//! Operation log records
//!
//! These are the records the core hands to the log sink: one per applied
//! operation, a start marker and a summary per cycle. They are the only
//! user-visible record of what a cycle did.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::entry::EntryKind;
use super::newtypes::{CycleId, RelativePath};
use super::operation::{Operation, OperationKind};

/// Outcome of a single applied operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum OperationOutcome {
    /// The operation completed successfully
    Success,
    /// The operation failed with a reason code and message
    Failed {
        /// Reason code for categorization
        code: String,
        /// Human-readable error message
        message: String,
    },
}

impl OperationOutcome {
    /// Creates a successful outcome
    pub fn success() -> Self {
        OperationOutcome::Success
    }

    /// Creates a failed outcome with the given code and message
    pub fn failed(code: impl Into<String>, message: impl Into<String>) -> Self {
        OperationOutcome::Failed {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OperationOutcome::Success)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, OperationOutcome::Failed { .. })
    }
}

/// Record of one applied operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    timestamp: DateTime<Utc>,
    cycle_id: CycleId,
    operation: OperationKind,
    entry_kind: EntryKind,
    path: RelativePath,
    outcome: OperationOutcome,
}

impl OperationRecord {
    /// Creates a record for `operation`, applied at `timestamp`
    pub fn new(
        timestamp: DateTime<Utc>,
        cycle_id: CycleId,
        operation: &Operation,
        outcome: OperationOutcome,
    ) -> Self {
        Self {
            timestamp,
            cycle_id,
            operation: operation.kind(),
            entry_kind: operation.entry_kind(),
            path: operation.path().clone(),
            outcome,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn cycle_id(&self) -> CycleId {
        self.cycle_id
    }

    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    pub fn entry_kind(&self) -> EntryKind {
        self.entry_kind
    }

    pub fn path(&self) -> &RelativePath {
        &self.path
    }

    pub fn outcome(&self) -> &OperationOutcome {
        &self.outcome
    }
}

impl fmt::Display for OperationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.operation.to_string().to_uppercase(),
            self.entry_kind,
            self.path
        )?;
        match &self.outcome {
            OperationOutcome::Success => write!(f, " ok"),
            OperationOutcome::Failed { code, message } => {
                write!(f, " FAILED [{}] {}", code, message)
            }
        }
    }
}

/// Per-cycle operation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleCounts {
    pub created: u32,
    pub updated: u32,
    pub deleted: u32,
    pub failed: u32,
}

impl CycleCounts {
    /// Counts one outcome of the given operation kind
    pub fn record(&mut self, kind: OperationKind, outcome: &OperationOutcome) {
        if outcome.is_failed() {
            self.failed += 1;
            return;
        }
        match kind {
            OperationKind::Create => self.created += 1,
            OperationKind::Update => self.updated += 1,
            OperationKind::Delete => self.deleted += 1,
        }
    }

    /// Total number of operations attempted
    pub fn total(&self) -> u32 {
        self.created + self.updated + self.deleted + self.failed
    }
}

/// How a cycle ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum CycleStatus {
    /// All operations were attempted (some may have failed)
    Completed,
    /// The cycle stopped before reconciling, e.g. the source was unreadable
    Aborted { reason: String },
}

/// Summary written at the end of every cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub cycle_id: CycleId,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub status: CycleStatus,
    pub counts: CycleCounts,
}

impl CycleSummary {
    pub fn duration_ms(&self) -> u64 {
        (self.completed_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.status, CycleStatus::Aborted { .. })
    }

    /// True if the cycle completed without attempting any operation
    pub fn is_noop(&self) -> bool {
        !self.is_aborted() && self.counts.total() == 0
    }
}

impl fmt::Display for CycleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ts = self
            .completed_at
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        match &self.status {
            CycleStatus::Aborted { reason } => {
                write!(f, "{} CYCLE {} aborted: {}", ts, self.cycle_id, reason)
            }
            CycleStatus::Completed => {
                let verdict = if self.counts.failed > 0 {
                    "completed with errors"
                } else if self.counts.total() == 0 {
                    "no changes were necessary"
                } else {
                    "completed successfully"
                };
                write!(
                    f,
                    "{} CYCLE {} {} (created={} updated={} deleted={} failed={} duration_ms={})",
                    ts,
                    self.cycle_id,
                    verdict,
                    self.counts.created,
                    self.counts.updated,
                    self.counts.deleted,
                    self.counts.failed,
                    self.duration_ms()
                )
            }
        }
    }
}

/// Serialization used when writing records to a log sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFormat {
    /// One human-readable line per record
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl fmt::Display for RecordFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordFormat::Text => write!(f, "text"),
            RecordFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for RecordFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(RecordFormat::Text),
            "json" => Ok(RecordFormat::Json),
            other => Err(format!("invalid log format '{other}'; valid: text, json")),
        }
    }
}
