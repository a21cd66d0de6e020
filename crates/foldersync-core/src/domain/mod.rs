//! Domain entities and business logic
//!
//! This module contains the core domain types for foldersync:
//! - Newtypes for identifiers, relative paths and content hashes
//! - Inventory entries and the per-cycle tree inventory
//! - Reconciliation operations and their log records
//! - Content comparison policies
//! - Domain-specific error types

pub mod comparison;
pub mod entry;
pub mod errors;
pub mod inventory;
pub mod newtypes;
pub mod operation;
pub mod record;

// Re-export commonly used types
pub use comparison::{
    permissions_differ, ChecksumPolicy, CompareMode, ComparisonPolicy, MetadataPolicy,
};
pub use entry::{EntryKind, PathEntry};
pub use errors::DomainError;
pub use inventory::{Inventory, PathCase, SymlinkPolicy};
pub use newtypes::*;
pub use operation::{Operation, OperationKind};
pub use record::{
    CycleCounts, CycleStatus, CycleSummary, OperationOutcome, OperationRecord, RecordFormat,
};
