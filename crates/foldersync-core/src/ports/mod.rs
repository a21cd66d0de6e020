//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ILocalFileSystem`] - Replica mutations and content hashing
//! - [`ILogSink`] - Append-only operation log
//! - [`IClock`] - Time source and inter-cycle suspension

pub mod clock;
pub mod local_filesystem;
pub mod log_sink;

pub use clock::IClock;
pub use local_filesystem::ILocalFileSystem;
pub use log_sink::{ILogSink, SinkError};
