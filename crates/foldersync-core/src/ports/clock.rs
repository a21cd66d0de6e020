//! Clock port
//!
//! The scheduler reads time and waits between cycles through [`IClock`], so
//! tests can run many cycles without real waits.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Port trait for reading time and suspending between cycles
#[async_trait::async_trait]
pub trait IClock: Send + Sync {
    /// Current wall-clock time
    fn now(&self) -> DateTime<Utc>;

    /// Suspends the caller for `duration`
    async fn sleep(&self, duration: Duration);
}
