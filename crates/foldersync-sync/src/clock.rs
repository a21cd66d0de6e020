//! Wall-clock implementation of [`IClock`]

use std::time::Duration;

use chrono::{DateTime, Utc};
use foldersync_core::ports::IClock;

/// Reads the system clock and sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait::async_trait]
impl IClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
