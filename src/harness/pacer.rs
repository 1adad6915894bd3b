//! Iteration pacing

use std::time::Duration;
use tokio::time::sleep;

/// Fixed think time between two iterations of the same virtual user
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pacer {
    delay: Duration,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Suspend the calling task only
    pub async fn pace(&self) {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}
