//! Cost budget tracking over a rolling time window.

use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

/// Tracks a consumable query-cost budget per rolling window.
///
/// Every response reports the cost it consumed; once the accumulated
/// cost reaches the budget, [`admit`](Self::admit) suspends the caller
/// for the remainder of the window, then resets the counter and the
/// window start. Uses `tokio::time::Instant` so tests can run against a
/// paused clock.
#[derive(Debug)]
pub struct RateGovernor {
    budget: u32,
    spent: u32,
    window: Duration,
    window_start: Instant,
}

impl RateGovernor {
    /// Governor with the standard 60-second window.
    pub fn new(budget: u32) -> Self {
        Self::with_window(budget, Duration::from_secs(60))
    }

    pub fn with_window(budget: u32, window: Duration) -> Self {
        Self {
            budget,
            spent: 0,
            window,
            window_start: Instant::now(),
        }
    }

    /// Gate one request. Returns immediately while budget remains;
    /// otherwise sleeps out the current window before resetting.
    pub async fn admit(&mut self) {
        if self.spent < self.budget {
            return;
        }
        let elapsed = self.window_start.elapsed();
        if elapsed < self.window {
            let cooldown = self.window - elapsed;
            info!(
                spent = self.spent,
                budget = self.budget,
                cooldown_secs = cooldown.as_secs_f64(),
                "cost budget exhausted, cooling down"
            );
            tokio::time::sleep(cooldown).await;
        }
        self.spent = 0;
        self.window_start = Instant::now();
    }

    /// Record the cost a response reported.
    pub fn record(&mut self, cost: u32) {
        self.spent = self.spent.saturating_add(cost);
    }

    /// Cost accumulated in the current window.
    pub fn spent(&self) -> u32 {
        self.spent
    }
}
