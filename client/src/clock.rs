//! Wall clock and the shared countdown ticker.
//!
//! Countdowns and Open/Ended transitions are pure functions of
//! `(deadline, now)`. One ticker task publishes `now` for every view.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

/// Source of the current unix time in seconds
pub trait Clock: Send + Sync {
    /// Current unix time (seconds)
    fn now(&self) -> u64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        Utc::now().timestamp().max(0) as u64
    }
}

/// Clock advanced by hand
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Clock frozen at `now`
    pub fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    /// Set the time
    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move the time forward
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Spawn the shared ticker. It publishes `clock.now()` every `period` and
/// stops once every receiver is dropped.
pub fn spawn_ticker(clock: Arc<dyn Clock>, period: Duration) -> (watch::Receiver<u64>, JoinHandle<()>) {
    let (tx, rx) = watch::channel(clock.now());

    let handle = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if tx.send(clock.now()).is_err() {
                debug!("Countdown ticker stopped: no subscribers");
                break;
            }
        }
    });

    (rx, handle)
}
