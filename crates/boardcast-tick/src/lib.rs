//! Fixed-interval tick scheduler for boardcast.
//!
//! Every session task advances its protocol state machine on a tick, and
//! the gateway runs its reaper on a slower one. A tick is the only thing
//! that moves time-gated states forward: delays between closing a stream
//! and reusing the transport are checked against elapsed time on each
//! tick rather than slept in place.
//!
//! # Disabled mode
//!
//! An `interval` of zero disables the scheduler and
//! [`TickScheduler::wait_for_tick`] pends forever.
//!
//! # Integration
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         _ = scheduler.wait_for_tick() => {
//!             client.tick().await;
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when a tick fires late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickPolicy {
    /// Forget the missed ticks and schedule the next one from now.
    #[default]
    Skip,
    /// Keep the original cadence; the next tick may fire immediately.
    Drop,
}

/// Configuration for a [`TickScheduler`].
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks. Zero disables the scheduler.
    pub interval: Duration,
    pub policy: TickPolicy,
    /// A tick whose work takes longer than this is logged at `warn`.
    /// Work that is slower than the interval but under this threshold is
    /// normal for ticks that wait on the network and is only traced.
    pub slow_tick_warn: Duration,
    /// Upper bound of the random delay added to the first tick, so
    /// sessions created together do not tick in lockstep.
    pub initial_jitter: Duration,
    /// Name used in log events.
    pub label: String,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(50),
            policy: TickPolicy::default(),
            slow_tick_warn: Duration::from_secs(5),
            initial_jitter: Duration::from_millis(5),
            label: "tick".to_string(),
        }
    }
}

impl TickConfig {
    /// A config with the given interval and default settings.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Sets the log label.
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Interval of a single tick, or `None` when disabled.
    pub fn tick_interval(&self) -> Option<Duration> {
        (!self.interval.is_zero()).then_some(self.interval)
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// `true` if the tick fired more than a tenth of an interval late.
    pub overrun: bool,
    /// Whole intervals skipped because of lateness.
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Counters updated by the scheduler.
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Ticks whose work exceeded `slow_tick_warn`.
    pub slow_ticks: u64,
    /// Exponential moving average of tick work time (α = 0.1).
    pub avg_tick_time: Duration,
    pub max_tick_time: Duration,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-interval scheduler. One per driven task.
pub struct TickScheduler {
    config: TickConfig,
    interval: Option<Duration>,
    tick_count: u64,
    next_tick: Option<Instant>,
    /// Set by `wait_for_tick`, consumed by `record_tick_end`.
    tick_start: Option<Instant>,
    metrics: TickMetrics,
}

impl TickScheduler {
    pub fn new(config: TickConfig) -> Self {
        let interval = config.tick_interval();
        let next_tick = interval.map(|d| {
            let jitter = if config.initial_jitter.is_zero() {
                Duration::ZERO
            } else {
                let max_us = config.initial_jitter.as_micros() as u64;
                Duration::from_micros(rand::rng().random_range(0..max_us.max(1)))
            };
            Instant::now() + d + jitter
        });

        match interval {
            Some(d) => debug!(
                label = %config.label,
                interval_ms = d.as_millis() as u64,
                policy = ?config.policy,
                "tick scheduler created"
            ),
            None => debug!(label = %config.label, "tick scheduler disabled"),
        }

        Self {
            config,
            interval,
            tick_count: 0,
            next_tick,
            tick_start: None,
            metrics: TickMetrics::default(),
        }
    }

    /// A scheduler ticking every `interval` with default settings.
    pub fn every(interval: Duration) -> Self {
        Self::new(TickConfig::every(interval))
    }

    /// Waits until the next tick is due.
    ///
    /// When disabled this pends forever, leaving other `select!` branches
    /// to make progress.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (next, interval) = match (self.next_tick, self.interval) {
            (Some(next), Some(interval)) => (next, interval),
            _ => std::future::pending().await,
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        self.tick_count += 1;
        self.tick_start = Some(now);

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > interval / 10;
        let mut ticks_skipped = 0;

        self.next_tick = Some(match self.config.policy {
            TickPolicy::Skip => {
                if overrun {
                    ticks_skipped =
                        (late_by.as_nanos() / interval.as_nanos()) as u64;
                    if ticks_skipped > 0 {
                        trace!(
                            label = %self.config.label,
                            tick = self.tick_count,
                            skipped = ticks_skipped,
                            "late tick, skipping ahead"
                        );
                    }
                }
                now + interval
            }
            TickPolicy::Drop => next + interval,
        });

        if overrun {
            self.metrics.total_overruns += 1;
        }
        self.metrics.total_skipped += ticks_skipped;
        self.metrics.total_ticks += 1;

        trace!(label = %self.config.label, tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }

    /// Records that the work for the current tick has finished.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();

        if elapsed >= self.config.slow_tick_warn {
            self.metrics.slow_ticks += 1;
            warn!(
                label = %self.config.label,
                tick = self.tick_count,
                elapsed_ms = elapsed.as_millis() as u64,
                "slow tick"
            );
        }

        if elapsed > self.metrics.max_tick_time {
            self.metrics.max_tick_time = elapsed;
        }
        let alpha = 0.1;
        let prev = self.metrics.avg_tick_time.as_secs_f64();
        self.metrics.avg_tick_time = Duration::from_secs_f64(
            prev * (1.0 - alpha) + elapsed.as_secs_f64() * alpha,
        );
    }

    pub fn is_disabled(&self) -> bool {
        self.interval.is_none()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn label(&self) -> &str {
        &self.config.label
    }
}
