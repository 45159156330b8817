//! Wall-clock polling for a live countdown.

use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::debug;

use crate::{
    countdown::{Clock, CodeEngine, Derived, EngineState},
    params::TotpParameters,
};

/// Fast enough that a per-second countdown never visibly lags
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A periodic poll that lives exactly as long as its owner.
///
/// Ticks are scheduled from the start instant rather than from the previous
/// tick, and late ticks are skipped instead of bursting, so the poll never
/// drifts. Dropping the ticker cancels it.
#[derive(Debug)]
pub struct Ticker {
    interval: Interval,
}

impl Ticker {
    /// Starts polling; the first tick completes immediately
    pub fn start(every: Duration) -> Self {
        let mut interval = time::interval(every.max(MIN_POLL_INTERVAL));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!(every_ms = every.as_millis() as u64, "ticker started");

        Self { interval }
    }

    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        debug!("ticker stopped");
    }
}

/// A [`CodeEngine`] whose ticker runs while the engine is active and is torn
/// down as soon as it goes idle.
pub struct LiveCountdown<C: Clock> {
    engine: CodeEngine,
    clock: C,
    poll_interval: Duration,
    ticker: Option<Ticker>,
}

impl<C: Clock> LiveCountdown<C> {
    pub fn new(engine: CodeEngine, clock: C, poll_interval: Duration) -> Self {
        Self {
            engine,
            clock,
            poll_interval,
            ticker: None,
        }
    }

    pub fn engine(&self) -> &CodeEngine {
        &self.engine
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn set_parameters(&mut self, params: TotpParameters) -> EngineState {
        let state = self.engine.set_parameters(params);

        match state {
            EngineState::Active if self.ticker.is_none() => {
                self.ticker = Some(Ticker::start(self.poll_interval));
            }
            EngineState::Active => (),
            EngineState::Invalid => self.ticker = None,
        }

        state
    }

    /// Waits for the next poll and derives the display state for it.
    /// Resolves to `None` straight away while the engine is idle.
    pub async fn next(&mut self) -> Option<Derived> {
        let ticker = self.ticker.as_mut()?;
        ticker.tick().await;

        self.engine.tick(self.clock.now_millis())
    }
}
