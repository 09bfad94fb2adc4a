//! Message banner countdown.
//!
//! # Responsibilities
//! - Count down the display period of a timed banner
//! - Switch the banner off in memory and on disk once the period elapses
//! - Stand down when the operator dismisses the banner first
//!
//! # Design Decisions
//! - The state machine ([`BannerCountdown`]) is synchronous; the async
//!   [`BannerTimer`] only drives it
//! - Every reload bumps the store's banner generation; a timer from an older
//!   generation exits on its next tick without writing

use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::config::loader::ConfigError;
use crate::config::schema::MessageBanner;
use crate::config::store::ConfigStore;
use crate::lifecycle::ShutdownListener;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerState {
    /// No countdown applies (banner off, or dismissed manually).
    Idle,
    Active,
    /// Period elapsed; the switch-off still has to be persisted.
    Expiring,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Running { remaining: u64 },
    Expired,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct BannerCountdown {
    state: BannerState,
    remaining: u64,
}

impl BannerCountdown {
    pub fn new(banner: &MessageBanner) -> Self {
        if banner.is_timed() {
            Self {
                state: BannerState::Active,
                remaining: banner.seconds_to_display,
            }
        } else {
            Self {
                state: BannerState::Idle,
                remaining: 0,
            }
        }
    }

    pub fn state(&self) -> BannerState {
        self.state
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Advances one tick. `still_on` is the banner flag in the current
    /// snapshot.
    pub fn tick(&mut self, still_on: bool) -> TickOutcome {
        match self.state {
            BannerState::Idle => TickOutcome::Idle,
            BannerState::Expiring | BannerState::Off => TickOutcome::Cancelled,
            BannerState::Active if !still_on => {
                self.state = BannerState::Off;
                TickOutcome::Cancelled
            }
            BannerState::Active => {
                self.remaining = self.remaining.saturating_sub(1);
                if self.remaining == 0 {
                    self.state = BannerState::Expiring;
                    TickOutcome::Expired
                } else {
                    TickOutcome::Running {
                        remaining: self.remaining,
                    }
                }
            }
        }
    }

    /// Marks the switch-off as persisted.
    pub fn finish(&mut self) {
        self.state = BannerState::Off;
    }
}

/// Async driver for one banner activation.
pub struct BannerTimer {
    store: Arc<ConfigStore>,
    generation: u64,
    tick: Duration,
}

impl BannerTimer {
    pub fn new(store: Arc<ConfigStore>, generation: u64, tick: Duration) -> Self {
        Self {
            store,
            generation,
            tick,
        }
    }

    pub async fn run(self, mut shutdown: ShutdownListener) -> Result<(), ConfigError> {
        let mut countdown = BannerCountdown::new(&self.store.snapshot().message_banner);
        if countdown.state() != BannerState::Active {
            return Ok(());
        }

        tracing::info!(
            generation = self.generation,
            seconds = countdown.remaining(),
            "Banner countdown started"
        );

        loop {
            tokio::select! {
                _ = time::sleep(self.tick) => {}
                _ = shutdown.recv() => {
                    tracing::debug!(generation = self.generation, "Banner countdown stopped by shutdown");
                    return Ok(());
                }
            }

            if !self.store.is_banner_generation(self.generation) {
                tracing::debug!(generation = self.generation, "Banner countdown superseded");
                return Ok(());
            }

            let still_on = self.store.snapshot().message_banner.on;
            match countdown.tick(still_on) {
                TickOutcome::Running { remaining } => {
                    self.store.set_banner_ticks(self.generation, remaining);
                }
                TickOutcome::Expired => {
                    if self.store.expire_banner(self.generation)? {
                        tracing::info!(generation = self.generation, "Banner display period elapsed, display-mode set to off");
                    }
                    countdown.finish();
                    return Ok(());
                }
                TickOutcome::Cancelled | TickOutcome::Idle => {
                    tracing::info!(generation = self.generation, "Banner dismissed before countdown ended");
                    return Ok(());
                }
            }
        }
    }
}
