//! Periodic poll cycle: fetch, reduce, render, track failures.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, RefreshConfig};
use crate::display::board::{BoardRenderer, Placeholder};
use crate::models::{Departures, Direction};
use crate::transit::alerts::select_banner;
use crate::transit::client::{FeedKind, FeedSource};
use crate::transit::clock;
use crate::transit::proto::FeedMessage;
use crate::transit::schedule::Schedule;

/// Why a cycle produced nothing to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleFailure {
    /// Retrieval gave up (transport or decode).
    NoFeed,
    /// Feed decoded but carried no entities.
    EmptyFeed,
}

impl std::fmt::Display for CycleFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleFailure::NoFeed => write!(f, "no data from trip updates feed"),
            CycleFailure::EmptyFeed => write!(f, "trip updates feed has no entities"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Rendered { trains: usize },
    Failed { failure: CycleFailure, consecutive: u32 },
    /// A newer cycle rendered first; this one's result was dropped.
    Discarded,
}

/// Cross-cycle state. Only written inside a cycle's synchronous section.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoopHealth {
    pub consecutive_failures: u32,
    pub degraded: bool,
    /// Local epoch seconds of the last successful cycle.
    pub last_success: Option<i64>,
    pub last_rendered_generation: u64,
    pub last_train_count: Option<usize>,
}

/// Drives the board: one cycle per poll interval.
pub struct UpdateLoop<S> {
    source: S,
    schedule: Schedule,
    renderer: Option<Arc<dyn BoardRenderer>>,
    refresh: RefreshConfig,
    horizon_minutes: u32,
    health: Mutex<LoopHealth>,
    generation: AtomicU64,
}

impl<S: FeedSource> UpdateLoop<S> {
    pub fn new(config: &Config, source: S, renderer: Option<Arc<dyn BoardRenderer>>) -> Self {
        UpdateLoop {
            source,
            schedule: Schedule::new(config),
            renderer,
            refresh: config.refresh.clone(),
            horizon_minutes: config.board.horizon_minutes,
            health: Mutex::new(LoopHealth::default()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn health(&self) -> LoopHealth {
        self.health
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn render(&self, f: impl FnOnce(&dyn BoardRenderer)) {
        if let Some(ref renderer) = self.renderer {
            f(renderer.as_ref());
        }
    }

    /// Tick every poll interval until cancelled.
    ///
    /// Each tick spawns its own cycle, so a slow fetch never holds back the
    /// next one. Overlapping cycles may finish in either order.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.refresh.poll_interval));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut cycles = JoinSet::new();

        info!(
            "[LOOP] Update loop started (every {}s)",
            self.refresh.poll_interval
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("[LOOP] Shutting down");
                    break;
                }
                _ = interval.tick() => {
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
                    let this = Arc::clone(&self);
                    cycles.spawn(async move { this.run_cycle(generation).await });
                }
                Some(result) = cycles.join_next(), if !cycles.is_empty() => {
                    match result {
                        Ok(outcome) => debug!("[LOOP] Cycle finished: {:?}", outcome),
                        Err(e) => warn!("[LOOP] Cycle task failed: {}", e),
                    }
                }
            }
        }

        cycles.abort_all();
    }

    /// One fetch-process-render pass. `generation` orders overlapping cycles.
    pub async fn run_cycle(&self, generation: u64) -> CycleOutcome {
        self.render(|r| r.set_live(false));

        let feed = self.source.fetch_feed(FeedKind::TripUpdates).await;
        let banner = if self.refresh.show_alerts {
            self.fetch_banner().await
        } else {
            None
        };

        // Everything below runs to completion without yielding.
        let mut health = self.health.lock().unwrap_or_else(|e| e.into_inner());

        if self.refresh.discard_stale_renders && generation < health.last_rendered_generation {
            debug!(
                "[LOOP] Cycle {} finished after cycle {}, discarding",
                generation, health.last_rendered_generation
            );
            return CycleOutcome::Discarded;
        }
        health.last_rendered_generation = generation;

        self.render(|r| r.set_alert(banner.as_deref()));

        match check_feed(feed) {
            Ok(feed) => {
                let departures = self.schedule.departures(Some(&feed), clock::local_now());

                if health.degraded {
                    info!("[LOOP] Feed recovered after {} failed cycles", health.consecutive_failures);
                }
                health.consecutive_failures = 0;
                health.degraded = false;
                health.last_success = Some(clock::local_now());

                let count = departures.len();
                if health.last_train_count != Some(count) {
                    info!(
                        "[LOOP] {} trains ({} west, {} east)",
                        count,
                        departures.west.len(),
                        departures.east.len()
                    );
                    health.last_train_count = Some(count);
                }

                self.render_departures(&departures);
                self.render(|r| {
                    r.set_degraded(false);
                    r.set_live(true);
                });
                CycleOutcome::Rendered { trains: count }
            }
            Err(failure) => {
                health.consecutive_failures += 1;
                let consecutive = health.consecutive_failures;
                warn!(
                    "[LOOP] Cycle {} failed: {} ({} in a row)",
                    generation, failure, consecutive
                );

                if consecutive >= self.refresh.degraded_after {
                    if !health.degraded {
                        warn!("[LOOP] Entering degraded state");
                    }
                    health.degraded = true;
                    self.render(|r| {
                        for column in Direction::ALL {
                            r.render_placeholder(column, Placeholder::Reconnecting);
                        }
                        r.set_degraded(true);
                    });
                }
                CycleOutcome::Failed {
                    failure,
                    consecutive,
                }
            }
        }
    }

    async fn fetch_banner(&self) -> Option<String> {
        let feed = self.source.fetch_feed(FeedKind::Alerts).await?;
        let banner = select_banner(&feed, self.schedule.matcher().routes());
        if let Some(ref text) = banner {
            debug!("[ALERTS] Banner: {}", text);
        }
        banner
    }

    fn render_departures(&self, departures: &Departures) {
        self.render(|r| {
            r.set_reference_time(departures.reference_time);
            if departures.is_empty() {
                let placeholder = Placeholder::NoTrains {
                    horizon_minutes: self.horizon_minutes,
                };
                for column in Direction::ALL {
                    r.render_placeholder(column, placeholder);
                }
                return;
            }
            for column in Direction::ALL {
                let trains = departures.for_direction(column);
                if trains.is_empty() {
                    r.render_placeholder(column, Placeholder::NoDirection(column));
                } else {
                    r.render_column(column, trains);
                }
            }
        });
    }
}

fn check_feed(feed: Option<FeedMessage>) -> Result<FeedMessage, CycleFailure> {
    match feed {
        None => Err(CycleFailure::NoFeed),
        Some(f) if f.entity.is_empty() => Err(CycleFailure::EmptyFeed),
        Some(f) => Ok(f),
    }
}
