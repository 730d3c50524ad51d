//! Lifecycle scheduler: advances screenings through their states from wall-clock comparisons.
//!
//! Every edge is applied as a conditional update inside the store, so two schedulers (or a
//! tick that overruns into the next) can run the same edge without moving a screening twice.

use std::collections::HashSet;

use time::OffsetDateTime;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::theater_store::TheaterStore,
    services::theater_events,
    state::{
        SharedState,
        lifecycle::{LifecycleWindows, TICK_ORDER, TransitionEdge},
    },
};

/// Passes a single tick may run before giving up on reaching a fixed point.
const MAX_PASSES: usize = TICK_ORDER.len();

/// Outcome of one tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Every move performed, in the order it happened.
    pub moved: Vec<(TransitionEdge, Uuid)>,
    /// Edges whose store call failed during the tick.
    pub failed_edges: Vec<TransitionEdge>,
}

impl TickReport {
    /// Distinct screenings touched by the tick, in first-move order.
    pub fn moved_screenings(&self) -> Vec<Uuid> {
        let mut seen = HashSet::with_capacity(self.moved.len());
        self.moved
            .iter()
            .filter_map(|(_, id)| seen.insert(*id).then_some(*id))
            .collect()
    }
}

/// Apply the lifecycle edges at `now` until no edge moves anything.
///
/// A pass runs the edges in [`TICK_ORDER`]. Passes repeat while the previous one moved a
/// screening, so a screening left behind by an outage catches up with `now` in one tick.
/// A failing edge is logged and skipped; the remaining edges still run.
pub async fn run_tick(
    store: &dyn TheaterStore,
    now: OffsetDateTime,
    windows: LifecycleWindows,
) -> TickReport {
    let mut report = TickReport::default();

    for _ in 0..MAX_PASSES {
        let mut progressed = false;
        for edge in TICK_ORDER {
            match store.apply_transition(edge, now, windows).await {
                Ok(moved) => {
                    for id in moved {
                        info!(screening_id = %id, transition = %edge, "screening moved");
                        report.moved.push((edge, id));
                        progressed = true;
                    }
                }
                Err(err) => {
                    warn!(transition = %edge, error = %err, "lifecycle transition failed");
                    if !report.failed_edges.contains(&edge) {
                        report.failed_edges.push(edge);
                    }
                }
            }
        }
        if !progressed {
            break;
        }
    }

    report
}

/// Run one tick against the installed store and publish the new state of every moved screening.
///
/// Does nothing in degraded mode.
pub async fn tick(state: &SharedState) -> TickReport {
    let Ok(store) = state.require_store().await else {
        debug!("lifecycle tick skipped (degraded mode)");
        return TickReport::default();
    };

    let report = run_tick(store.as_ref(), state.now(), state.config().lifecycle_windows()).await;
    if report.moved.is_empty() {
        debug!("lifecycle tick moved nothing");
    }
    for screening_id in report.moved_screenings() {
        theater_events::publish_playback_state(state, screening_id).await;
    }
    report
}

/// Drive [`tick`] forever at the configured period.
pub async fn run(state: SharedState) {
    let mut ticker = interval(state.config().lifecycle_tick());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        tick(&state).await;
    }
}
