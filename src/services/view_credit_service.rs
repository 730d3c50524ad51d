//! View credit sweeper: catches closed sessions whose leave-time credit never happened.

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::{dao::models::CreditOutcome, state::SharedState};

/// Summary of one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Sessions selected for crediting.
    pub scanned: usize,
    /// Sessions this sweep credited.
    pub credited: usize,
    /// Sessions credited by someone else between selection and update.
    pub already_credited: usize,
    /// Sessions whose credit failed; retried by the next sweep.
    pub failed: usize,
}

/// Credit every settled, qualifying, uncredited session once.
///
/// A failure on one session is logged and the sweep moves on to the next.
pub async fn sweep(state: &SharedState) -> SweepReport {
    let mut report = SweepReport::default();
    let Ok(store) = state.require_store().await else {
        debug!("credit sweep skipped (degraded mode)");
        return report;
    };

    let config = state.config();
    let left_before = state.now().saturating_sub(config.credit_settle());
    let sessions = match store
        .find_creditable_sessions(left_before, config.min_watch())
        .await
    {
        Ok(sessions) => sessions,
        Err(err) => {
            warn!(error = %err, "credit sweep query failed");
            return report;
        }
    };

    report.scanned = sessions.len();
    for session in sessions {
        match store.credit_session(session.id).await {
            Ok(CreditOutcome::Credited) => report.credited += 1,
            Ok(CreditOutcome::AlreadyCredited) => report.already_credited += 1,
            // Re-entered since it was selected.
            Ok(CreditOutcome::NotEligible) => {}
            Err(err) => {
                warn!(session_id = %session.id, error = %err, "credit sweep failed for session");
                report.failed += 1;
            }
        }
    }

    if report.scanned > 0 {
        info!(
            scanned = report.scanned,
            credited = report.credited,
            already_credited = report.already_credited,
            failed = report.failed,
            "credit sweep finished"
        );
    }
    report
}

/// Drive [`sweep`] forever at the configured period.
pub async fn run(state: SharedState) {
    let mut ticker = interval(state.config().credit_sweep());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        sweep(&state).await;
    }
}
