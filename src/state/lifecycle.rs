use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use utoipa::ToSchema;

/// Broadcast states a screening moves through, driven only by wall-clock comparisons.
///
/// `Closed` is both "not yet due" and "over"; which one applies depends on where `now`
/// sits relative to the screening window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScreeningStatus {
    /// Pre-roll lobby: viewers may enter, playback has not started.
    Waiting,
    /// Broadcast in progress; every viewer sees `now - start_at`.
    Playing,
    /// Broadcast finished; the room stays open for the closing grace period.
    Ending,
    /// Not yet due, or over.
    Closed,
}

impl ScreeningStatus {
    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            ScreeningStatus::Waiting => "WAITING",
            ScreeningStatus::Playing => "PLAYING",
            ScreeningStatus::Ending => "ENDING",
            ScreeningStatus::Closed => "CLOSED",
        }
    }

    /// Whether viewers are allowed to enter a screening in this status.
    pub fn admits_viewers(self) -> bool {
        matches!(self, ScreeningStatus::Waiting | ScreeningStatus::Playing)
    }
}

impl fmt::Display for ScreeningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time windows surrounding a screening's `[start_at, end_at)` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleWindows {
    /// How long before `start_at` the lobby opens.
    pub preroll: Duration,
    /// How long after `end_at` the room stays in `Ending`.
    pub closing_grace: Duration,
}

impl Default for LifecycleWindows {
    fn default() -> Self {
        Self {
            preroll: Duration::minutes(10),
            closing_grace: Duration::minutes(10),
        }
    }
}

/// Timestamp a transition condition is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleField {
    /// The screening's `start_at`.
    StartAt,
    /// The screening's `end_at`.
    EndAt,
}

/// Time predicate of one edge, expressed as a half-open range on a single timestamp:
/// `after < field <= until`.
///
/// Storage backends translate this into their own conditional update filter so the table
/// below stays the only definition of when a screening may move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeCondition {
    /// Timestamp the bounds apply to.
    pub field: ScheduleField,
    /// Exclusive lower bound, when the edge has one.
    pub after: Option<OffsetDateTime>,
    /// Inclusive upper bound.
    pub until: OffsetDateTime,
}

impl EdgeCondition {
    /// Evaluate the condition against a screening window.
    pub fn holds(&self, start_at: OffsetDateTime, end_at: OffsetDateTime) -> bool {
        let value = match self.field {
            ScheduleField::StartAt => start_at,
            ScheduleField::EndAt => end_at,
        };
        self.after.is_none_or(|after| value > after) && value <= self.until
    }
}

/// One edge of the lifecycle table.
///
/// | Edge | From | To | Condition |
/// |---|---|---|---|
/// | `Open` | CLOSED | WAITING | `start_at - preroll <= now < start_at` |
/// | `Start` | WAITING | PLAYING | `now >= start_at` |
/// | `Finish` | PLAYING | ENDING | `now >= end_at` |
/// | `Close` | ENDING | CLOSED | `now >= end_at + closing_grace` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionEdge {
    /// CLOSED to WAITING when the pre-roll window opens.
    Open,
    /// WAITING to PLAYING at `start_at`.
    Start,
    /// PLAYING to ENDING at `end_at`.
    Finish,
    /// ENDING to CLOSED once the closing grace period has elapsed.
    Close,
}

/// Order in which a tick applies the edges. Later states go first so that a single pass
/// moves a screening at most one step.
pub const TICK_ORDER: [TransitionEdge; 4] = [
    TransitionEdge::Close,
    TransitionEdge::Finish,
    TransitionEdge::Start,
    TransitionEdge::Open,
];

impl TransitionEdge {
    /// Status a screening must currently hold for the edge to apply.
    pub fn from_status(self) -> ScreeningStatus {
        match self {
            TransitionEdge::Open => ScreeningStatus::Closed,
            TransitionEdge::Start => ScreeningStatus::Waiting,
            TransitionEdge::Finish => ScreeningStatus::Playing,
            TransitionEdge::Close => ScreeningStatus::Ending,
        }
    }

    /// Status written when the edge applies.
    pub fn to_status(self) -> ScreeningStatus {
        match self {
            TransitionEdge::Open => ScreeningStatus::Waiting,
            TransitionEdge::Start => ScreeningStatus::Playing,
            TransitionEdge::Finish => ScreeningStatus::Ending,
            TransitionEdge::Close => ScreeningStatus::Closed,
        }
    }

    /// Time predicate of the edge at `now`.
    pub fn condition(self, now: OffsetDateTime, windows: LifecycleWindows) -> EdgeCondition {
        match self {
            // start_at - preroll <= now < start_at  <=>  now < start_at <= now + preroll
            TransitionEdge::Open => EdgeCondition {
                field: ScheduleField::StartAt,
                after: Some(now),
                until: now.saturating_add(windows.preroll),
            },
            TransitionEdge::Start => EdgeCondition {
                field: ScheduleField::StartAt,
                after: None,
                until: now,
            },
            TransitionEdge::Finish => EdgeCondition {
                field: ScheduleField::EndAt,
                after: None,
                until: now,
            },
            TransitionEdge::Close => EdgeCondition {
                field: ScheduleField::EndAt,
                after: None,
                until: now.saturating_sub(windows.closing_grace),
            },
        }
    }

    /// Whether a screening in `status` with the given window may take this edge at `now`.
    pub fn is_eligible(
        self,
        status: ScreeningStatus,
        start_at: OffsetDateTime,
        end_at: OffsetDateTime,
        now: OffsetDateTime,
        windows: LifecycleWindows,
    ) -> bool {
        status == self.from_status() && self.condition(now, windows).holds(start_at, end_at)
    }
}

impl fmt::Display for TransitionEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.from_status(), self.to_status())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    const START: OffsetDateTime = datetime!(2025-03-01 20:00 UTC);
    const END: OffsetDateTime = datetime!(2025-03-01 20:30 UTC);

    fn eligible(edge: TransitionEdge, status: ScreeningStatus, now: OffsetDateTime) -> bool {
        edge.is_eligible(status, START, END, now, LifecycleWindows::default())
    }

    #[test]
    fn open_edge_covers_exactly_the_preroll_window() {
        use ScreeningStatus::Closed;

        assert!(!eligible(TransitionEdge::Open, Closed, START - Duration::minutes(11)));
        assert!(eligible(TransitionEdge::Open, Closed, START - Duration::minutes(10)));
        assert!(eligible(TransitionEdge::Open, Closed, START - Duration::seconds(1)));
        assert!(!eligible(TransitionEdge::Open, Closed, START));
        // Past screenings that are CLOSED stay CLOSED.
        assert!(!eligible(TransitionEdge::Open, Closed, END + Duration::hours(1)));
    }

    #[test]
    fn start_finish_and_close_are_inclusive_thresholds() {
        use ScreeningStatus::{Ending, Playing, Waiting};

        assert!(!eligible(TransitionEdge::Start, Waiting, START - Duration::seconds(1)));
        assert!(eligible(TransitionEdge::Start, Waiting, START));

        assert!(!eligible(TransitionEdge::Finish, Playing, END - Duration::seconds(1)));
        assert!(eligible(TransitionEdge::Finish, Playing, END));

        assert!(!eligible(TransitionEdge::Close, Ending, END + Duration::minutes(9)));
        assert!(eligible(TransitionEdge::Close, Ending, END + Duration::minutes(10)));
    }

    #[test]
    fn edges_require_their_source_status() {
        assert!(!eligible(TransitionEdge::Start, ScreeningStatus::Closed, START));
        assert!(!eligible(TransitionEdge::Finish, ScreeningStatus::Waiting, END));
        assert!(!eligible(TransitionEdge::Close, ScreeningStatus::Playing, END + Duration::hours(1)));
        assert!(!eligible(
            TransitionEdge::Open,
            ScreeningStatus::Waiting,
            START - Duration::minutes(5)
        ));
    }

    #[test]
    fn tick_order_walks_the_table_backwards() {
        let targets: Vec<_> = TICK_ORDER.iter().map(|edge| edge.to_status()).collect();
        assert_eq!(
            targets,
            vec![
                ScreeningStatus::Closed,
                ScreeningStatus::Ending,
                ScreeningStatus::Playing,
                ScreeningStatus::Waiting,
            ]
        );
        for pair in TICK_ORDER.windows(2) {
            assert_eq!(pair[0].from_status(), pair[1].to_status());
        }
    }

    #[test]
    fn edges_chain_into_a_cycle() {
        for edge in TICK_ORDER {
            let next = TICK_ORDER
                .iter()
                .find(|candidate| candidate.from_status() == edge.to_status())
                .copied();
            match next {
                Some(_) => {}
                None => panic!("unexpected dead end after {edge}"),
            }
        }
    }

    #[test]
    fn status_uses_upper_case_wire_names() {
        let json = serde_json::to_string(&ScreeningStatus::Playing).unwrap();
        assert_eq!(json, "\"PLAYING\"");
        let parsed: ScreeningStatus = serde_json::from_str("\"ENDING\"").unwrap();
        assert_eq!(parsed, ScreeningStatus::Ending);
    }

    #[test]
    fn custom_windows_shift_the_thresholds() {
        let windows = LifecycleWindows {
            preroll: Duration::minutes(30),
            closing_grace: Duration::minutes(1),
        };
        assert!(TransitionEdge::Open.is_eligible(
            ScreeningStatus::Closed,
            START,
            END,
            START - Duration::minutes(25),
            windows
        ));
        assert!(TransitionEdge::Close.is_eligible(
            ScreeningStatus::Ending,
            START,
            END,
            END + Duration::minutes(1),
            windows
        ));
    }

    #[test]
    fn huge_windows_saturate_instead_of_overflowing() {
        let windows = LifecycleWindows {
            preroll: Duration::MAX,
            closing_grace: Duration::MAX,
        };
        let open = TransitionEdge::Open.condition(START, windows);
        assert_eq!(open.until, START.saturating_add(Duration::MAX));
        assert!(!TransitionEdge::Close.is_eligible(ScreeningStatus::Ending, START, END, END, windows));
    }
}
