use time::{Date, Duration, OffsetDateTime};
use uuid::Uuid;

use crate::state::lifecycle::ScreeningStatus;

/// Content aggregate as far as scheduling and view crediting are concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEntity {
    /// Stable identifier for the content.
    pub id: Uuid,
    /// Account that owns the content and may schedule it.
    pub owner_id: Uuid,
    /// Display title echoed back to viewers.
    pub title: String,
    /// Only published content can be scheduled.
    pub published: bool,
    /// Lifetime credited views.
    pub total_view: u64,
    /// Credited views for the current month.
    pub month_view: u64,
}

/// Groups the screenings of one content item on one calendar date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreeningDayEntity {
    /// Stable identifier for the day.
    pub id: Uuid,
    /// Content the day belongs to.
    pub content_id: Uuid,
    /// Calendar date, unique per content.
    pub date: Date,
    /// Once locked, screenings under the day can no longer be added, edited or deleted.
    pub locked: bool,
    /// When the day was locked.
    pub locked_at: Option<OffsetDateTime>,
}

/// A single scheduled broadcast slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreeningEntity {
    /// Stable identifier for the screening.
    pub id: Uuid,
    /// Content being broadcast.
    pub content_id: Uuid,
    /// Day grouping this screening.
    pub day_id: Uuid,
    /// Owner of the content at scheduling time, used for overlap checks.
    pub owner_id: Uuid,
    /// Broadcast start, always before `end_at`.
    pub start_at: OffsetDateTime,
    /// Broadcast end.
    pub end_at: OffsetDateTime,
    /// Current lifecycle status.
    pub status: ScreeningStatus,
}

impl ScreeningEntity {
    /// Whether this slot intersects `[start_at, end_at)`.
    pub fn overlaps(&self, start_at: OffsetDateTime, end_at: OffsetDateTime) -> bool {
        self.start_at < end_at && self.end_at > start_at
    }

    /// Broadcast length.
    pub fn duration(&self) -> Duration {
        self.end_at - self.start_at
    }
}

/// Filter and page of a schedule search. Only screenings under locked days are returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreeningSearch {
    /// Restrict to one owner's screenings.
    pub owner_id: Option<Uuid>,
    /// Keep screenings intersecting `[from, until)`.
    pub range: Option<(OffsetDateTime, OffsetDateTime)>,
    /// Zero-based page index.
    pub page: u64,
    /// Page length.
    pub size: u64,
}

impl ScreeningSearch {
    /// Rows skipped before the requested page.
    pub fn offset(&self) -> u64 {
        self.page.saturating_mul(self.size)
    }

    /// Whether a screening passes the owner and range filters.
    pub fn matches(&self, screening: &ScreeningEntity) -> bool {
        self.owner_id.is_none_or(|owner_id| screening.owner_id == owner_id)
            && self
                .range
                .is_none_or(|(from, until)| screening.overlaps(from, until))
    }
}

/// One page of search results with the number of matches across all pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreeningPage {
    /// Screenings of the requested page.
    pub items: Vec<ScreeningEntity>,
    /// Matches across every page.
    pub total: u64,
}

/// Attendance record of one viewer for one screening.
///
/// There is exactly one row per (viewer, screening); re-entering reuses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSessionEntity {
    /// Stable identifier for the session.
    pub id: Uuid,
    /// Viewer attending.
    pub viewer_id: Uuid,
    /// Screening attended.
    pub screening_id: Uuid,
    /// Content whose counters a credit increments.
    pub content_id: Uuid,
    /// Latest entry time.
    pub entered_at: OffsetDateTime,
    /// Latest exit time, `None` while the viewer is in the room.
    pub left_at: Option<OffsetDateTime>,
    /// Whether the content counters were incremented for this session.
    pub view_counted: bool,
}

/// Derived state of a [`WatchSessionEntity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Viewer is currently in the room.
    Active,
    /// Viewer left and no view was credited yet.
    ClosedUncredited,
    /// Viewer left and the view was credited.
    ClosedCredited,
}

impl WatchSessionEntity {
    /// Current state derived from `left_at` and `view_counted`.
    pub fn state(&self) -> SessionState {
        match (self.left_at, self.view_counted) {
            (None, _) => SessionState::Active,
            (Some(_), false) => SessionState::ClosedUncredited,
            (Some(_), true) => SessionState::ClosedCredited,
        }
    }

    /// Time spent in the room for the latest enter/leave pair, once closed.
    pub fn watched(&self) -> Option<Duration> {
        self.left_at.map(|left_at| left_at - self.entered_at)
    }

    /// Whether the latest enter/leave pair lasted at least `min_watch` and is still uncredited.
    pub fn qualifies_for_credit(&self, min_watch: Duration) -> bool {
        self.state() == SessionState::ClosedUncredited
            && self.watched().is_some_and(|watched| watched >= min_watch)
    }
}

/// Result of an atomic credit attempt on one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditOutcome {
    /// This call flipped `view_counted` and incremented the counters.
    Credited,
    /// Another caller already credited the session.
    AlreadyCredited,
    /// The session is unknown or still active.
    NotEligible,
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn session(left_at: Option<OffsetDateTime>, view_counted: bool) -> WatchSessionEntity {
        WatchSessionEntity {
            id: Uuid::new_v4(),
            viewer_id: Uuid::new_v4(),
            screening_id: Uuid::new_v4(),
            content_id: Uuid::new_v4(),
            entered_at: datetime!(2025-03-01 20:01 UTC),
            left_at,
            view_counted,
        }
    }

    #[test]
    fn session_state_follows_left_at_and_flag() {
        assert_eq!(session(None, false).state(), SessionState::Active);
        assert_eq!(
            session(Some(datetime!(2025-03-01 20:07 UTC)), false).state(),
            SessionState::ClosedUncredited
        );
        assert_eq!(
            session(Some(datetime!(2025-03-01 20:07 UTC)), true).state(),
            SessionState::ClosedCredited
        );
    }

    #[test]
    fn credit_requires_minimum_watch_time() {
        let min_watch = Duration::minutes(5);
        assert!(session(Some(datetime!(2025-03-01 20:07 UTC)), false).qualifies_for_credit(min_watch));
        assert!(session(Some(datetime!(2025-03-01 20:06 UTC)), false).qualifies_for_credit(min_watch));
        assert!(!session(Some(datetime!(2025-03-01 20:02 UTC)), false).qualifies_for_credit(min_watch));
        assert!(!session(Some(datetime!(2025-03-01 20:07 UTC)), true).qualifies_for_credit(min_watch));
        assert!(!session(None, false).qualifies_for_credit(min_watch));
    }

    #[test]
    fn overlap_is_strict_on_both_ends() {
        let screening = ScreeningEntity {
            id: Uuid::new_v4(),
            content_id: Uuid::new_v4(),
            day_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            start_at: datetime!(2025-03-01 20:00 UTC),
            end_at: datetime!(2025-03-01 21:00 UTC),
            status: ScreeningStatus::Closed,
        };

        assert!(screening.overlaps(datetime!(2025-03-01 20:30 UTC), datetime!(2025-03-01 21:30 UTC)));
        assert!(screening.overlaps(datetime!(2025-03-01 19:00 UTC), datetime!(2025-03-01 22:00 UTC)));
        assert!(!screening.overlaps(datetime!(2025-03-01 21:00 UTC), datetime!(2025-03-01 22:00 UTC)));
        assert!(!screening.overlaps(datetime!(2025-03-01 19:00 UTC), datetime!(2025-03-01 20:00 UTC)));
    }
}
