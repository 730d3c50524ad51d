pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;
pub mod seed;

use futures::future::BoxFuture;
use time::{Date, Duration, OffsetDateTime};
use uuid::Uuid;

use crate::dao::models::{
    ContentEntity, CreditOutcome, ScreeningDayEntity, ScreeningEntity, ScreeningPage,
    ScreeningSearch, WatchSessionEntity,
};
use crate::dao::storage::StorageResult;
use crate::state::lifecycle::{LifecycleWindows, TransitionEdge};

pub use self::memory::MemoryTheaterStore;

/// Abstraction over the persistence layer for screenings, watch sessions and view counters.
///
/// Every mutating operation that can race is a conditional update on a single row: callers
/// never read a record, decide, and write it back.
pub trait TheaterStore: Send + Sync {
    /// Load a screening by id.
    fn find_screening(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ScreeningEntity>>>;

    /// Screenings grouped under a day, ordered by `start_at`.
    fn list_screenings_for_day(
        &self,
        day_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ScreeningEntity>>>;

    /// Screenings of locked days matching `search`, ordered by content title then
    /// `start_at`, cut to the requested page.
    fn search_screenings(
        &self,
        search: ScreeningSearch,
    ) -> BoxFuture<'static, StorageResult<ScreeningPage>>;

    /// Persist a freshly scheduled screening.
    fn insert_screening(&self, screening: ScreeningEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// Move a screening to a new slot, returning the updated record when it exists.
    fn reschedule_screening(
        &self,
        id: Uuid,
        start_at: OffsetDateTime,
        end_at: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<Option<ScreeningEntity>>>;

    /// Remove a screening; `false` when it did not exist.
    fn delete_screening(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;

    /// Whether the owner already has a screening intersecting `[start_at, end_at)`,
    /// ignoring `exclude`.
    fn owner_has_overlap(
        &self,
        owner_id: Uuid,
        start_at: OffsetDateTime,
        end_at: OffsetDateTime,
        exclude: Option<Uuid>,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    /// Load a screening day by id.
    fn find_screening_day(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ScreeningDayEntity>>>;

    /// Load the day of a content item on a date.
    fn find_screening_day_by_date(
        &self,
        content_id: Uuid,
        date: Date,
    ) -> BoxFuture<'static, StorageResult<Option<ScreeningDayEntity>>>;

    /// Get or create the unlocked day for a content item on a date.
    fn ensure_screening_day(
        &self,
        content_id: Uuid,
        date: Date,
    ) -> BoxFuture<'static, StorageResult<ScreeningDayEntity>>;

    /// Set the lock flag of a day that is currently unlocked. `locked_at` set means locked.
    ///
    /// Returns `None` when the day does not exist or was already locked.
    fn set_day_lock(
        &self,
        id: Uuid,
        locked_at: Option<OffsetDateTime>,
    ) -> BoxFuture<'static, StorageResult<Option<ScreeningDayEntity>>>;

    /// Move every screening eligible for `edge` at `now` and return the ids this call moved.
    ///
    /// Each row is moved by re-checking `status = edge.from AND <time predicate>` atomically,
    /// so overlapping invocations never move the same screening twice.
    fn apply_transition(
        &self,
        edge: TransitionEdge,
        now: OffsetDateTime,
        windows: LifecycleWindows,
    ) -> BoxFuture<'static, StorageResult<Vec<Uuid>>>;

    /// Load a content item with its counters.
    fn find_content(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ContentEntity>>>;

    /// Whether the viewer holds an active subscription.
    fn subscription_is_active(&self, viewer_id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;

    /// Create the viewer's session for a screening, or reopen the existing one by clearing
    /// `left_at` and refreshing `entered_at`.
    fn open_session(
        &self,
        viewer_id: Uuid,
        screening_id: Uuid,
        content_id: Uuid,
        now: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<WatchSessionEntity>>;

    /// Close the viewer's active session, returning it, or `None` when none is active.
    fn close_session(
        &self,
        viewer_id: Uuid,
        screening_id: Uuid,
        now: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<Option<WatchSessionEntity>>>;

    /// Flip `view_counted` from false to true on a closed session and increment the
    /// content counters exactly once.
    fn credit_session(&self, session_id: Uuid) -> BoxFuture<'static, StorageResult<CreditOutcome>>;

    /// Closed, uncredited sessions that left at or before `left_before` and lasted at least
    /// `min_watch`.
    fn find_creditable_sessions(
        &self,
        left_before: OffsetDateTime,
        min_watch: Duration,
    ) -> BoxFuture<'static, StorageResult<Vec<WatchSessionEntity>>>;

    /// Number of viewers currently in the room.
    fn count_active_sessions(&self, screening_id: Uuid) -> BoxFuture<'static, StorageResult<u64>>;

    /// A viewer's sessions, newest entry first.
    fn list_sessions_for_viewer(
        &self,
        viewer_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<WatchSessionEntity>>>;

    /// Cheap round-trip used by the storage supervisor.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;

    /// Re-establish the underlying connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
