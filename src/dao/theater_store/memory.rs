//! In-process [`TheaterStore`] used when no database is configured and by the test suites.
//!
//! Row-level atomicity comes from DashMap entry guards: every conditional update re-checks
//! its predicate while holding the write guard of the row it mutates. When two maps are
//! involved the guards are always taken in the order index, sessions, contents.

use std::{io, sync::Arc};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use time::{Date, Duration, OffsetDateTime};
use uuid::Uuid;

use super::TheaterStore;
use crate::{
    dao::{
        models::{
            ContentEntity, CreditOutcome, ScreeningDayEntity, ScreeningEntity, ScreeningPage,
            ScreeningSearch, SessionState, WatchSessionEntity,
        },
        storage::{StorageError, StorageResult},
    },
    state::lifecycle::{LifecycleWindows, TransitionEdge},
};

#[derive(Clone, Default)]
/// Memory-backed store; clones share the same data.
pub struct MemoryTheaterStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    contents: DashMap<Uuid, ContentEntity>,
    subscriptions: DashMap<Uuid, bool>,
    days: DashMap<Uuid, ScreeningDayEntity>,
    day_index: DashMap<(Uuid, Date), Uuid>,
    screenings: DashMap<Uuid, ScreeningEntity>,
    sessions: DashMap<Uuid, WatchSessionEntity>,
    session_index: DashMap<(Uuid, Uuid), Uuid>,
    #[cfg(test)]
    failing_credits: dashmap::DashSet<Uuid>,
}

impl MemoryTheaterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a content item.
    pub fn insert_content(&self, content: ContentEntity) {
        self.inner.contents.insert(content.id, content);
    }

    /// Set the subscription flag of a viewer.
    pub fn set_subscription(&self, viewer_id: Uuid, active: bool) {
        self.inner.subscriptions.insert(viewer_id, active);
    }

    /// Make every credit attempt on `session_id` fail with a storage error.
    #[cfg(test)]
    pub(crate) fn fail_credits_for(&self, session_id: Uuid) {
        self.inner.failing_credits.insert(session_id);
    }

    fn screenings_for_day(&self, day_id: Uuid) -> Vec<ScreeningEntity> {
        let mut screenings: Vec<_> = self
            .inner
            .screenings
            .iter()
            .filter(|entry| entry.day_id == day_id)
            .map(|entry| entry.value().clone())
            .collect();
        screenings.sort_by_key(|screening| screening.start_at);
        screenings
    }

    fn search(&self, search: &ScreeningSearch) -> ScreeningPage {
        let mut matches: Vec<(String, ScreeningEntity)> = self
            .inner
            .screenings
            .iter()
            .filter(|entry| {
                search.matches(entry.value())
                    && self.inner.days.get(&entry.day_id).is_some_and(|day| day.locked)
            })
            .map(|entry| {
                let title = self
                    .inner
                    .contents
                    .get(&entry.content_id)
                    .map(|content| content.title.clone())
                    .unwrap_or_default();
                (title, entry.value().clone())
            })
            .collect();
        matches.sort_by(|(a_title, a), (b_title, b)| {
            a_title
                .cmp(b_title)
                .then(a.start_at.cmp(&b.start_at))
                .then(a.id.cmp(&b.id))
        });

        let total = matches.len() as u64;
        let offset = usize::try_from(search.offset()).unwrap_or(usize::MAX);
        let size = usize::try_from(search.size).unwrap_or(usize::MAX);
        let items = matches
            .into_iter()
            .skip(offset)
            .take(size)
            .map(|(_, screening)| screening)
            .collect();
        ScreeningPage { items, total }
    }

    fn reschedule(
        &self,
        id: Uuid,
        start_at: OffsetDateTime,
        end_at: OffsetDateTime,
    ) -> Option<ScreeningEntity> {
        let mut screening = self.inner.screenings.get_mut(&id)?;
        screening.start_at = start_at;
        screening.end_at = end_at;
        Some(screening.clone())
    }

    fn has_overlap(
        &self,
        owner_id: Uuid,
        start_at: OffsetDateTime,
        end_at: OffsetDateTime,
        exclude: Option<Uuid>,
    ) -> bool {
        self.inner.screenings.iter().any(|entry| {
            entry.owner_id == owner_id
                && Some(entry.id) != exclude
                && entry.overlaps(start_at, end_at)
        })
    }

    fn ensure_day(&self, content_id: Uuid, date: Date) -> ScreeningDayEntity {
        let day_id = *self
            .inner
            .day_index
            .entry((content_id, date))
            .or_insert_with(|| {
                let day = ScreeningDayEntity {
                    id: Uuid::new_v4(),
                    content_id,
                    date,
                    locked: false,
                    locked_at: None,
                };
                let id = day.id;
                self.inner.days.insert(id, day);
                id
            });

        self.inner
            .days
            .get(&day_id)
            .map(|day| day.clone())
            .unwrap_or(ScreeningDayEntity {
                id: day_id,
                content_id,
                date,
                locked: false,
                locked_at: None,
            })
    }

    fn lock_day(&self, id: Uuid, locked_at: Option<OffsetDateTime>) -> Option<ScreeningDayEntity> {
        let mut day = self.inner.days.get_mut(&id)?;
        if day.locked {
            return None;
        }
        day.locked = locked_at.is_some();
        day.locked_at = locked_at;
        Some(day.clone())
    }

    fn transition(
        &self,
        edge: TransitionEdge,
        now: OffsetDateTime,
        windows: LifecycleWindows,
    ) -> Vec<Uuid> {
        let mut moved = Vec::new();
        for mut screening in self.inner.screenings.iter_mut() {
            if edge.is_eligible(
                screening.status,
                screening.start_at,
                screening.end_at,
                now,
                windows,
            ) {
                screening.status = edge.to_status();
                moved.push(screening.id);
            }
        }
        moved
    }

    fn open(
        &self,
        viewer_id: Uuid,
        screening_id: Uuid,
        content_id: Uuid,
        now: OffsetDateTime,
    ) -> WatchSessionEntity {
        let fresh = || WatchSessionEntity {
            id: Uuid::new_v4(),
            viewer_id,
            screening_id,
            content_id,
            entered_at: now,
            left_at: None,
            view_counted: false,
        };

        match self.inner.session_index.entry((viewer_id, screening_id)) {
            Entry::Occupied(mut indexed) => {
                if let Some(mut session) = self.inner.sessions.get_mut(indexed.get()) {
                    session.entered_at = now;
                    session.left_at = None;
                    return session.clone();
                }
                // Index pointed at a removed row; start over.
                let session = fresh();
                indexed.insert(session.id);
                self.inner.sessions.insert(session.id, session.clone());
                session
            }
            Entry::Vacant(slot) => {
                let session = fresh();
                self.inner.sessions.insert(session.id, session.clone());
                slot.insert(session.id);
                session
            }
        }
    }

    fn close(
        &self,
        viewer_id: Uuid,
        screening_id: Uuid,
        now: OffsetDateTime,
    ) -> Option<WatchSessionEntity> {
        let session_id = *self.inner.session_index.get(&(viewer_id, screening_id))?;
        let mut session = self.inner.sessions.get_mut(&session_id)?;
        if session.left_at.is_some() {
            return None;
        }
        session.left_at = Some(now);
        Some(session.clone())
    }

    fn credit(&self, session_id: Uuid) -> StorageResult<CreditOutcome> {
        #[cfg(test)]
        if self.inner.failing_credits.contains(&session_id) {
            return Err(StorageError::unavailable(
                format!("credit of session `{session_id}` rejected"),
                io::Error::other("injected failure"),
            ));
        }

        let Some(mut session) = self.inner.sessions.get_mut(&session_id) else {
            return Ok(CreditOutcome::NotEligible);
        };
        match session.state() {
            SessionState::Active => return Ok(CreditOutcome::NotEligible),
            SessionState::ClosedCredited => return Ok(CreditOutcome::AlreadyCredited),
            SessionState::ClosedUncredited => {}
        }

        // The session guard is held until the counters are bumped.
        let Some(mut content) = self.inner.contents.get_mut(&session.content_id) else {
            return Err(StorageError::unavailable(
                format!("content `{}` missing while crediting", session.content_id),
                io::Error::new(io::ErrorKind::NotFound, "content not found"),
            ));
        };
        content.total_view += 1;
        content.month_view += 1;
        session.view_counted = true;
        Ok(CreditOutcome::Credited)
    }

    fn creditable(&self, left_before: OffsetDateTime, min_watch: Duration) -> Vec<WatchSessionEntity> {
        self.inner
            .sessions
            .iter()
            .filter(|entry| {
                entry.left_at.is_some_and(|left_at| left_at <= left_before)
                    && entry.qualifies_for_credit(min_watch)
            })
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn sessions_for_viewer(&self, viewer_id: Uuid) -> Vec<WatchSessionEntity> {
        let mut sessions: Vec<_> = self
            .inner
            .sessions
            .iter()
            .filter(|entry| entry.viewer_id == viewer_id)
            .map(|entry| entry.value().clone())
            .collect();
        sessions.sort_by(|a, b| b.entered_at.cmp(&a.entered_at));
        sessions
    }
}

impl TheaterStore for MemoryTheaterStore {
    fn find_screening(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ScreeningEntity>>> {
        let found = self.inner.screenings.get(&id).map(|entry| entry.clone());
        Box::pin(async move { Ok(found) })
    }

    fn list_screenings_for_day(
        &self,
        day_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ScreeningEntity>>> {
        let screenings = self.screenings_for_day(day_id);
        Box::pin(async move { Ok(screenings) })
    }

    fn search_screenings(
        &self,
        search: ScreeningSearch,
    ) -> BoxFuture<'static, StorageResult<ScreeningPage>> {
        let page = self.search(&search);
        Box::pin(async move { Ok(page) })
    }

    fn insert_screening(&self, screening: ScreeningEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.screenings.insert(screening.id, screening);
        Box::pin(async { Ok(()) })
    }

    fn reschedule_screening(
        &self,
        id: Uuid,
        start_at: OffsetDateTime,
        end_at: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<Option<ScreeningEntity>>> {
        let updated = self.reschedule(id, start_at, end_at);
        Box::pin(async move { Ok(updated) })
    }

    fn delete_screening(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let removed = self.inner.screenings.remove(&id).is_some();
        Box::pin(async move { Ok(removed) })
    }

    fn owner_has_overlap(
        &self,
        owner_id: Uuid,
        start_at: OffsetDateTime,
        end_at: OffsetDateTime,
        exclude: Option<Uuid>,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let overlap = self.has_overlap(owner_id, start_at, end_at, exclude);
        Box::pin(async move { Ok(overlap) })
    }

    fn find_screening_day(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ScreeningDayEntity>>> {
        let found = self.inner.days.get(&id).map(|entry| entry.clone());
        Box::pin(async move { Ok(found) })
    }

    fn find_screening_day_by_date(
        &self,
        content_id: Uuid,
        date: Date,
    ) -> BoxFuture<'static, StorageResult<Option<ScreeningDayEntity>>> {
        let found = self
            .inner
            .day_index
            .get(&(content_id, date))
            .map(|entry| *entry)
            .and_then(|id| self.inner.days.get(&id).map(|entry| entry.clone()));
        Box::pin(async move { Ok(found) })
    }

    fn ensure_screening_day(
        &self,
        content_id: Uuid,
        date: Date,
    ) -> BoxFuture<'static, StorageResult<ScreeningDayEntity>> {
        let day = self.ensure_day(content_id, date);
        Box::pin(async move { Ok(day) })
    }

    fn set_day_lock(
        &self,
        id: Uuid,
        locked_at: Option<OffsetDateTime>,
    ) -> BoxFuture<'static, StorageResult<Option<ScreeningDayEntity>>> {
        let updated = self.lock_day(id, locked_at);
        Box::pin(async move { Ok(updated) })
    }

    fn apply_transition(
        &self,
        edge: TransitionEdge,
        now: OffsetDateTime,
        windows: LifecycleWindows,
    ) -> BoxFuture<'static, StorageResult<Vec<Uuid>>> {
        let moved = self.transition(edge, now, windows);
        Box::pin(async move { Ok(moved) })
    }

    fn find_content(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ContentEntity>>> {
        let found = self.inner.contents.get(&id).map(|entry| entry.clone());
        Box::pin(async move { Ok(found) })
    }

    fn subscription_is_active(&self, viewer_id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let active = self
            .inner
            .subscriptions
            .get(&viewer_id)
            .is_some_and(|entry| *entry);
        Box::pin(async move { Ok(active) })
    }

    fn open_session(
        &self,
        viewer_id: Uuid,
        screening_id: Uuid,
        content_id: Uuid,
        now: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<WatchSessionEntity>> {
        let session = self.open(viewer_id, screening_id, content_id, now);
        Box::pin(async move { Ok(session) })
    }

    fn close_session(
        &self,
        viewer_id: Uuid,
        screening_id: Uuid,
        now: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<Option<WatchSessionEntity>>> {
        let closed = self.close(viewer_id, screening_id, now);
        Box::pin(async move { Ok(closed) })
    }

    fn credit_session(&self, session_id: Uuid) -> BoxFuture<'static, StorageResult<CreditOutcome>> {
        let outcome = self.credit(session_id);
        Box::pin(async move { outcome })
    }

    fn find_creditable_sessions(
        &self,
        left_before: OffsetDateTime,
        min_watch: Duration,
    ) -> BoxFuture<'static, StorageResult<Vec<WatchSessionEntity>>> {
        let sessions = self.creditable(left_before, min_watch);
        Box::pin(async move { Ok(sessions) })
    }

    fn count_active_sessions(&self, screening_id: Uuid) -> BoxFuture<'static, StorageResult<u64>> {
        let count = self
            .inner
            .sessions
            .iter()
            .filter(|entry| entry.screening_id == screening_id && entry.left_at.is_none())
            .count() as u64;
        Box::pin(async move { Ok(count) })
    }

    fn list_sessions_for_viewer(
        &self,
        viewer_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<WatchSessionEntity>>> {
        let sessions = self.sessions_for_viewer(viewer_id);
        Box::pin(async move { Ok(sessions) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
