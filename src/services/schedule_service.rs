use std::collections::HashMap;

use time::{Date, OffsetDateTime};
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        models::{ContentEntity, ScreeningDayEntity, ScreeningEntity, ScreeningSearch},
        theater_store::TheaterStore,
    },
    dto::{
        schedule::{
            CreateScreeningRequest, CreateScreeningResponse, EditScreeningRequest, LockDayResponse,
            MAX_PAGE_SIZE, ScheduleSearchQuery, ScreeningDayResponse, ScreeningPageResponse,
            ScreeningResponse,
        },
        theater::ContentViewsResponse,
    },
    error::ServiceError,
    services::theater_events,
    state::{SharedState, lifecycle::ScreeningStatus},
};

/// Schedule a new screening of an owned, published content item.
///
/// The screening starts out CLOSED; the lifecycle scheduler opens it when its pre-roll
/// window begins.
pub async fn create(
    state: &SharedState,
    owner_id: Uuid,
    request: CreateScreeningRequest,
) -> Result<CreateScreeningResponse, ServiceError> {
    let store = state.require_store().await?;
    let content = owned_content(store.as_ref(), owner_id, request.content_id).await?;
    if !content.published {
        return Err(ServiceError::InvalidInput(format!(
            "content `{}` is not published",
            content.id
        )));
    }
    ensure_window(request.start_at, request.end_at)?;
    ensure_no_overlap(store.as_ref(), owner_id, request.start_at, request.end_at, None).await?;

    let day = store
        .ensure_screening_day(content.id, request.date)
        .await?;
    ensure_unlocked(&day)?;

    let screening = ScreeningEntity {
        id: Uuid::new_v4(),
        content_id: content.id,
        day_id: day.id,
        owner_id,
        start_at: request.start_at,
        end_at: request.end_at,
        status: ScreeningStatus::Closed,
    };
    store.insert_screening(screening.clone()).await?;
    info!(screening_id = %screening.id, day_id = %day.id, owner_id = %owner_id, "screening scheduled");

    Ok(CreateScreeningResponse {
        screening_id: screening.id,
        day_id: day.id,
    })
}

/// Move one of the owner's screenings to a new slot.
pub async fn edit(
    state: &SharedState,
    owner_id: Uuid,
    screening_id: Uuid,
    request: EditScreeningRequest,
) -> Result<ScreeningResponse, ServiceError> {
    let store = state.require_store().await?;
    let screening = owned_screening(store.as_ref(), owner_id, screening_id).await?;
    ensure_day_unlocked(store.as_ref(), screening.day_id).await?;
    ensure_window(request.start_at, request.end_at)?;
    ensure_no_overlap(
        store.as_ref(),
        owner_id,
        request.start_at,
        request.end_at,
        Some(screening_id),
    )
    .await?;

    let updated = store
        .reschedule_screening(screening_id, request.start_at, request.end_at)
        .await?
        .ok_or_else(|| screening_not_found(screening_id))?;
    info!(screening_id = %screening_id, "screening rescheduled");

    theater_events::publish_playback_state(state, screening_id).await;
    let title = content_title(store.as_ref(), updated.content_id).await?;
    Ok(ScreeningResponse::new(updated, title))
}

/// Remove one of the owner's screenings.
pub async fn delete(
    state: &SharedState,
    owner_id: Uuid,
    screening_id: Uuid,
) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    let screening = owned_screening(store.as_ref(), owner_id, screening_id).await?;
    ensure_day_unlocked(store.as_ref(), screening.day_id).await?;

    if !store.delete_screening(screening_id).await? {
        return Err(screening_not_found(screening_id));
    }
    info!(screening_id = %screening_id, "screening deleted");

    // Subscribers fall back to the closed state.
    theater_events::publish_playback_state(state, screening_id).await;
    Ok(())
}

/// Load a screening with the title of its content.
pub async fn get(state: &SharedState, screening_id: Uuid) -> Result<ScreeningResponse, ServiceError> {
    let store = state.require_store().await?;
    let screening = store
        .find_screening(screening_id)
        .await?
        .ok_or_else(|| screening_not_found(screening_id))?;
    let title = content_title(store.as_ref(), screening.content_id).await?;
    Ok(ScreeningResponse::new(screening, title))
}

/// Load a content's day with its screenings ordered by start.
pub async fn day(
    state: &SharedState,
    content_id: Uuid,
    date: Date,
) -> Result<ScreeningDayResponse, ServiceError> {
    let store = state.require_store().await?;
    let day = store
        .find_screening_day_by_date(content_id, date)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("no screening day for `{content_id}` on {date}"))
        })?;
    let title = content_title(store.as_ref(), content_id).await?;
    let screenings = store
        .list_screenings_for_day(day.id)
        .await?
        .into_iter()
        .map(|screening| ScreeningResponse::new(screening, title.clone()))
        .collect();

    Ok(ScreeningDayResponse {
        day_id: day.id,
        content_id: day.content_id,
        date: day.date,
        locked: day.locked,
        locked_at: day.locked_at,
        screenings,
    })
}

/// Page through the screenings of locked days, ordered by content title then start.
///
/// A date range keeps screenings that intersect `[start_date 00:00, end_date + 1 day 00:00)`
/// in UTC.
pub async fn search(
    state: &SharedState,
    query: ScheduleSearchQuery,
) -> Result<ScreeningPageResponse, ServiceError> {
    let store = state.require_store().await?;
    let size = query.size.clamp(1, MAX_PAGE_SIZE);
    let range = match (query.start_date, query.end_date) {
        (None, None) => None,
        (Some(start), Some(end)) => Some(day_range(start, end)?),
        _ => {
            return Err(ServiceError::InvalidInput(
                "start_date and end_date go together".into(),
            ));
        }
    };

    let found = store
        .search_screenings(ScreeningSearch {
            owner_id: query.owner_id,
            range,
            page: query.page,
            size,
        })
        .await?;

    let mut titles: HashMap<Uuid, String> = HashMap::new();
    let mut items = Vec::with_capacity(found.items.len());
    for screening in found.items {
        let title = match titles.get(&screening.content_id) {
            Some(title) => title.clone(),
            None => {
                let title = content_title(store.as_ref(), screening.content_id).await?;
                titles.insert(screening.content_id, title.clone());
                title
            }
        };
        items.push(ScreeningResponse::new(screening, title));
    }

    Ok(ScreeningPageResponse::new(items, query.page, size, found.total))
}

/// Lock (or leave unlocked) a day of one of the owner's content items.
///
/// A locked day is final: locking or unlocking it again is rejected.
pub async fn lock(
    state: &SharedState,
    owner_id: Uuid,
    day_id: Uuid,
    locked: bool,
) -> Result<LockDayResponse, ServiceError> {
    let store = state.require_store().await?;
    let day = store
        .find_screening_day(day_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("screening day `{day_id}`")))?;
    owned_content(store.as_ref(), owner_id, day.content_id).await?;
    ensure_unlocked(&day)?;

    let locked_at = locked.then(|| state.now());
    let updated = store
        .set_day_lock(day_id, locked_at)
        .await?
        .ok_or_else(already_locked)?;
    info!(day_id = %day_id, locked = updated.locked, "screening day lock updated");
    Ok(updated.into())
}

/// View counters of a content item.
pub async fn content_views(
    state: &SharedState,
    content_id: Uuid,
) -> Result<ContentViewsResponse, ServiceError> {
    let store = state.require_store().await?;
    store
        .find_content(content_id)
        .await?
        .map(ContentViewsResponse::from)
        .ok_or_else(|| ServiceError::NotFound(format!("content `{content_id}`")))
}

async fn owned_content(
    store: &dyn TheaterStore,
    owner_id: Uuid,
    content_id: Uuid,
) -> Result<ContentEntity, ServiceError> {
    let content = store
        .find_content(content_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("content `{content_id}`")))?;
    if content.owner_id != owner_id {
        return Err(ServiceError::AccessDenied(format!(
            "content `{content_id}` belongs to another owner"
        )));
    }
    Ok(content)
}

async fn owned_screening(
    store: &dyn TheaterStore,
    owner_id: Uuid,
    screening_id: Uuid,
) -> Result<ScreeningEntity, ServiceError> {
    let screening = store
        .find_screening(screening_id)
        .await?
        .ok_or_else(|| screening_not_found(screening_id))?;
    if screening.owner_id != owner_id {
        return Err(ServiceError::AccessDenied(format!(
            "screening `{screening_id}` belongs to another owner"
        )));
    }
    Ok(screening)
}

async fn ensure_day_unlocked(store: &dyn TheaterStore, day_id: Uuid) -> Result<(), ServiceError> {
    match store.find_screening_day(day_id).await? {
        Some(day) => ensure_unlocked(&day),
        None => Err(ServiceError::NotFound(format!("screening day `{day_id}`"))),
    }
}

fn ensure_unlocked(day: &ScreeningDayEntity) -> Result<(), ServiceError> {
    if day.locked {
        return Err(already_locked());
    }
    Ok(())
}

fn ensure_window(start_at: OffsetDateTime, end_at: OffsetDateTime) -> Result<(), ServiceError> {
    if start_at >= end_at {
        return Err(ServiceError::InvalidInput(
            "start_at must be before end_at".into(),
        ));
    }
    Ok(())
}

async fn ensure_no_overlap(
    store: &dyn TheaterStore,
    owner_id: Uuid,
    start_at: OffsetDateTime,
    end_at: OffsetDateTime,
    exclude: Option<Uuid>,
) -> Result<(), ServiceError> {
    if store
        .owner_has_overlap(owner_id, start_at, end_at, exclude)
        .await?
    {
        return Err(ServiceError::Conflict(
            "the slot overlaps another screening of the same owner".into(),
        ));
    }
    Ok(())
}

async fn content_title(store: &dyn TheaterStore, content_id: Uuid) -> Result<String, ServiceError> {
    Ok(store
        .find_content(content_id)
        .await?
        .map(|content| content.title)
        .unwrap_or_default())
}

fn day_range(start: Date, end: Date) -> Result<(OffsetDateTime, OffsetDateTime), ServiceError> {
    if start > end {
        return Err(ServiceError::InvalidInput(
            "start_date must not be after end_date".into(),
        ));
    }
    let until = end
        .next_day()
        .ok_or_else(|| ServiceError::InvalidInput(format!("end_date {end} is out of range")))?;
    Ok((start.midnight().assume_utc(), until.midnight().assume_utc()))
}

fn screening_not_found(screening_id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("screening `{screening_id}`"))
}

fn already_locked() -> ServiceError {
    ServiceError::InvalidState("screening day is locked".into())
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::macros::{date, datetime};

    use super::*;
    use crate::{
        clock::ManualClock, config::AppConfig, dao::theater_store::MemoryTheaterStore,
        state::AppState,
    };

    struct Fixture {
        state: SharedState,
        owner: Uuid,
        content_id: Uuid,
    }

    async fn fixture(published: bool) -> Fixture {
        let state = AppState::new(
            AppConfig::default(),
            Arc::new(ManualClock::new(datetime!(2025-02-28 12:00 UTC))),
        );
        let store = MemoryTheaterStore::new();
        let content = ContentEntity {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: "Night Train".into(),
            published,
            total_view: 0,
            month_view: 0,
        };
        store.insert_content(content.clone());
        state.set_store(Arc::new(store)).await;
        Fixture {
            state,
            owner: content.owner_id,
            content_id: content.id,
        }
    }

    fn request(content_id: Uuid, start: OffsetDateTime, end: OffsetDateTime) -> CreateScreeningRequest {
        CreateScreeningRequest {
            content_id,
            date: start.date(),
            start_at: start,
            end_at: end,
        }
    }

    #[tokio::test]
    async fn created_screenings_start_closed_under_their_day() {
        let fx = fixture(true).await;
        let created = create(
            &fx.state,
            fx.owner,
            request(
                fx.content_id,
                datetime!(2025-03-01 20:00 UTC),
                datetime!(2025-03-01 21:30 UTC),
            ),
        )
        .await
        .unwrap();

        let screening = get(&fx.state, created.screening_id).await.unwrap();
        assert_eq!(screening.status, ScreeningStatus::Closed);
        assert_eq!(screening.content_title, "Night Train");

        let day = day(&fx.state, fx.content_id, date!(2025-03-01)).await.unwrap();
        assert_eq!(day.day_id, created.day_id);
        assert_eq!(day.screenings.len(), 1);
    }

    #[tokio::test]
    async fn unpublished_content_cannot_be_scheduled() {
        let fx = fixture(false).await;
        let err = create(
            &fx.state,
            fx.owner,
            request(
                fx.content_id,
                datetime!(2025-03-01 20:00 UTC),
                datetime!(2025-03-01 21:00 UTC),
            ),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn other_owners_are_denied() {
        let fx = fixture(true).await;
        let err = create(
            &fx.state,
            Uuid::new_v4(),
            request(
                fx.content_id,
                datetime!(2025-03-01 20:00 UTC),
                datetime!(2025-03-01 21:00 UTC),
            ),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn overlapping_slots_conflict_but_adjacent_ones_do_not() {
        let fx = fixture(true).await;
        let first = create(
            &fx.state,
            fx.owner,
            request(
                fx.content_id,
                datetime!(2025-03-01 20:00 UTC),
                datetime!(2025-03-01 21:00 UTC),
            ),
        )
        .await
        .unwrap();

        let err = create(
            &fx.state,
            fx.owner,
            request(
                fx.content_id,
                datetime!(2025-03-01 20:30 UTC),
                datetime!(2025-03-01 21:30 UTC),
            ),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let second = create(
            &fx.state,
            fx.owner,
            request(
                fx.content_id,
                datetime!(2025-03-01 21:00 UTC),
                datetime!(2025-03-01 22:00 UTC),
            ),
        )
        .await
        .unwrap();

        // Moving a screening within its own slot does not collide with itself.
        let moved = edit(
            &fx.state,
            fx.owner,
            first.screening_id,
            EditScreeningRequest {
                start_at: datetime!(2025-03-01 19:30 UTC),
                end_at: datetime!(2025-03-01 20:45 UTC),
            },
        )
        .await
        .unwrap();
        assert_eq!(moved.start_at, datetime!(2025-03-01 19:30 UTC));

        let err = edit(
            &fx.state,
            fx.owner,
            second.screening_id,
            EditScreeningRequest {
                start_at: datetime!(2025-03-01 20:30 UTC),
                end_at: datetime!(2025-03-01 22:00 UTC),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn locked_days_freeze_their_screenings() {
        let fx = fixture(true).await;
        let created = create(
            &fx.state,
            fx.owner,
            request(
                fx.content_id,
                datetime!(2025-03-01 20:00 UTC),
                datetime!(2025-03-01 21:00 UTC),
            ),
        )
        .await
        .unwrap();

        let locked = lock(&fx.state, fx.owner, created.day_id, true).await.unwrap();
        assert!(locked.locked);
        assert_eq!(locked.locked_at, Some(datetime!(2025-02-28 12:00 UTC)));

        let err = lock(&fx.state, fx.owner, created.day_id, true).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let err = edit(
            &fx.state,
            fx.owner,
            created.screening_id,
            EditScreeningRequest {
                start_at: datetime!(2025-03-01 22:00 UTC),
                end_at: datetime!(2025-03-01 23:00 UTC),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let err = delete(&fx.state, fx.owner, created.screening_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let err = create(
            &fx.state,
            fx.owner,
            request(
                fx.content_id,
                datetime!(2025-03-01 22:00 UTC),
                datetime!(2025-03-01 23:00 UTC),
            ),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn deleted_screenings_are_gone() {
        let fx = fixture(true).await;
        let created = create(
            &fx.state,
            fx.owner,
            request(
                fx.content_id,
                datetime!(2025-03-01 20:00 UTC),
                datetime!(2025-03-01 21:00 UTC),
            ),
        )
        .await
        .unwrap();

        delete(&fx.state, fx.owner, created.screening_id).await.unwrap();
        assert!(matches!(
            get(&fx.state, created.screening_id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn content_views_reports_counters() {
        let fx = fixture(true).await;
        let views = content_views(&fx.state, fx.content_id).await.unwrap();
        assert_eq!((views.total_view, views.month_view), (0, 0));
        assert!(matches!(
            content_views(&fx.state, Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    fn search_query(start_date: Option<Date>, end_date: Option<Date>) -> ScheduleSearchQuery {
        ScheduleSearchQuery {
            page: 0,
            size: 10,
            owner_id: None,
            start_date,
            end_date,
        }
    }

    #[tokio::test]
    async fn search_lists_only_locked_days_within_the_range() {
        let fx = fixture(true).await;
        let mut day_ids = Vec::new();
        for (start, end) in [
            (datetime!(2025-03-01 20:00 UTC), datetime!(2025-03-01 21:00 UTC)),
            (datetime!(2025-03-02 20:00 UTC), datetime!(2025-03-02 21:00 UTC)),
            (datetime!(2025-03-03 20:00 UTC), datetime!(2025-03-03 21:00 UTC)),
        ] {
            let created = create(&fx.state, fx.owner, request(fx.content_id, start, end))
                .await
                .unwrap();
            day_ids.push(created.day_id);
        }
        // The third day stays a draft.
        for day_id in &day_ids[..2] {
            lock(&fx.state, fx.owner, *day_id, true).await.unwrap();
        }

        let all = search(&fx.state, search_query(None, None)).await.unwrap();
        assert_eq!(all.total_elements, 2);
        assert_eq!(all.total_pages, 1);
        assert!(all.last);
        assert!(all.items.iter().all(|item| item.content_title == "Night Train"));

        let second_day = search(
            &fx.state,
            search_query(Some(date!(2025-03-02)), Some(date!(2025-03-03))),
        )
        .await
        .unwrap();
        assert_eq!(second_day.items.len(), 1);
        assert_eq!(second_day.items[0].day_id, day_ids[1]);
    }

    #[tokio::test]
    async fn search_rejects_reversed_ranges() {
        let fx = fixture(true).await;
        let err = search(
            &fx.state,
            search_query(Some(date!(2025-03-03)), Some(date!(2025-03-01))),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}
