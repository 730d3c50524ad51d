//! Synchronized playback: every viewer derives the same position from the screening start
//! and the server clock, so there is nothing per-viewer to track or correct.

use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::{
    clock::unix_millis,
    dao::models::ScreeningEntity,
    dto::theater::{PlaybackState, TimelineState},
    error::ServiceError,
    state::{
        SharedState,
        lifecycle::{LifecycleWindows, ScreeningStatus},
    },
};

/// Playback state of `screening` at `now`. An unknown screening reads as closed.
pub fn playback_state(screening: Option<&ScreeningEntity>, now: OffsetDateTime) -> PlaybackState {
    let status = screening
        .map(|screening| screening.status)
        .unwrap_or(ScreeningStatus::Closed);
    let playing = status == ScreeningStatus::Playing;
    let position_ms = match screening {
        Some(screening) if playing => unix_millis(now).saturating_sub(unix_millis(screening.start_at)).max(0),
        _ => 0,
    };

    PlaybackState {
        status,
        playing,
        position_ms,
        playback_rate: 1.0,
        server_time_ms: unix_millis(now),
    }
}

/// Detailed timeline of `screening` at `now`.
pub fn timeline_state(
    screening: &ScreeningEntity,
    now: OffsetDateTime,
    windows: LifecycleWindows,
) -> TimelineState {
    let duration_ms = unix_millis(screening.end_at) - unix_millis(screening.start_at);
    let position_ms = match screening.status {
        ScreeningStatus::Playing => (unix_millis(now) - unix_millis(screening.start_at)).clamp(0, duration_ms),
        _ => 0,
    };

    TimelineState {
        screening_id: screening.id,
        status: screening.status,
        server_time_ms: unix_millis(now),
        start_at_ms: unix_millis(screening.start_at),
        duration_ms,
        position_ms,
        waiting_open_at_ms: unix_millis(screening.start_at.saturating_sub(windows.preroll)),
        ending_close_at_ms: unix_millis(screening.end_at.saturating_add(windows.closing_grace)),
    }
}

/// Current playback state of a screening, for request/response queries.
pub async fn current_playback(
    state: &SharedState,
    screening_id: Uuid,
) -> Result<PlaybackState, ServiceError> {
    let store = state.require_store().await?;
    let screening = store.find_screening(screening_id).await?;
    Ok(playback_state(screening.as_ref(), state.now()))
}

/// Playback state for push subscribers: storage problems degrade to the closed state
/// instead of failing the subscription.
pub async fn playback_for_subscriber(state: &SharedState, screening_id: Uuid) -> PlaybackState {
    match current_playback(state, screening_id).await {
        Ok(playback) => playback,
        Err(err) => {
            warn!(screening_id = %screening_id, error = %err, "playback lookup failed; reporting closed");
            playback_state(None, state.now())
        }
    }
}

/// Timeline of a screening; unlike playback, an unknown id is an error here.
pub async fn current_timeline(
    state: &SharedState,
    screening_id: Uuid,
) -> Result<TimelineState, ServiceError> {
    let store = state.require_store().await?;
    let screening = store
        .find_screening(screening_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("screening `{screening_id}`")))?;
    Ok(timeline_state(
        &screening,
        state.now(),
        state.config().lifecycle_windows(),
    ))
}
