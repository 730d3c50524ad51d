use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{CreditOutcome, WatchSessionEntity},
    dto::theater::{EnterResponse, LeaveResponse, ViewerCountResponse, WatchLogEntry},
    error::ServiceError,
    state::SharedState,
};

/// Let a subscribed viewer into a screening whose room is open.
///
/// Entering again reuses the viewer's session for that screening.
pub async fn enter(
    state: &SharedState,
    viewer_id: Uuid,
    screening_id: Uuid,
) -> Result<EnterResponse, ServiceError> {
    let store = state.require_store().await?;
    let screening = store
        .find_screening(screening_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("screening `{screening_id}`")))?;

    if !store.subscription_is_active(viewer_id).await? {
        return Err(ServiceError::AccessDenied(
            "an active subscription is required".into(),
        ));
    }
    if !screening.status.admits_viewers() {
        return Err(ServiceError::InvalidState(format!(
            "screening is {}",
            screening.status
        )));
    }

    let content_title = content_title(state, screening.content_id).await?;
    let session = store
        .open_session(viewer_id, screening_id, screening.content_id, state.now())
        .await?;
    info!(viewer_id = %viewer_id, screening_id = %screening_id, session_id = %session.id, "viewer entered");

    Ok(EnterResponse {
        session_id: session.id,
        screening_id,
        content_title,
        entered_at: session.entered_at,
    })
}

/// Close the viewer's active session and credit the view right away when it qualifies.
///
/// A failed credit does not fail the leave: the sweeper picks the session up later.
pub async fn leave(
    state: &SharedState,
    viewer_id: Uuid,
    screening_id: Uuid,
) -> Result<LeaveResponse, ServiceError> {
    let store = state.require_store().await?;
    let session = store
        .close_session(viewer_id, screening_id, state.now())
        .await?
        .ok_or_else(|| ServiceError::InvalidState("no active session".into()))?;

    let view_credited = if session.qualifies_for_credit(state.config().min_watch()) {
        match store.credit_session(session.id).await {
            Ok(outcome) => outcome == CreditOutcome::Credited,
            Err(err) => {
                warn!(session_id = %session.id, error = %err, "fast-path credit failed; leaving it to the sweeper");
                false
            }
        }
    } else {
        false
    };
    info!(viewer_id = %viewer_id, screening_id = %screening_id, view_credited, "viewer left");

    let content_title = content_title(state, session.content_id).await?;
    let WatchSessionEntity {
        id,
        entered_at,
        left_at,
        ..
    } = session;

    Ok(LeaveResponse {
        session_id: id,
        screening_id,
        content_title,
        entered_at,
        left_at: left_at.unwrap_or(entered_at),
        view_credited,
    })
}

/// Number of viewers currently inside a screening.
pub async fn viewer_count(
    state: &SharedState,
    screening_id: Uuid,
) -> Result<ViewerCountResponse, ServiceError> {
    let store = state.require_store().await?;
    if store.find_screening(screening_id).await?.is_none() {
        return Err(ServiceError::NotFound(format!("screening `{screening_id}`")));
    }
    let viewers = store.count_active_sessions(screening_id).await?;
    Ok(ViewerCountResponse {
        screening_id,
        viewers,
    })
}

/// Every session of a viewer, newest entry first.
pub async fn watch_log(
    state: &SharedState,
    viewer_id: Uuid,
) -> Result<Vec<WatchLogEntry>, ServiceError> {
    let store = state.require_store().await?;
    let sessions = store.list_sessions_for_viewer(viewer_id).await?;
    Ok(sessions.into_iter().map(WatchLogEntry::from).collect())
}

async fn content_title(state: &SharedState, content_id: Uuid) -> Result<String, ServiceError> {
    let store = state.require_store().await?;
    Ok(store
        .find_content(content_id)
        .await?
        .map(|content| content.title)
        .unwrap_or_default())
}
