use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::theater::{
        ChatMessage, ChatRequest, ContentViewsResponse, EnterResponse, LeaveResponse,
        PlaybackState, TimelineState, ViewerCountResponse, WatchLogEntry,
    },
    error::AppError,
    routes::identity::ViewerId,
    services::{chat_service, playback_service, presence_service, schedule_service},
    state::SharedState,
};

/// Viewer-facing theater endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/theaters/{id}/playback", get(playback))
        .route("/theaters/{id}/state", get(timeline))
        .route("/theaters/{id}/enter", post(enter))
        .route("/theaters/{id}/leave", post(leave))
        .route("/theaters/{id}/viewers", get(viewers))
        .route("/theaters/{id}/chat", post(chat))
        .route("/viewers/me/watch-log", get(watch_log))
        .route("/contents/{id}/views", get(content_views))
}

/// Current synchronized playback state. Unknown screenings read as `CLOSED`.
#[utoipa::path(
    get,
    path = "/theaters/{id}/playback",
    tag = "theater",
    params(("id" = Uuid, Path, description = "Screening identifier")),
    responses(
        (status = 200, description = "Playback state", body = PlaybackState),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn playback(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PlaybackState>, AppError> {
    let playback = playback_service::current_playback(&state, id).await?;
    Ok(Json(playback))
}

/// Timeline with lobby and closing boundaries.
#[utoipa::path(
    get,
    path = "/theaters/{id}/state",
    tag = "theater",
    params(("id" = Uuid, Path, description = "Screening identifier")),
    responses(
        (status = 200, description = "Timeline state", body = TimelineState),
        (status = 404, description = "Unknown screening")
    )
)]
pub async fn timeline(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TimelineState>, AppError> {
    let timeline = playback_service::current_timeline(&state, id).await?;
    Ok(Json(timeline))
}

/// Enter the screening room, reopening an earlier session when there is one.
#[utoipa::path(
    post,
    path = "/theaters/{id}/enter",
    tag = "theater",
    params(
        ("id" = Uuid, Path, description = "Screening identifier"),
        ("x-viewer-id" = Uuid, Header, description = "Authenticated viewer")
    ),
    responses(
        (status = 200, description = "Session opened", body = EnterResponse),
        (status = 401, description = "Missing viewer identity"),
        (status = 403, description = "No active subscription"),
        (status = 404, description = "Unknown screening"),
        (status = 409, description = "Screening not open for entry")
    )
)]
pub async fn enter(
    State(state): State<SharedState>,
    ViewerId(viewer_id): ViewerId,
    Path(id): Path<Uuid>,
) -> Result<Json<EnterResponse>, AppError> {
    let response = presence_service::enter(&state, viewer_id, id).await?;
    Ok(Json(response))
}

/// Leave the screening room; a long enough stay is credited immediately.
#[utoipa::path(
    post,
    path = "/theaters/{id}/leave",
    tag = "theater",
    params(
        ("id" = Uuid, Path, description = "Screening identifier"),
        ("x-viewer-id" = Uuid, Header, description = "Authenticated viewer")
    ),
    responses(
        (status = 200, description = "Session closed", body = LeaveResponse),
        (status = 401, description = "Missing viewer identity"),
        (status = 409, description = "No active session")
    )
)]
pub async fn leave(
    State(state): State<SharedState>,
    ViewerId(viewer_id): ViewerId,
    Path(id): Path<Uuid>,
) -> Result<Json<LeaveResponse>, AppError> {
    let response = presence_service::leave(&state, viewer_id, id).await?;
    Ok(Json(response))
}

/// Post a chat line to everyone watching; the sender must be in the room.
#[utoipa::path(
    post,
    path = "/theaters/{id}/chat",
    tag = "theater",
    request_body = ChatRequest,
    params(
        ("id" = Uuid, Path, description = "Screening identifier"),
        ("x-viewer-id" = Uuid, Header, description = "Authenticated viewer")
    ),
    responses(
        (status = 200, description = "Line broadcast to the room", body = ChatMessage),
        (status = 400, description = "Empty or oversized message"),
        (status = 401, description = "Missing viewer identity"),
        (status = 403, description = "Viewer is not in the room"),
        (status = 404, description = "Unknown screening"),
        (status = 409, description = "Room is not open")
    )
)]
pub async fn chat(
    State(state): State<SharedState>,
    ViewerId(viewer_id): ViewerId,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<ChatRequest>>,
) -> Result<Json<ChatMessage>, AppError> {
    let chat = chat_service::post(&state, id, viewer_id, &payload.message).await?;
    Ok(Json(chat))
}

#[utoipa::path(
    get,
    path = "/theaters/{id}/viewers",
    tag = "theater",
    params(("id" = Uuid, Path, description = "Screening identifier")),
    responses(
        (status = 200, description = "Viewers in the room", body = ViewerCountResponse),
        (status = 404, description = "Unknown screening")
    )
)]
pub async fn viewers(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ViewerCountResponse>, AppError> {
    let count = presence_service::viewer_count(&state, id).await?;
    Ok(Json(count))
}

/// Sessions of the calling viewer, newest first.
#[utoipa::path(
    get,
    path = "/viewers/me/watch-log",
    tag = "theater",
    params(("x-viewer-id" = Uuid, Header, description = "Authenticated viewer")),
    responses(
        (status = 200, description = "Watch log", body = [WatchLogEntry]),
        (status = 401, description = "Missing viewer identity")
    )
)]
pub async fn watch_log(
    State(state): State<SharedState>,
    ViewerId(viewer_id): ViewerId,
) -> Result<Json<Vec<WatchLogEntry>>, AppError> {
    let entries = presence_service::watch_log(&state, viewer_id).await?;
    Ok(Json(entries))
}

#[utoipa::path(
    get,
    path = "/contents/{id}/views",
    tag = "theater",
    params(("id" = Uuid, Path, description = "Content identifier")),
    responses(
        (status = 200, description = "Credited view counters", body = ContentViewsResponse),
        (status = 404, description = "Unknown content")
    )
)]
pub async fn content_views(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContentViewsResponse>, AppError> {
    let views = schedule_service::content_views(&state, id).await?;
    Ok(Json(views))
}
