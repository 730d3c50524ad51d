use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::schedule::{
        CreateScreeningRequest, CreateScreeningResponse, DayQuery, EditScreeningRequest,
        LockDayRequest, LockDayResponse, ScheduleSearchQuery, ScreeningDayResponse,
        ScreeningPageResponse, ScreeningResponse,
    },
    error::AppError,
    routes::identity::OwnerId,
    services::schedule_service,
    state::SharedState,
};

/// Owner-facing scheduling endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/schedules", get(search).post(create_screening))
        .route("/schedules/days", get(get_day))
        .route("/schedules/days/{id}/lock", put(lock_day))
        .route(
            "/schedules/{id}",
            get(get_screening)
                .put(edit_screening)
                .delete(delete_screening),
        )
}

/// Published line-ups: screenings of locked days, paged and ordered by title then start.
#[utoipa::path(
    get,
    path = "/schedules",
    tag = "schedule",
    params(ScheduleSearchQuery),
    responses(
        (status = 200, description = "One page of screenings", body = ScreeningPageResponse),
        (status = 400, description = "Invalid page or date range")
    )
)]
pub async fn search(
    State(state): State<SharedState>,
    Valid(Query(query)): Valid<Query<ScheduleSearchQuery>>,
) -> Result<Json<ScreeningPageResponse>, AppError> {
    let page = schedule_service::search(&state, query).await?;
    Ok(Json(page))
}

/// Schedule a screening, creating its day on demand.
#[utoipa::path(
    post,
    path = "/schedules",
    tag = "schedule",
    request_body = CreateScreeningRequest,
    params(("x-owner-id" = Uuid, Header, description = "Authenticated content owner")),
    responses(
        (status = 201, description = "Screening scheduled", body = CreateScreeningResponse),
        (status = 400, description = "Invalid time window"),
        (status = 403, description = "Content not owned by caller"),
        (status = 409, description = "Overlapping slot or locked day")
    )
)]
pub async fn create_screening(
    State(state): State<SharedState>,
    OwnerId(owner_id): OwnerId,
    Valid(Json(payload)): Valid<Json<CreateScreeningRequest>>,
) -> Result<(StatusCode, Json<CreateScreeningResponse>), AppError> {
    let created = schedule_service::create(&state, owner_id, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/schedules/{id}",
    tag = "schedule",
    params(("id" = Uuid, Path, description = "Screening identifier")),
    responses(
        (status = 200, description = "Screening", body = ScreeningResponse),
        (status = 404, description = "Unknown screening")
    )
)]
pub async fn get_screening(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScreeningResponse>, AppError> {
    let screening = schedule_service::get(&state, id).await?;
    Ok(Json(screening))
}

/// Move a screening to a new slot while its day is unlocked.
#[utoipa::path(
    put,
    path = "/schedules/{id}",
    tag = "schedule",
    request_body = EditScreeningRequest,
    params(
        ("id" = Uuid, Path, description = "Screening identifier"),
        ("x-owner-id" = Uuid, Header, description = "Authenticated content owner")
    ),
    responses(
        (status = 200, description = "Screening moved", body = ScreeningResponse),
        (status = 400, description = "Invalid time window"),
        (status = 403, description = "Screening not owned by caller"),
        (status = 404, description = "Unknown screening"),
        (status = 409, description = "Overlapping slot or locked day")
    )
)]
pub async fn edit_screening(
    State(state): State<SharedState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<EditScreeningRequest>>,
) -> Result<Json<ScreeningResponse>, AppError> {
    let screening = schedule_service::edit(&state, owner_id, id, payload).await?;
    Ok(Json(screening))
}

#[utoipa::path(
    delete,
    path = "/schedules/{id}",
    tag = "schedule",
    params(
        ("id" = Uuid, Path, description = "Screening identifier"),
        ("x-owner-id" = Uuid, Header, description = "Authenticated content owner")
    ),
    responses(
        (status = 204, description = "Screening removed"),
        (status = 403, description = "Screening not owned by caller"),
        (status = 404, description = "Unknown screening"),
        (status = 409, description = "Locked day")
    )
)]
pub async fn delete_screening(
    State(state): State<SharedState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    schedule_service::delete(&state, owner_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// A content's day with its screenings in start order.
#[utoipa::path(
    get,
    path = "/schedules/days",
    tag = "schedule",
    params(DayQuery),
    responses(
        (status = 200, description = "Screening day", body = ScreeningDayResponse),
        (status = 404, description = "No screening day on that date")
    )
)]
pub async fn get_day(
    State(state): State<SharedState>,
    Query(query): Query<DayQuery>,
) -> Result<Json<ScreeningDayResponse>, AppError> {
    let day = schedule_service::day(&state, query.content_id, query.date).await?;
    Ok(Json(day))
}

/// Freeze or release a day's line-up. A locked day cannot be changed again.
#[utoipa::path(
    put,
    path = "/schedules/days/{id}/lock",
    tag = "schedule",
    request_body = LockDayRequest,
    params(
        ("id" = Uuid, Path, description = "Screening day identifier"),
        ("x-owner-id" = Uuid, Header, description = "Authenticated content owner")
    ),
    responses(
        (status = 200, description = "Lock state", body = LockDayResponse),
        (status = 403, description = "Day not owned by caller"),
        (status = 404, description = "Unknown day"),
        (status = 409, description = "Day already locked")
    )
)]
pub async fn lock_day(
    State(state): State<SharedState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<Uuid>,
    Json(payload): Json<LockDayRequest>,
) -> Result<Json<LockDayResponse>, AppError> {
    let day = schedule_service::lock(&state, owner_id, id, payload.locked).await?;
    Ok(Json(day))
}
