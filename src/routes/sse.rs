use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/theaters/{id}/sse",
    tag = "sse",
    params(("id" = Uuid, Path, description = "Screening identifier")),
    responses((
        status = 200,
        description = "Stream of `theater.state` events, starting with the current state",
        content_type = "text/event-stream",
        body = String
    ))
)]
/// Push the playback state of a screening whenever it changes.
pub async fn theater_stream(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (initial, receiver) = sse_service::subscribe_theater(&state, id).await;
    info!(screening_id = %id, "new theater SSE connection");
    sse_service::to_sse_stream(id, initial, receiver)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/theaters/{id}/sse", get(theater_stream))
}
