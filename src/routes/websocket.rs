use axum::{
    Router,
    extract::{Path, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use uuid::Uuid;

use crate::{routes::identity::ViewerId, services::websocket_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/theaters/{id}/ws",
    tag = "theater",
    params(
        ("id" = Uuid, Path, description = "Screening identifier"),
        ("x-viewer-id" = Option<Uuid>, Header, description = "Viewer posting chat; read-only without it")
    ),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 401, description = "Malformed viewer identity")
    )
)]
/// Upgrade the HTTP connection into a playback and chat WebSocket for one screening.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    viewer: Option<ViewerId>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let viewer_id = viewer.map(|ViewerId(viewer)| viewer);
    ws.on_upgrade(move |socket| websocket_service::handle_socket(state, id, viewer_id, socket))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/theaters/{id}/ws", get(ws_handler))
}
