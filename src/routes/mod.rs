use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod health;
pub mod identity;
pub mod schedule;
pub mod sse;
pub mod theater;
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(theater::router())
        .merge(schedule::router())
        .merge(sse::router())
        .merge(websocket::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use time::macros::datetime;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::{
        clock::ManualClock, config::AppConfig, dao::theater_store::MemoryTheaterStore,
        state::AppState,
    };

    fn state() -> SharedState {
        AppState::new(
            AppConfig::default(),
            Arc::new(ManualClock::new(datetime!(2025-03-01 20:00 UTC))),
        )
    }

    async fn connected_state() -> SharedState {
        let state = state();
        state.set_store(Arc::new(MemoryTheaterStore::new())).await;
        state
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn healthcheck_reports_degraded_without_storage() {
        let response = router(state())
            .oneshot(Request::get("/healthcheck").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["server_time_ms"], 1_740_859_200_000_i64);
    }

    #[tokio::test]
    async fn healthcheck_reports_ok_with_storage() {
        let response = router(connected_state().await)
            .oneshot(Request::get("/healthcheck").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn enter_without_viewer_header_is_unauthorized() {
        let uri = format!("/theaters/{}/enter", Uuid::new_v4());
        let response = router(connected_state().await)
            .oneshot(Request::post(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_viewer_header_is_unauthorized() {
        let response = router(connected_state().await)
            .oneshot(
                Request::get("/viewers/me/watch-log")
                    .header(identity::VIEWER_HEADER, "not-a-uuid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_screening_plays_back_as_closed() {
        let uri = format!("/theaters/{}/playback", Uuid::new_v4());
        let response = router(connected_state().await)
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "CLOSED");
        assert_eq!(body["playing"], false);
        assert_eq!(body["position_ms"], 0);
    }

    #[tokio::test]
    async fn unknown_screening_timeline_is_not_found() {
        let uri = format!("/theaters/{}/state", Uuid::new_v4());
        let response = router(connected_state().await)
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(json_body(response).await["message"].is_string());
    }

    #[tokio::test]
    async fn commands_are_unavailable_in_degraded_mode() {
        let uri = format!("/theaters/{}/enter", Uuid::new_v4());
        let response = router(state())
            .oneshot(
                Request::post(uri)
                    .header(identity::VIEWER_HEADER, Uuid::new_v4().to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn reversed_schedule_window_is_rejected() {
        let payload = serde_json::json!({
            "content_id": Uuid::new_v4(),
            "date": "2025-03-01",
            "start_at": "2025-03-01T21:00:00Z",
            "end_at": "2025-03-01T20:00:00Z",
        });
        let response = router(connected_state().await)
            .oneshot(
                Request::post("/schedules")
                    .header(identity::OWNER_HEADER, Uuid::new_v4().to_string())
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_requires_a_viewer() {
        let uri = format!("/theaters/{}/chat", Uuid::new_v4());
        let response = router(connected_state().await)
            .oneshot(
                Request::post(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message":"hello"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn empty_chat_lines_are_rejected() {
        let uri = format!("/theaters/{}/chat", Uuid::new_v4());
        let response = router(connected_state().await)
            .oneshot(
                Request::post(uri)
                    .header(identity::VIEWER_HEADER, Uuid::new_v4().to_string())
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message":""}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn schedule_search_pages_an_empty_store() {
        let response = router(connected_state().await)
            .oneshot(
                Request::get("/schedules?page=0&size=5&start_date=2025-03-01&end_date=2025-03-07")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["items"], serde_json::json!([]));
        assert_eq!(body["size"], 5);
        assert_eq!(body["total_elements"], 0);
        assert_eq!(body["last"], true);
    }

    #[tokio::test]
    async fn schedule_search_rejects_reversed_dates() {
        let response = router(connected_state().await)
            .oneshot(
                Request::get("/schedules?start_date=2025-03-07&end_date=2025-03-01")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
