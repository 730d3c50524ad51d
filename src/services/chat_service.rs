//! Per-screening live chat.
//!
//! Lines are not persisted: they go out on the screening's push channel and reach whoever
//! is connected at that moment, over SSE and WebSocket alike.

use tracing::debug;
use uuid::Uuid;

use crate::{
    dto::theater::{ChatMessage, MAX_CHAT_LENGTH},
    error::ServiceError,
    services::theater_events,
    state::SharedState,
};

/// Post a chat line from a viewer who is currently in the room.
pub async fn post(
    state: &SharedState,
    screening_id: Uuid,
    viewer_id: Uuid,
    message: &str,
) -> Result<ChatMessage, ServiceError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(ServiceError::InvalidInput("chat message is empty".into()));
    }
    if message.chars().count() as u64 > MAX_CHAT_LENGTH {
        return Err(ServiceError::InvalidInput(format!(
            "chat message exceeds {MAX_CHAT_LENGTH} characters"
        )));
    }

    let store = state.require_store().await?;
    let screening = store
        .find_screening(screening_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("screening `{screening_id}`")))?;
    if !screening.status.admits_viewers() {
        return Err(ServiceError::InvalidState(format!(
            "screening is {}",
            screening.status
        )));
    }

    let in_room = store
        .list_sessions_for_viewer(viewer_id)
        .await?
        .iter()
        .any(|session| session.screening_id == screening_id && session.left_at.is_none());
    if !in_room {
        return Err(ServiceError::AccessDenied(
            "only viewers in the room can chat".into(),
        ));
    }

    let chat = ChatMessage {
        screening_id,
        viewer_id,
        message: message.to_owned(),
        sent_at: state.now(),
    };
    theater_events::broadcast_chat(state, &chat);
    debug!(screening_id = %screening_id, viewer_id = %viewer_id, "chat line posted");
    Ok(chat)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::{Duration, OffsetDateTime, macros::datetime};

    use super::*;
    use crate::{
        clock::ManualClock,
        config::AppConfig,
        dao::{
            models::{ContentEntity, ScreeningEntity},
            theater_store::{MemoryTheaterStore, TheaterStore},
        },
        dto::theater::TheaterOutboundMessage,
        services::{presence_service, theater_events::EVENT_THEATER_CHAT},
        state::{AppState, lifecycle::ScreeningStatus},
    };

    const NOW: OffsetDateTime = datetime!(2025-03-01 20:05 UTC);

    struct Room {
        state: SharedState,
        screening_id: Uuid,
        viewer_id: Uuid,
    }

    async fn room(status: ScreeningStatus) -> Room {
        let state = AppState::new(AppConfig::default(), Arc::new(ManualClock::new(NOW)));
        let store = MemoryTheaterStore::new();
        let content = ContentEntity {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: "Night Train".into(),
            published: true,
            total_view: 0,
            month_view: 0,
        };
        store.insert_content(content.clone());
        let viewer_id = Uuid::new_v4();
        store.set_subscription(viewer_id, true);
        let screening = ScreeningEntity {
            id: Uuid::new_v4(),
            content_id: content.id,
            day_id: Uuid::new_v4(),
            owner_id: content.owner_id,
            start_at: datetime!(2025-03-01 20:00 UTC),
            end_at: datetime!(2025-03-01 20:00 UTC) + Duration::minutes(30),
            status,
        };
        store.insert_screening(screening.clone()).await.unwrap();
        state.set_store(Arc::new(store)).await;
        Room {
            state,
            screening_id: screening.id,
            viewer_id,
        }
    }

    #[tokio::test]
    async fn chat_reaches_everyone_subscribed_to_the_room() {
        let room = room(ScreeningStatus::Playing).await;
        presence_service::enter(&room.state, room.viewer_id, room.screening_id)
            .await
            .unwrap();
        let mut listener = room.state.hub().subscribe(room.screening_id);

        let chat = post(&room.state, room.screening_id, room.viewer_id, "  what a scene  ")
            .await
            .unwrap();
        assert_eq!(chat.message, "what a scene");
        assert_eq!(chat.sent_at, NOW);

        let event = listener.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some(EVENT_THEATER_CHAT));
        let frame: TheaterOutboundMessage = serde_json::from_str(&event.data).unwrap();
        assert_eq!(frame, TheaterOutboundMessage::Chat(chat));
    }

    #[tokio::test]
    async fn blank_lines_are_rejected_before_touching_storage() {
        let state = AppState::new(AppConfig::default(), Arc::new(ManualClock::new(NOW)));
        let err = post(&state, Uuid::new_v4(), Uuid::new_v4(), "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn viewers_outside_the_room_cannot_chat() {
        let room = room(ScreeningStatus::Playing).await;
        let err = post(&room.state, room.screening_id, room.viewer_id, "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AccessDenied(_)));

        presence_service::enter(&room.state, room.viewer_id, room.screening_id)
            .await
            .unwrap();
        presence_service::leave(&room.state, room.viewer_id, room.screening_id)
            .await
            .unwrap();
        let err = post(&room.state, room.screening_id, room.viewer_id, "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn closed_rooms_have_no_chat() {
        let room = room(ScreeningStatus::Closed).await;
        let err = post(&room.state, room.screening_id, room.viewer_id, "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }
}
