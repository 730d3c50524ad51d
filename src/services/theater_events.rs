use std::time::Duration;

use serde::Serialize;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dto::{
        sse::ServerEvent,
        theater::{ChatMessage, PlaybackState, TheaterOutboundMessage},
    },
    services::playback_service,
    state::SharedState,
};

/// Event name carrying a screening's playback state.
pub const EVENT_THEATER_STATE: &str = "theater.state";

/// Event name carrying a chat line.
pub const EVENT_THEATER_CHAT: &str = "theater.chat";

/// Build the `theater.state` event for a playback snapshot.
pub fn state_event(playback: &PlaybackState) -> Option<ServerEvent> {
    to_event(EVENT_THEATER_STATE, playback)
}

/// Push a playback snapshot to the screening's subscribers.
pub fn broadcast_playback_state(state: &SharedState, screening_id: Uuid, playback: &PlaybackState) {
    if let Some(event) = state_event(playback) {
        state.hub().broadcast(screening_id, event);
    }
}

/// Push a chat line to everyone watching the screening.
pub fn broadcast_chat(state: &SharedState, chat: &ChatMessage) {
    let frame = TheaterOutboundMessage::Chat(chat.clone());
    if let Some(event) = to_event(EVENT_THEATER_CHAT, &frame) {
        state.hub().broadcast(chat.screening_id, event);
    }
}

/// Look up the screening's current playback state and push it to its subscribers.
///
/// Skipped when nobody listens on the screening's channel.
pub async fn publish_playback_state(state: &SharedState, screening_id: Uuid) {
    if !state.hub().has_subscribers(screening_id) {
        return;
    }
    let playback = playback_service::playback_for_subscriber(state, screening_id).await;
    broadcast_playback_state(state, screening_id, &playback);
}

/// Refresh every watched screening and drop channels nobody listens to any more.
pub async fn broadcast_active(state: &SharedState) {
    let pruned = state.hub().prune();
    if pruned > 0 {
        debug!(pruned, "dropped idle theater channels");
    }

    if state.is_degraded() {
        return;
    }
    for screening_id in state.hub().active_screenings() {
        publish_playback_state(state, screening_id).await;
    }
}

/// Periodically rebroadcast playback state so late clocks re-anchor on the server time.
pub async fn run(state: SharedState, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        broadcast_active(&state).await;
    }
}

fn to_event(event: &str, payload: &impl Serialize) -> Option<ServerEvent> {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event, error = %err, "failed to serialize theater event payload");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::{Duration, macros::datetime};

    use super::*;
    use crate::{
        clock::ManualClock,
        config::AppConfig,
        dao::{models::ScreeningEntity, theater_store::{MemoryTheaterStore, TheaterStore}},
        state::{AppState, lifecycle::ScreeningStatus},
    };

    #[tokio::test]
    async fn active_channels_receive_the_current_state() {
        let clock = Arc::new(ManualClock::new(datetime!(2025-03-01 20:05 UTC)));
        let state = AppState::new(AppConfig::default(), clock);
        let store = MemoryTheaterStore::new();
        let screening = ScreeningEntity {
            id: Uuid::new_v4(),
            content_id: Uuid::new_v4(),
            day_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            start_at: datetime!(2025-03-01 20:00 UTC),
            end_at: datetime!(2025-03-01 20:00 UTC) + Duration::minutes(30),
            status: ScreeningStatus::Playing,
        };
        store.insert_screening(screening.clone()).await.unwrap();
        state.set_store(Arc::new(store)).await;

        let mut rx = state.hub().subscribe(screening.id);
        drop(state.hub().subscribe(Uuid::new_v4()));
        broadcast_active(&state).await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some(EVENT_THEATER_STATE));
        let playback: PlaybackState = serde_json::from_str(&event.data).unwrap();
        assert!(playback.playing);
        assert_eq!(playback.position_ms, 300_000);
        assert_eq!(state.hub().active_screenings(), vec![screening.id]);
    }
}
