use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        sse::ServerEvent,
        theater::{TheaterInboundMessage, TheaterOutboundMessage},
    },
    services::{chat_service, playback_service},
    state::SharedState,
};

/// Internal error type for the theater socket loop.
#[derive(Debug, Error)]
enum SocketError {
    /// Writer channel closed - connection should be terminated immediately.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Handle the full lifecycle of a viewer's WebSocket on one screening.
///
/// The current playback state is sent on connect, then every event of the screening is
/// forwarded. A `{"type":"sync"}` message asks for a fresh snapshot and
/// `{"type":"chat","message":"..."}` posts to the room when the socket carries a viewer.
pub async fn handle_socket(
    state: SharedState,
    screening_id: Uuid,
    viewer_id: Option<Uuid>,
    socket: WebSocket,
) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut events = state.hub().subscribe(screening_id);
    info!(screening_id = %screening_id, "theater socket connected");

    if send_snapshot(&state, screening_id, &outbound_tx).await.is_err() {
        finalize(writer_task, outbound_tx).await;
        return;
    }

    loop {
        tokio::select! {
            inbound = receiver.next() => {
                let Some(message) = inbound else { break };
                match message {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<TheaterInboundMessage>(&text) {
                            Ok(TheaterInboundMessage::Sync) => {
                                if let Err(err) = send_snapshot(&state, screening_id, &outbound_tx).await {
                                    warn!(screening_id = %screening_id, error = %err, "sync reply failed");
                                    break;
                                }
                            }
                            Ok(TheaterInboundMessage::Chat { message }) => {
                                if let Err(err) = relay_chat(&state, screening_id, viewer_id, &message, &outbound_tx).await {
                                    warn!(screening_id = %screening_id, error = %err, "chat reply failed");
                                    break;
                                }
                            }
                            Err(err) => {
                                warn!(screening_id = %screening_id, error = %err, "ignoring malformed theater message");
                            }
                        }
                    }
                    Ok(Message::Ping(payload)) => {
                        let _ = outbound_tx.send(Message::Pong(payload));
                    }
                    Ok(Message::Close(frame)) => {
                        let _ = outbound_tx.send(Message::Close(frame));
                        break;
                    }
                    Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
                    Err(err) => {
                        warn!(screening_id = %screening_id, error = %err, "websocket error");
                        break;
                    }
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if forward_event(&outbound_tx, event).is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(screening_id = %screening_id, skipped, "theater socket lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    info!(screening_id = %screening_id, "theater socket disconnected");
    finalize(writer_task, outbound_tx).await;
}

/// Send the screening's playback state as a bare JSON text frame.
async fn send_snapshot(
    state: &SharedState,
    screening_id: Uuid,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), SocketError> {
    let playback = playback_service::playback_for_subscriber(state, screening_id).await;
    let payload = match serde_json::to_string(&playback) {
        Ok(payload) => payload,
        Err(err) => {
            // Serialization failure is a bug, not a connection problem.
            warn!(error = %err, "failed to serialize playback state");
            return Ok(());
        }
    };
    tx.send(Message::Text(payload.into()))
        .map_err(|_| SocketError::ConnectionClosed)
}

/// Post a chat line for the socket's viewer. Refusals go back to the sender only; accepted
/// lines come back through the broadcast like everyone else's.
async fn relay_chat(
    state: &SharedState,
    screening_id: Uuid,
    viewer_id: Option<Uuid>,
    message: &str,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), SocketError> {
    let refusal = match viewer_id {
        None => "chat needs a viewer identity".to_owned(),
        Some(viewer_id) => match chat_service::post(state, screening_id, viewer_id, message).await {
            Ok(_) => return Ok(()),
            Err(err) => err.to_string(),
        },
    };
    debug!(screening_id = %screening_id, reason = %refusal, "chat line refused");
    send_frame(tx, &TheaterOutboundMessage::Error { message: refusal })
}

fn send_frame(
    tx: &mpsc::UnboundedSender<Message>,
    frame: &TheaterOutboundMessage,
) -> Result<(), SocketError> {
    let payload = match serde_json::to_string(frame) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize theater frame");
            return Ok(());
        }
    };
    tx.send(Message::Text(payload.into()))
        .map_err(|_| SocketError::ConnectionClosed)
}

fn forward_event(
    tx: &mpsc::UnboundedSender<Message>,
    event: ServerEvent,
) -> Result<(), SocketError> {
    tx.send(Message::Text(event.data.into()))
        .map_err(|_| SocketError::ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
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
            models::ScreeningEntity,
            theater_store::{MemoryTheaterStore, TheaterStore},
        },
        dto::theater::PlaybackState,
        state::{AppState, lifecycle::ScreeningStatus},
    };

    const NOW: OffsetDateTime = datetime!(2025-03-01 20:10 UTC);

    async fn playing_room() -> (SharedState, Uuid) {
        let state = AppState::new(AppConfig::default(), Arc::new(ManualClock::new(NOW)));
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
        (state, screening.id)
    }

    fn text(message: Message) -> String {
        match message {
            Message::Text(text) => text.as_str().to_owned(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn snapshot_frame_is_the_bare_playback_state() {
        let (state, screening_id) = playing_room().await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        send_snapshot(&state, screening_id, &tx).await.unwrap();

        let playback: PlaybackState = serde_json::from_str(&text(rx.recv().await.unwrap())).unwrap();
        assert!(playback.playing);
        assert_eq!(playback.position_ms, 600_000);
    }

    #[tokio::test]
    async fn snapshot_into_a_closed_writer_ends_the_socket() {
        let (state, screening_id) = playing_room().await;
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let err = send_snapshot(&state, screening_id, &tx).await.unwrap_err();
        assert!(matches!(err, SocketError::ConnectionClosed));
    }

    #[tokio::test]
    async fn anonymous_sockets_get_an_error_frame_for_chat() {
        let (state, screening_id) = playing_room().await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        relay_chat(&state, screening_id, None, "hello", &tx).await.unwrap();

        let frame: TheaterOutboundMessage = serde_json::from_str(&text(rx.recv().await.unwrap())).unwrap();
        assert!(matches!(frame, TheaterOutboundMessage::Error { .. }));
    }

    #[tokio::test]
    async fn refused_chat_answers_only_the_sender() {
        let (state, screening_id) = playing_room().await;
        let mut room = state.hub().subscribe(screening_id);
        let (tx, mut rx) = mpsc::unbounded_channel();

        // The viewer never entered the room.
        relay_chat(&state, screening_id, Some(Uuid::new_v4()), "hello", &tx)
            .await
            .unwrap();

        let frame: TheaterOutboundMessage = serde_json::from_str(&text(rx.recv().await.unwrap())).unwrap();
        assert!(matches!(frame, TheaterOutboundMessage::Error { .. }));
        assert!(room.try_recv().is_err());
    }
}
