use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dto::sse::ServerEvent,
    services::{playback_service, theater_events},
    state::SharedState,
};

/// Subscribe to a screening's push channel and capture the state to send first.
///
/// The receiver is registered before the snapshot is taken so no transition published in
/// between is lost.
pub async fn subscribe_theater(
    state: &SharedState,
    screening_id: Uuid,
) -> (Option<ServerEvent>, broadcast::Receiver<ServerEvent>) {
    let receiver = state.hub().subscribe(screening_id);
    let playback = playback_service::playback_for_subscriber(state, screening_id).await;
    (theater_events::state_event(&playback), receiver)
}

/// Convert a broadcast receiver into an SSE response, sending `initial` first and then
/// forwarding events until the client disconnects.
pub fn to_sse_stream(
    screening_id: Uuid,
    initial: Option<ServerEvent>,
    mut receiver: broadcast::Receiver<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if let Some(payload) = initial {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            // Only the latest state matters; keep the stream alive.
                            debug!(screening_id = %screening_id, skipped, "theater SSE subscriber lagged");
                            continue;
                        }
                    }
                }
            }
        }

        info!(screening_id = %screening_id, "theater SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}
