use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dto::sse::ServerEvent;

/// Per-screening broadcast channels feeding the SSE and WebSocket subscribers.
///
/// Channels are created on first subscription and dropped by [`TheaterHub::prune`] once
/// their last receiver is gone.
pub struct TheaterHub {
    channels: DashMap<Uuid, broadcast::Sender<ServerEvent>>,
    capacity: usize,
}

impl TheaterHub {
    /// Construct a hub whose channels buffer up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    /// Register a new subscriber on the screening's channel.
    pub fn subscribe(&self, screening_id: Uuid) -> broadcast::Receiver<ServerEvent> {
        self.channels
            .entry(screening_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Send an event to the screening's subscribers, ignoring delivery errors.
    pub fn broadcast(&self, screening_id: Uuid, event: ServerEvent) {
        if let Some(sender) = self.channels.get(&screening_id) {
            let _ = sender.send(event);
        }
    }

    /// Whether anyone is listening on the screening's channel.
    pub fn has_subscribers(&self, screening_id: Uuid) -> bool {
        self.channels
            .get(&screening_id)
            .is_some_and(|sender| sender.receiver_count() > 0)
    }

    /// Screenings that currently have at least one subscriber.
    pub fn active_screenings(&self) -> Vec<Uuid> {
        self.channels
            .iter()
            .filter(|entry| entry.receiver_count() > 0)
            .map(|entry| *entry.key())
            .collect()
    }

    /// Drop channels without subscribers, returning how many were removed.
    pub fn prune(&self) -> usize {
        let before = self.channels.len();
        self.channels.retain(|_, sender| sender.receiver_count() > 0);
        before.saturating_sub(self.channels.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_only_their_screening() {
        let hub = TheaterHub::new(4);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let mut first_rx = hub.subscribe(first);
        let mut second_rx = hub.subscribe(second);

        hub.broadcast(
            first,
            ServerEvent {
                event: Some("theater.state".into()),
                data: "{}".into(),
            },
        );

        let received = first_rx.recv().await.unwrap();
        assert_eq!(received.event.as_deref(), Some("theater.state"));
        assert!(second_rx.try_recv().is_err());
    }

    #[test]
    fn prune_drops_abandoned_channels() {
        let hub = TheaterHub::new(4);
        let kept = Uuid::new_v4();
        let abandoned = Uuid::new_v4();
        let _kept_rx = hub.subscribe(kept);
        drop(hub.subscribe(abandoned));

        assert_eq!(hub.active_screenings(), vec![kept]);
        assert_eq!(hub.prune(), 1);
        assert!(hub.has_subscribers(kept));
        assert!(!hub.has_subscribers(abandoned));
    }
}
