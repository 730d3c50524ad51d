use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{ContentEntity, WatchSessionEntity},
    state::lifecycle::ScreeningStatus,
};

/// Synchronized playback state: identical for every viewer of a screening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PlaybackState {
    /// Current lifecycle status.
    pub status: ScreeningStatus,
    /// True only while the status is `PLAYING`.
    pub playing: bool,
    /// Elapsed broadcast time in milliseconds, 0 unless playing.
    pub position_ms: i64,
    /// Always 1.0; viewers cannot change speed.
    pub playback_rate: f64,
    /// Server clock the position was computed at, in Unix milliseconds.
    pub server_time_ms: i64,
}

/// Detailed timeline of a screening, used to render lobby and closing countdowns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TimelineState {
    /// Screening described.
    pub screening_id: Uuid,
    /// Current lifecycle status.
    pub status: ScreeningStatus,
    /// Server clock in Unix milliseconds.
    pub server_time_ms: i64,
    /// Broadcast start in Unix milliseconds.
    pub start_at_ms: i64,
    /// Broadcast length in milliseconds.
    pub duration_ms: i64,
    /// Elapsed broadcast time, clamped to `[0, duration_ms]` while playing.
    pub position_ms: i64,
    /// When the lobby opens (`start_at - preroll`).
    pub waiting_open_at_ms: i64,
    /// When the room closes (`end_at + closing_grace`).
    pub ending_close_at_ms: i64,
}

/// Session summary echoed back when a viewer enters.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnterResponse {
    /// Session row reused across re-entries.
    pub session_id: Uuid,
    /// Screening entered.
    pub screening_id: Uuid,
    /// Title of the content being shown.
    pub content_title: String,
    /// Entry time recorded by the server.
    #[serde(with = "time::serde::rfc3339")]
    pub entered_at: OffsetDateTime,
}

/// Session summary returned when a viewer leaves.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LeaveResponse {
    /// Session closed.
    pub session_id: Uuid,
    /// Screening left.
    pub screening_id: Uuid,
    /// Title of the content being shown.
    pub content_title: String,
    /// Latest entry time.
    #[serde(with = "time::serde::rfc3339")]
    pub entered_at: OffsetDateTime,
    /// Exit time recorded by the server.
    #[serde(with = "time::serde::rfc3339")]
    pub left_at: OffsetDateTime,
    /// Whether this leave credited a view to the content.
    pub view_credited: bool,
}

/// Number of viewers currently in a screening room.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ViewerCountResponse {
    /// Screening counted.
    pub screening_id: Uuid,
    /// Sessions that have not left yet.
    pub viewers: u64,
}

/// One line of a viewer's watch log.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WatchLogEntry {
    /// Session identifier.
    pub session_id: Uuid,
    /// Screening attended.
    pub screening_id: Uuid,
    /// Content shown.
    pub content_id: Uuid,
    /// Latest entry time.
    #[serde(with = "time::serde::rfc3339")]
    pub entered_at: OffsetDateTime,
    /// Latest exit time, absent while still watching.
    #[serde(with = "time::serde::rfc3339::option")]
    pub left_at: Option<OffsetDateTime>,
    /// Whether a view was credited for the session.
    pub view_counted: bool,
}

impl From<WatchSessionEntity> for WatchLogEntry {
    fn from(value: WatchSessionEntity) -> Self {
        Self {
            session_id: value.id,
            screening_id: value.screening_id,
            content_id: value.content_id,
            entered_at: value.entered_at,
            left_at: value.left_at,
            view_counted: value.view_counted,
        }
    }
}

/// Credited view counters of a content item.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContentViewsResponse {
    /// Content identifier.
    pub content_id: Uuid,
    /// Content title.
    pub title: String,
    /// Lifetime credited views.
    pub total_view: u64,
    /// Credited views for the current month.
    pub month_view: u64,
}

impl From<ContentEntity> for ContentViewsResponse {
    fn from(value: ContentEntity) -> Self {
        Self {
            content_id: value.id,
            title: value.title,
            total_view: value.total_view,
            month_view: value.month_view,
        }
    }
}

/// Longest chat line accepted, in characters.
pub const MAX_CHAT_LENGTH: u64 = 500;

/// Chat line posted by a viewer in the room.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ChatRequest {
    /// Message text, 1 to 500 characters.
    #[validate(length(min = 1, max = 500))]
    pub message: String,
}

/// Chat line as delivered to everyone watching the screening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    /// Screening the line was posted in.
    pub screening_id: Uuid,
    /// Sender.
    pub viewer_id: Uuid,
    /// Trimmed message text.
    pub message: String,
    /// Server time the line was accepted.
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
}

/// Messages a viewer may send over the theater WebSocket.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TheaterInboundMessage {
    /// Ask for a fresh playback state.
    Sync,
    /// Post a chat line to the room. Needs the viewer header on the upgrade request.
    Chat {
        /// Message text.
        message: String,
    },
}

/// Typed frames pushed over the theater channels besides the playback state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TheaterOutboundMessage {
    /// A chat line from someone in the room.
    Chat(ChatMessage),
    /// A socket request was refused; only the sender receives it.
    Error {
        /// Why the request was refused.
        message: String,
    },
}
