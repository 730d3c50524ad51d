use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Theater Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::theater::playback,
        crate::routes::theater::timeline,
        crate::routes::theater::enter,
        crate::routes::theater::leave,
        crate::routes::theater::viewers,
        crate::routes::theater::chat,
        crate::routes::theater::watch_log,
        crate::routes::theater::content_views,
        crate::routes::schedule::search,
        crate::routes::schedule::create_screening,
        crate::routes::schedule::get_screening,
        crate::routes::schedule::edit_screening,
        crate::routes::schedule::delete_screening,
        crate::routes::schedule::get_day,
        crate::routes::schedule::lock_day,
        crate::routes::sse::theater_stream,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::theater::PlaybackState,
            crate::dto::theater::TimelineState,
            crate::dto::theater::EnterResponse,
            crate::dto::theater::LeaveResponse,
            crate::dto::theater::ViewerCountResponse,
            crate::dto::theater::WatchLogEntry,
            crate::dto::theater::ContentViewsResponse,
            crate::dto::theater::ChatRequest,
            crate::dto::theater::ChatMessage,
            crate::dto::theater::TheaterInboundMessage,
            crate::dto::theater::TheaterOutboundMessage,
            crate::dto::schedule::CreateScreeningRequest,
            crate::dto::schedule::CreateScreeningResponse,
            crate::dto::schedule::EditScreeningRequest,
            crate::dto::schedule::ScreeningResponse,
            crate::dto::schedule::ScreeningPageResponse,
            crate::dto::schedule::ScreeningDayResponse,
            crate::dto::schedule::LockDayRequest,
            crate::dto::schedule::LockDayResponse,
            crate::state::lifecycle::ScreeningStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "theater", description = "Playback, presence, chat and view counters"),
        (name = "schedule", description = "Screening slots and screening days"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
