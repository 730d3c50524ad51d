/// Live chat per screening.
pub mod chat_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Lifecycle scheduler driving screenings through their states.
pub mod lifecycle_service;
/// Synchronized playback and timeline views.
pub mod playback_service;
/// Viewer enter/leave tracking and watch logs.
pub mod presence_service;
/// Screening and screening day management for content owners.
pub mod schedule_service;
/// Server-Sent Events streams for theater channels.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// Theater push events and the periodic state broadcaster.
pub mod theater_events;
/// Periodic view credit sweeper.
pub mod view_credit_service;
/// Theater WebSocket connection handling.
pub mod websocket_service;
