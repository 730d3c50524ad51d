use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    dao::models::{ScreeningDayEntity, ScreeningEntity},
    dto::validation::{validate_date_range, validate_start_on_date, validate_window},
    state::lifecycle::ScreeningStatus,
};

/// Payload used to schedule a new screening slot.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_create_request"))]
pub struct CreateScreeningRequest {
    /// Content to broadcast.
    pub content_id: Uuid,
    /// Day the slot is filed under (`YYYY-MM-DD`).
    pub date: Date,
    /// Broadcast start (RFC 3339).
    #[serde(with = "time::serde::rfc3339")]
    pub start_at: OffsetDateTime,
    /// Broadcast end (RFC 3339).
    #[serde(with = "time::serde::rfc3339")]
    pub end_at: OffsetDateTime,
}

fn validate_create_request(request: &CreateScreeningRequest) -> Result<(), ValidationError> {
    validate_window(request.start_at, request.end_at)?;
    validate_start_on_date(request.start_at, request.date)
}

/// Payload used to move an existing screening slot.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_edit_request"))]
pub struct EditScreeningRequest {
    /// New broadcast start (RFC 3339).
    #[serde(with = "time::serde::rfc3339")]
    pub start_at: OffsetDateTime,
    /// New broadcast end (RFC 3339).
    #[serde(with = "time::serde::rfc3339")]
    pub end_at: OffsetDateTime,
}

fn validate_edit_request(request: &EditScreeningRequest) -> Result<(), ValidationError> {
    validate_window(request.start_at, request.end_at)
}

/// Identifiers assigned to a newly scheduled screening.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateScreeningResponse {
    /// New screening.
    pub screening_id: Uuid,
    /// Day the screening was filed under (created on demand).
    pub day_id: Uuid,
}

/// Public view of a screening.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScreeningResponse {
    /// Screening identifier.
    pub screening_id: Uuid,
    /// Content shown.
    pub content_id: Uuid,
    /// Title of the content shown.
    pub content_title: String,
    /// Day the screening belongs to.
    pub day_id: Uuid,
    /// Broadcast start.
    #[serde(with = "time::serde::rfc3339")]
    pub start_at: OffsetDateTime,
    /// Broadcast end.
    #[serde(with = "time::serde::rfc3339")]
    pub end_at: OffsetDateTime,
    /// Current lifecycle status.
    pub status: ScreeningStatus,
}

impl ScreeningResponse {
    /// Combine a screening with the title of its content.
    pub fn new(screening: ScreeningEntity, content_title: String) -> Self {
        Self {
            screening_id: screening.id,
            content_id: screening.content_id,
            content_title,
            day_id: screening.day_id,
            start_at: screening.start_at,
            end_at: screening.end_at,
            status: screening.status,
        }
    }
}

/// Query string selecting a content's day.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct DayQuery {
    /// Content the day belongs to.
    pub content_id: Uuid,
    /// Calendar date (`YYYY-MM-DD`).
    #[param(value_type = String, format = Date)]
    pub date: Date,
}

/// Page length used when the query does not set one.
pub const DEFAULT_PAGE_SIZE: u64 = 10;
/// Largest page a search may request.
pub const MAX_PAGE_SIZE: u64 = 100;

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

/// Query string of the schedule search. Only screenings of locked days are listed.
#[derive(Debug, Clone, Deserialize, IntoParams, Validate)]
#[validate(schema(function = "validate_search_query"))]
pub struct ScheduleSearchQuery {
    /// Zero-based page index.
    #[serde(default)]
    pub page: u64,
    /// Page length, 1 to 100.
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 100))]
    pub size: u64,
    /// Only list this owner's screenings.
    pub owner_id: Option<Uuid>,
    /// First day of the range (inclusive, UTC).
    #[param(value_type = Option<String>, format = Date)]
    pub start_date: Option<Date>,
    /// Last day of the range (inclusive, UTC).
    #[param(value_type = Option<String>, format = Date)]
    pub end_date: Option<Date>,
}

fn validate_search_query(query: &ScheduleSearchQuery) -> Result<(), ValidationError> {
    validate_date_range(query.start_date, query.end_date)
}

/// One page of schedule search results.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScreeningPageResponse {
    /// Screenings ordered by content title, then start.
    pub items: Vec<ScreeningResponse>,
    /// Zero-based page index.
    pub page: u64,
    /// Requested page length.
    pub size: u64,
    /// Matches across every page.
    pub total_elements: u64,
    /// Number of pages at this page length.
    pub total_pages: u64,
    /// Whether no page follows this one.
    pub last: bool,
}

impl ScreeningPageResponse {
    /// Wrap one page of items with the paging totals.
    pub fn new(items: Vec<ScreeningResponse>, page: u64, size: u64, total_elements: u64) -> Self {
        let total_pages = total_elements.div_ceil(size.max(1));
        Self {
            items,
            page,
            size,
            total_elements,
            total_pages,
            last: page.saturating_add(1) >= total_pages,
        }
    }
}

/// A day with every screening filed under it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScreeningDayResponse {
    /// Day identifier.
    pub day_id: Uuid,
    /// Content the day belongs to.
    pub content_id: Uuid,
    /// Calendar date.
    pub date: Date,
    /// Whether the line-up is frozen.
    pub locked: bool,
    /// When the day was locked.
    #[serde(with = "time::serde::rfc3339::option")]
    pub locked_at: Option<OffsetDateTime>,
    /// Screenings ordered by start.
    pub screenings: Vec<ScreeningResponse>,
}

/// Lock or unlock request for a day.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LockDayRequest {
    /// `true` freezes the day's line-up.
    pub locked: bool,
}

/// Lock state of a day after a lock request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LockDayResponse {
    /// Day identifier.
    pub day_id: Uuid,
    /// Whether the line-up is frozen.
    pub locked: bool,
    /// When the day was locked.
    #[serde(with = "time::serde::rfc3339::option")]
    pub locked_at: Option<OffsetDateTime>,
}

impl From<ScreeningDayEntity> for LockDayResponse {
    fn from(value: ScreeningDayEntity) -> Self {
        Self {
            day_id: value.id,
            locked: value.locked,
            locked_at: value.locked_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_rejects_reversed_windows() {
        let request: CreateScreeningRequest = serde_json::from_str(
            r#"{
                "content_id": "6f1c1c64-8a4e-4b53-9d57-0c2f1f1b3a10",
                "date": "2025-03-01",
                "start_at": "2025-03-01T21:00:00Z",
                "end_at": "2025-03-01T20:00:00Z"
            }"#,
        )
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn create_request_accepts_a_slot_on_its_day() {
        let request: CreateScreeningRequest = serde_json::from_str(
            r#"{
                "content_id": "6f1c1c64-8a4e-4b53-9d57-0c2f1f1b3a10",
                "date": "2025-03-01",
                "start_at": "2025-03-01T20:00:00Z",
                "end_at": "2025-03-01T21:30:00Z"
            }"#,
        )
        .unwrap();
        assert!(request.validate().is_ok());
    }

    #[test]
    fn edit_request_rejects_empty_windows() {
        let request: EditScreeningRequest = serde_json::from_str(
            r#"{ "start_at": "2025-03-01T20:00:00Z", "end_at": "2025-03-01T20:00:00Z" }"#,
        )
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn search_query_defaults_to_the_first_page_of_ten() {
        let query: ScheduleSearchQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.page, 0);
        assert_eq!(query.size, DEFAULT_PAGE_SIZE);
        assert!(query.validate().is_ok());
    }

    #[test]
    fn search_query_rejects_half_open_ranges_and_huge_pages() {
        let half: ScheduleSearchQuery =
            serde_json::from_str(r#"{ "start_date": "2025-03-01" }"#).unwrap();
        assert!(half.validate().is_err());
        let huge: ScheduleSearchQuery = serde_json::from_str(r#"{ "size": 1000 }"#).unwrap();
        assert!(huge.validate().is_err());
    }

    #[test]
    fn page_totals_round_up() {
        let page = ScreeningPageResponse::new(Vec::new(), 2, 10, 21);
        assert_eq!(page.total_pages, 3);
        assert!(page.last);
        let first = ScreeningPageResponse::new(Vec::new(), 0, 10, 21);
        assert!(!first.last);
        let empty = ScreeningPageResponse::new(Vec::new(), 0, 10, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(empty.last);
    }
}
