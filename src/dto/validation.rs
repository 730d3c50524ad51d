//! Validation helpers for DTOs.

use time::{Date, OffsetDateTime, UtcOffset};
use validator::ValidationError;

/// Validates that a screening slot starts strictly before it ends.
pub fn validate_window(
    start_at: OffsetDateTime,
    end_at: OffsetDateTime,
) -> Result<(), ValidationError> {
    if start_at >= end_at {
        let mut err = ValidationError::new("screening_window");
        err.message = Some("start_at must be before end_at".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a screening starts on the calendar date (UTC) of the day it is filed under.
pub fn validate_start_on_date(start_at: OffsetDateTime, date: Date) -> Result<(), ValidationError> {
    let start_date = start_at.to_offset(UtcOffset::UTC).date();
    if start_date != date {
        let mut err = ValidationError::new("screening_date");
        err.message = Some(format!("start_at falls on {start_date}, expected {date}").into());
        return Err(err);
    }

    Ok(())
}

/// Validates an optional inclusive date range: both ends or neither, in order.
pub fn validate_date_range(start: Option<Date>, end: Option<Date>) -> Result<(), ValidationError> {
    match (start, end) {
        (None, None) => Ok(()),
        (Some(start), Some(end)) if start <= end => Ok(()),
        (Some(_), Some(_)) => {
            let mut err = ValidationError::new("date_range");
            err.message = Some("start_date must not be after end_date".into());
            Err(err)
        }
        _ => {
            let mut err = ValidationError::new("date_range");
            err.message = Some("start_date and end_date go together".into());
            Err(err)
        }
    }
}
