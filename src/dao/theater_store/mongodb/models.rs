use mongodb::bson::{self, DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, macros::format_description};

use crate::{
    clock::unix_millis,
    dao::{
        models::{ContentEntity, ScreeningDayEntity, ScreeningEntity, WatchSessionEntity},
        storage::StorageError,
    },
    state::lifecycle::ScreeningStatus,
};

pub const CONTENT_COLLECTION: &str = "contents";
pub const SUBSCRIPTION_COLLECTION: &str = "subscriptions";
pub const DAY_COLLECTION: &str = "screening_days";
pub const SCREENING_COLLECTION: &str = "screenings";
pub const SESSION_COLLECTION: &str = "watch_sessions";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoContentDocument {
    #[serde(rename = "_id")]
    pub id: bson::Uuid,
    pub owner_id: bson::Uuid,
    pub title: String,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub total_view: i64,
    #[serde(default)]
    pub month_view: i64,
}

impl From<MongoContentDocument> for ContentEntity {
    fn from(value: MongoContentDocument) -> Self {
        Self {
            id: from_bson_uuid(value.id),
            owner_id: from_bson_uuid(value.owner_id),
            title: value.title,
            published: value.published,
            total_view: value.total_view.max(0) as u64,
            month_view: value.month_view.max(0) as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSubscriptionDocument {
    #[serde(rename = "_id")]
    pub viewer_id: bson::Uuid,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoDayDocument {
    #[serde(rename = "_id")]
    pub id: bson::Uuid,
    pub content_id: bson::Uuid,
    /// `YYYY-MM-DD`.
    pub date: String,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub locked_at: Option<DateTime>,
}

impl TryFrom<MongoDayDocument> for ScreeningDayEntity {
    type Error = StorageError;

    fn try_from(value: MongoDayDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: from_bson_uuid(value.id),
            content_id: from_bson_uuid(value.content_id),
            date: parse_date(&value.date)?,
            locked: value.locked,
            locked_at: value.locked_at.map(from_bson_datetime).transpose()?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoScreeningDocument {
    #[serde(rename = "_id")]
    pub id: bson::Uuid,
    pub content_id: bson::Uuid,
    pub day_id: bson::Uuid,
    pub owner_id: bson::Uuid,
    pub start_at: DateTime,
    pub end_at: DateTime,
    pub status: ScreeningStatus,
}

impl From<ScreeningEntity> for MongoScreeningDocument {
    fn from(value: ScreeningEntity) -> Self {
        Self {
            id: to_bson_uuid(value.id),
            content_id: to_bson_uuid(value.content_id),
            day_id: to_bson_uuid(value.day_id),
            owner_id: to_bson_uuid(value.owner_id),
            start_at: to_bson_datetime(value.start_at),
            end_at: to_bson_datetime(value.end_at),
            status: value.status,
        }
    }
}

impl TryFrom<MongoScreeningDocument> for ScreeningEntity {
    type Error = StorageError;

    fn try_from(value: MongoScreeningDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: from_bson_uuid(value.id),
            content_id: from_bson_uuid(value.content_id),
            day_id: from_bson_uuid(value.day_id),
            owner_id: from_bson_uuid(value.owner_id),
            start_at: from_bson_datetime(value.start_at)?,
            end_at: from_bson_datetime(value.end_at)?,
            status: value.status,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSessionDocument {
    #[serde(rename = "_id")]
    pub id: bson::Uuid,
    pub viewer_id: bson::Uuid,
    pub screening_id: bson::Uuid,
    pub content_id: bson::Uuid,
    pub entered_at: DateTime,
    #[serde(default)]
    pub left_at: Option<DateTime>,
    #[serde(default)]
    pub view_counted: bool,
}

impl TryFrom<MongoSessionDocument> for WatchSessionEntity {
    type Error = StorageError;

    fn try_from(value: MongoSessionDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: from_bson_uuid(value.id),
            viewer_id: from_bson_uuid(value.viewer_id),
            screening_id: from_bson_uuid(value.screening_id),
            content_id: from_bson_uuid(value.content_id),
            entered_at: from_bson_datetime(value.entered_at)?,
            left_at: value.left_at.map(from_bson_datetime).transpose()?,
            view_counted: value.view_counted,
        })
    }
}

pub fn to_bson_uuid(id: uuid::Uuid) -> bson::Uuid {
    bson::Uuid::from_bytes(id.into_bytes())
}

pub fn from_bson_uuid(id: bson::Uuid) -> uuid::Uuid {
    uuid::Uuid::from_bytes(id.bytes())
}

pub fn to_bson_datetime(instant: OffsetDateTime) -> DateTime {
    DateTime::from_millis(unix_millis(instant))
}

pub fn from_bson_datetime(value: DateTime) -> Result<OffsetDateTime, StorageError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(value.timestamp_millis()) * 1_000_000)
        .map_err(|err| StorageError::corrupt("datetime", err.to_string()))
}

pub fn format_date(date: Date) -> String {
    date.to_string()
}

fn parse_date(value: &str) -> Result<Date, StorageError> {
    Date::parse(value, format_description!("[year]-[month]-[day]"))
        .map_err(|err| StorageError::corrupt(DAY_COLLECTION, format!("date `{value}`: {err}")))
}

pub fn doc_id(id: uuid::Uuid) -> Document {
    doc! { "_id": to_bson_uuid(id) }
}
