use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to load screening `{id}`")]
    LoadScreening {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to save screening `{id}`")]
    SaveScreening {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to delete screening `{id}`")]
    DeleteScreening {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to query screenings of owner `{owner_id}`")]
    QueryOwnerScreenings {
        owner_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list screenings of day `{day_id}`")]
    ListDayScreenings {
        day_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to apply transition `{transition}`")]
    ApplyTransition {
        transition: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load screening day of content `{content_id}`")]
    LoadScreeningDay {
        content_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load screening day `{id}`")]
    LoadScreeningDayById {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to update screening day `{id}`")]
    SaveScreeningDay {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load content `{id}`")]
    LoadContent {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load subscription of viewer `{viewer_id}`")]
    LoadSubscription {
        viewer_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to record session of viewer `{viewer_id}` on screening `{screening_id}`")]
    SaveSession {
        viewer_id: Uuid,
        screening_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to credit session `{id}`")]
    CreditSession {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("credit transaction of session `{id}` failed to {step}")]
    CreditTransaction {
        id: Uuid,
        step: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to search screenings")]
    SearchScreenings {
        #[source]
        source: MongoError,
    },
    #[error("failed to query watch sessions")]
    QuerySessions {
        #[source]
        source: MongoError,
    },
}

/// Whether the failure is a unique index violation.
pub fn is_duplicate_key(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(failure)) => failure.code == DUPLICATE_KEY,
        ErrorKind::Command(failure) => failure.code == DUPLICATE_KEY,
        _ => false,
    }
}
