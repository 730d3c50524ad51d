//! MongoDB-backed [`TheaterStore`](super::TheaterStore).
//!
//! Collections: `contents`, `subscriptions`, `screening_days`, `screenings` and
//! `watch_sessions`. Every racy write is a single `find_one_and_update` whose filter repeats
//! the precondition, so the server arbitrates between concurrent callers. Crediting a view
//! touches two collections and runs in a multi-document transaction, which needs a replica
//! set (a single-node one is enough).

mod config;
mod connection;
mod error;
mod filters;
mod models;
mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoTheaterStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
