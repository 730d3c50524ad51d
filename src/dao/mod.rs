/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
/// Screening, session and counter persistence.
pub mod theater_store;
