pub mod health;
pub mod schedule;
pub mod sse;
pub mod theater;
pub mod validation;
