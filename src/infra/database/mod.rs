//! Concrete database implementations.
//!
//! Production adapters for the `MessageRepository` trait defined in the
//! domain layer.

pub mod postgres;

pub use postgres::{PostgresConfig, PostgresMessageStore};
