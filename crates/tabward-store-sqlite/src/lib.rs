//! SQLite backend for the Tabward store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every [`AccountStore`] operation is a
//! single closure on that thread holding a single transaction, which makes
//! operations on one store handle strictly sequential.
//!
//! [`AccountStore`]: tabward_core::store::AccountStore

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
