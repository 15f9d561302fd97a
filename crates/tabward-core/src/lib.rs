//! Core types and trait definitions for the Tabward backend.
//!
//! This crate is deliberately free of HTTP and database dependencies. It holds
//! the domain model (accounts, block patterns, blocking history, stats and
//! payment effects), the pure reconciliation logic, and the [`AccountStore`]
//! abstraction that storage backends implement.
//!
//! [`AccountStore`]: store::AccountStore

pub mod account;
pub mod blocklist;
pub mod error;
pub mod history;
pub mod payment;
pub mod stats;
pub mod store;
pub mod timestamp;

pub use error::{Error, Result};
