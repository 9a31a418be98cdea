//! Storage module for persistent queue state
//!
//! Provides the SQLite-backed queue store. Every mutation of a job row goes through it.

mod database;

pub use database::{DbLocation, QueueDb};
