//! Persistence layer for worker profiles.
//!
//! [`WorkerStore`] owns the SeaORM connection. It runs the schema migration,
//! exposes table checks and implements the worker repository on top of a
//! single `worker` table with soft deletes. Every write runs in its own
//! transaction.

pub mod entities;
pub mod error;
pub mod store;

#[cfg(test)]
mod tests;

pub use error::{Result, StorageError, TransactionFailure};
pub use store::WorkerStore;
