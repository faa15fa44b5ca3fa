//! Sync engine that copies Runtastic activities missing on Strava.
//!
//! A run reads both timelines, reconciles them, and uploads the selected
//! activities oldest first while staying inside Strava's rate limits.

pub mod cli;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod governor;
pub mod oauth;
pub mod orchestrator;
pub mod reconcile;
pub mod transfer;

#[cfg(test)]
mod test_utils;

pub use config::{Credentials, DestinationAuth};
pub use error::{SyncError, SyncResult};
pub use orchestrator::{FailurePolicy, Orchestrator, RunOutcome, SyncOptions};
pub use reconcile::Policy;
