//! # MeetSync Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - SQLite repositories and the transactional reconciliation store
//! - The calendar provider HTTP client and webhook verification
//! - The durable webhook inbox worker and the cron poll scheduler
//! - Configuration loading
//!
//! ## Architecture
//! - Implements traits defined in `meetsync-core`
//! - Depends on `meetsync-common`, `meetsync-domain` and `meetsync-core`
//! - Contains all "impure" code (I/O, HTTP, timers)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod scheduling;
pub mod sync;

// Re-export commonly used items
pub use database::*;
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use integrations::calendar::{CalendarApiClient, WebhookVerifier};
pub use scheduling::{PollScheduler, PollSchedulerConfig, SchedulerError, SchedulerResult};
pub use sync::{InboxWorker, InboxWorkerConfig};
