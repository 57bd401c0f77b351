//! # MeetSync API
//!
//! HTTP surface and process wiring.
//!
//! This crate contains:
//! - Routes (webhook intake, audit queries, meeting edits, integration status)
//! - Application context (dependency injection)
//! - Background services (inbox worker, poll scheduler)
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - Wires up the hexagonal architecture
//! - Handlers stay thin; behaviour lives in `core`

pub mod context;
pub mod routes;
pub mod utils;

pub use context::{AppContext, BackgroundServices};
pub use routes::app as router;
