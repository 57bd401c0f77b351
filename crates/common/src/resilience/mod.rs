//! Resilience helpers
//!
//! Exponential backoff with optional jitter, shared by the provider HTTP
//! client and the webhook inbox worker.

pub mod backoff;

pub use backoff::{Backoff, Jitter};
