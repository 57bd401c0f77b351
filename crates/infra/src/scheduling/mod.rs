//! Scheduling infrastructure for automated task execution
//!
//! The reconciliation poller is triggered by a cron-based scheduler with
//! explicit lifecycle management: start/stop, tracked join handles,
//! cancellation tokens and timeouts around every asynchronous step.

pub mod error;
pub mod poll_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use poll_scheduler::{PollJob, PollScheduler, PollSchedulerConfig};
