//! Background sync services
//!
//! - InboxWorker: drains the durable webhook inbox into the applier
//!
//! Workers have explicit lifecycle management, tracked join handles and
//! cancellation support.

pub mod inbox_worker;

pub use inbox_worker::{BatchStats, InboxWorker, InboxWorkerConfig};
