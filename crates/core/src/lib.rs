//! # MeetSync Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - The diff engine and apply planning for calendar reconciliation
//! - Port/adapter interfaces (traits) for storage and the calendar provider
//! - The reconciliation poller, webhook processor and audit service
//!
//! ## Architecture Principles
//! - Only depends on `meetsync-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod audit;
pub mod calendar_ports;
pub mod reconcile;
pub mod sync;
pub mod utils;

pub use audit::AuditService;
pub use calendar_ports::{CalendarProvider, IntegrationRepository};
pub use reconcile::ports::{ChangeLedger, MeetingRepository, ReconciliationStore};
pub use reconcile::{diff, plan_apply, plan_local_edit, ApplyOptions, ApplyPlan, ApplyState};
pub use sync::poller::{
    CycleReport, IntegrationReport, PollerSettings, ReconciliationPoller, SyncCounts,
};
pub use sync::ports::WebhookInbox;
pub use sync::webhook::{WebhookDisposition, WebhookProcessor};
pub use utils::clock::{Clock, ManualClock, SystemClock};
