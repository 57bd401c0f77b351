//! SQLite persistence
//!
//! Every repository holds an `Arc<DbManager>` and runs its statements on the
//! blocking pool.

pub mod change_ledger_repository;
pub mod integration_repository;
pub mod manager;
pub mod meeting_repository;
pub mod reconciliation_store;
mod rows;
pub mod webhook_inbox_repository;

pub use change_ledger_repository::SqliteChangeLedger;
pub use integration_repository::SqliteIntegrationRepository;
pub use manager::DbManager;
pub use meeting_repository::SqliteMeetingRepository;
pub use reconciliation_store::SqliteReconciliationStore;
pub use webhook_inbox_repository::SqliteWebhookInbox;
