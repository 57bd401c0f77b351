//! Audit queries over the change ledger.

pub mod cursor;
pub mod service;

pub use cursor::{decode_cursor, encode_cursor};
pub use service::{replay, AuditService, ChainBreak, ChainReport};
