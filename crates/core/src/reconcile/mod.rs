//! Calendar reconciliation: diffing remote observations against meetings
//! and planning the resulting writes.

pub mod apply;
pub mod diff;
pub mod ports;

pub use apply::{plan_apply, plan_local_edit, ApplyOptions, ApplyPlan, ApplyState, Verdict};
pub use diff::diff;
