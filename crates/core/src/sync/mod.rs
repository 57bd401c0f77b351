//! The two channels that feed the applier: the periodic poller and the
//! webhook inbox processor.

pub mod poller;
pub mod ports;
pub mod webhook;
