//! AudioWatch - A rate-limited dispatcher for audio quality notifications
//!
//! This library receives audio quality degradation events tied to a live
//! connection, suppresses duplicates per (subject, issue) within a throttle
//! window, formats human-readable remediation messages, and delivers them
//! over an abstracted push transport.

pub mod cli;
pub mod config;
pub mod core;
pub mod dispatcher;
pub mod formatting;
pub mod internal_metrics;
pub mod throttle;
pub mod transport;

// Re-export core types for convenience
pub use crate::core::*;
pub use dispatcher::NotificationDispatcher;
pub use throttle::{ThrottleKey, ThrottleLedger};
