//! Last-write-wins reconciliation between the device collection and a
//! single cloud snapshot.

pub mod merge;
pub mod service;

pub use crate::merge::{merge, merge_with_stats, MergeStats};
pub use crate::service::{SyncError, SyncOutcome, SyncReport, SyncService};
