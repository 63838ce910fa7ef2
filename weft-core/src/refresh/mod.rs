//! Batch Refresh
//!
//! A `RefreshCoordinator` owns a named set of async memos and refreshes them
//! together. After each batch it compares the new values with the previous
//! ones and emits a single change notification if anything moved, no matter
//! how many memos changed.
//!
//! The coordinator is also a change tracker: reads made directly against it
//! (outside any memo) subscribe it to the atoms involved. Any change to a
//! memo's dependencies or to a directly read atom marks it stale, which
//! `invalidated` lets the host wait for before calling `refresh` again.
//!
//! `ExecutingFlag` exposes whether an async action is running as a tracked
//! boolean that coordinator memos can read.

mod config;
mod coordinator;
mod executing;

pub use config::RefreshConfig;
pub use coordinator::{MountHook, RefreshCoordinator};
pub use executing::ExecutingFlag;
