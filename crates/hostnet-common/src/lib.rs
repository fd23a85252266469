//! Shared infrastructure for the hostnet reconciliation watchers.
//!
//! This crate carries the pieces every watcher needs:
//!
//! - [`error`]: the workspace-wide error taxonomy
//! - [`shell`]: quoted shell command execution for the external CLIs
//! - [`watcher`]: the periodic-reconciliation trait and its scheduler

pub mod error;
pub mod shell;
pub mod watcher;

pub use error::{HostnetError, Result};
pub use watcher::{parse_sync_interval, spawn_watcher, Watcher};
