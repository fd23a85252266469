//! Dangling virtual-ethernet cleanup.
//!
//! When a container dies uncleanly its host-side veth can outlive it,
//! stuck on the bridge and leaking an ifindex. This crate builds two views
//! of the veth population:
//!
//! - the host view: links whose name carries the veth prefix and whose
//!   master is a local CNI bridge
//! - the container view: the peer indices live containers actually use,
//!   read as eth0's parent index inside each container's namespace
//!
//! and deletes whatever the host sees that no container claims.

pub mod enumerate;
mod watcher;

pub use watcher::{VethWatcher, DEFAULT_SYNC_INTERVAL_SECS};
