//! ARP neighbor-table reconciliation.
//!
//! The kernel learns neighbor MACs from traffic, and after container
//! migrations or network-driver restarts the learned entries go stale in a
//! way that blackholes traffic until they age out. This watcher periodically
//! checks every neighbor entry on the local bridge subnet against metadata
//! and reprograms entries whose MAC disagrees with the expected one:
//!
//! - local container: its own `primary_mac_address`
//! - remote container: the MAC of the local network-driver container, which
//!   fronts all remote traffic on the bridge
//!
//! Entries whose IP maps to no known container are left alone to age out
//! naturally; cleaning those up needs a policy decision this watcher does
//! not make.

mod watcher;

pub use watcher::{ArpWatcher, DEFAULT_SYNC_INTERVAL_SECS};
