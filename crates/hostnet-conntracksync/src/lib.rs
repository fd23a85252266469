//! Conntrack DNAT reconciliation.
//!
//! A DNAT conntrack entry pins an inbound flow to the backend that was
//! elected on its first packet. When a published-port container is
//! rescheduled or changes IP, pinned flows keep steering traffic at the old
//! backend. This watcher compares every DNAT entry against the published
//! ports of local containers and deletes entries whose reply source
//! disagrees with the current backend, so the next packet re-elects one.

mod watcher;

pub use watcher::{ConntrackWatcher, DEFAULT_SYNC_INTERVAL_SECS};
