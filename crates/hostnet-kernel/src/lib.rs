//! Kernel table adapters for the hostnet watchers.
//!
//! Uniform, stateless access to the three kernel tables the watchers
//! reconcile:
//!
//! - links and the ARP neighbor cache over rtnetlink ([`RouteNetlink`])
//! - connection-tracking DNAT entries over the `conntrack(8)` CLI
//!   ([`ConntrackCli`])
//!
//! Every call is an independent snapshot; the adapters hold no sockets or
//! caches between calls, so they are safe to share across watchers.

mod conntrack;
mod netlink;
mod ops;
mod types;

pub use conntrack::ConntrackCli;
pub use netlink::{link_by_name_blocking, RouteNetlink};
pub use ops::{ConntrackOps, NetlinkOps};
pub use types::{DnatEntry, Link, NeighborEntry, NeighborState, Protocol};
