//! Capability traits for kernel table access.
//!
//! Watchers are generic over these traits so tests can substitute
//! in-memory fakes for the real netlink socket and conntrack CLI.

use async_trait::async_trait;
use hostnet_common::Result;

use crate::types::{DnatEntry, Link, NeighborEntry};

/// Link and neighbor table access over rtnetlink.
///
/// Implementations must be safe for concurrent use across watchers; the
/// adapter is stateless and every call is an independent snapshot.
#[async_trait]
pub trait NetlinkOps: Send + Sync {
    /// Lists all links on the host.
    async fn list_links(&self) -> Result<Vec<Link>>;

    /// Looks up a single link by name.
    ///
    /// Returns [`hostnet_common::HostnetError::LinkNotFound`] when no link
    /// carries the name.
    async fn link_by_name(&self, name: &str) -> Result<Link>;

    /// Deletes a link. Deleting an already-gone link is not an error.
    async fn link_delete(&self, link: &Link) -> Result<()>;

    /// Lists IPv4 neighbor cache entries, optionally restricted to one link.
    async fn list_neighbors(&self, link_index: Option<u32>) -> Result<Vec<NeighborEntry>>;

    /// Upserts a neighbor entry with state REACHABLE.
    async fn neighbor_set(&self, entry: &NeighborEntry) -> Result<()>;
}

/// Connection-tracking DNAT table access.
#[async_trait]
pub trait ConntrackOps: Send + Sync {
    /// Lists IPv4 DNAT conntrack entries.
    async fn list_dnat(&self) -> Result<Vec<DnatEntry>>;

    /// Deletes one tracked flow so the next packet re-elects a backend.
    async fn delete(&self, entry: &DnatEntry) -> Result<()>;
}
