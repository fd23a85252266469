//! In-memory link and neighbor tables.

use async_trait::async_trait;
use hostnet_common::{HostnetError, Result};
use hostnet_kernel::{Link, NeighborEntry, NeighborState, NetlinkOps};
use std::net::Ipv4Addr;
use std::sync::Mutex;

/// Fake kernel link/neighbor tables.
///
/// `neighbor_set` applies the upsert to the stored table, so a second
/// reconciliation over the same fake observes the repaired state; every
/// mutation is also recorded for assertions.
#[derive(Debug, Default)]
pub struct FakeNetlink {
    pub links: Mutex<Vec<Link>>,
    pub neighbors: Mutex<Vec<NeighborEntry>>,
    /// Names of links deleted through `link_delete`, in order.
    pub deleted_links: Mutex<Vec<String>>,
    /// Entries passed to `neighbor_set`, in order.
    pub neighbor_sets: Mutex<Vec<NeighborEntry>>,
    /// Injected per-entry failure: `neighbor_set` for this IP errors.
    pub fail_neighbor_set_for: Option<Ipv4Addr>,
}

impl FakeNetlink {
    pub fn with_links(links: Vec<Link>) -> Self {
        Self {
            links: Mutex::new(links),
            ..Self::default()
        }
    }

    pub fn deleted_link_names(&self) -> Vec<String> {
        self.deleted_links.lock().unwrap().clone()
    }

    pub fn recorded_neighbor_sets(&self) -> Vec<NeighborEntry> {
        self.neighbor_sets.lock().unwrap().clone()
    }
}

#[async_trait]
impl NetlinkOps for FakeNetlink {
    async fn list_links(&self) -> Result<Vec<Link>> {
        Ok(self.links.lock().unwrap().clone())
    }

    async fn link_by_name(&self, name: &str) -> Result<Link> {
        self.links
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.name == name)
            .cloned()
            .ok_or_else(|| HostnetError::LinkNotFound {
                name: name.to_string(),
            })
    }

    async fn link_delete(&self, link: &Link) -> Result<()> {
        let mut links = self.links.lock().unwrap();
        links.retain(|l| l.index != link.index);
        self.deleted_links.lock().unwrap().push(link.name.clone());
        Ok(())
    }

    async fn list_neighbors(&self, link_index: Option<u32>) -> Result<Vec<NeighborEntry>> {
        Ok(self
            .neighbors
            .lock()
            .unwrap()
            .iter()
            .filter(|n| link_index.is_none() || link_index == Some(n.link_index))
            .cloned()
            .collect())
    }

    async fn neighbor_set(&self, entry: &NeighborEntry) -> Result<()> {
        if self.fail_neighbor_set_for == Some(entry.ip) {
            return Err(HostnetError::kernel_io("neighbor_set", "injected failure"));
        }

        self.neighbor_sets.lock().unwrap().push(entry.clone());

        let mut neighbors = self.neighbors.lock().unwrap();
        if let Some(existing) = neighbors
            .iter_mut()
            .find(|n| n.link_index == entry.link_index && n.ip == entry.ip)
        {
            existing.mac = entry.mac;
            existing.state = NeighborState::Reachable;
        } else {
            neighbors.push(NeighborEntry {
                state: NeighborState::Reachable,
                ..entry.clone()
            });
        }
        Ok(())
    }
}
