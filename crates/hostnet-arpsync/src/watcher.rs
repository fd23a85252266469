//! The ARP table watcher.

use async_trait::async_trait;
use hostnet_common::{HostnetError, Result, Watcher};
use hostnet_kernel::{NeighborEntry, NeighborState, NetlinkOps};
use hostnet_metadata::{cni, local_networks, Container, MetadataView};
use hostnet_types::MacAddress;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default arpsync interval in seconds.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 120;

/// Checks the ARP table periodically for invalid entries and reprograms
/// the appropriate ones based on metadata.
pub struct ArpWatcher<M, K> {
    metadata: Arc<M>,
    kernel: Arc<K>,
}

impl<M, K> ArpWatcher<M, K>
where
    M: MetadataView,
    K: NetlinkOps,
{
    pub fn new(metadata: Arc<M>, kernel: Arc<K>) -> Self {
        Self { metadata, kernel }
    }

    async fn reconcile(&self) -> Result<()> {
        let host = self.metadata.get_self_host().await?;

        let (locals, driver_mac) = local_networks(&*self.metadata).await?;
        if locals.len() > 1 {
            warn!(
                count = locals.len(),
                "multiple local networks found, reconciling only the first"
            );
        }
        let local_network = locals.first().ok_or(HostnetError::NoLocalNetwork)?;
        debug!(network = %local_network.uuid, driver_mac = %driver_mac, "checking the ARP table");

        let bridge_info = cni::bridge_info(local_network)?;
        let bridge = self.kernel.link_by_name(&bridge_info.name).await?;

        let containers = self.metadata.get_containers().await?;
        let containers_by_ip = build_containers_map(&containers, &local_network.uuid);

        let entries = self.kernel.list_neighbors(None).await?;
        for entry in entries {
            if entry.link_index != bridge.index || !bridge_info.subnet.contains(entry.ip) {
                continue;
            }

            let Some(container) = containers_by_ip.get(&entry.ip) else {
                // No policy for unknown entries; the kernel ages them out.
                debug!(ip = %entry.ip, "container not found for ARP entry");
                continue;
            };

            let local = container.host_uuid == host.uuid;
            let expected_raw = if local {
                &container.primary_mac_address
            } else {
                &driver_mac
            };
            let expected: MacAddress = match expected_raw.parse() {
                Ok(mac) => mac,
                Err(err) => {
                    warn!(
                        mac = %expected_raw,
                        error = %err,
                        "couldn't parse expected MAC address"
                    );
                    continue;
                }
            };

            if entry.mac == expected {
                continue;
            }

            info!(
                ip = %entry.ip,
                found = %entry.mac,
                expected = %expected,
                local,
                "wrong ARP entry found, fixing it"
            );
            let repaired = NeighborEntry {
                mac: expected,
                state: NeighborState::Reachable,
                ..entry
            };
            if let Err(err) = self.kernel.neighbor_set(&repaired).await {
                warn!(ip = %repaired.ip, error = %err, "error changing ARP entry");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl<M, K> Watcher for ArpWatcher<M, K>
where
    M: MetadataView + 'static,
    K: NetlinkOps + 'static,
{
    fn name(&self) -> &'static str {
        "arpsync"
    }

    async fn sync(&mut self) -> Result<()> {
        self.reconcile().await
    }
}

/// Indexes containers by primary IP, restricted to the given network.
/// Containers without an IP, on another network, or with an unparsable IP
/// are skipped.
fn build_containers_map<'a>(
    containers: &'a [Container],
    network_uuid: &str,
) -> HashMap<Ipv4Addr, &'a Container> {
    let mut map = HashMap::new();
    for container in containers {
        if container.primary_ip.is_empty() || container.network_uuid != network_uuid {
            continue;
        }
        match container.primary_ip.parse::<Ipv4Addr>() {
            Ok(ip) => {
                map.insert(ip, container);
            }
            Err(_) => {
                debug!(
                    container = %container.uuid,
                    ip = %container.primary_ip,
                    "skipping container with unparsable primary ip"
                );
            }
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn container(uuid: &str, network: &str, ip: &str) -> Container {
        Container {
            uuid: uuid.to_string(),
            network_uuid: network.to_string(),
            primary_ip: ip.to_string(),
            ..Container::default()
        }
    }

    #[test]
    fn test_build_containers_map_filters() {
        let containers = vec![
            container("c-1", "n-1", "10.42.0.5"),
            container("c-2", "n-1", ""),
            container("c-3", "n-2", "10.42.0.6"),
            container("c-4", "n-1", "not-an-ip"),
        ];

        let map = build_containers_map(&containers, "n-1");
        assert_eq!(map.len(), 1);
        assert_eq!(map[&Ipv4Addr::new(10, 42, 0, 5)].uuid, "c-1");
    }
}
