//! Host-view and container-view veth enumeration.

use hostnet_common::{HostnetError, Result};
use hostnet_kernel::{Link, NetlinkOps};
use hostnet_metadata::{cni, local_networks, MetadataView};
use hostnet_runtime::ContainerRuntime;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Interface name read inside each container's namespace.
const CONTAINER_IFACE: &str = "eth0";

/// Name prefix of id-derived veths: `vethr` + first 10 chars of the
/// container id. Deployment convention of the CNI plugin; only trusted as
/// a fallback keying.
pub const ID_DERIVED_VETH_PREFIX: &str = "vethr";

/// How a host-view map is keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyBy {
    /// Decimal string of the link index; pairs with the namespace view.
    Index,
    /// Link name; pairs with the id-derived view.
    Name,
}

/// Returns the veths as seen from the host, keyed by decimal link index.
///
/// A link counts as a veth when its name starts with `prefix` and its
/// master is a bridge of a local network. Fails with
/// [`HostnetError::NoLocalBridge`] when no local bridge resolves to a link.
pub async fn host_view<M, K>(prefix: &str, metadata: &M, kernel: &K) -> Result<HashMap<String, Link>>
where
    M: MetadataView + ?Sized,
    K: NetlinkOps + ?Sized,
{
    collect_host_veths(prefix, metadata, kernel, KeyBy::Index).await
}

/// [`host_view`] keyed by link name instead of index, for pairing with
/// [`container_view_via_id`].
pub async fn host_view_by_name<M, K>(
    prefix: &str,
    metadata: &M,
    kernel: &K,
) -> Result<HashMap<String, Link>>
where
    M: MetadataView + ?Sized,
    K: NetlinkOps + ?Sized,
{
    collect_host_veths(prefix, metadata, kernel, KeyBy::Name).await
}

async fn collect_host_veths<M, K>(
    prefix: &str,
    metadata: &M,
    kernel: &K,
    key_by: KeyBy,
) -> Result<HashMap<String, Link>>
where
    M: MetadataView + ?Sized,
    K: NetlinkOps + ?Sized,
{
    let links = kernel.list_links().await?;

    let (locals, _) = local_networks(metadata).await?;
    let bridge_names = cni::local_bridge_names(locals.iter());
    debug!(?bridge_names, "local bridges from CNI config");

    let bridge_indices: HashSet<u32> = links
        .iter()
        .filter(|l| bridge_names.contains(&l.name))
        .map(|l| l.index)
        .collect();
    if bridge_indices.is_empty() {
        return Err(HostnetError::NoLocalBridge);
    }

    let mut veths = HashMap::new();
    for link in links {
        if !link.name.starts_with(prefix) || !bridge_indices.contains(&link.master_index) {
            continue;
        }
        let key = match key_by {
            KeyBy::Index => link.index.to_string(),
            KeyBy::Name => link.name.clone(),
        };
        veths.insert(key, link);
    }

    Ok(veths)
}

/// Returns the peer indices (as decimal strings) in use by live containers,
/// read by entering each non-host-networked container's namespace.
///
/// Per-container failures are logged and skip that container only; a
/// container racing with its own teardown must not abort the scan.
pub async fn container_view_via_ns<R>(runtime: &R) -> Result<HashSet<String>>
where
    R: ContainerRuntime + ?Sized,
{
    let containers = runtime.list_containers().await?;

    let mut indices = HashSet::new();
    for container in &containers {
        if container.is_host_networked() {
            continue;
        }
        match runtime
            .interface_parent_index(&container.id, CONTAINER_IFACE)
            .await
        {
            Ok(parent_index) => {
                debug!(container = %container.id, veth_index = parent_index, "resolved veth index");
                indices.insert(parent_index.to_string());
            }
            Err(err) => {
                warn!(
                    container = %container.id,
                    error = %err,
                    "couldn't determine veth index, skipping container"
                );
            }
        }
    }

    Ok(indices)
}

/// Returns the veth names derived from container ids
/// (`{prefix}{id[..10]}`), for deployments where the peer-index strategy
/// is unreliable. Pairs with [`host_view_by_name`].
pub async fn container_view_via_id<R>(runtime: &R, prefix: &str) -> Result<HashSet<String>>
where
    R: ContainerRuntime + ?Sized,
{
    let containers = runtime.list_containers().await?;
    Ok(containers
        .iter()
        .filter(|c| !c.is_host_networked())
        .map(|c| derived_veth_name(prefix, &c.id))
        .collect())
}

fn derived_veth_name(prefix: &str, container_id: &str) -> String {
    let short = container_id.get(..10).unwrap_or(container_id);
    format!("{}{}", prefix, short)
}

/// Returns the host-view entries no container claims (host \ container).
///
/// Both maps must be over the same key space (index or name).
pub fn dangling(
    host_veths: &HashMap<String, Link>,
    container_veths: &HashSet<String>,
) -> HashMap<String, Link> {
    host_veths
        .iter()
        .filter(|(key, _)| !container_veths.contains(*key))
        .map(|(key, link)| (key.clone(), link.clone()))
        .collect()
}
