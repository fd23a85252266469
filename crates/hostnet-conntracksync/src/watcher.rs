//! The conntrack table watcher.

use async_trait::async_trait;
use hostnet_common::{Result, Watcher};
use hostnet_kernel::{ConntrackOps, DnatEntry};
use hostnet_metadata::{Container, Host, MetadataView};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default conntracksync interval in seconds.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 120;

/// Checks the conntrack table periodically for DNAT entries pointing at
/// stale backends and deletes them.
pub struct ConntrackWatcher<M, C> {
    metadata: Arc<M>,
    conntrack: Arc<C>,
}

impl<M, C> ConntrackWatcher<M, C>
where
    M: MetadataView,
    C: ConntrackOps,
{
    pub fn new(metadata: Arc<M>, conntrack: Arc<C>) -> Self {
        Self {
            metadata,
            conntrack,
        }
    }

    async fn reconcile(&self) -> Result<()> {
        let host = self.metadata.get_self_host().await?;
        let containers = self.metadata.get_containers().await?;
        let backends = build_backends_map(&containers, &host);
        debug!(published_ports = backends.len(), "checking the conntrack table");

        let entries = self.conntrack.list_dnat().await?;
        for entry in entries {
            let expected = match backends.get(&entry.key()) {
                Some(container) => container,
                None => match backends.get(&generic_key(&entry)) {
                    Some(container) => container,
                    None => continue,
                },
            };

            if entry.reply_source_ip.to_string() != expected.primary_ip {
                info!(
                    entry = %entry,
                    expected = %expected.primary_ip,
                    "deleting mismatching conntrack entry"
                );
                if let Err(err) = self.conntrack.delete(&entry).await {
                    warn!(entry = %entry, error = %err, "error deleting conntrack entry");
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl<M, C> Watcher for ConntrackWatcher<M, C>
where
    M: MetadataView + 'static,
    C: ConntrackOps + 'static,
{
    fn name(&self) -> &'static str {
        "conntracksync"
    }

    async fn sync(&mut self) -> Result<()> {
        self.reconcile().await
    }
}

/// Indexes local published-port containers by `hostIp:hostPort/protocol`.
///
/// Duplicate keys resolve last-writer-wins; identical keys imply an
/// identical intended backend, so the choice does not matter.
fn build_backends_map<'a>(
    containers: &'a [Container],
    host: &Host,
) -> HashMap<String, &'a Container> {
    let mut map = HashMap::new();
    for container in containers {
        if !container.is_on_host(host) || container.ports.is_empty() {
            continue;
        }
        for port in &container.ports {
            let Some(key) = port_key(port) else {
                debug!(container = %container.uuid, port = %port, "skipping malformed port");
                continue;
            };
            map.insert(key, container);
        }
    }
    map
}

/// Turns a published-port triple `hostIp:hostPort:containerPort/protocol`
/// into the lookup key `hostIp:hostPort/protocol`.
fn port_key(port: &str) -> Option<String> {
    let mut parts = port.split(':');
    let host_ip = parts.next()?;
    let host_port = parts.next()?;
    let container_part = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let (_, protocol) = container_part.split_once('/')?;
    if host_ip.is_empty() || host_port.is_empty() || protocol.is_empty() {
        return None;
    }
    Some(format!("{}:{}/{}", host_ip, host_port, protocol))
}

fn generic_key(entry: &DnatEntry) -> String {
    format!(
        "0.0.0.0:{}/{}",
        entry.original_destination_port, entry.protocol
    )
}
