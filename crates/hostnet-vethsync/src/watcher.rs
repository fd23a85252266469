//! The veth cleanup watcher.

use async_trait::async_trait;
use hostnet_common::{Result, Watcher};
use hostnet_kernel::NetlinkOps;
use hostnet_metadata::MetadataView;
use hostnet_runtime::ContainerRuntime;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::enumerate::{self, ID_DERIVED_VETH_PREFIX};

/// Default vethsync interval in seconds.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;

/// Periodically detects and deletes dangling veths.
///
/// A veth that appears dangling may belong to a container created between
/// the host scan and the container scan; that rare false positive is
/// accepted, the next pass observes the rebuilt state.
pub struct VethWatcher<M, K, R> {
    metadata: Arc<M>,
    kernel: Arc<K>,
    runtime: Arc<R>,
    veth_prefix: String,
}

impl<M, K, R> VethWatcher<M, K, R>
where
    M: MetadataView,
    K: NetlinkOps,
    R: ContainerRuntime,
{
    pub fn new(metadata: Arc<M>, kernel: Arc<K>, runtime: Arc<R>, veth_prefix: String) -> Self {
        Self {
            metadata,
            kernel,
            runtime,
            veth_prefix,
        }
    }

    async fn reconcile(&self) -> Result<()> {
        let host_veths =
            enumerate::host_view(&self.veth_prefix, &*self.metadata, &*self.kernel).await?;
        if host_veths.is_empty() {
            debug!("no veths on local bridges");
            return Ok(());
        }

        let ns_view = enumerate::container_view_via_ns(&*self.runtime).await?;

        let (host_veths, container_veths) = if ns_view.is_empty() {
            // Either no containers run, or every namespace entry failed.
            // The id-derived names tell the two apart: when containers
            // exist, re-key the host view by name and pair it with them.
            let id_view =
                enumerate::container_view_via_id(&*self.runtime, ID_DERIVED_VETH_PREFIX).await?;
            if id_view.is_empty() {
                (host_veths, ns_view)
            } else {
                info!("namespace view is empty, falling back to id-derived veth names");
                let by_name =
                    enumerate::host_view_by_name(&self.veth_prefix, &*self.metadata, &*self.kernel)
                        .await?;
                (by_name, id_view)
            }
        } else {
            (host_veths, ns_view)
        };

        let dangling = enumerate::dangling(&host_veths, &container_veths);
        if dangling.is_empty() {
            debug!("no dangling veths");
            return Ok(());
        }

        info!(count = dangling.len(), "cleaning up dangling veths");
        for link in dangling.values() {
            if let Err(err) = self.kernel.link_delete(link).await {
                warn!(link = %link.name, error = %err, "error deleting dangling veth");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl<M, K, R> Watcher for VethWatcher<M, K, R>
where
    M: MetadataView + 'static,
    K: NetlinkOps + 'static,
    R: ContainerRuntime + 'static,
{
    fn name(&self) -> &'static str {
        "vethsync"
    }

    async fn sync(&mut self) -> Result<()> {
        self.reconcile().await
    }
}
