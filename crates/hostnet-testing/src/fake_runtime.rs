//! In-memory container runtime.

use async_trait::async_trait;
use hostnet_common::{HostnetError, Result};
use hostnet_runtime::{ContainerRuntime, ContainerSummary};
use std::collections::HashMap;

/// Fake container runtime.
///
/// `parent_indices` maps container id to the parent index its eth0 would
/// report; containers without an entry fail namespace entry, like a
/// container that exited mid-scan.
#[derive(Debug, Default)]
pub struct FakeRuntime {
    pub containers: Vec<ContainerSummary>,
    pub parent_indices: HashMap<String, u32>,
}

impl FakeRuntime {
    pub fn add_container(&mut self, id: &str, network_mode: &str, parent_index: Option<u32>) {
        self.containers.push(ContainerSummary {
            id: id.to_string(),
            network_mode: network_mode.to_string(),
        });
        if let Some(index) = parent_index {
            self.parent_indices.insert(id.to_string(), index);
        }
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        Ok(self.containers.clone())
    }

    async fn interface_parent_index(&self, container_id: &str, _ifname: &str) -> Result<u32> {
        self.parent_indices
            .get(container_id)
            .copied()
            .ok_or_else(|| HostnetError::ns_entry(container_id, "injected namespace failure"))
    }
}
