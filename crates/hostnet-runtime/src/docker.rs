//! Docker CLI adapter.

use async_trait::async_trait;
use hostnet_common::shell::{self, shellquote, DOCKER_CMD};
use hostnet_common::{HostnetError, Result};
use hostnet_kernel::link_by_name_blocking;
use tracing::{debug, trace};

use crate::netns;

/// Network mode value of host-networked containers.
const HOST_NETWORK_MODE: &str = "host";

/// A running container as seen by the local runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    /// Full (untruncated) container id.
    pub id: String,
    /// Network mode from the container's host config ("default", "host",
    /// "bridge", "container:<id>", ...).
    pub network_mode: String,
}

impl ContainerSummary {
    /// Host-networked containers have no veth of their own and are excluded
    /// from veth enumeration.
    pub fn is_host_networked(&self) -> bool {
        self.network_mode == HOST_NETWORK_MODE
    }
}

/// Access to the local container runtime.
///
/// Watchers consume this trait so tests can substitute in-memory fakes.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Lists running containers.
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>>;

    /// Reads the parent (peer) link index of an interface inside the given
    /// container's network namespace.
    ///
    /// For a veth-attached container, `eth0`'s parent index is the host-side
    /// veth's index.
    async fn interface_parent_index(&self, container_id: &str, ifname: &str) -> Result<u32>;
}

/// Runtime adapter driving the `docker` CLI against the local daemon.
#[derive(Debug, Default, Clone, Copy)]
pub struct DockerCli;

impl DockerCli {
    pub fn new() -> Self {
        Self
    }

    /// Runs `f` inside the network namespace of the given container and
    /// returns its result.
    ///
    /// The callback runs on a thread pinned to the target namespace for its
    /// whole duration and must not retain resources outside the namespace.
    pub async fn enter_netns<T, F>(&self, container_id: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pid = self.container_pid(container_id).await?;
        let id = container_id.to_string();

        tokio::task::spawn_blocking(move || netns::with_netns(&id, pid, f))
            .await
            .map_err(|e| HostnetError::ns_entry(container_id, e.to_string()))?
    }

    /// Resolves the init PID of a running container.
    async fn container_pid(&self, container_id: &str) -> Result<i32> {
        let cmd = format!(
            "{} inspect --format '{{{{.State.Pid}}}}' {}",
            DOCKER_CMD,
            shellquote(container_id)
        );
        let output = shell::exec_or_throw(&cmd)
            .await
            .map_err(|e| HostnetError::ns_entry(container_id, e.to_string()))?;

        let pid: i32 = output.trim().parse().map_err(|_| {
            HostnetError::ns_entry(container_id, format!("unexpected pid output: {}", output))
        })?;
        if pid <= 0 {
            return Err(HostnetError::ns_entry(
                container_id,
                "container has no running process",
            ));
        }
        Ok(pid)
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        let ids_output = shell::exec_or_throw(&format!("{} ps -q --no-trunc", DOCKER_CMD))
            .await
            .map_err(|e| HostnetError::runtime("list_containers", e.to_string()))?;
        let ids: Vec<&str> = ids_output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let id_args: Vec<String> = ids.iter().map(|id| shellquote(id)).collect();
        let cmd = format!(
            "{} inspect --format '{{{{.Id}}}} {{{{.HostConfig.NetworkMode}}}}' {}",
            DOCKER_CMD,
            id_args.join(" ")
        );

        // A container stopping between ps and inspect makes inspect exit
        // non-zero while still printing the survivors; take what we got.
        let result = shell::exec(&cmd)
            .await
            .map_err(|e| HostnetError::runtime("list_containers", e.to_string()))?;
        if !result.success() {
            debug!(stderr = %result.stderr, "docker inspect reported missing containers");
        }

        let containers = parse_inspect_lines(&result.stdout);
        trace!(count = containers.len(), "listed containers");
        Ok(containers)
    }

    async fn interface_parent_index(&self, container_id: &str, ifname: &str) -> Result<u32> {
        let ifname = ifname.to_string();
        let link = self
            .enter_netns(container_id, move || link_by_name_blocking(&ifname))
            .await?;
        Ok(link.parent_index)
    }
}

fn parse_inspect_lines(stdout: &str) -> Vec<ContainerSummary> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let id = parts.next()?;
            let network_mode = parts.next()?;
            Some(ContainerSummary {
                id: id.to_string(),
                network_mode: network_mode.to_string(),
            })
        })
        .collect()
}
