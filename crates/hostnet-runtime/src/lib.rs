//! Container runtime adapter.
//!
//! The watchers need two things from the local container runtime: the list
//! of running containers (with their network mode, to exclude host-networked
//! ones from veth enumeration) and the ability to run a short callback
//! inside a container's network namespace.
//!
//! The [`DockerCli`] implementation drives the `docker` CLI over the local
//! daemon socket; [`netns`] provides the namespace-pinned callback
//! machinery it uses.

mod docker;
pub mod netns;

pub use docker::{ContainerRuntime, ContainerSummary, DockerCli};
