//! Typed snapshots of the authoritative cluster metadata service.
//!
//! The metadata service is the desired-state side of every reconciliation:
//! which containers exist, where they run, which MAC and IP they own, and
//! which ports they publish. This crate provides:
//!
//! - [`types`]: the entity snapshots ([`Host`], [`Network`], [`Container`],
//!   [`Service`])
//! - [`MetadataView`]: the capability trait watchers consume, with
//!   [`MetadataClient`] as the HTTP implementation
//! - [`cni`]: bridge discovery from a network's CNI configuration
//!
//! Snapshots from different calls may be mutually stale by small windows;
//! callers must make every decision from the most-recently-read input only.

pub mod cni;
mod client;
mod local;
mod types;

pub use client::{MetadataClient, MetadataView};
pub use local::local_networks;
pub use types::{Container, Host, Network, Service, NETWORK_DRIVER_SERVICE_KIND};
