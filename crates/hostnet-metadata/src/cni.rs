//! Bridge discovery from a network's CNI configuration.
//!
//! A network's metadata carries a `cniConfig` mapping from config file name
//! to the plugin configuration that file holds. The ARP path needs the one
//! bridge (and its subnet) programmed by the bridge plugin; the veth path
//! only needs the names of every bridge any local network parents veths on,
//! regardless of plugin type.

use hostnet_common::{HostnetError, Result};
use hostnet_types::Ipv4Network;
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

use crate::types::Network;

/// Plugin type of the canonical bridge plugin.
pub const BRIDGE_PLUGIN_TYPE: &str = "bridge";

/// Key of the CNI configuration mapping inside network metadata.
pub const CNI_CONFIG_KEY: &str = "cniConfig";

/// Bridge name and subnet extracted from a network's CNI configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeInfo {
    /// Kernel link name of the bridge (e.g. "docker0").
    pub name: String,
    /// IPv4 subnet the bridge serves.
    pub subnet: Ipv4Network,
}

/// Extracts the bridge name and subnet from the first bridge-plugin config
/// of the given network.
///
/// A network with more than one bridge in its CNI config is a configuration
/// error; only the first bridge-typed entry is honored.
///
/// # Errors
///
/// - [`HostnetError::BridgeMissing`] if no plugin config is bridge-typed.
/// - [`HostnetError::InvalidCniConfig`] if a bridge-typed config has an
///   empty `bridge` or an empty/unparsable `bridgeSubnet`.
pub fn bridge_info(network: &Network) -> Result<BridgeInfo> {
    let Some(conf) = network.metadata.get(CNI_CONFIG_KEY).and_then(Value::as_object) else {
        return Err(HostnetError::BridgeMissing);
    };

    for (file, config) in conf {
        let Some(props) = config.as_object() else {
            continue;
        };
        if props.get("type").and_then(Value::as_str) != Some(BRIDGE_PLUGIN_TYPE) {
            continue;
        }

        let bridge = props.get("bridge").and_then(Value::as_str).unwrap_or("");
        if bridge.is_empty() {
            return Err(HostnetError::invalid_cni_config(format!(
                "bridge is empty in {}",
                file
            )));
        }

        let subnet = props
            .get("bridgeSubnet")
            .and_then(Value::as_str)
            .unwrap_or("");
        if subnet.is_empty() {
            return Err(HostnetError::invalid_cni_config(format!(
                "bridgeSubnet is empty in {}",
                file
            )));
        }
        let subnet: Ipv4Network = subnet.parse().map_err(|_| {
            HostnetError::invalid_cni_config(format!(
                "bridgeSubnet {} in {} is not an IPv4 CIDR",
                subnet, file
            ))
        })?;

        return Ok(BridgeInfo {
            name: bridge.to_string(),
            subnet,
        });
    }

    Err(HostnetError::BridgeMissing)
}

/// Returns the set of bridge names across all given networks, ignoring
/// plugin-type filtering.
///
/// Veth parenting is bridge-agnostic: a host-side veth belongs to whatever
/// bridge its CNI plugin attached it to, so every `bridge` field in every
/// plugin config counts here.
pub fn local_bridge_names<'a, I>(networks: I) -> HashSet<String>
where
    I: IntoIterator<Item = &'a Network>,
{
    let mut bridges = HashSet::new();

    for network in networks {
        let Some(conf) = network.metadata.get(CNI_CONFIG_KEY).and_then(Value::as_object) else {
            debug!(network = %network.uuid, "network has no CNI config");
            continue;
        };

        for config in conf.values() {
            let bridge = config
                .as_object()
                .and_then(|props| props.get("bridge"))
                .and_then(Value::as_str)
                .unwrap_or("");
            if !bridge.is_empty() {
                bridges.insert(bridge.to_string());
            }
        }
    }

    bridges
}
