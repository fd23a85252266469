//! Entity snapshots returned by the metadata service.
//!
//! All entities are plain value snapshots; watchers never retain them across
//! reconciliation passes. Unknown JSON fields are ignored and missing fields
//! default, so the manager stays compatible with older metadata versions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Service kind of the network-driver service, whose local container's MAC
/// is the expected neighbor MAC for every remote container on the bridge.
pub const NETWORK_DRIVER_SERVICE_KIND: &str = "networkDriverService";

/// The host this manager runs on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Host {
    /// Opaque stable identifier of the host.
    pub uuid: String,
    pub name: String,
    pub agent_ip: String,
}

/// A managed network, including its CNI configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Network {
    pub uuid: String,
    pub name: String,
    /// Free-form per-network metadata. The `cniConfig` key holds a mapping
    /// from config file name to CNI plugin configuration.
    pub metadata: Map<String, Value>,
}

/// A container known to the metadata service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Container {
    pub uuid: String,
    pub name: String,
    /// Container id assigned by the local runtime.
    pub external_id: String,
    /// Host the container is scheduled on. The container is "local" iff
    /// this equals the self host's uuid.
    pub host_uuid: String,
    pub network_uuid: String,
    /// Primary IPv4 address, empty when the container has none (yet).
    pub primary_ip: String,
    /// Primary EUI-48 MAC address as a string.
    pub primary_mac_address: String,
    /// Published ports as `hostIp:hostPort:containerPort/protocol` triples.
    pub ports: Vec<String>,
}

impl Container {
    /// Returns true if the container runs on the given host.
    pub fn is_on_host(&self, host: &Host) -> bool {
        self.host_uuid == host.uuid
    }
}

/// A service grouping containers, used to identify the network driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    pub kind: String,
    pub name: String,
    pub primary_service_name: String,
    pub containers: Vec<Container>,
}

impl Service {
    /// Returns true if this is the primary service of the network-driver
    /// plugin stack (sidekick services carry the same kind but a different
    /// name).
    pub fn is_network_driver(&self) -> bool {
        self.kind == NETWORK_DRIVER_SERVICE_KIND && self.name == self.primary_service_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_container_deserialize() {
        let container: Container = serde_json::from_value(serde_json::json!({
            "uuid": "c-1234",
            "name": "web",
            "external_id": "8f1c6ab2d3e4aabbccdd",
            "host_uuid": "h-1",
            "network_uuid": "n-1",
            "primary_ip": "10.42.0.5",
            "primary_mac_address": "02:aa:aa:aa:aa:05",
            "ports": ["0.0.0.0:8080:80/tcp"],
            "some_future_field": true
        }))
        .unwrap();

        assert_eq!(container.primary_ip, "10.42.0.5");
        assert_eq!(container.ports, vec!["0.0.0.0:8080:80/tcp".to_string()]);
    }

    #[test]
    fn test_container_missing_fields_default() {
        let container: Container =
            serde_json::from_value(serde_json::json!({ "uuid": "c-1" })).unwrap();
        assert_eq!(container.primary_ip, "");
        assert!(container.ports.is_empty());
    }

    #[test]
    fn test_is_on_host() {
        let host = Host {
            uuid: "h-1".to_string(),
            ..Host::default()
        };
        let local = Container {
            host_uuid: "h-1".to_string(),
            ..Container::default()
        };
        let remote = Container {
            host_uuid: "h-2".to_string(),
            ..Container::default()
        };
        assert!(local.is_on_host(&host));
        assert!(!remote.is_on_host(&host));
    }

    #[test]
    fn test_is_network_driver() {
        let primary = Service {
            kind: NETWORK_DRIVER_SERVICE_KIND.to_string(),
            name: "ipsec".to_string(),
            primary_service_name: "ipsec".to_string(),
            containers: vec![],
        };
        let sidekick = Service {
            name: "ipsec-router".to_string(),
            ..primary.clone()
        };
        let unrelated = Service {
            kind: "loadBalancerService".to_string(),
            ..primary.clone()
        };

        assert!(primary.is_network_driver());
        assert!(!sidekick.is_network_driver());
        assert!(!unrelated.is_network_driver());
    }
}
