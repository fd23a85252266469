//! Fixture builders for metadata entities.

use hostnet_metadata::{Container, Host, Network, Service, NETWORK_DRIVER_SERVICE_KIND};

/// Builds a host with the given uuid.
pub fn host(uuid: &str) -> Host {
    Host {
        uuid: uuid.to_string(),
        name: format!("host-{}", uuid),
        ..Host::default()
    }
}

/// Builds a network whose CNI config programs one bridge plugin.
pub fn bridge_network(uuid: &str, bridge: &str, subnet: &str) -> Network {
    let metadata = serde_json::json!({
        "cniConfig": {
            "10-managed.conf": {
                "type": "bridge",
                "bridge": bridge,
                "bridgeSubnet": subnet,
            }
        }
    });
    Network {
        uuid: uuid.to_string(),
        name: format!("network-{}", uuid),
        metadata: metadata.as_object().unwrap().clone(),
    }
}

/// Builds a container snapshot.
pub fn container(uuid: &str, host_uuid: &str, network_uuid: &str, ip: &str, mac: &str) -> Container {
    Container {
        uuid: uuid.to_string(),
        name: format!("container-{}", uuid),
        external_id: format!("{:0<20}", uuid),
        host_uuid: host_uuid.to_string(),
        network_uuid: network_uuid.to_string(),
        primary_ip: ip.to_string(),
        primary_mac_address: mac.to_string(),
        ports: Vec::new(),
    }
}

/// Builds the primary network-driver service with the given containers.
pub fn network_driver_service(containers: Vec<Container>) -> Service {
    Service {
        kind: NETWORK_DRIVER_SERVICE_KIND.to_string(),
        name: "ipsec".to_string(),
        primary_service_name: "ipsec".to_string(),
        containers,
    }
}
