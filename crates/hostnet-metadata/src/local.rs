//! Local-network discovery.
//!
//! A network is "local" when the network-driver service has a container on
//! this host; that container's MAC is also the expected neighbor MAC for
//! every remote container reachable through the bridge.

use hostnet_common::Result;
use tracing::debug;

use crate::client::MetadataView;
use crate::types::Network;

/// Returns the networks local to this host (in metadata order) and the MAC
/// address of the local network-driver container.
///
/// An empty result is not an error here; callers decide whether a missing
/// local network aborts their reconciliation.
pub async fn local_networks<M>(view: &M) -> Result<(Vec<Network>, String)>
where
    M: MetadataView + ?Sized,
{
    let host = view.get_self_host().await?;
    let networks = view.get_networks().await?;
    let services = view.get_services().await?;

    let mut driver_mac = String::new();
    let mut local_uuids = std::collections::HashSet::new();
    for service in &services {
        if !service.is_network_driver() {
            continue;
        }
        for container in &service.containers {
            if container.is_on_host(&host) {
                driver_mac = container.primary_mac_address.clone();
                local_uuids.insert(container.network_uuid.clone());
            }
        }
    }
    debug!(driver_mac = %driver_mac, count = local_uuids.len(), "resolved local networks");

    let locals = networks
        .into_iter()
        .filter(|n| local_uuids.contains(&n.uuid))
        .collect();
    Ok((locals, driver_mac))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Container, Host, Service, NETWORK_DRIVER_SERVICE_KIND};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct StaticView {
        host: Host,
        networks: Vec<Network>,
        services: Vec<Service>,
    }

    #[async_trait]
    impl MetadataView for StaticView {
        async fn get_self_host(&self) -> Result<Host> {
            Ok(self.host.clone())
        }
        async fn get_networks(&self) -> Result<Vec<Network>> {
            Ok(self.networks.clone())
        }
        async fn get_containers(&self) -> Result<Vec<Container>> {
            Ok(Vec::new())
        }
        async fn get_services(&self) -> Result<Vec<Service>> {
            Ok(self.services.clone())
        }
    }

    fn driver_service(host_uuid: &str, network_uuid: &str, mac: &str) -> Service {
        Service {
            kind: NETWORK_DRIVER_SERVICE_KIND.to_string(),
            name: "ipsec".to_string(),
            primary_service_name: "ipsec".to_string(),
            containers: vec![Container {
                host_uuid: host_uuid.to_string(),
                network_uuid: network_uuid.to_string(),
                primary_mac_address: mac.to_string(),
                ..Container::default()
            }],
        }
    }

    #[tokio::test]
    async fn test_local_networks_found() {
        let view = StaticView {
            host: Host {
                uuid: "h-1".to_string(),
                ..Host::default()
            },
            networks: vec![
                Network {
                    uuid: "n-other".to_string(),
                    ..Network::default()
                },
                Network {
                    uuid: "n-local".to_string(),
                    ..Network::default()
                },
            ],
            services: vec![driver_service("h-1", "n-local", "02:dd:dd:dd:dd:dd")],
        };

        let (locals, driver_mac) = local_networks(&view).await.unwrap();
        assert_eq!(locals.len(), 1);
        assert_eq!(locals[0].uuid, "n-local");
        assert_eq!(driver_mac, "02:dd:dd:dd:dd:dd");
    }

    #[tokio::test]
    async fn test_local_networks_none_on_other_host() {
        let view = StaticView {
            host: Host {
                uuid: "h-1".to_string(),
                ..Host::default()
            },
            networks: vec![Network {
                uuid: "n-1".to_string(),
                ..Network::default()
            }],
            services: vec![driver_service("h-2", "n-1", "02:dd:dd:dd:dd:dd")],
        };

        let (locals, driver_mac) = local_networks(&view).await.unwrap();
        assert!(locals.is_empty());
        assert_eq!(driver_mac, "");
    }

    #[tokio::test]
    async fn test_sidekick_service_ignored() {
        let mut sidekick = driver_service("h-1", "n-1", "02:dd:dd:dd:dd:dd");
        sidekick.name = "ipsec-router".to_string();

        let view = StaticView {
            host: Host {
                uuid: "h-1".to_string(),
                ..Host::default()
            },
            networks: vec![Network {
                uuid: "n-1".to_string(),
                ..Network::default()
            }],
            services: vec![sidekick],
        };

        let (locals, _) = local_networks(&view).await.unwrap();
        assert!(locals.is_empty());
    }
}
