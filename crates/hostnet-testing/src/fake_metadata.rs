//! In-memory metadata view.

use async_trait::async_trait;
use hostnet_common::{HostnetError, Result};
use hostnet_metadata::{Container, Host, MetadataView, Network, Service};

/// Serves fixed entity snapshots; set `unavailable` to simulate a metadata
/// outage (every getter then fails).
#[derive(Debug, Default)]
pub struct FakeMetadata {
    pub host: Host,
    pub networks: Vec<Network>,
    pub containers: Vec<Container>,
    pub services: Vec<Service>,
    pub unavailable: bool,
}

impl FakeMetadata {
    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            Err(HostnetError::metadata_unavailable("injected outage"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MetadataView for FakeMetadata {
    async fn get_self_host(&self) -> Result<Host> {
        self.check_available()?;
        Ok(self.host.clone())
    }

    async fn get_networks(&self) -> Result<Vec<Network>> {
        self.check_available()?;
        Ok(self.networks.clone())
    }

    async fn get_containers(&self) -> Result<Vec<Container>> {
        self.check_available()?;
        Ok(self.containers.clone())
    }

    async fn get_services(&self) -> Result<Vec<Service>> {
        self.check_available()?;
        Ok(self.services.clone())
    }
}
