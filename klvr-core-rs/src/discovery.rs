//! mDNS announcement of the emulated charger

use std::collections::HashMap;
use std::net::IpAddr;

use mdns_sd::{ServiceDaemon, ServiceInfo};
use thiserror::Error;
use tracing::{debug, info};

/// mDNS service type advertised by KLVR chargers
pub const SERVICE_TYPE: &str = "_klvrcharger._tcp.local.";
const INSTANCE_NAME: &str = "KLVR Charger Pro";
const HOST_NAME: &str = "klvr-emulator.local.";

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("mDNS error: {0}")]
    Mdns(#[from] mdns_sd::Error),
}

/// What gets published about the device
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryRecord {
    pub name: String,
    pub model: String,
    pub version: String,
    pub addr: IpAddr,
    pub port: u16,
}

impl DiscoveryRecord {
    fn properties(&self) -> HashMap<String, String> {
        let mut properties = HashMap::new();
        properties.insert("version".to_string(), self.version.clone());
        properties.insert("model".to_string(), self.model.clone());
        properties.insert("name".to_string(), self.name.clone());
        properties
    }
}

/// Registers the device on the local network until shut down
pub struct Announcer {
    daemon: ServiceDaemon,
    fullname: Option<String>,
}

impl Announcer {
    pub fn new() -> Result<Self, DiscoveryError> {
        Ok(Self {
            daemon: ServiceDaemon::new()?,
            fullname: None,
        })
    }

    /// Publish the record
    pub fn announce(&mut self, record: &DiscoveryRecord) -> Result<(), DiscoveryError> {
        let addr = record.addr.to_string();
        let service_info = ServiceInfo::new(
            SERVICE_TYPE,
            INSTANCE_NAME,
            HOST_NAME,
            addr.as_str(),
            record.port,
            record.properties(),
        )?;

        let fullname = service_info.get_fullname().to_string();
        self.daemon.register(service_info)?;
        info!(
            "mDNS: Announcing \"{}\" ({} {}) at {}:{}",
            record.name, record.model, record.version, record.addr, record.port
        );
        self.fullname = Some(fullname);
        Ok(())
    }

    /// Withdraw the record and stop the daemon
    pub fn shutdown(mut self) -> Result<(), DiscoveryError> {
        if let Some(fullname) = self.fullname.take() {
            // Unregister is acknowledged asynchronously; the receiver is dropped
            let _ = self.daemon.unregister(&fullname)?;
            debug!("mDNS: Withdrew {}", fullname);
        }
        self.daemon.shutdown()?;
        info!("mDNS: Discovery stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_record_properties() {
        let record = DiscoveryRecord {
            name: "Laddare #1".to_string(),
            model: "emulator".to_string(),
            version: "0.1.0".to_string(),
            addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8000,
        };

        let props = record.properties();
        assert_eq!(props["version"], "0.1.0");
        assert_eq!(props["model"], "emulator");
        assert_eq!(props["name"], "Laddare #1");
    }
}
