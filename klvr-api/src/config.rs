//! Configuration for the charger emulator
//!
//! Combines the emulated device identity, simulation timing and HTTP server
//! settings.

use std::path::PathBuf;
use std::time::Duration;

use klvr_core::simulator::MIN_TICK_INTERVAL;
use klvr_core::{DeviceIdentity, FirmwareTiming, NetworkInfo};

/// Complete emulator configuration
#[derive(Debug, Clone, Default)]
pub struct EmulatorConfig {
    pub device: DeviceConfig,
    pub simulation: SimulationConfig,
    pub server: ServerConfig,
}

/// Identity of the emulated charger
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Name reported by the info query
    pub name: String,

    /// Model advertised over mDNS
    pub model: String,

    /// Firmware build identifier
    pub firmware_build: String,

    /// Firmware version at start-up
    pub firmware_version: String,

    /// Internal temperature in °C
    pub internal_temperature_c: f64,

    /// Temperature reported for every bay
    pub bay_temperature_c: f64,

    /// Reported network identity
    pub network: NetworkInfo,

    /// Replace the reported IP with the host's detected address at start-up
    pub detect_ip: bool,
}

/// Timing of the simulated hardware
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Wall-clock interval between charging ticks (each covers 2 simulated seconds)
    pub tick_interval: Duration,

    /// Time a board takes to come back after a reboot command
    pub reboot_delay: Duration,

    /// Simulated transfer time of a firmware upload
    pub upload_latency: Duration,

    /// Answer info queries with 503 while a board reboots
    pub reject_info_while_rebooting: bool,
}

/// HTTP server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,

    /// First port to try
    pub port: u16,

    /// Number of consecutive ports to try before giving up
    pub port_attempts: u16,

    /// Directory with the web UI, served for unmatched paths
    pub static_dir: Option<PathBuf>,

    /// Announce the device over mDNS
    pub use_mdns: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let identity = DeviceIdentity::default();
        Self {
            name: identity.name,
            model: identity.model,
            firmware_build: identity.firmware_build,
            firmware_version: "0.1.0".to_string(),
            internal_temperature_c: identity.internal_temperature_c,
            bay_temperature_c: 24.0,
            network: identity.network,
            detect_ip: true,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let timing = FirmwareTiming::default();
        Self {
            tick_interval: Duration::from_secs(2),
            reboot_delay: timing.reboot_delay,
            upload_latency: timing.upload_latency,
            reject_info_while_rebooting: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            port_attempts: 50,
            static_dir: None,
            use_mdns: true,
        }
    }
}

impl DeviceConfig {
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity {
            name: self.name.clone(),
            model: self.model.clone(),
            firmware_build: self.firmware_build.clone(),
            internal_temperature_c: self.internal_temperature_c,
            network: self.network.clone(),
        }
    }
}

impl SimulationConfig {
    pub fn firmware_timing(&self) -> FirmwareTiming {
        FirmwareTiming {
            reboot_delay: self.reboot_delay,
            upload_latency: self.upload_latency,
        }
    }
}

impl EmulatorConfig {
    /// Create config with a device name and first port
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            device: DeviceConfig {
                name: name.into(),
                ..Default::default()
            },
            server: ServerConfig {
                port,
                ..Default::default()
            },
            simulation: SimulationConfig::default(),
        }
    }

    /// Set the model advertised over mDNS
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.device.model = model.into();
        self
    }

    /// Set the firmware version at start-up
    pub fn with_firmware(mut self, version: impl Into<String>) -> Self {
        self.device.firmware_version = version.into();
        self
    }

    /// Set the reported IP address
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.device.network.ip_address = ip.into();
        self.device.detect_ip = false;
        self
    }

    /// Set the bind address
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.server.host = host.into();
        self
    }

    /// Set how many ports to try from the first one
    pub fn with_port_attempts(mut self, attempts: u16) -> Self {
        self.server.port_attempts = attempts.max(1);
        self
    }

    /// Set the wall-clock charging tick interval
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.simulation.tick_interval = interval.max(MIN_TICK_INTERVAL);
        self
    }

    /// Set reboot delay and upload latency
    pub fn with_firmware_timing(mut self, reboot_delay: Duration, upload_latency: Duration) -> Self {
        self.simulation.reboot_delay = reboot_delay;
        self.simulation.upload_latency = upload_latency;
        self
    }

    /// Refuse info queries while rebooting, as older firmware did
    pub fn with_strict_info(mut self) -> Self {
        self.simulation.reject_info_while_rebooting = true;
        self
    }

    /// Serve a web UI from this directory
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.server.static_dir = Some(dir.into());
        self
    }

    /// Disable mDNS announcement
    pub fn without_mdns(mut self) -> Self {
        self.server.use_mdns = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EmulatorConfig::default();

        assert_eq!(config.device.name, "Laddare #1");
        assert_eq!(config.device.firmware_version, "0.1.0");
        assert_eq!(config.device.network.gateway_address, "10.0.0.1");
        assert!(config.device.detect_ip);
        assert_eq!(config.simulation.tick_interval, Duration::from_secs(2));
        assert_eq!(config.simulation.reboot_delay, Duration::from_secs(2));
        assert!(!config.simulation.reject_info_while_rebooting);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.port_attempts, 50);
        assert!(config.server.use_mdns);
    }

    #[test]
    fn test_config_builder() {
        let config = EmulatorConfig::new("Bench charger", 9100)
            .with_model("bench")
            .with_firmware("1.2.3")
            .with_ip("192.168.1.50")
            .with_port_attempts(0)
            .with_tick_interval(Duration::from_millis(100))
            .with_strict_info()
            .without_mdns();

        assert_eq!(config.device.name, "Bench charger");
        assert_eq!(config.device.model, "bench");
        assert_eq!(config.device.firmware_version, "1.2.3");
        assert_eq!(config.device.network.ip_address, "192.168.1.50");
        assert!(!config.device.detect_ip);
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.port_attempts, 1);
        assert_eq!(config.simulation.tick_interval, Duration::from_millis(100));
        assert!(config.simulation.reject_info_while_rebooting);
        assert!(!config.server.use_mdns);

        let identity = config.device.identity();
        assert_eq!(identity.name, "Bench charger");
    }

    #[test]
    fn test_zero_tick_interval_clamped() {
        let config = EmulatorConfig::default().with_tick_interval(Duration::ZERO);
        assert_eq!(config.simulation.tick_interval, MIN_TICK_INTERVAL);
    }
}
