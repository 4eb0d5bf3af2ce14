//! Device facade
//!
//! Read-only projection of the slot registry and firmware orchestrator into
//! the charger's status and info views.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, Result};
use crate::firmware::Firmware;
use crate::slots::SlotRegistry;
use crate::types::{BatterySlot, DeviceStatus};

/// Network identity reported by the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub ip_address: String,
    pub gateway_address: String,
    pub mask: String,
    pub mac_address: String,
    pub method: String,
}

impl Default for NetworkInfo {
    fn default() -> Self {
        Self {
            ip_address: "127.0.0.1".to_string(),
            gateway_address: "10.0.0.1".to_string(),
            mask: "255.255.255.0".to_string(),
            mac_address: "00:B0:D0:63:C2:26".to_string(),
            method: "dhcp".to_string(),
        }
    }
}

/// Static identity of the emulated charger
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceIdentity {
    pub name: String,
    pub model: String,
    pub firmware_build: String,
    pub internal_temperature_c: f64,
    pub network: NetworkInfo,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            name: "Laddare #1".to_string(),
            model: "emulator".to_string(),
            firmware_build: "abc123".to_string(),
            internal_temperature_c: 24.01,
            network: NetworkInfo::default(),
        }
    }
}

/// Body of the charger status query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargerStatus {
    pub device_status: String,
    pub batteries: Vec<BatterySlot>,
}

/// Body of the device info query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub device_internal_temperature_c: f64,
    pub name: String,
    pub firmware_version: String,
    pub firmware_build: String,
    pub ip: NetworkInfo,
    pub status: DeviceStatus,
}

/// The emulated charger as seen from outside
#[derive(Debug, Clone)]
pub struct Device {
    identity: Arc<DeviceIdentity>,
    slots: Arc<SlotRegistry>,
    firmware: Firmware,
}

impl Device {
    pub fn new(identity: DeviceIdentity, slots: Arc<SlotRegistry>, firmware: Firmware) -> Self {
        Self {
            identity: Arc::new(identity),
            slots,
            firmware,
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn slots(&self) -> &Arc<SlotRegistry> {
        &self.slots
    }

    pub fn firmware(&self) -> &Firmware {
        &self.firmware
    }

    pub fn status(&self) -> ChargerStatus {
        ChargerStatus {
            device_status: "ok".to_string(),
            batteries: self.slots.snapshot(),
        }
    }

    pub fn info(&self) -> DeviceInfo {
        let snapshot = self.firmware.snapshot();
        DeviceInfo {
            device_internal_temperature_c: self.identity.internal_temperature_c,
            name: self.identity.name.clone(),
            firmware_version: snapshot.current_version,
            firmware_build: self.identity.firmware_build.clone(),
            ip: self.identity.network.clone(),
            status: snapshot.status,
        }
    }

    /// Info query in the predecessor protocol, which refused while rebooting
    pub fn info_strict(&self) -> Result<DeviceInfo> {
        let info = self.info();
        if info.status.is_rebooting() {
            return Err(DeviceError::Unavailable(format!(
                "device is rebooting ({})",
                info.status
            )));
        }
        Ok(info)
    }
}
