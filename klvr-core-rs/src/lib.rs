//! KLVR Core Library
//!
//! Device state machine for the KLVR charger emulator: 48 battery slots
//! advanced by a background charging simulator, and a two-board firmware
//! update orchestrator that applies uploaded images after a simulated reboot.

pub mod error;
pub mod types;
pub mod slots;
pub mod simulator;
pub mod version;
pub mod firmware;
pub mod device;
pub mod discovery;

pub use error::{DeviceError, Result};
pub use types::*;
pub use slots::{BulkInsertReport, SlotRegistry};
pub use simulator::{ChargingSimulator, SimulatorHandle};
pub use firmware::{BoardSnapshot, Firmware, FirmwareSnapshot, FirmwareTiming, UploadReceipt};
pub use device::{ChargerStatus, Device, DeviceIdentity, DeviceInfo, NetworkInfo};
pub use discovery::{Announcer, DiscoveryError, DiscoveryRecord};
