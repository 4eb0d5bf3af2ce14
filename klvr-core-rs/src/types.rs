//! Core types for the charger emulator

use serde::{Deserialize, Serialize};

/// Number of battery bays on the charger
pub const SLOT_COUNT: usize = 48;

/// Charge level assigned to a freshly inserted battery
pub const INSERT_CHARGE_PERCENT: f64 = 5.0;

/// Seconds to charge from `INSERT_CHARGE_PERCENT` to full
pub const FULL_CHARGE_SECONDS: u64 = 7200;

/// Percentage points covered by `FULL_CHARGE_SECONDS`
pub const CHARGE_SPAN_PERCENT: f64 = 100.0 - INSERT_CHARGE_PERCENT;

/// Lifecycle state of a battery bay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    Empty,
    Charging,
    Done,
}

impl std::fmt::Display for SlotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotState::Empty => write!(f, "empty"),
            SlotState::Charging => write!(f, "charging"),
            SlotState::Done => write!(f, "done"),
        }
    }
}

/// One battery bay, as reported by the charger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatterySlot {
    pub slot: usize,
    pub battery_bay_temp_c: f64,
    pub slot_state: SlotState,
    pub state_of_charge_percent: f64,
    pub time_remaining_seconds: u64,
    pub error_msg: String,
    pub battery_detected: String,
}

impl BatterySlot {
    /// An empty bay at the given index
    pub fn empty(slot: usize, bay_temp_c: f64) -> Self {
        Self {
            slot,
            battery_bay_temp_c: bay_temp_c,
            slot_state: SlotState::Empty,
            state_of_charge_percent: 0.0,
            time_remaining_seconds: 0,
            error_msg: String::new(),
            battery_detected: String::new(),
        }
    }

    /// Reset to the empty defaults, keeping index and bay temperature
    pub fn clear(&mut self) {
        *self = Self::empty(self.slot, self.battery_bay_temp_c);
    }

    pub fn is_occupied(&self) -> bool {
        self.slot_state != SlotState::Empty
    }
}

/// Estimated seconds until full, on the linear model
///
/// 95 percentage points are consumed over the 7200 second window that starts
/// at insertion (5%), so `(100 - percent) / 95 * 7200`, rounded.
pub fn estimate_time_remaining(percent: f64) -> u64 {
    let remaining = (100.0 - percent).max(0.0);
    (remaining / CHARGE_SPAN_PERCENT * FULL_CHARGE_SECONDS as f64).round() as u64
}

/// Independently rebootable firmware board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Board {
    Main,
    Rear,
}

impl Board {
    pub const ALL: [Board; 2] = [Board::Main, Board::Rear];

    pub fn as_str(&self) -> &'static str {
        match self {
            Board::Main => "main",
            Board::Rear => "rear",
        }
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Board {
    type Err = crate::DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "main" => Ok(Board::Main),
            "rear" => Ok(Board::Rear),
            other => Err(crate::DeviceError::InvalidArgument(format!(
                "unknown board {:?}, expected \"main\" or \"rear\"",
                other
            ))),
        }
    }
}

/// Externally visible device status, derived from the boards' reboot flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Ready,
    RebootingMain,
    RebootingRear,
    RebootingBoth,
}

impl DeviceStatus {
    pub fn from_flags(main_rebooting: bool, rear_rebooting: bool) -> Self {
        match (main_rebooting, rear_rebooting) {
            (false, false) => DeviceStatus::Ready,
            (true, false) => DeviceStatus::RebootingMain,
            (false, true) => DeviceStatus::RebootingRear,
            (true, true) => DeviceStatus::RebootingBoth,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Ready => "ready",
            DeviceStatus::RebootingMain => "rebooting_main",
            DeviceStatus::RebootingRear => "rebooting_rear",
            DeviceStatus::RebootingBoth => "rebooting_both",
        }
    }

    pub fn is_rebooting(&self) -> bool {
        *self != DeviceStatus::Ready
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_serialization() {
        let slot = BatterySlot::empty(3, 24.0);
        let json = serde_json::to_value(&slot).unwrap();

        assert_eq!(json["slot"], 3);
        assert_eq!(json["batteryBayTempC"], 24.0);
        assert_eq!(json["slotState"], "empty");
        assert_eq!(json["stateOfChargePercent"], 0.0);
        assert_eq!(json["timeRemainingSeconds"], 0);
        assert_eq!(json["errorMsg"], "");
        assert_eq!(json["batteryDetected"], "");
    }

    #[test]
    fn test_time_estimate() {
        assert_eq!(estimate_time_remaining(5.0), 7200);
        assert_eq!(estimate_time_remaining(100.0), 0);
        // 45 points left: 45/95 * 7200 = 3410.5 -> 3411
        assert_eq!(estimate_time_remaining(55.0), 3411);
    }

    #[test]
    fn test_board_parse() {
        assert_eq!("main".parse::<Board>().unwrap(), Board::Main);
        assert_eq!(" rear\n".parse::<Board>().unwrap(), Board::Rear);
        assert!(matches!(
            "front".parse::<Board>(),
            Err(crate::DeviceError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_device_status_labels() {
        assert_eq!(DeviceStatus::from_flags(false, false), DeviceStatus::Ready);
        assert_eq!(DeviceStatus::from_flags(true, true), DeviceStatus::RebootingBoth);

        let json = serde_json::to_value(DeviceStatus::RebootingRear).unwrap();
        assert_eq!(json, "rebooting_rear");
    }
}
