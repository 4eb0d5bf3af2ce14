//! Slot registry
//!
//! Fixed array of 48 battery bays behind a single lock. Bays are never created
//! or destroyed after start-up, only mutated in place. Both request handlers
//! and the charging simulator go through this type.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use rand::seq::{index, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DeviceError, Result};
use crate::types::*;

/// Battery models the bulk seeder picks from
pub const BATTERY_TYPES: [&str; 4] = ["AA", "AAA", "AA-Pro", "AAA-Pro"];

/// Bays occupied by a bulk insert
pub const BULK_OCCUPIED: usize = 37;

/// Summary of a bulk insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkInsertReport {
    pub inserted: usize,
    pub by_type: BTreeMap<String, usize>,
    pub average_charge: f64,
    pub full_batteries: usize,
}

/// The charger's battery bays
#[derive(Debug)]
pub struct SlotRegistry {
    slots: Mutex<Vec<BatterySlot>>,
}

impl SlotRegistry {
    /// Create 48 empty bays at the given bay temperature
    pub fn new(bay_temp_c: f64) -> Self {
        let slots = (0..SLOT_COUNT)
            .map(|i| BatterySlot::empty(i, bay_temp_c))
            .collect();

        Self {
            slots: Mutex::new(slots),
        }
    }

    /// Validate a raw slot index
    pub fn check_index(slot: i64) -> Result<usize> {
        if (0..SLOT_COUNT as i64).contains(&slot) {
            Ok(slot as usize)
        } else {
            Err(DeviceError::OutOfRange { slot })
        }
    }

    /// Insert a battery, replacing whatever occupied the bay
    pub fn insert(&self, slot: i64, battery_type: &str) -> Result<BatterySlot> {
        let idx = Self::check_index(slot)?;
        let mut slots = self.slots.lock();
        let bay = &mut slots[idx];

        bay.slot_state = SlotState::Charging;
        bay.state_of_charge_percent = INSERT_CHARGE_PERCENT;
        bay.time_remaining_seconds = FULL_CHARGE_SECONDS;
        bay.battery_detected = battery_type.to_string();

        info!("Inserted {} battery into slot {}", battery_type, idx);
        Ok(bay.clone())
    }

    /// Eject whatever is in the bay; ejecting an empty bay is a no-op
    pub fn eject(&self, slot: i64) -> Result<BatterySlot> {
        let idx = Self::check_index(slot)?;
        let mut slots = self.slots.lock();
        let bay = &mut slots[idx];

        if bay.is_occupied() {
            info!("Ejected {} battery from slot {}", bay.battery_detected, idx);
        }
        bay.clear();
        Ok(bay.clone())
    }

    /// Force a charge level (debug control)
    ///
    /// 100% or more completes the battery regardless of prior state. Below
    /// that, a charging battery gets a fresh linear estimate, an empty bay
    /// keeps its state with no time remaining, and a completed battery goes
    /// back to charging so that `Done` always means 100%.
    pub fn set_charge(&self, slot: i64, percent: f64) -> Result<BatterySlot> {
        let idx = Self::check_index(slot)?;
        if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
            return Err(DeviceError::InvalidArgument(format!(
                "percentage {} outside 0..=100",
                percent
            )));
        }

        let mut slots = self.slots.lock();
        let bay = &mut slots[idx];
        bay.state_of_charge_percent = percent;

        if percent >= 100.0 {
            bay.slot_state = SlotState::Done;
            bay.time_remaining_seconds = 0;
        } else {
            match bay.slot_state {
                SlotState::Empty => bay.time_remaining_seconds = 0,
                SlotState::Charging => {
                    bay.time_remaining_seconds = estimate_time_remaining(percent);
                }
                SlotState::Done => {
                    bay.slot_state = SlotState::Charging;
                    bay.time_remaining_seconds = estimate_time_remaining(percent);
                }
            }
        }

        debug!(
            "Slot {} charge set to {:.1}% ({}, {}s remaining)",
            idx, percent, bay.slot_state, bay.time_remaining_seconds
        );
        Ok(bay.clone())
    }

    /// Seed a realistic scene using the thread-local RNG
    pub fn bulk_insert(&self) -> BulkInsertReport {
        self.bulk_insert_with(&mut rand::thread_rng())
    }

    /// Clear every bay, then occupy 37 random bays, 4 or 5 of them full
    ///
    /// The whole operation runs under one lock acquisition, so readers and the
    /// simulator never observe a half-seeded registry.
    pub fn bulk_insert_with<R: Rng + ?Sized>(&self, rng: &mut R) -> BulkInsertReport {
        let occupied = index::sample(rng, SLOT_COUNT, BULK_OCCUPIED).into_vec();
        let full_count = rng.gen_range(4..=5);
        let full: Vec<usize> = occupied
            .choose_multiple(rng, full_count)
            .copied()
            .collect();

        let mut by_type = BTreeMap::new();
        let mut total_charge = 0.0;

        let mut slots = self.slots.lock();
        for bay in slots.iter_mut() {
            bay.clear();
        }

        for &idx in &occupied {
            let battery_type = BATTERY_TYPES[rng.gen_range(0..BATTERY_TYPES.len())];
            let bay = &mut slots[idx];
            bay.battery_detected = battery_type.to_string();

            if full.contains(&idx) {
                bay.slot_state = SlotState::Done;
                bay.state_of_charge_percent = 100.0;
                bay.time_remaining_seconds = 0;
            } else {
                let percent = rng.gen_range(INSERT_CHARGE_PERCENT..95.0);
                bay.slot_state = SlotState::Charging;
                bay.state_of_charge_percent = percent;
                bay.time_remaining_seconds = estimate_time_remaining(percent);
            }

            total_charge += bay.state_of_charge_percent;
            *by_type.entry(battery_type.to_string()).or_insert(0) += 1;
        }
        drop(slots);

        let report = BulkInsertReport {
            inserted: occupied.len(),
            by_type,
            average_charge: total_charge / occupied.len() as f64,
            full_batteries: full_count,
        };

        info!(
            "Bulk insert: {} batteries, {} full, average charge {:.1}%",
            report.inserted, report.full_batteries, report.average_charge
        );
        report
    }

    /// Copy of a single bay
    pub fn get(&self, slot: i64) -> Result<BatterySlot> {
        let idx = Self::check_index(slot)?;
        Ok(self.slots.lock()[idx].clone())
    }

    /// Copy of all bays, in index order
    pub fn snapshot(&self) -> Vec<BatterySlot> {
        self.slots.lock().clone()
    }

    /// Apply `f` to every bay under a single lock acquisition
    pub fn update_all<F>(&self, mut f: F)
    where
        F: FnMut(&mut BatterySlot),
    {
        let mut slots = self.slots.lock();
        for bay in slots.iter_mut() {
            f(bay);
        }
    }

    /// Number of bays holding a battery
    pub fn occupied_count(&self) -> usize {
        self.slots.lock().iter().filter(|b| b.is_occupied()).count()
    }
}

impl Default for SlotRegistry {
    fn default() -> Self {
        Self::new(24.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_insert_and_eject() {
        let registry = SlotRegistry::default();

        let bay = registry.insert(7, "AA").unwrap();
        assert_eq!(bay.slot_state, SlotState::Charging);
        assert_eq!(bay.state_of_charge_percent, 5.0);
        assert_eq!(bay.time_remaining_seconds, 7200);
        assert_eq!(bay.battery_detected, "AA");

        let bay = registry.eject(7).unwrap();
        assert_eq!(bay, BatterySlot::empty(7, 24.0));

        // Ejecting twice leaves the same state
        let again = registry.eject(7).unwrap();
        assert_eq!(bay, again);
    }

    #[test]
    fn test_insert_overwrites() {
        let registry = SlotRegistry::default();
        registry.insert(0, "AA").unwrap();
        registry.set_charge(0, 80.0).unwrap();

        let bay = registry.insert(0, "AAA").unwrap();
        assert_eq!(bay.battery_detected, "AAA");
        assert_eq!(bay.state_of_charge_percent, 5.0);
    }

    #[test]
    fn test_out_of_range() {
        let registry = SlotRegistry::default();

        assert_eq!(
            registry.insert(48, "AA"),
            Err(DeviceError::OutOfRange { slot: 48 })
        );
        assert_eq!(registry.eject(-1), Err(DeviceError::OutOfRange { slot: -1 }));
        assert!(matches!(
            registry.set_charge(100, 50.0),
            Err(DeviceError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_set_charge_rules() {
        let registry = SlotRegistry::default();

        // Invalid percentages
        assert!(matches!(
            registry.set_charge(0, 100.5),
            Err(DeviceError::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.set_charge(0, f64::NAN),
            Err(DeviceError::InvalidArgument(_))
        ));

        // Empty bay keeps its state
        let bay = registry.set_charge(0, 40.0).unwrap();
        assert_eq!(bay.slot_state, SlotState::Empty);
        assert_eq!(bay.time_remaining_seconds, 0);

        // Empty bay forced to 100 completes
        let bay = registry.set_charge(1, 100.0).unwrap();
        assert_eq!(bay.slot_state, SlotState::Done);

        // Charging bay gets a fresh estimate
        registry.insert(2, "AA").unwrap();
        let bay = registry.set_charge(2, 55.0).unwrap();
        assert_eq!(bay.slot_state, SlotState::Charging);
        assert_eq!(bay.time_remaining_seconds, 3411);

        // Done bay lowered below 100 resumes charging
        registry.set_charge(2, 100.0).unwrap();
        let bay = registry.set_charge(2, 90.0).unwrap();
        assert_eq!(bay.slot_state, SlotState::Charging);
        assert_eq!(bay.time_remaining_seconds, estimate_time_remaining(90.0));
    }

    #[test]
    fn test_bulk_insert() {
        let registry = SlotRegistry::default();
        registry.insert(0, "AA").unwrap();

        let mut rng = StdRng::seed_from_u64(42);
        let report = registry.bulk_insert_with(&mut rng);

        assert_eq!(report.inserted, 37);
        assert!(report.full_batteries == 4 || report.full_batteries == 5);
        assert_eq!(report.by_type.values().sum::<usize>(), 37);
        assert_eq!(registry.occupied_count(), 37);

        let slots = registry.snapshot();
        let done = slots
            .iter()
            .filter(|b| b.slot_state == SlotState::Done)
            .count();
        assert_eq!(done, report.full_batteries);

        for bay in slots.iter().filter(|b| b.slot_state == SlotState::Charging) {
            assert!(bay.state_of_charge_percent >= 5.0 && bay.state_of_charge_percent < 95.0);
            assert_eq!(
                bay.time_remaining_seconds,
                estimate_time_remaining(bay.state_of_charge_percent)
            );
            assert!(BATTERY_TYPES.contains(&bay.battery_detected.as_str()));
        }

        let mean = slots
            .iter()
            .filter(|b| b.is_occupied())
            .map(|b| b.state_of_charge_percent)
            .sum::<f64>()
            / 37.0;
        assert!((mean - report.average_charge).abs() < 1e-9);
    }
}
