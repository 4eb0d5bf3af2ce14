//! Charging simulator
//!
//! Background task that advances every charging bay once per tick. Each tick
//! represents 2 simulated seconds; the wall-clock interval between ticks is
//! configurable so demos can run faster than real time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::slots::SlotRegistry;
use crate::types::{BatterySlot, SlotState};

/// Simulated seconds covered by one tick
pub const SECONDS_PER_TICK: u64 = 2;

/// Charge added per tick: 95 points over 7200 s at one tick per 2 s
pub const CHARGE_PER_TICK: f64 = 0.0264;

/// Default wall-clock interval between ticks
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(SECONDS_PER_TICK);

/// Shortest accepted wall-clock interval between ticks
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Advance a single bay by one tick
///
/// Returns true when this tick completed the battery.
pub fn advance(bay: &mut BatterySlot) -> bool {
    if bay.slot_state != SlotState::Charging {
        return false;
    }

    bay.state_of_charge_percent = (bay.state_of_charge_percent + CHARGE_PER_TICK).min(100.0);
    bay.time_remaining_seconds = bay.time_remaining_seconds.saturating_sub(SECONDS_PER_TICK);

    if bay.state_of_charge_percent >= 100.0 {
        bay.slot_state = SlotState::Done;
        bay.time_remaining_seconds = 0;
        return true;
    }
    false
}

/// Advance every bay in the registry by one tick
///
/// Returns the indices of bays that finished charging.
pub fn tick(registry: &SlotRegistry) -> Vec<usize> {
    let mut finished = Vec::new();
    registry.update_all(|bay| {
        if advance(bay) {
            finished.push(bay.slot);
        }
    });
    finished
}

/// Periodic driver for [`tick`]
pub struct ChargingSimulator {
    registry: Arc<SlotRegistry>,
    period: Duration,
}

impl ChargingSimulator {
    pub fn new(registry: Arc<SlotRegistry>) -> Self {
        Self {
            registry,
            period: DEFAULT_TICK_INTERVAL,
        }
    }

    /// Set the wall-clock interval between ticks, at least [`MIN_TICK_INTERVAL`]
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period.max(MIN_TICK_INTERVAL);
        self
    }

    /// Start ticking on the current tokio runtime
    ///
    /// Ticks missed while the task is descheduled are skipped, never queued.
    pub fn spawn(self) -> SimulatorHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let registry = self.registry;
        let period = self.period;

        info!("Charging simulator started, tick every {:?}", period);

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick of a tokio interval fires immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        for slot in tick(&registry) {
                            info!("Slot {} fully charged", slot);
                        }
                    }
                    _ = &mut shutdown_rx => {
                        debug!("Charging simulator received shutdown");
                        break;
                    }
                }
            }
        });

        SimulatorHandle {
            shutdown_tx: Some(shutdown_tx),
            task,
        }
    }
}

/// Owner handle for a running simulator task
pub struct SimulatorHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SimulatorHandle {
    /// Stop ticking and wait for the task to exit
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!("Charging simulator task failed: {}", e);
        }
        info!("Charging simulator stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}
