//! # KLVR Charger API
//!
//! HTTP surface of the KLVR charger emulator.
//!
//! Serves the charger's local REST API over the device model in `klvr-core`,
//! so client applications can be developed against a charger that never
//! leaves the desk.
//!
//! ## Architecture
//!
//! ```text
//! Client app / web UI
//!       │ HTTP JSON
//!       ▼
//! ┌─────────────────────────────────┐
//! │    klvr-api                     │
//! │  ┌───────────┐  ┌────────────┐  │
//! │  │ Router    │─►│ Handlers   │  │
//! │  │ CORS      │  │ parse/shape│  │
//! │  └───────────┘  └────────────┘  │
//! └─────────────┬───────────────────┘
//!               │ method calls
//!               ▼
//! ┌─────────────────────────────────┐
//! │    klvr-core-rs                 │
//! │  Slots │ Simulator │ Firmware   │
//! └─────────────────────────────────┘
//! ```
//!
//! ## Routes
//!
//! All routes live under `/api/v2`.
//!
//! | Method | Path | Effect |
//! |--------|------|--------|
//! | GET  | `/charger/status` | All 48 bays |
//! | POST | `/charger/insert/{slot}?type=AA` | Insert a battery at 5% |
//! | POST | `/charger/eject/{slot}` | Empty a bay |
//! | POST | `/charger/bulk_insert` | Randomly fill 37 bays |
//! | GET  | `/device/info` | Identity, version, reboot status |
//! | POST | `/device/firmware_charger` | Upload main board image |
//! | POST | `/device/firmware_rear` | Upload rear board image |
//! | POST | `/device/reboot` | Body `main` or `rear` |
//! | POST | `/debug/set_charge/{slot}` | `{"percentage": n}` |
//! | GET  | `/debug/firmware_state` | Update session snapshot |
//! | POST | `/debug/set_firmware_version` | `{"version": "x"}` |
//! | POST | `/debug/set_target_version` | `{"version": "x"}` |
//!
//! ## Usage
//!
//! ```no_run
//! use klvr_api::{Emulator, EmulatorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EmulatorConfig::new("Laddare #1", 8000);
//!
//!     let emulator = Emulator::new(config);
//!     emulator.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod emulator;

pub use config::{DeviceConfig, EmulatorConfig, ServerConfig, SimulationConfig};
pub use error::ApiError;
pub use handlers::{AppState, FIRMWARE_VERSION_HEADER};
pub use router::{create_router, API_PREFIX};
pub use emulator::{bind_listener, local_ip, Emulator, EmulatorError};
