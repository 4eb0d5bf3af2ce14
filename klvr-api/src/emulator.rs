//! Emulator lifecycle
//!
//! Owns the device model, the charging simulator, the mDNS announcement and
//! the HTTP server, and tears them down in reverse order on shutdown.

use std::future::Future;
use std::io;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::sync::Arc;

use axum::Router;
use klvr_core::{Announcer, ChargingSimulator, Device, DiscoveryRecord, Firmware, SlotRegistry};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::EmulatorConfig;
use crate::handlers::AppState;
use crate::router::create_router;

#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("no free port in {host}:{first}..={last}")]
    NoFreePort { host: String, first: u16, last: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Bind the first free port starting at `port`, trying `attempts` ports in order
pub async fn bind_listener(host: &str, port: u16, attempts: u16) -> Result<TcpListener, EmulatorError> {
    let last = port.saturating_add(attempts.max(1) - 1);
    for candidate in port..=last {
        match TcpListener::bind((host, candidate)).await {
            Ok(listener) => return Ok(listener),
            Err(e) => debug!("Port {} unavailable: {}", candidate, e),
        }
    }
    Err(EmulatorError::NoFreePort {
        host: host.to_string(),
        first: port,
        last,
    })
}

/// Whether the listener landed on another port than the one asked for
///
/// Port 0 asks the OS for any free port, so it never counts as a fallback.
fn fell_back(requested: u16, bound: u16) -> bool {
    requested != 0 && requested != bound
}

/// Address of the interface that routes to the internet, or loopback
///
/// Connecting a UDP socket sends nothing; it only selects a route.
pub fn local_ip() -> IpAddr {
    let probe = || -> io::Result<IpAddr> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect("8.8.8.8:80")?;
        Ok(socket.local_addr()?.ip())
    };
    probe().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// The emulated charger
pub struct Emulator {
    config: EmulatorConfig,
    device: Device,
    state: AppState,
}

impl Emulator {
    /// Build the device model from configuration
    pub fn new(mut config: EmulatorConfig) -> Self {
        if config.device.detect_ip {
            config.device.network.ip_address = local_ip().to_string();
        }

        let slots = Arc::new(SlotRegistry::new(config.device.bay_temperature_c));
        let firmware = Firmware::new(
            config.device.firmware_version.clone(),
            config.simulation.firmware_timing(),
        );
        let device = Device::new(config.device.identity(), slots, firmware);
        let state = AppState::new(device.clone())
            .with_strict_info(config.simulation.reject_info_while_rebooting);

        Self {
            config,
            device,
            state,
        }
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// HTTP router over this emulator's device
    pub fn router(&self) -> Router {
        create_router(self.state.clone(), self.config.server.static_dir.as_deref())
    }

    /// Run until Ctrl-C
    pub async fn run(self) -> Result<(), EmulatorError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Shutdown requested");
        })
        .await
    }

    /// Run until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), EmulatorError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let server = &self.config.server;
        let listener = bind_listener(&server.host, server.port, server.port_attempts).await?;
        let local_addr = listener.local_addr()?;
        if fell_back(server.port, local_addr.port()) {
            warn!("Port {} in use, bound {} instead", server.port, local_addr.port());
        }
        info!(
            "Emulating \"{}\" (firmware {}) on http://{}",
            self.config.device.name,
            self.device.firmware().current_version(),
            local_addr
        );

        let simulator = ChargingSimulator::new(self.device.slots().clone())
            .with_period(self.config.simulation.tick_interval)
            .spawn();

        let announcer = if server.use_mdns {
            self.announce(local_addr.port())
        } else {
            None
        };

        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await;

        simulator.stop().await;
        self.device.firmware().wait_for_reboots().await;
        if let Some(announcer) = announcer {
            if let Err(e) = announcer.shutdown() {
                warn!("mDNS shutdown failed: {}", e);
            }
        }
        info!("Emulator stopped");

        served.map_err(EmulatorError::from)
    }

    /// Publish over mDNS; failure leaves the emulator running undiscoverable
    fn announce(&self, port: u16) -> Option<Announcer> {
        let addr = self
            .config
            .device
            .network
            .ip_address
            .parse()
            .unwrap_or_else(|_| local_ip());
        let record = DiscoveryRecord {
            name: self.config.device.name.clone(),
            model: self.config.device.model.clone(),
            version: self.device.firmware().current_version(),
            addr,
            port,
        };

        let result = Announcer::new().and_then(|mut announcer| {
            announcer.announce(&record)?;
            Ok(announcer)
        });
        match result {
            Ok(announcer) => Some(announcer),
            Err(e) => {
                warn!("mDNS announcement failed, continuing without discovery: {}", e);
                None
            }
        }
    }
}
