//! KLVR Emulator - CLI for the charger emulator
//!
//! Serves the charger's local API so apps can be developed without hardware.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (port 8000, or the next free one)
//! klvr-emulator
//!
//! # Named device with a web UI and fast charging
//! klvr-emulator --name "Bench charger" --static-dir ./web --tick-ms 100
//!
//! # Predecessor behaviour: info refuses while rebooting
//! klvr-emulator --strict-info --no-mdns
//! ```
//!
//! # Demo Scenario
//!
//! 1. POST `/api/v2/charger/bulk_insert` to fill the bays
//! 2. Upload images to `/device/firmware_charger?version=2.0.0` and `/device/firmware_rear`
//! 3. POST `main`, then `rear` to `/device/reboot`
//! 4. `/device/info` reports the new version once both boards are back

use std::time::Duration;

use clap::Parser;
use klvr_api::{Emulator, EmulatorConfig};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// KLVR charger emulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Device name reported by the info query
    #[arg(short, long, default_value = "Laddare #1")]
    name: String,

    /// First HTTP port to try
    #[arg(short, long, default_value = "8000")]
    port: u16,

    /// Consecutive ports to try when the first is taken
    #[arg(long, default_value = "50")]
    port_attempts: u16,

    /// Bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Firmware version at start-up
    #[arg(long, default_value = "0.1.0")]
    firmware_version: String,

    /// Model advertised over mDNS
    #[arg(long, default_value = "emulator")]
    model: String,

    /// Reported IP address (detected when omitted)
    #[arg(long)]
    ip: Option<String>,

    /// Wall-clock milliseconds per charging tick (each tick is 2 simulated seconds)
    #[arg(long, default_value = "2000")]
    tick_ms: u64,

    /// Board reboot duration in milliseconds
    #[arg(long, default_value = "2000")]
    reboot_delay_ms: u64,

    /// Simulated firmware transfer time in milliseconds
    #[arg(long, default_value = "1000")]
    upload_latency_ms: u64,

    /// Answer info queries with 503 while a board reboots
    #[arg(long)]
    strict_info: bool,

    /// Directory with a web UI to serve for non-API paths
    #[arg(long)]
    static_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Disable mDNS announcement
    #[arg(long)]
    no_mdns: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Setup logging
    let level = match args.log_level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => args.log_level.as_str(),
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Print banner
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║              KLVR Emulator - Battery Charger Pro             ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Name:     {:<50} ║", truncate(&args.name, 50));
    println!("║  Firmware: {:<50} ║", truncate(&args.firmware_version, 50));
    println!("║  Listen:   {:<50} ║", format!("{}:{}", args.host, args.port));
    println!("║  Tick:     {:<50} ║", format!("{} ms", args.tick_ms));
    println!("║  mDNS:     {:<50} ║", if args.no_mdns { "off" } else { "on" });
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    // Build configuration
    let mut config = EmulatorConfig::new(&args.name, args.port)
        .with_model(&args.model)
        .with_firmware(&args.firmware_version)
        .with_host(&args.host)
        .with_port_attempts(args.port_attempts)
        .with_tick_interval(Duration::from_millis(args.tick_ms.max(1)))
        .with_firmware_timing(
            Duration::from_millis(args.reboot_delay_ms),
            Duration::from_millis(args.upload_latency_ms),
        );

    if let Some(ip) = &args.ip {
        config = config.with_ip(ip);
    }
    if let Some(dir) = &args.static_dir {
        config = config.with_static_dir(dir);
        info!("Serving web UI from {}", dir);
    }
    if args.strict_info {
        config = config.with_strict_info();
    }
    if args.no_mdns {
        config = config.without_mdns();
    }

    info!("Starting KLVR emulator...");

    // Create and run emulator
    let emulator = Emulator::new(config);
    emulator.run().await?;

    Ok(())
}

/// Truncate string with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
