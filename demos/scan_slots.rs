//! Full Station Scan Example
//!
//! This example demonstrates the binary-protocol workflow:
//! - Listing and selecting serial ports
//! - Querying board model and firmware version
//! - Scanning every board and slot, with charging selection
//!
//! Usage:
//!   cargo run --example scan_slots                  # Interactive mode
//!   cargo run --example scan_slots -- /dev/ttyUSB0  # Specify port
//!
//! Set RUST_LOG environment variable to control logging:
//!   RUST_LOG=debug cargo run --example scan_slots

use inquire::Select;
use log::info;
use station_protocol::{constants::MAXIMUM_BOARD_ADDRESS, Result, Station};

/// Interactive serial port selection using inquire
fn select_port() -> Result<String> {
    let ports = Station::list_ports()?;

    if ports.is_empty() {
        eprintln!("No serial ports found!");
        std::process::exit(1);
    }

    let port_names: Vec<String> = ports
        .iter()
        .map(|p| format!("{} - {:?}", p.port_name, p.port_type))
        .collect();

    let selection = Select::new("Select a serial port:", port_names)
        .prompt()
        .map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Selection cancelled: {}", e),
            )
        })?;

    // Extract just the port name (before " - ")
    let port_name = selection.split(" - ").next().unwrap().to_string();
    Ok(port_name)
}

fn main() -> Result<()> {
    env_logger::init();

    let port = match std::env::args().nth(1) {
        Some(p) => p,
        None => select_port()?,
    };

    info!("opening {port}");
    let mut station = Station::open(&port)?;

    let model = station.model(0)?;
    if let Some(info) = &model.payload {
        println!("Model: {} ({} boards)", info.model, info.board_count);
    }

    let fw = station.firmware_version(0)?;
    if let Some(version) = &fw.payload {
        println!("Firmware: {version}");
    }

    let report = station.scan(MAXIMUM_BOARD_ADDRESS)?;
    println!("{}", serde_json::to_string_pretty(&report).unwrap());

    station.disconnect();
    Ok(())
}
