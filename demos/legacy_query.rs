//! Legacy Board Query Example
//!
//! Talks to an ASCII-protocol (legacy family) station board:
//! - Queries the active report ({0@CQ,0,0,0000})
//! - Optionally unlocks a slot ({0@FB,0,<nonce>,<slot>,0000})
//!
//! Usage:
//!   cargo run --example legacy_query -- /dev/ttyUSB0
//!   cargo run --example legacy_query -- /dev/ttyUSB0 3   # also unlock slot 3

use station_protocol::{LegacyStation, Result};

fn main() -> Result<()> {
    env_logger::init();

    let port = std::env::args().nth(1).unwrap_or_else(|| {
        eprintln!("usage: legacy_query <port> [slot-to-unlock]");
        std::process::exit(1);
    });

    let mut station = LegacyStation::open(&port)?;

    let report = station.query()?;
    println!("{}", serde_json::to_string_pretty(&report).unwrap());

    for slot in &report.slots {
        let flags = slot.flags();
        println!(
            "slot {}: available={} charging={} outputting={}",
            slot.slot_number, flags.available, flags.charging, flags.outputting
        );
    }

    if let Some(slot) = std::env::args().nth(2) {
        let slot: u8 = slot.parse().map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "slot must be 0-5")
        })?;
        station.unlock(slot)?;
        println!("unlock command sent for slot {slot}");
    }

    station.disconnect();
    Ok(())
}
