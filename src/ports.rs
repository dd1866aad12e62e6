use std::fs;

use tracing::debug;

/// Device name prefixes that look like serial lines on this host.
const DEVICE_PREFIXES: &[&str] = &["ttyS", "ttyUSB", "ttyACM", "ttyV"];

/// List candidate serial device paths for the wizard.
///
/// The platform enumerator misses virtual null-modem devices (ttyV*), so a
/// /dev scan backs it up. Sorted and deduplicated.
pub fn discover_ports() -> Vec<String> {
    let mut found: Vec<String> = match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            debug!("port enumeration failed: {e}");
            Vec::new()
        }
    };

    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if DEVICE_PREFIXES.iter().any(|p| name.starts_with(p)) {
                found.push(format!("/dev/{name}"));
            }
        }
    }

    found.sort();
    found.dedup();
    found
}
