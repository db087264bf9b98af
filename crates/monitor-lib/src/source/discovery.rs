//! Serial port discovery from the kernel's tty class tree
//!
//! Every entry under `/sys/class/tty` with a backing `device` node is a
//! candidate. Ports whose product, manufacturer or interface text names a
//! known microcontroller bridge are preferred; otherwise the first port wins.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_SYSFS_TTY: &str = "/sys/class/tty";
pub const DEFAULT_DEV_ROOT: &str = "/dev";

/// Name fragments of common controller boards and USB-serial bridges
pub const CONTROLLER_KEYWORDS: [&str; 6] =
    ["ARDUINO", "CH340", "CH341", "USB SERIAL", "USB-SERIAL", "FTDI"];

/// Legacy UART driver that registers phantom ports on most PCs
const PHANTOM_DRIVER: &str = "serial8250";

/// A serial port found during discovery
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortInfo {
    pub name: String,
    pub device: PathBuf,
    /// Product, manufacturer and interface strings joined by spaces
    pub description: String,
    pub driver: Option<String>,
}

impl PortInfo {
    /// Whether the description or driver names a known controller
    pub fn is_controller(&self) -> bool {
        let haystack = format!(
            "{} {}",
            self.description,
            self.driver.as_deref().unwrap_or_default()
        )
        .to_uppercase();
        CONTROLLER_KEYWORDS.iter().any(|k| haystack.contains(k))
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// List serial ports under `sysfs_root`, mapping names into `dev_root`.
///
/// Unreadable trees yield an empty list.
pub fn list_ports(sysfs_root: &Path, dev_root: &Path) -> Vec<PortInfo> {
    let entries = match std::fs::read_dir(sysfs_root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(path = %sysfs_root.display(), error = %e, "Cannot read tty class tree");
            return Vec::new();
        }
    };

    let mut ports: Vec<PortInfo> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            let device = entry.path().join("device");
            if !device.exists() {
                return None;
            }

            let driver = std::fs::read_link(device.join("driver"))
                .ok()
                .and_then(|target| target.file_name().map(|n| n.to_string_lossy().into_owned()));
            if driver.as_deref() == Some(PHANTOM_DRIVER) {
                return None;
            }

            // USB strings live on the interface or on its parent device
            let description = [
                device.join("interface"),
                device.join("product"),
                device.join("manufacturer"),
                device.join("..").join("product"),
                device.join("..").join("manufacturer"),
            ]
            .iter()
            .filter_map(|p| read_trimmed(p))
            .collect::<Vec<_>>()
            .join(" ");

            Some(PortInfo {
                device: dev_root.join(&name),
                name,
                description,
                driver,
            })
        })
        .collect();

    ports.sort_by(|a, b| a.name.cmp(&b.name));
    ports
}

/// Prefer a known controller, else the first port
pub fn select_port(ports: &[PortInfo]) -> Option<&PortInfo> {
    ports.iter().find(|p| p.is_controller()).or_else(|| ports.first())
}

/// Scan and pick a port in one step
pub fn auto_detect_port(sysfs_root: &Path, dev_root: &Path) -> Option<PathBuf> {
    let ports = list_ports(sysfs_root, dev_root);
    match select_port(&ports) {
        Some(port) if port.is_controller() => {
            info!(port = %port.device.display(), description = %port.description, "Auto-detected controller");
            Some(port.device.clone())
        }
        Some(port) => {
            warn!(port = %port.device.display(), "No known controller found, using first available port");
            Some(port.device.clone())
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn add_port(root: &Path, name: &str, files: &[(&str, &str)]) {
        let device = root.join("tty").join(name).join("device");
        std::fs::create_dir_all(&device).unwrap();
        for (file, content) in files {
            let path = root.join("tty").join(name).join(file);
            std::fs::write(path, content).unwrap();
        }
    }

    #[cfg(unix)]
    fn link_driver(root: &Path, name: &str, driver: &str) {
        let target = root.join("drivers").join(driver);
        std::fs::create_dir_all(&target).unwrap();
        std::os::unix::fs::symlink(&target, root.join("tty").join(name).join("device/driver")).unwrap();
    }

    #[test]
    fn test_prefers_controller() {
        let dir = TempDir::new().unwrap();
        add_port(dir.path(), "ttyACM0", &[("device/interface", "CDC Abstract Control Model")]);
        add_port(dir.path(), "ttyUSB0", &[("product", "USB2.0-Serial"), ("manufacturer", "QinHeng CH340")]);
        // Virtual console: no device node
        std::fs::create_dir_all(dir.path().join("tty/tty0")).unwrap();

        let ports = list_ports(&dir.path().join("tty"), Path::new("/dev"));
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[0].name, "ttyACM0");

        let chosen = select_port(&ports).unwrap();
        assert_eq!(chosen.device, PathBuf::from("/dev/ttyUSB0"));
        assert!(chosen.description.contains("CH340"));
    }

    #[test]
    fn test_falls_back_to_first() {
        let dir = TempDir::new().unwrap();
        add_port(dir.path(), "ttyS5", &[]);
        add_port(dir.path(), "ttyS4", &[("device/interface", "Modem")]);

        let found = auto_detect_port(&dir.path().join("tty"), Path::new("/dev"));
        assert_eq!(found, Some(PathBuf::from("/dev/ttyS4")));
    }

    #[test]
    fn test_missing_tree() {
        let dir = TempDir::new().unwrap();
        assert!(list_ports(&dir.path().join("nope"), Path::new("/dev")).is_empty());
        assert_eq!(auto_detect_port(&dir.path().join("nope"), Path::new("/dev")), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_driver_name_and_phantom_ports() {
        let dir = TempDir::new().unwrap();
        add_port(dir.path(), "ttyS0", &[]);
        link_driver(dir.path(), "ttyS0", "serial8250");
        add_port(dir.path(), "ttyUSB1", &[]);
        link_driver(dir.path(), "ttyUSB1", "ftdi_sio");

        let ports = list_ports(&dir.path().join("tty"), Path::new("/dev"));
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].driver.as_deref(), Some("ftdi_sio"));
        assert!(ports[0].is_controller());
    }
}
