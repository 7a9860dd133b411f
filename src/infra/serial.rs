//! Serial port enumeration
//!
//! Thin wrapper over `serialport` so port selection can be exercised
//! without hardware.

use serialport::SerialPortType;

use crate::error::FlashError;

/// A serial port as presented to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Device name (`/dev/cu.usbmodem0001`, `COM3`)
    pub name: String,
    /// USB vendor id, if known
    pub vid: Option<u16>,
    /// USB product id, if known
    pub pid: Option<u16>,
    /// USB serial number, if known
    pub serial_number: Option<String>,
    /// USB product string, if known
    pub product: Option<String>,
}

impl PortInfo {
    /// Port without USB metadata
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            vid: None,
            pid: None,
            serial_number: None,
            product: None,
        }
    }

    /// One-line description used in selection lists
    pub fn describe(&self) -> String {
        match (self.vid, self.pid) {
            (Some(vid), Some(pid)) => format!(
                "{} (VID:{vid:04x} PID:{pid:04x} Serial:{})",
                self.name,
                self.serial_number.as_deref().unwrap_or("-")
            ),
            _ => self.name.clone(),
        }
    }
}

/// Source of the port list
pub trait PortLister {
    /// List ports currently present
    fn list(&self) -> Result<Vec<PortInfo>, FlashError>;
}

/// Ports reported by the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPorts;

impl PortLister for SystemPorts {
    fn list(&self) -> Result<Vec<PortInfo>, FlashError> {
        let ports = serialport::available_ports().map_err(|e| FlashError::PortEnumeration {
            error: e.to_string(),
        })?;

        Ok(ports
            .into_iter()
            .map(|p| match p.port_type {
                SerialPortType::UsbPort(usb) => PortInfo {
                    name: p.port_name,
                    vid: Some(usb.vid),
                    pid: Some(usb.pid),
                    serial_number: usb.serial_number,
                    product: usb.product,
                },
                _ => PortInfo::named(&p.port_name),
            })
            .collect())
    }
}

/// A fixed port list
#[derive(Debug, Default, Clone)]
pub struct StaticPorts(pub Vec<PortInfo>);

impl PortLister for StaticPorts {
    fn list(&self) -> Result<Vec<PortInfo>, FlashError> {
        Ok(self.0.clone())
    }
}
