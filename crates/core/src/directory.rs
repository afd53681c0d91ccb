//! Device directory: HID enumeration and interface lookup by usage.
//!
//! The headset exposes several HID interfaces under one VID/PID. The lighting
//! and event interfaces are told apart only by their (usage page, usage) pair.

use crate::error::{Error, Result};
use crate::transport::{HidTransport, HidapiTransport, ReadMode};
use crate::VENDOR_USAGE_PAGE;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Snapshot of one HID interface, produced fresh by every enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Platform path used to open the interface.
    pub path: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub usage_page: u16,
    pub usage: u16,
    /// Empty when the device does not report one.
    pub manufacturer: String,
    /// Empty when the device does not report one.
    pub product: String,
}

impl DeviceDescriptor {
    fn from_info(info: &hidapi::DeviceInfo) -> Self {
        Self {
            path: info.path().to_string_lossy().into_owned(),
            vendor_id: info.vendor_id(),
            product_id: info.product_id(),
            usage_page: info.usage_page(),
            usage: info.usage(),
            manufacturer: info.manufacturer_string().unwrap_or_default().to_string(),
            product: info.product_string().unwrap_or_default().to_string(),
        }
    }

    /// Whether the vendor/product pair passes the filters. Zero is a wildcard.
    pub fn matches_ids(&self, vendor_id: u16, product_id: u16) -> bool {
        (vendor_id == 0 || self.vendor_id == vendor_id)
            && (product_id == 0 || self.product_id == product_id)
    }

    /// Human-readable "Manufacturer - Product" label.
    pub fn display_name(&self) -> String {
        match (self.manufacturer.is_empty(), self.product.is_empty()) {
            (true, true) => format!("{:04X}:{:04X}", self.vendor_id, self.product_id),
            (false, true) => self.manufacturer.clone(),
            (true, false) => self.product.clone(),
            (false, false) => format!("{} - {}", self.manufacturer, self.product),
        }
    }
}

/// Enumerate HID interfaces, optionally filtered by vendor and product.
///
/// A zero filter matches everything. If the HID subsystem cannot be
/// initialized the result is empty; enumeration never fails the caller.
pub fn enumerate(vendor_id: u16, product_id: u16) -> Vec<DeviceDescriptor> {
    debug!(
        vid = format_args!("0x{:04X}", vendor_id),
        pid = format_args!("0x{:04X}", product_id),
        "Starting HID device enumeration"
    );
    let api = match hidapi::HidApi::new() {
        Ok(api) => api,
        Err(e) => {
            warn!("HID enumeration unavailable: {e}");
            return Vec::new();
        }
    };

    let all: Vec<DeviceDescriptor> = api
        .device_list()
        .map(DeviceDescriptor::from_info)
        .collect();
    let devices = filter_by_ids(all, vendor_id, product_id);

    debug!(count = devices.len(), "Device enumeration complete");
    devices
}

/// Keep only descriptors matching the vendor/product filters.
pub fn filter_by_ids(
    devices: Vec<DeviceDescriptor>,
    vendor_id: u16,
    product_id: u16,
) -> Vec<DeviceDescriptor> {
    devices
        .into_iter()
        .filter(|d| d.matches_ids(vendor_id, product_id))
        .collect()
}

/// First descriptor with exactly this (usage page, usage) pair.
pub fn select_by_usage(
    devices: &[DeviceDescriptor],
    usage_page: u16,
    usage: u16,
) -> Option<DeviceDescriptor> {
    devices
        .iter()
        .find(|d| d.usage_page == usage_page && d.usage == usage)
        .cloned()
}

/// Locate the interface of a device by its (usage page, usage) pair.
///
/// Enumeration order is platform-defined; only the returned path is
/// meaningful, and only until the device is reconnected.
pub fn find_by_usage(
    vendor_id: u16,
    product_id: u16,
    usage_page: u16,
    usage: u16,
) -> Option<DeviceDescriptor> {
    select_by_usage(&enumerate(vendor_id, product_id), usage_page, usage)
}

/// Like [`find_by_usage`], but reports a missing interface as an error.
pub fn require_by_usage(
    vendor_id: u16,
    product_id: u16,
    usage_page: u16,
    usage: u16,
    label: &str,
) -> Result<DeviceDescriptor> {
    find_by_usage(vendor_id, product_id, usage_page, usage).ok_or_else(|| {
        Error::DeviceNotFound(format!(
            "{label} interface (VID=0x{vendor_id:04X} PID=0x{product_id:04X} \
             usage page=0x{usage_page:04X} usage=0x{usage:04X})"
        ))
    })
}

/// An open interface together with the descriptor it was found under.
pub struct OpenedInterface {
    pub transport: Arc<dyn HidTransport>,
    pub descriptor: DeviceDescriptor,
}

/// Locates and opens one vendor interface of a device.
///
/// Channels connect through this seam so tests can substitute scripted
/// interfaces for real hardware.
pub trait InterfaceOpener {
    fn open(
        &self,
        vendor_id: u16,
        product_id: u16,
        usage: u16,
        label: &'static str,
        mode: ReadMode,
    ) -> Result<OpenedInterface>;
}

/// Opens interfaces through hidapi enumeration.
#[derive(Debug, Clone, Copy, Default)]
pub struct HidapiOpener;

impl InterfaceOpener for HidapiOpener {
    fn open(
        &self,
        vendor_id: u16,
        product_id: u16,
        usage: u16,
        label: &'static str,
        mode: ReadMode,
    ) -> Result<OpenedInterface> {
        let descriptor =
            require_by_usage(vendor_id, product_id, VENDOR_USAGE_PAGE, usage, label)?;
        info!(
            interface = label,
            device = %descriptor.display_name(),
            usage_page = format_args!("0x{:04X}", descriptor.usage_page),
            usage = format_args!("0x{:04X}", descriptor.usage),
            "Interface found"
        );
        let transport = HidapiTransport::open(&descriptor.path, mode)?;
        Ok(OpenedInterface {
            transport: Arc::new(transport),
            descriptor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{pids, CORSAIR_VID, EVENT_USAGE, LIGHTING_USAGE};

    fn descriptor(pid: u16, usage_page: u16, usage: u16, path: &str) -> DeviceDescriptor {
        DeviceDescriptor {
            path: path.to_string(),
            vendor_id: CORSAIR_VID,
            product_id: pid,
            usage_page,
            usage,
            manufacturer: "Corsair".into(),
            product: "CORSAIR HS80 RGB Wireless Gaming Receiver".into(),
        }
    }

    fn sample() -> Vec<DeviceDescriptor> {
        vec![
            descriptor(pids::HS80_WIRELESS, 0x000C, 0x0001, "/dev/hidraw0"),
            descriptor(pids::HS80_WIRELESS, VENDOR_USAGE_PAGE, LIGHTING_USAGE, "/dev/hidraw1"),
            descriptor(pids::HS80_WIRELESS, VENDOR_USAGE_PAGE, EVENT_USAGE, "/dev/hidraw2"),
            DeviceDescriptor {
                vendor_id: 0x046D,
                ..descriptor(0xC08D, VENDOR_USAGE_PAGE, LIGHTING_USAGE, "/dev/hidraw3")
            },
        ]
    }

    #[test]
    fn zero_filters_are_wildcards() {
        assert_eq!(filter_by_ids(sample(), 0, 0).len(), 4);
        assert_eq!(filter_by_ids(sample(), CORSAIR_VID, 0).len(), 3);
        assert_eq!(filter_by_ids(sample(), 0, 0xC08D).len(), 1);
    }

    #[test]
    fn selects_lighting_and_event_interfaces_by_usage() {
        let devices = filter_by_ids(sample(), CORSAIR_VID, pids::HS80_WIRELESS);
        let lighting = select_by_usage(&devices, VENDOR_USAGE_PAGE, LIGHTING_USAGE).unwrap();
        let events = select_by_usage(&devices, VENDOR_USAGE_PAGE, EVENT_USAGE).unwrap();
        assert_eq!(lighting.path, "/dev/hidraw1");
        assert_eq!(events.path, "/dev/hidraw2");
    }

    #[test]
    fn select_returns_first_match() {
        let mut devices = sample();
        devices.insert(
            0,
            descriptor(pids::HS80_WIRELESS, VENDOR_USAGE_PAGE, EVENT_USAGE, "/dev/hidraw9"),
        );
        let found = select_by_usage(&devices, VENDOR_USAGE_PAGE, EVENT_USAGE).unwrap();
        assert_eq!(found.path, "/dev/hidraw9");
    }

    #[test]
    fn select_missing_usage_is_none() {
        assert!(select_by_usage(&sample(), VENDOR_USAGE_PAGE, 0x0042).is_none());
    }

    #[test]
    fn display_name_tolerates_missing_strings() {
        let mut d = descriptor(pids::HS80_WIRELESS, 0, 0, "p");
        d.manufacturer.clear();
        d.product.clear();
        assert_eq!(d.display_name(), "1B1C:0A6B");
        d.product = "HS80".into();
        assert_eq!(d.display_name(), "HS80");
    }
}
