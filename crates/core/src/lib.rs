//! hs80-core: device discovery, lighting protocol, and event monitoring.
//!
//! This crate drives the Corsair HS80 RGB Wireless headset over its two
//! vendor HID interfaces: a lighting interface that accepts fixed 64-byte
//! commands, and an event interface that reports battery, charging, and
//! mute changes.

pub mod color;
pub mod config;
pub mod directory;
pub mod error;
pub mod event;
pub mod lighting;
pub mod monitor;
pub mod protocol;
pub mod session;
mod task;
pub mod transport;

/// Corsair USB Vendor ID.
pub const CORSAIR_VID: u16 = 0x1B1C;

/// Known HS80 product IDs.
pub mod pids {
    /// HS80 RGB Wireless (USB receiver).
    pub const HS80_WIRELESS: u16 = 0x0A6B;
}

/// Vendor usage page shared by the lighting and event interfaces.
pub const VENDOR_USAGE_PAGE: u16 = 0xFF42;
/// Usage of the lighting interface.
pub const LIGHTING_USAGE: u16 = 0x0001;
/// Usage of the event interface.
pub const EVENT_USAGE: u16 = 0x0002;
