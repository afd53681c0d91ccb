//! HS80 lighting protocol: fixed 64-byte output reports.
//!
//! Every packet shares the header `[0x02, mode, command, ...]`, zero-padded
//! to 64 bytes. No extra report-ID prefix is sent; 0x02 is the first byte on
//! the wire.
//!
//! | Command                 | id   | payload                         |
//! |-------------------------|------|---------------------------------|
//! | Enter software mode     | 0x01 | 0x03, 0x00, 0x02                |
//! | Open lighting endpoint  | 0x0D | 0x00, 0x01                      |
//! | Set brightness          | 0x01 | 0x02, 0x00, raw LE16 (0..=1000) |
//! | Set zone colors         | 0x06 | 0x00, 0x09, 0, 0, 0, R*3 G*3 B*3|
//! | Restore hardware mode   | 0x01 | 0x03, 0x00, 0x01                |

use crate::color::ZoneSet;
use crate::pids;

/// Every lighting packet is exactly this long.
pub const PACKET_LEN: usize = 64;
/// First byte of every lighting packet.
pub const REPORT_MARKER: u8 = 0x02;
/// Largest inbound event report, including a possible report-ID byte.
pub const EVENT_REPORT_LEN: usize = 65;

/// Command identifiers (byte 2).
pub mod cmd {
    pub const MODE: u8 = 0x01;
    pub const OPEN_ENDPOINT: u8 = 0x0D;
    pub const ZONE_COLORS: u8 = 0x06;
}

/// Sub-commands of [`cmd::MODE`] (byte 3).
pub mod sub {
    pub const BRIGHTNESS: u8 = 0x02;
    pub const LIGHTING_MODE: u8 = 0x03;
}

/// Offset of the first color byte in a zone-colors packet.
pub const ZONE_DATA_OFFSET: usize = 8;
/// Number of color bytes in a zone-colors packet.
pub const ZONE_DATA_LEN: usize = 9;

/// Framing selector in byte 1: wireless receiver or USB cable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMode {
    Wireless,
    Wired,
}

impl DeviceMode {
    /// Framing for a product ID. Only the wireless receiver has a known PID;
    /// anything else is driven with wired framing.
    pub fn for_product(product_id: u16) -> Self {
        if product_id == pids::HS80_WIRELESS {
            Self::Wireless
        } else {
            Self::Wired
        }
    }

    pub fn byte(&self) -> u8 {
        match self {
            Self::Wireless => 0x09,
            Self::Wired => 0x08,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Wireless => "wireless",
            Self::Wired => "wired",
        }
    }
}

/// LED brightness on the device's raw 0..=1000 scale.
///
/// Out-of-range inputs are clamped, never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Brightness(u16);

impl Brightness {
    pub const RAW_MAX: u16 = 1000;
    pub const MAX: Brightness = Brightness(Self::RAW_MAX);

    /// From a raw value, clamped to 0..=1000.
    pub fn from_raw(raw: i32) -> Self {
        Self(raw.clamp(0, i32::from(Self::RAW_MAX)) as u16)
    }

    /// From a percentage, clamped to 0..=100.
    pub fn from_percent(percent: i32) -> Self {
        let percent = percent.clamp(0, 100);
        Self::from_raw(percent * i32::from(Self::RAW_MAX) / 100)
    }

    pub fn raw(&self) -> u16 {
        self.0
    }

    /// Percentage view, truncating.
    pub fn percent(&self) -> u8 {
        (u32::from(self.0) * 100 / u32::from(Self::RAW_MAX)) as u8
    }
}

impl Default for Brightness {
    fn default() -> Self {
        Self::MAX
    }
}

fn packet(mode: DeviceMode, command: u8, payload: &[u8]) -> [u8; PACKET_LEN] {
    let mut buf = [0u8; PACKET_LEN];
    buf[0] = REPORT_MARKER;
    buf[1] = mode.byte();
    buf[2] = command;
    buf[3..3 + payload.len()].copy_from_slice(payload);
    buf
}

/// Stop firmware effects; the host drives the LEDs.
pub fn software_mode(mode: DeviceMode) -> [u8; PACKET_LEN] {
    packet(mode, cmd::MODE, &[sub::LIGHTING_MODE, 0x00, 0x02])
}

/// Must follow [`software_mode`] before color or brightness writes are accepted.
pub fn open_lighting_endpoint(mode: DeviceMode) -> [u8; PACKET_LEN] {
    packet(mode, cmd::OPEN_ENDPOINT, &[0x00, 0x01])
}

/// Hand the LEDs back to firmware effects.
pub fn hardware_mode(mode: DeviceMode) -> [u8; PACKET_LEN] {
    packet(mode, cmd::MODE, &[sub::LIGHTING_MODE, 0x00, 0x01])
}

/// Scale all zones uniformly.
pub fn brightness(mode: DeviceMode, level: Brightness) -> [u8; PACKET_LEN] {
    let [lo, hi] = level.raw().to_le_bytes();
    packet(mode, cmd::MODE, &[sub::BRIGHTNESS, 0x00, lo, hi])
}

/// Set all three zones at once.
///
/// Color bytes are grouped by channel, not by zone: R of logo/power/mic,
/// then G of each, then B of each.
pub fn zone_colors(mode: DeviceMode, zones: &ZoneSet) -> [u8; PACKET_LEN] {
    let mut buf = packet(mode, cmd::ZONE_COLORS, &[0x00, ZONE_DATA_LEN as u8]);
    let ordered = zones.in_wire_order();
    for (i, color) in ordered.iter().enumerate() {
        buf[ZONE_DATA_OFFSET + i] = color.r;
        buf[ZONE_DATA_OFFSET + 3 + i] = color.g;
        buf[ZONE_DATA_OFFSET + 6 + i] = color.b;
    }
    buf
}
