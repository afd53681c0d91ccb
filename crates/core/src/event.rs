//! Unsolicited headset notifications read from the event interface.
//!
//! Structured events start with `[0x03, 0x01, 0x01, code]`; byte 5 (and 6
//! for battery) carry the value:
//!
//! ```text
//! 03 01 01 A6 00 01        mute: byte 5 = 0x01 muted, 0x00 unmuted
//! 03 01 01 0F 00 B2 02     battery: bytes 5..=6 LE16 raw 0..=1000 (0x02B2 = 69%)
//! 03 01 01 10 00 01        charging: byte 5 = 0x01 charging
//! ```
//!
//! Anything else, such as the two-byte volume report, is passed through as
//! an unstructured event.

use std::fmt;

/// Maximum payload kept from one read.
pub const MAX_EVENT_LEN: usize = 64;

/// Prefix shared by all structured events.
pub const EVENT_HEADER: [u8; 3] = [0x03, 0x01, 0x01];

/// Event codes (byte 3).
pub mod code {
    pub const MUTE: u8 = 0xA6;
    pub const BATTERY: u8 = 0x0F;
    pub const CHARGING: u8 = 0x10;
}

const HEADER_LEN: usize = 4;
const VALUE_OFFSET: usize = 5;

/// Microphone mute state as reported by the headset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuteState {
    Muted,
    Unmuted,
    /// A value byte outside {0x00, 0x01}.
    Unknown(u8),
}

/// Decoded meaning of an event report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Mute(MuteState),
    /// Raw battery level on the 0..=1000 scale.
    Battery { raw: u16 },
    Charging(bool),
    /// Structured header with an unrecognized event code.
    Unknown(u8),
    /// Structured header and known code, but too short to carry the value.
    Truncated(u8),
    /// Not a structured event (e.g. a volume report).
    Unstructured,
}

/// One report read from the event interface.
///
/// Values are decoded lazily; every accessor checks the header and length
/// first and returns `None` when the report is not of the asked-for kind.
#[derive(Clone, PartialEq, Eq)]
pub struct HeadsetEvent {
    data: [u8; MAX_EVENT_LEN],
    len: usize,
}

impl HeadsetEvent {
    /// Capture a report. Bytes past [`MAX_EVENT_LEN`] are dropped.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let len = bytes.len().min(MAX_EVENT_LEN);
        let mut data = [0u8; MAX_EVENT_LEN];
        data[..len].copy_from_slice(&bytes[..len]);
        Self { data, len }
    }

    /// Captured bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Event code if the report carries the structured header.
    pub fn code(&self) -> Option<u8> {
        let bytes = self.bytes();
        if bytes.len() >= HEADER_LEN && bytes[..3] == EVENT_HEADER {
            Some(bytes[3])
        } else {
            None
        }
    }

    pub fn is_structured(&self) -> bool {
        self.code().is_some()
    }

    /// Payload bytes from the value offset, if the report has `code`.
    fn value_bytes(&self, expected: u8, needed: usize) -> Option<&[u8]> {
        if self.code()? != expected {
            return None;
        }
        self.bytes().get(VALUE_OFFSET..VALUE_OFFSET + needed)
    }

    pub fn mute_state(&self) -> Option<MuteState> {
        let value = self.value_bytes(code::MUTE, 1)?;
        Some(match value[0] {
            0x00 => MuteState::Unmuted,
            0x01 => MuteState::Muted,
            other => MuteState::Unknown(other),
        })
    }

    /// `true` only for a mute event reporting muted.
    pub fn is_muted(&self) -> bool {
        self.mute_state() == Some(MuteState::Muted)
    }

    /// `true` only for a mute event reporting unmuted.
    pub fn is_unmuted(&self) -> bool {
        self.mute_state() == Some(MuteState::Unmuted)
    }

    /// Raw battery level, 0..=1000.
    pub fn battery_level_raw(&self) -> Option<u16> {
        let value = self.value_bytes(code::BATTERY, 2)?;
        Some(u16::from_le_bytes([value[0], value[1]]))
    }

    /// Battery percentage, truncating (690 -> 69).
    pub fn battery_level(&self) -> Option<u16> {
        self.battery_level_raw().map(|raw| raw / 10)
    }

    /// Charging flag of a charging event.
    pub fn charging(&self) -> Option<bool> {
        let value = self.value_bytes(code::CHARGING, 1)?;
        Some(value[0] == 0x01)
    }

    /// `true` only for a charging event reporting charging.
    pub fn is_charging(&self) -> bool {
        self.charging() == Some(true)
    }

    /// Level from a two-byte volume report.
    pub fn volume(&self) -> Option<u8> {
        if self.len == 2 && !self.is_structured() {
            Some(self.data[1])
        } else {
            None
        }
    }

    /// Tagged decode of the report.
    pub fn kind(&self) -> EventKind {
        let Some(event_code) = self.code() else {
            return EventKind::Unstructured;
        };
        let decoded = match event_code {
            code::MUTE => self.mute_state().map(EventKind::Mute),
            code::BATTERY => self.battery_level_raw().map(|raw| EventKind::Battery { raw }),
            code::CHARGING => self.charging().map(EventKind::Charging),
            other => return EventKind::Unknown(other),
        };
        decoded.unwrap_or(EventKind::Truncated(event_code))
    }
}

impl fmt::Debug for HeadsetEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadsetEvent")
            .field("bytes", &format_args!("{:02X?}", self.bytes()))
            .field("kind", &self.kind())
            .finish()
    }
}

impl fmt::Display for HeadsetEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            EventKind::Mute(MuteState::Muted) => write!(f, "microphone muted"),
            EventKind::Mute(MuteState::Unmuted) => write!(f, "microphone active"),
            EventKind::Mute(MuteState::Unknown(v)) => {
                write!(f, "microphone state unknown (0x{v:02X})")
            }
            EventKind::Battery { raw } => write!(f, "battery {}%", raw / 10),
            EventKind::Charging(true) => write!(f, "charging"),
            EventKind::Charging(false) => write!(f, "not charging"),
            EventKind::Unknown(c) => write!(f, "unknown event 0x{c:02X}"),
            EventKind::Truncated(c) => write!(f, "truncated event 0x{c:02X}"),
            EventKind::Unstructured => match self.volume() {
                Some(level) => write!(f, "volume {level}"),
                None => write!(f, "raw report {:02X?}", self.bytes()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn battery_level_truncates() {
        let ev = HeadsetEvent::from_bytes(&[0x03, 0x01, 0x01, 0x0F, 0x00, 0xB2, 0x02]);
        assert_eq!(ev.battery_level_raw(), Some(690));
        assert_eq!(ev.battery_level(), Some(69));
        assert_eq!(ev.kind(), EventKind::Battery { raw: 690 });
        assert_eq!(ev.to_string(), "battery 69%");
    }

    #[test]
    fn mute_states() {
        let muted = HeadsetEvent::from_bytes(&[0x03, 0x01, 0x01, 0xA6, 0x00, 0x01]);
        assert!(muted.is_muted());
        assert!(!muted.is_unmuted());

        let unmuted = HeadsetEvent::from_bytes(&[0x03, 0x01, 0x01, 0xA6, 0x00, 0x00]);
        assert!(unmuted.is_unmuted());
        assert!(!unmuted.is_muted());
    }

    #[test]
    fn unknown_mute_value_is_neither_state() {
        let ev = HeadsetEvent::from_bytes(&[0x03, 0x01, 0x01, 0xA6, 0x00, 0x07]);
        assert!(!ev.is_muted());
        assert!(!ev.is_unmuted());
        assert_eq!(ev.kind(), EventKind::Mute(MuteState::Unknown(0x07)));
    }

    #[test]
    fn charging_flag() {
        let on = HeadsetEvent::from_bytes(&[0x03, 0x01, 0x01, 0x10, 0x00, 0x01]);
        let off = HeadsetEvent::from_bytes(&[0x03, 0x01, 0x01, 0x10, 0x00, 0x00]);
        assert!(on.is_charging());
        assert!(!off.is_charging());
        assert_eq!(off.charging(), Some(false));
    }

    #[test]
    fn accessors_reject_other_event_families() {
        let battery = HeadsetEvent::from_bytes(&[0x03, 0x01, 0x01, 0x0F, 0x00, 0x01, 0x00]);
        assert!(!battery.is_muted());
        assert!(!battery.is_charging());
        assert_eq!(battery.charging(), None);

        let mute = HeadsetEvent::from_bytes(&[0x03, 0x01, 0x01, 0xA6, 0x00, 0x01]);
        assert_eq!(mute.battery_level(), None);
    }

    #[test]
    fn short_reports_fail_closed() {
        let ev = HeadsetEvent::from_bytes(&[0x03, 0x01, 0x01, 0x0F, 0x00, 0xB2]);
        assert_eq!(ev.battery_level(), None);
        assert_eq!(ev.kind(), EventKind::Truncated(code::BATTERY));

        let ev = HeadsetEvent::from_bytes(&[0x03, 0x01, 0x01, 0xA6]);
        assert!(!ev.is_muted());
        assert!(!ev.is_unmuted());
    }

    #[test]
    fn header_must_match_fully() {
        let ev = HeadsetEvent::from_bytes(&[0x03, 0x02, 0x01, 0xA6, 0x00, 0x01]);
        assert!(!ev.is_structured());
        assert!(!ev.is_muted());
        assert_eq!(ev.kind(), EventKind::Unstructured);
    }

    #[test]
    fn unknown_code_is_preserved() {
        let ev = HeadsetEvent::from_bytes(&[0x03, 0x01, 0x01, 0x42, 0x00, 0x01]);
        assert_eq!(ev.kind(), EventKind::Unknown(0x42));
        assert_eq!(ev.to_string(), "unknown event 0x42");
    }

    #[test]
    fn volume_report_is_unstructured_passthrough() {
        let ev = HeadsetEvent::from_bytes(&[0x01, 0x37]);
        assert_eq!(ev.kind(), EventKind::Unstructured);
        assert_eq!(ev.volume(), Some(0x37));
        assert_eq!(ev.bytes(), &[0x01, 0x37]);
    }

    #[test]
    fn oversized_read_is_capped() {
        let ev = HeadsetEvent::from_bytes(&[0xAA; 65]);
        assert_eq!(ev.len(), MAX_EVENT_LEN);
    }
}
