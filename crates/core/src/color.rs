//! Colors and LED zones.

use std::fmt;

/// An 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Fully saturated color at `hue` degrees on the color wheel.
    ///
    /// The hue wraps modulo 360.
    pub fn from_hue(hue: f32) -> Self {
        let hue = hue.rem_euclid(360.0);
        let ramp = |x: f32| (x / 60.0 * 255.0) as u8;
        let (r, g, b) = if hue < 60.0 {
            (255, ramp(hue), 0)
        } else if hue < 120.0 {
            (ramp(120.0 - hue), 255, 0)
        } else if hue < 180.0 {
            (0, 255, ramp(hue - 120.0))
        } else if hue < 240.0 {
            (0, ramp(240.0 - hue), 255)
        } else if hue < 300.0 {
            (ramp(hue - 240.0), 0, 255)
        } else {
            (255, 0, ramp(360.0 - hue))
        };
        Self::new(r, g, b)
    }

    /// Scale every channel by `factor` (clamped to 0.0..=1.0), truncating.
    pub fn scaled(self, factor: f32) -> Self {
        let factor = factor.clamp(0.0, 1.0);
        let scale = |c: u8| (f32::from(c) * factor) as u8;
        Self::new(scale(self.r), scale(self.g), scale(self.b))
    }

    /// Parse a color name or `#RRGGBB` hex string (case-insensitive).
    ///
    /// Accepted names: red, green, blue, cyan, magenta, yellow, white,
    /// off/black.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_lowercase();
        if let Some(hex) = lower.strip_prefix('#') {
            return Self::from_hex(hex);
        }
        match lower.as_str() {
            "red" => Some(Self::new(255, 0, 0)),
            "green" => Some(Self::new(0, 255, 0)),
            "blue" => Some(Self::new(0, 0, 255)),
            "cyan" => Some(Self::new(0, 255, 255)),
            "magenta" => Some(Self::new(255, 0, 255)),
            "yellow" => Some(Self::new(255, 255, 0)),
            "white" => Some(Self::WHITE),
            "off" | "black" => Some(Self::BLACK),
            _ => None,
        }
    }

    fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Addressable LED zone. `All` fans a color out to every zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Zone {
    Logo,
    Power,
    Mic,
    All,
}

impl Zone {
    pub const VARIANTS: &'static [Zone] = &[Zone::Logo, Zone::Power, Zone::Mic, Zone::All];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Logo => "logo",
            Self::Power => "power",
            Self::Mic => "mic",
            Self::All => "all",
        }
    }

    /// Parse a zone name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "logo" => Some(Self::Logo),
            "power" => Some(Self::Power),
            "mic" | "microphone" => Some(Self::Mic),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Colors of the three LED zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneSet {
    pub logo: Color,
    pub power: Color,
    pub mic: Color,
}

impl ZoneSet {
    /// The same color on every zone.
    pub const fn uniform(color: Color) -> Self {
        Self {
            logo: color,
            power: color,
            mic: color,
        }
    }

    /// Copy with one zone (or all of them) replaced.
    pub fn with_zone(mut self, zone: Zone, color: Color) -> Self {
        match zone {
            Zone::Logo => self.logo = color,
            Zone::Power => self.power = color,
            Zone::Mic => self.mic = color,
            Zone::All => self = Self::uniform(color),
        }
        self
    }

    /// Zones in wire order: logo, power, mic.
    pub fn in_wire_order(&self) -> [Color; 3] {
        [self.logo, self.power, self.mic]
    }
}

impl Default for ZoneSet {
    /// Firmware-like cyan on every zone.
    fn default() -> Self {
        Self::uniform(Color::new(0, 155, 222))
    }
}
