//! RGB to KML color conversion.
//!
//! KML stores colors as eight hex digits in `aabbggrr` order: alpha first,
//! then the RGB channels reversed.

use core::fmt;
use ks_core::KmlError;
use ks_core::KmlResult;

/// Opaque RGB triple parsed from `#RRGGBB` notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Parses `#RRGGBB`; hex digits may be either case.
    pub fn parse(input: &str) -> KmlResult<Self> {
        let digits = input
            .strip_prefix('#')
            .ok_or_else(|| KmlError::invalid_color(input, "expected a leading `#`"))?;

        if digits.len() != 6 {
            return Err(KmlError::invalid_color(
                input,
                "expected exactly 6 hex digits after `#`",
            ));
        }

        if !digits.bytes().all(|byte| byte.is_ascii_hexdigit()) {
            return Err(KmlError::invalid_color(input, "contains non-hex characters"));
        }

        Ok(Self {
            red: parse_channel(input, &digits[0..2])?,
            green: parse_channel(input, &digits[2..4])?,
            blue: parse_channel(input, &digits[4..6])?,
        })
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.red, self.green, self.blue)
    }
}

/// Color with alpha, rendered in KML channel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KmlColor {
    pub rgb: Rgb,
    pub alpha: u8,
}

impl KmlColor {
    pub fn new(rgb: Rgb, alpha: u8) -> Self {
        Self { rgb, alpha }
    }

    /// Builds a color from a transparency percentage in `[0, 100]`.
    pub fn with_transparency(rgb: Rgb, transparency_percent: f64) -> KmlResult<Self> {
        Ok(Self {
            rgb,
            alpha: alpha_from_percent(transparency_percent)?,
        })
    }

    /// Decodes an existing `aabbggrr` value as found in KML `color` elements.
    pub fn parse_kml(input: &str) -> KmlResult<Self> {
        let trimmed = input.trim();
        if trimmed.len() != 8 || !trimmed.bytes().all(|byte| byte.is_ascii_hexdigit()) {
            return Err(KmlError::invalid_color(
                input,
                "expected exactly 8 hex digits in aabbggrr order",
            ));
        }

        let alpha = parse_channel(input, &trimmed[0..2])?;
        let blue = parse_channel(input, &trimmed[2..4])?;
        let green = parse_channel(input, &trimmed[4..6])?;
        let red = parse_channel(input, &trimmed[6..8])?;

        Ok(Self {
            rgb: Rgb::new(red, green, blue),
            alpha,
        })
    }

    pub fn to_kml_hex(self) -> String {
        format!(
            "{:02X}{:02X}{:02X}{:02X}",
            self.alpha, self.rgb.blue, self.rgb.green, self.rgb.red
        )
    }
}

impl fmt::Display for KmlColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_kml_hex())
    }
}

/// Converts `#RRGGBB` plus a transparency percentage into KML `AABBGGRR`.
pub fn encode(rgb_hex: &str, transparency_percent: f64) -> KmlResult<String> {
    let rgb = Rgb::parse(rgb_hex)?;
    Ok(KmlColor::with_transparency(rgb, transparency_percent)?.to_kml_hex())
}

/// Maps `[0, 100]` linearly onto `[0, 255]`, rounding half away from zero.
pub fn alpha_from_percent(transparency_percent: f64) -> KmlResult<u8> {
    if !transparency_percent.is_finite() || !(0.0..=100.0).contains(&transparency_percent) {
        return Err(KmlError::InvalidTransparency {
            value: transparency_percent,
        });
    }

    let scaled = (transparency_percent / 100.0 * 255.0).round();
    Ok(scaled.clamp(0.0, 255.0) as u8)
}

fn parse_channel(input: &str, pair: &str) -> KmlResult<u8> {
    u8::from_str_radix(pair, 16)
        .map_err(|_| KmlError::invalid_color(input, "contains non-hex characters"))
}
