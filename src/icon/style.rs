//! Icon style presets

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Straight (non-premultiplied) 8-bit color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`
    pub fn parse_hex(value: &str) -> Option<Self> {
        let hex = value.strip_prefix('#')?;
        let nibble = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok();
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            3 => Some(Self::rgb(nibble(0)? * 17, nibble(1)? * 17, nibble(2)? * 17)),
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }

    pub fn to_color(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, self.a)
    }
}

/// Outline drawn around every glyph: `rgba(0,0,0,0.7)`
pub const OUTLINE: Rgba = Rgba::rgba(0, 0, 0, 179);

/// Every parameter the fitter and renderer read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleOptions {
    /// Identifies the style in pan identity checks and the last-rendered key
    pub key: &'static str,
    pub pad_pct: f32,
    pub corner_radius_pct: f32,
    pub max_w_pct: f32,
    pub max_h_pct: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub font_weight: u16,
    pub stroke_pct: f32,
    pub fg: Rgba,
    pub bg: Rgba,
    /// CSS-like comma separated family stack
    pub font_family: &'static str,
    /// Digits that should fit the frame at once; `None` means 3
    pub visible_digits: Option<usize>,
    /// Extra offset fills that fake a heavier weight
    pub bold_passes: u8,
    pub bold_offset_pct: f32,
}

const FONT_STACK_CONDENSED: &str = r#""Arial Narrow","Roboto Condensed","Noto Sans Condensed",system-ui,-apple-system,"Segoe UI",Roboto,Arial,sans-serif"#;

const FONT_STACK_SYSTEM: &str = r#"system-ui,-apple-system,"Segoe UI",Roboto,Arial,sans-serif"#;

const FONT_STACK_WIDE: &str = r#""Arial Black","Segoe UI Black","Impact","Roboto Black","Helvetica Neue",Arial,sans-serif"#;

/// Tall condensed digits that use nearly the whole icon
pub const XL: StyleOptions = StyleOptions {
    key: "XLv2",
    pad_pct: 0.02,
    corner_radius_pct: 0.10,
    max_w_pct: 0.96,
    max_h_pct: 0.90,
    scale_x: 0.86,
    scale_y: 1.28,
    font_weight: 900,
    stroke_pct: 0.05,
    fg: Rgba::rgb(255, 255, 255),
    bg: Rgba::rgb(0, 0, 0),
    font_family: FONT_STACK_CONDENSED,
    visible_digits: None,
    bold_passes: 0,
    bold_offset_pct: 0.0,
};

/// Default panning style, sized so two digits show at a time
pub const READABLE: StyleOptions = StyleOptions {
    key: "PANREADv2",
    pad_pct: 0.05,
    corner_radius_pct: 0.08,
    max_w_pct: 0.94,
    max_h_pct: 0.84,
    scale_x: 1.04,
    scale_y: 1.18,
    font_weight: 800,
    stroke_pct: 0.08,
    fg: Rgba::rgb(255, 255, 255),
    bg: Rgba::rgb(0, 0, 0),
    font_family: FONT_STACK_SYSTEM,
    visible_digits: Some(2),
    bold_passes: 0,
    bold_offset_pct: 0.0,
};

/// Wide, heavy digits with a thick outline
pub const WIDE: StyleOptions = StyleOptions {
    key: "WIDEv1",
    pad_pct: 0.02,
    corner_radius_pct: 0.06,
    max_w_pct: 0.98,
    max_h_pct: 0.90,
    scale_x: 1.06,
    scale_y: 1.12,
    font_weight: 900,
    stroke_pct: 0.12,
    fg: Rgba::rgb(255, 255, 255),
    bg: Rgba::rgb(0, 0, 0),
    font_family: FONT_STACK_WIDE,
    visible_digits: None,
    bold_passes: 4,
    bold_offset_pct: 0.02,
};

/// Named style choice as it appears in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StylePreset {
    Xl,
    #[default]
    Readable,
    Wide,
}

impl StylePreset {
    pub fn options(self) -> &'static StyleOptions {
        match self {
            StylePreset::Xl => &XL,
            StylePreset::Readable => &READABLE,
            StylePreset::Wide => &WIDE,
        }
    }
}

impl fmt::Display for StylePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StylePreset::Xl => "xl",
            StylePreset::Readable => "readable",
            StylePreset::Wide => "wide",
        };
        f.write_str(name)
    }
}

impl FromStr for StylePreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xl" => Ok(StylePreset::Xl),
            "readable" => Ok(StylePreset::Readable),
            "wide" => Ok(StylePreset::Wide),
            other => Err(format!("unknown style '{}' (expected xl, readable or wide)", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(Rgba::parse_hex("#999999"), Some(Rgba::rgb(0x99, 0x99, 0x99)));
        assert_eq!(Rgba::parse_hex("#fff"), Some(Rgba::rgb(255, 255, 255)));
        assert_eq!(Rgba::parse_hex("#000000b3"), Some(OUTLINE));
        assert_eq!(Rgba::parse_hex("999999"), None);
        assert_eq!(Rgba::parse_hex("#12345"), None);
        assert_eq!(Rgba::parse_hex("#gggggg"), None);
    }

    #[test]
    fn test_presets_have_distinct_keys() {
        let keys = [XL.key, READABLE.key, WIDE.key];
        assert_eq!(keys, ["XLv2", "PANREADv2", "WIDEv1"]);
        assert_eq!(StylePreset::default().options().visible_digits, Some(2));
        assert_eq!(StylePreset::Wide.options().bold_passes, 4);
    }

    #[test]
    fn test_preset_from_str() {
        assert_eq!("XL".parse::<StylePreset>(), Ok(StylePreset::Xl));
        assert_eq!("wide".parse::<StylePreset>(), Ok(StylePreset::Wide));
        assert!("huge".parse::<StylePreset>().is_err());
        assert_eq!(StylePreset::Readable.to_string(), "readable");
    }
}
