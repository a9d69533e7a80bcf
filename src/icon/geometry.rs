//! Text fitting for a square icon

use super::font::{GlyphSource, TextMetrics};
use super::style::StyleOptions;

/// Font sizes never shrink below this
pub const MIN_FONT_SIZE: u32 = 6;

/// Starting font size as a fraction of the icon size
const START_FONT_PCT: f32 = 0.92;

/// Digits shown at once when the style does not say
const DEFAULT_VISIBLE_DIGITS: usize = 3;

/// Widest digit, used to probe the width budget
pub const WIDEST_DIGIT: char = '8';

/// Everything needed to draw `text` at one icon size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub size: u32,
    pub pad: f32,
    pub radius: f32,
    /// Side of the square content box
    pub content: f32,
    pub font_size: f32,
    /// Ink extents at `font_size`, before axis scaling
    pub ascent: f32,
    pub descent: f32,
    /// Width of the complete text after horizontal scaling
    pub full_width: f32,
    /// How far the text can pan left; zero means it fits
    pub max_offset: f32,
    pub line_width: f32,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl Geometry {
    pub fn needs_pan(&self) -> bool {
        self.max_offset > 0.0
    }
}

/// True for non-empty ASCII digit strings
pub fn is_all_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

/// Ascent and descent with the usual fallbacks for faces that report no ink
pub(crate) fn ink_extents(metrics: &TextMetrics, font_size: f32) -> (f32, f32) {
    let ascent = if metrics.ascent > 0.0 {
        metrics.ascent
    } else {
        font_size * 0.8
    };
    let descent = if metrics.descent > 0.0 {
        metrics.descent
    } else {
        font_size * 0.2
    };
    (ascent, descent)
}

/// Largest starting font size for an icon
pub(crate) fn start_font_size(size: u32) -> u32 {
    (size as f32 * START_FONT_PCT).floor() as u32
}

/// Line width normalized by the larger axis scale so the outline looks the
/// same under anisotropic scaling
pub(crate) fn line_width(size: u32, style: &StyleOptions) -> f32 {
    let stroke = (size as f32 * style.stroke_pct).round();
    (stroke / style.scale_x.max(style.scale_y)).max(1.0)
}

/// Fit `text` into a `size` x `size` icon.
///
/// The font shrinks until the full text fits the height budget, then until a
/// probe of the target visible digit count fits the width budget. Whatever
/// the full text overflows the content box by is the pan range.
pub fn compute_geometry(
    size: u32,
    text: &str,
    style: &StyleOptions,
    font: &dyn GlyphSource,
) -> Geometry {
    let side = size as f32;
    let pad = (side * style.pad_pct).round();
    let radius = (side * style.corner_radius_pct).round();
    let content = side - 2.0 * pad;
    let max_h = content * style.max_h_pct;
    let max_w = content * style.max_w_pct;

    let mut font_size = start_font_size(size);
    while font_size > MIN_FONT_SIZE {
        let fs = font_size as f32;
        let (ascent, descent) = ink_extents(&font.measure(text, fs), fs);
        if (ascent + descent) * style.scale_y <= max_h {
            break;
        }
        font_size -= 1;
    }

    let len = text.chars().count();
    let target = style
        .visible_digits
        .unwrap_or(DEFAULT_VISIBLE_DIGITS)
        .max(1)
        .min(len);
    let probe: String = if is_all_digits(text) {
        std::iter::repeat(WIDEST_DIGIT).take(target).collect()
    } else {
        text.chars().take(target).collect()
    };

    while font_size > MIN_FONT_SIZE {
        let probe_width = font.measure(&probe, font_size as f32).width * style.scale_x;
        if probe_width <= max_w {
            break;
        }
        font_size -= 1;
    }

    let fs = font_size as f32;
    let metrics = font.measure(text, fs);
    let (ascent, descent) = ink_extents(&metrics, fs);
    let full_width = metrics.width * style.scale_x;

    Geometry {
        size,
        pad,
        radius,
        content,
        font_size: fs,
        ascent,
        descent,
        full_width,
        max_offset: (full_width - content).ceil().max(0.0),
        line_width: line_width(size, style),
        scale_x: style.scale_x,
        scale_y: style.scale_y,
    }
}
