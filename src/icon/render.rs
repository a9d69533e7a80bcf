//! Icon rasterization

use super::font::GlyphSource;
use super::geometry::{
    ink_extents, is_all_digits, line_width, start_font_size, Geometry, MIN_FONT_SIZE,
    WIDEST_DIGIT,
};
use super::style::{Rgba, StyleOptions, OUTLINE};
use thiserror::Error;
use tiny_skia::{
    ColorU8, FillRule, LineJoin, Mask, Paint, Path, PathBuilder, Pixmap, Rect, Stroke, Transform,
};

/// Small toolbar icon side in pixels
pub const SMALL_ICON: u32 = 16;

/// Large (HiDPI) toolbar icon side in pixels
pub const LARGE_ICON: u32 = 32;

/// Cubic approximation constant for quarter circles
const KAPPA: f32 = 0.552_284_8;

/// Digit count from which static text is abbreviated
const ABBREVIATE_MIN_DIGITS: usize = 7;

/// Grid glyphs fill this share of a cell
const GRID_CELL_W_PCT: f32 = 0.94;
const GRID_CELL_H_PCT: f32 = 0.82;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Invalid icon size {0}")]
    InvalidSize(u32),

    #[error("Pixel buffer does not match a {0}x{0} icon")]
    BufferSize(u32),

    #[error("PNG encoding failed: {0}")]
    Png(String),
}

/// One rendered icon: straight (non-premultiplied) RGBA rows, top to bottom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconImage {
    pub size: u32,
    pub rgba: Vec<u8>,
}

impl IconImage {
    fn from_pixmap(pixmap: &Pixmap) -> Self {
        let mut rgba = Vec::with_capacity(pixmap.data().len());
        for pixel in pixmap.pixels() {
            let color = pixel.demultiply();
            rgba.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
        }
        Self {
            size: pixmap.width(),
            rgba,
        }
    }

    /// RGBA of one pixel
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.size || y >= self.size {
            return None;
        }
        let start = ((y * self.size + x) * 4) as usize;
        let bytes = self.rgba.get(start..start + 4)?;
        Some([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, RenderError> {
        let mut pixmap =
            Pixmap::new(self.size, self.size).ok_or(RenderError::InvalidSize(self.size))?;
        if self.rgba.len() != pixmap.data().len() {
            return Err(RenderError::BufferSize(self.size));
        }
        for (target, source) in pixmap.pixels_mut().iter_mut().zip(self.rgba.chunks_exact(4)) {
            *target = ColorU8::from_rgba(source[0], source[1], source[2], source[3]).premultiply();
        }
        pixmap
            .encode_png()
            .map_err(|e| RenderError::Png(e.to_string()))
    }
}

/// The pair of images the toolbar takes for one state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconFrames {
    pub small: IconImage,
    pub large: IconImage,
}

fn paint_for(color: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_color());
    paint.anti_alias = true;
    paint
}

fn new_pixmap(size: u32) -> Result<Pixmap, RenderError> {
    Pixmap::new(size, size).ok_or(RenderError::InvalidSize(size))
}

/// Rounded rectangle, radius clamped to half the shorter side
fn rounded_rect(x: f32, y: f32, w: f32, h: f32, radius: f32) -> Option<Path> {
    let r = radius.min(w / 2.0).min(h / 2.0);
    if r <= 0.0 {
        return Some(PathBuilder::from_rect(Rect::from_xywh(x, y, w, h)?));
    }
    let k = r * KAPPA;
    let (right, bottom) = (x + w, y + h);

    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(right - r, y);
    pb.cubic_to(right - r + k, y, right, y + r - k, right, y + r);
    pb.line_to(right, bottom - r);
    pb.cubic_to(right, bottom - r + k, right - r + k, bottom, right - r, bottom);
    pb.line_to(x + r, bottom);
    pb.cubic_to(x + r - k, bottom, x, bottom - r + k, x, bottom - r);
    pb.line_to(x, y + r);
    pb.cubic_to(x, y + r - k, x + r - k, y, x + r, y);
    pb.close();
    pb.finish()
}

fn fill_background(pixmap: &mut Pixmap, pad: f32, content: f32, radius: f32, style: &StyleOptions) {
    if let Some(path) = rounded_rect(pad, pad, content, content, radius) {
        pixmap.fill_path(
            &path,
            &paint_for(style.bg),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
    }
}

/// Text placement inside the scaled coordinate space
#[derive(Debug, Clone, Copy)]
enum Anchor {
    Left,
    Center,
}

/// One run of text, drawn around an origin with the style's axis scaling.
struct TextRun<'a> {
    text: &'a str,
    font_size: f32,
    anchor: Anchor,
    /// Device-space origin, rounded to whole pixels
    origin: (f32, f32),
    line_width: f32,
}

impl TextRun<'_> {
    /// Fill (plus fake-bold passes), then the outline stroke
    fn draw(
        &self,
        pixmap: &mut Pixmap,
        style: &StyleOptions,
        font: &dyn GlyphSource,
        mask: Option<&Mask>,
    ) {
        let metrics = font.measure(self.text, self.font_size);
        let (ascent, descent) = ink_extents(&metrics, self.font_size);
        let x = match self.anchor {
            Anchor::Left => 0.0,
            Anchor::Center => -metrics.width / 2.0,
        };
        // vertical middle of the ink sits on the origin
        let baseline = (ascent - descent) / 2.0;

        let mut pb = PathBuilder::new();
        font.outline(self.text, self.font_size, x, baseline, &mut pb);
        let Some(path) = pb.finish() else {
            return;
        };

        let (ox, oy) = (self.origin.0.round(), self.origin.1.round());
        let transform = Transform::from_translate(ox, oy).pre_scale(style.scale_x, style.scale_y);
        let fill = paint_for(style.fg);
        pixmap.fill_path(&path, &fill, FillRule::Winding, transform, mask);

        let size = pixmap.width() as f32;
        for pass in 1..=style.bold_passes {
            let shift = f32::from(pass) * style.bold_offset_pct * size;
            let shifted = Transform::from_translate(ox + shift, oy)
                .pre_scale(style.scale_x, style.scale_y);
            pixmap.fill_path(&path, &fill, FillRule::Winding, shifted, mask);
        }

        let stroke = Stroke {
            width: self.line_width,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        pixmap.stroke_path(&path, &paint_for(OUTLINE), &stroke, transform, mask);
    }
}

/// One frame of the panning animation.
///
/// The text is left-aligned in the content box, vertically centered and
/// shifted left by `offset`; everything outside the content box is clipped.
pub fn render_frame(
    text: &str,
    geometry: &Geometry,
    offset: f32,
    style: &StyleOptions,
    font: &dyn GlyphSource,
) -> Result<IconImage, RenderError> {
    let size = geometry.size;
    let mut pixmap = new_pixmap(size)?;
    fill_background(&mut pixmap, geometry.pad, geometry.content, geometry.radius, style);

    let mut mask = Mask::new(size, size).ok_or(RenderError::InvalidSize(size))?;
    if let Some(clip) = Rect::from_xywh(geometry.pad, geometry.pad, geometry.content, geometry.content)
    {
        mask.fill_path(
            &PathBuilder::from_rect(clip),
            FillRule::Winding,
            false,
            Transform::identity(),
        );
    }

    TextRun {
        text,
        font_size: geometry.font_size,
        anchor: Anchor::Left,
        origin: (
            geometry.pad - offset,
            geometry.pad + geometry.content / 2.0,
        ),
        line_width: geometry.line_width,
    }
    .draw(&mut pixmap, style, font, Some(&mask));

    Ok(IconImage::from_pixmap(&pixmap))
}

/// Both icon sizes of one panning frame
pub fn render_frames(
    text: &str,
    small: &Geometry,
    large: &Geometry,
    progress: f32,
    style: &StyleOptions,
    font: &dyn GlyphSource,
) -> Result<IconFrames, RenderError> {
    Ok(IconFrames {
        small: render_frame(text, small, small.max_offset * progress, style, font)?,
        large: render_frame(text, large, large.max_offset * progress, style, font)?,
    })
}

/// How a static icon arranges its text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaticLayout {
    /// One centered line
    Line(String),
    /// Two rows of `cols` cells; blank cells are spaces
    Grid { cols: usize, cells: Vec<char> },
}

/// Pick the static layout for `text`
pub fn static_layout(text: &str) -> StaticLayout {
    let digits = is_all_digits(text);
    let len = text.chars().count();

    if digits && len >= ABBREVIATE_MIN_DIGITS {
        let short = text
            .parse::<u64>()
            .map(abbreviate)
            .unwrap_or_else(|_| text.to_string());
        return StaticLayout::Line(short);
    }
    if !digits || len <= 3 {
        return StaticLayout::Line(text.to_string());
    }

    let cols = if len == 4 { 2 } else { 3 };
    let top = len.div_ceil(2).min(cols);
    let mut cells: Vec<char> = Vec::with_capacity(cols * 2);
    let mut row = |chars: &mut dyn Iterator<Item = char>| {
        let before = cells.len();
        cells.extend(chars.take(cols));
        cells.resize(before + cols, ' ');
    };
    row(&mut text.chars().take(top));
    row(&mut text.chars().skip(top));
    StaticLayout::Grid { cols, cells }
}

/// Short form for large counts: `1.2k`, `45k`, `4M`, `2B`
pub fn abbreviate(n: u64) -> String {
    fn tenths(n: u64, unit: u64, suffix: &str) -> String {
        let t = (n as f64 / (unit as f64 / 10.0)).round() as u64;
        if t % 10 == 0 {
            format!("{}{}", t / 10, suffix)
        } else {
            format!("{}.{}{}", t / 10, t % 10, suffix)
        }
    }
    fn whole(n: u64, unit: u64, suffix: &str) -> String {
        format!("{}{}", (n as f64 / unit as f64).round() as u64, suffix)
    }

    match n {
        0..=999 => n.to_string(),
        1_000..=9_999 => tenths(n, 1_000, "k"),
        10_000..=999_999 => whole(n, 1_000, "k"),
        1_000_000..=9_999_999 => tenths(n, 1_000_000, "M"),
        10_000_000..=999_999_999 => whole(n, 1_000_000, "M"),
        _ => whole(n, 1_000_000_000, "B"),
    }
}

/// Shrink from the starting size until one `probe` fits `max_w` x `max_h`
fn fit_font_size(
    size: u32,
    probe: &str,
    max_w: f32,
    max_h: f32,
    style: &StyleOptions,
    font: &dyn GlyphSource,
) -> f32 {
    let mut font_size = start_font_size(size);
    while font_size > MIN_FONT_SIZE {
        let fs = font_size as f32;
        let metrics = font.measure(probe, fs);
        let (ascent, descent) = ink_extents(&metrics, fs);
        if metrics.width * style.scale_x <= max_w && (ascent + descent) * style.scale_y <= max_h {
            break;
        }
        font_size -= 1;
    }
    font_size as f32
}

/// Non-panned icon with the text centered, laid out by [`static_layout`]
pub fn render_static(
    text: &str,
    size: u32,
    style: &StyleOptions,
    font: &dyn GlyphSource,
) -> Result<IconImage, RenderError> {
    let mut pixmap = new_pixmap(size)?;
    let side = size as f32;
    let pad = (side * style.pad_pct).round();
    let radius = (side * style.corner_radius_pct).round();
    let content = side - 2.0 * pad;
    fill_background(&mut pixmap, pad, content, radius, style);
    let line = line_width(size, style);

    match static_layout(text) {
        StaticLayout::Line(line_text) => {
            let font_size = fit_font_size(
                size,
                &line_text,
                content * style.max_w_pct,
                content * style.max_h_pct,
                style,
                font,
            );
            TextRun {
                text: &line_text,
                font_size,
                anchor: Anchor::Center,
                origin: (pad + content / 2.0, pad + content / 2.0),
                line_width: line,
            }
            .draw(&mut pixmap, style, font, None);
        }
        StaticLayout::Grid { cols, cells } => {
            let cell_w = content / cols as f32;
            let cell_h = content / 2.0;
            let probe = WIDEST_DIGIT.to_string();
            let font_size = fit_font_size(
                size,
                &probe,
                cell_w * GRID_CELL_W_PCT,
                cell_h * GRID_CELL_H_PCT,
                style,
                font,
            );

            let mut buf = [0u8; 4];
            for (index, c) in cells.iter().enumerate() {
                if *c == ' ' {
                    continue;
                }
                let (row, col) = (index / cols, index % cols);
                TextRun {
                    text: c.encode_utf8(&mut buf),
                    font_size,
                    anchor: Anchor::Center,
                    origin: (
                        pad + (col as f32 + 0.5) * cell_w,
                        pad + (row as f32 + 0.5) * cell_h,
                    ),
                    line_width: line,
                }
                .draw(&mut pixmap, style, font, None);
            }
        }
    }

    Ok(IconImage::from_pixmap(&pixmap))
}

/// Both icon sizes of a static icon
pub fn render_static_frames(
    text: &str,
    style: &StyleOptions,
    font: &dyn GlyphSource,
) -> Result<IconFrames, RenderError> {
    Ok(IconFrames {
        small: render_static(text, SMALL_ICON, style, font)?,
        large: render_static(text, LARGE_ICON, style, font)?,
    })
}
