//! Glyph sources for icon text
//!
//! Text is turned into vector outlines so the same path can be filled and
//! stroked by the renderer. Two sources exist: a built-in 5x7 dot-matrix face
//! that needs no system fonts and renders identically everywhere, and system
//! faces looked up by the style's family stack.

use super::style::StyleOptions;
use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tiny_skia::PathBuilder;
use tracing::{debug, info, warn};

/// Ink extents of a run of text at a given font size, in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TextMetrics {
    /// Advance width of the whole run
    pub width: f32,
    /// Distance from the baseline to the highest ink
    pub ascent: f32,
    /// Distance from the baseline to the lowest ink, zero when nothing descends
    pub descent: f32,
}

/// Measures text and emits its outlines.
pub trait GlyphSource {
    fn measure(&self, text: &str, font_size: f32) -> TextMetrics;

    /// Append the outlines of `text` with its baseline origin at `(x, baseline)`.
    /// Coordinates are y-down like the pixmap.
    fn outline(&self, text: &str, font_size: f32, x: f32, baseline: f32, path: &mut PathBuilder);

    /// Human readable face name for logs
    fn name(&self) -> &str;
}

const GLYPH_ROWS: usize = 7;
const GLYPH_COLS: usize = 5;
/// Cells per em
const CELLS_PER_EM: f32 = 8.0;
/// Horizontal advance in cells, one blank column included
const ADVANCE_CELLS: f32 = 6.0;

/// Rows top to bottom, bit 4 is the leftmost column
fn glyph_rows(c: char) -> [u8; GLYPH_ROWS] {
    match c {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '/' => [0x01, 0x02, 0x02, 0x04, 0x08, 0x08, 0x10],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        'k' => [0x10, 0x10, 0x12, 0x14, 0x18, 0x14, 0x12],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        ' ' => [0x00; GLYPH_ROWS],
        _ => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
    }
}

fn lit(rows: &[u8; GLYPH_ROWS], col: i32, row: i32) -> bool {
    if !(0..GLYPH_COLS as i32).contains(&col) || !(0..GLYPH_ROWS as i32).contains(&row) {
        return false;
    }
    rows[row as usize] & (0x10 >> col) != 0
}

/// Closed boundary loops of a glyph's lit cells, in cell corner coordinates.
///
/// Every lit cell contributes the edges it shares with an unlit neighbour,
/// oriented clockwise, so loops around holes run the other way and the
/// nonzero fill rule keeps them open.
fn glyph_contours(rows: &[u8; GLYPH_ROWS]) -> Vec<Vec<(i32, i32)>> {
    let mut edges: BTreeMap<(i32, i32), Vec<(i32, i32)>> = BTreeMap::new();
    let mut add = |from: (i32, i32), to: (i32, i32)| edges.entry(from).or_default().push(to);

    for row in 0..GLYPH_ROWS as i32 {
        for col in 0..GLYPH_COLS as i32 {
            if !lit(rows, col, row) {
                continue;
            }
            if !lit(rows, col, row - 1) {
                add((col, row), (col + 1, row));
            }
            if !lit(rows, col + 1, row) {
                add((col + 1, row), (col + 1, row + 1));
            }
            if !lit(rows, col, row + 1) {
                add((col + 1, row + 1), (col, row + 1));
            }
            if !lit(rows, col - 1, row) {
                add((col, row + 1), (col, row));
            }
        }
    }

    let mut contours = Vec::new();
    while let Some(start) = edges.first_key_value().map(|(start, _)| *start) {
        let mut contour = vec![start];
        let mut at = start;
        loop {
            let Some(targets) = edges.get_mut(&at) else {
                break;
            };
            let next = targets.pop();
            if targets.is_empty() {
                edges.remove(&at);
            }
            let Some(next) = next else {
                break;
            };
            if next == start {
                break;
            }
            contour.push(next);
            at = next;
        }
        contours.push(contour);
    }
    contours
}

/// Built-in dot-matrix face covering digits and the abbreviation suffixes.
/// Unknown characters draw as `?`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelFont;

impl PixelFont {
    fn cell(font_size: f32) -> f32 {
        font_size / CELLS_PER_EM
    }
}

impl GlyphSource for PixelFont {
    fn measure(&self, text: &str, font_size: f32) -> TextMetrics {
        let cell = Self::cell(font_size);
        let count = text.chars().count();
        if count == 0 {
            return TextMetrics::default();
        }

        let top = text
            .chars()
            .filter_map(|c| glyph_rows(c).iter().position(|row| *row != 0))
            .min();

        TextMetrics {
            width: (ADVANCE_CELLS * count as f32 - 1.0) * cell,
            ascent: top.map_or(0.0, |top| (GLYPH_ROWS - top) as f32 * cell),
            descent: 0.0,
        }
    }

    fn outline(&self, text: &str, font_size: f32, x: f32, baseline: f32, path: &mut PathBuilder) {
        let cell = Self::cell(font_size);
        let top = baseline - GLYPH_ROWS as f32 * cell;
        for (index, c) in text.chars().enumerate() {
            let left = x + index as f32 * ADVANCE_CELLS * cell;
            for contour in glyph_contours(&glyph_rows(c)) {
                let mut points = contour.iter().map(|&(col, row)| {
                    (left + col as f32 * cell, top + row as f32 * cell)
                });
                let Some((px, py)) = points.next() else {
                    continue;
                };
                path.move_to(px, py);
                for (px, py) in points {
                    path.line_to(px, py);
                }
                path.close();
            }
        }
    }

    fn name(&self) -> &str {
        "builtin 5x7"
    }
}

/// Forwards ttf-parser outline callbacks into a tiny-skia path
struct PathSink<'a> {
    path: &'a mut PathBuilder,
    x: f32,
    baseline: f32,
    scale: f32,
}

impl PathSink<'_> {
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.x + x * self.scale, self.baseline - y * self.scale)
    }
}

impl ttf_parser::OutlineBuilder for PathSink<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.path.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.path.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.path.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.path.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.path.close();
    }
}

/// An installed font face, held as owned bytes
#[derive(Clone)]
pub struct SystemFont {
    data: Vec<u8>,
    index: u32,
    family: String,
}

impl fmt::Debug for SystemFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemFont")
            .field("family", &self.family)
            .field("index", &self.index)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl SystemFont {
    /// Wrap raw font file bytes; `None` when they do not parse
    pub fn from_data(data: Vec<u8>, index: u32, family: impl Into<String>) -> Option<Self> {
        if let Err(e) = ttf_parser::Face::parse(&data, index) {
            warn!("Failed to parse font face: {}", e);
            return None;
        }
        Some(Self {
            data,
            index,
            family: family.into(),
        })
    }

    fn face(&self) -> Option<ttf_parser::Face<'_>> {
        ttf_parser::Face::parse(&self.data, self.index).ok()
    }

    fn glyph(face: &ttf_parser::Face<'_>, c: char) -> ttf_parser::GlyphId {
        face.glyph_index(c)
            .or_else(|| face.glyph_index('?'))
            .unwrap_or(ttf_parser::GlyphId(0))
    }
}

impl GlyphSource for SystemFont {
    fn measure(&self, text: &str, font_size: f32) -> TextMetrics {
        let Some(face) = self.face() else {
            return TextMetrics::default();
        };
        let scale = font_size / f32::from(face.units_per_em().max(1));

        let mut advance = 0.0;
        let mut top: Option<f32> = None;
        let mut bottom: Option<f32> = None;
        for c in text.chars() {
            let glyph = Self::glyph(&face, c);
            advance += f32::from(face.glyph_hor_advance(glyph).unwrap_or(0));
            if let Some(bbox) = face.glyph_bounding_box(glyph) {
                let high = f32::from(bbox.y_max);
                let low = f32::from(bbox.y_min);
                top = Some(top.map_or(high, |t| t.max(high)));
                bottom = Some(bottom.map_or(low, |b| b.min(low)));
            }
        }

        TextMetrics {
            width: advance * scale,
            ascent: top.map_or(0.0, |t| t.max(0.0) * scale),
            descent: bottom.map_or(0.0, |b| (-b).max(0.0) * scale),
        }
    }

    fn outline(&self, text: &str, font_size: f32, x: f32, baseline: f32, path: &mut PathBuilder) {
        let Some(face) = self.face() else {
            return;
        };
        let scale = font_size / f32::from(face.units_per_em().max(1));
        let mut pen = x;
        for c in text.chars() {
            let glyph = Self::glyph(&face, c);
            let mut sink = PathSink {
                path: &mut *path,
                x: pen,
                baseline,
                scale,
            };
            face.outline_glyph(glyph, &mut sink);
            pen += f32::from(face.glyph_hor_advance(glyph).unwrap_or(0)) * scale;
        }
    }

    fn name(&self) -> &str {
        &self.family
    }
}

/// Where glyph outlines come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontBackend {
    /// Installed fonts matching the style's family stack
    #[default]
    System,
    /// Always the built-in pixel face
    Builtin,
}

impl FromStr for FontBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "system" => Ok(FontBackend::System),
            "builtin" => Ok(FontBackend::Builtin),
            other => Err(format!("unknown font backend '{}' (expected system or builtin)", other)),
        }
    }
}

/// Split a CSS-like family list into trimmed, unquoted names
pub fn parse_family_stack(stack: &str) -> Vec<String> {
    stack
        .split(',')
        .map(|name| name.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

fn to_family(name: &str) -> Option<Family<'_>> {
    match name {
        "serif" => Some(Family::Serif),
        "sans-serif" => Some(Family::SansSerif),
        "monospace" => Some(Family::Monospace),
        "cursive" => Some(Family::Cursive),
        "fantasy" => Some(Family::Fantasy),
        // browser aliases with no fontdb counterpart
        "system-ui" | "-apple-system" => None,
        other => Some(Family::Name(other)),
    }
}

/// Resolves styles to glyph sources, caching one face per style key.
pub struct FontBook {
    backend: FontBackend,
    db: Option<Database>,
    faces: HashMap<&'static str, Option<SystemFont>>,
    pixel: PixelFont,
}

impl Default for FontBook {
    fn default() -> Self {
        Self::new(FontBackend::default())
    }
}

impl FontBook {
    pub fn new(backend: FontBackend) -> Self {
        Self {
            backend,
            db: None,
            faces: HashMap::new(),
            pixel: PixelFont,
        }
    }

    /// Font book that never touches system fonts
    pub fn builtin() -> Self {
        Self::new(FontBackend::Builtin)
    }

    pub fn backend(&self) -> FontBackend {
        self.backend
    }

    /// Glyph source for a style, falling back to the pixel face when no family
    /// in the stack is installed
    pub fn resolve(&mut self, style: &StyleOptions) -> &dyn GlyphSource {
        if self.backend == FontBackend::Builtin {
            return &self.pixel;
        }
        if !self.faces.contains_key(style.key) {
            let face = self.load(style);
            match &face {
                Some(face) => info!(style = style.key, family = %face.family, "Loaded icon font"),
                None => warn!(style = style.key, "No installed font matches, using builtin face"),
            }
            self.faces.insert(style.key, face);
        }
        match self.faces.get(style.key) {
            Some(Some(face)) => face,
            _ => &self.pixel,
        }
    }

    fn load(&mut self, style: &StyleOptions) -> Option<SystemFont> {
        let db = self.db.get_or_insert_with(|| {
            let mut db = Database::new();
            db.load_system_fonts();
            debug!(faces = db.len(), "Loaded system font database");
            db
        });

        let names = parse_family_stack(style.font_family);
        let families: Vec<Family<'_>> = names.iter().filter_map(|name| to_family(name)).collect();
        let query = Query {
            families: &families,
            weight: Weight(style.font_weight),
            stretch: Stretch::Normal,
            style: Style::Normal,
        };

        let id = db.query(&query)?;
        let family = db
            .face(id)
            .and_then(|info| info.families.first().map(|(name, _)| name.clone()))
            .unwrap_or_else(|| "unknown".to_string());
        db.with_face_data(id, |data, index| SystemFont::from_data(data.to_vec(), index, family))
            .flatten()
    }
}
