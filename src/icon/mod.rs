//! Toolbar icon drawing: text fitting, rasterization and panning

pub mod font;
pub mod geometry;
pub mod pan;
pub mod render;
pub mod style;

pub use font::{FontBackend, FontBook, GlyphSource, PixelFont, SystemFont, TextMetrics};
pub use geometry::{compute_geometry, is_all_digits, Geometry};
pub use pan::{PanScheduler, PanStart};
pub use render::{
    abbreviate, render_frame, render_static, IconFrames, IconImage, RenderError, LARGE_ICON,
    SMALL_ICON,
};
pub use style::{Rgba, StyleOptions, StylePreset};
