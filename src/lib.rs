//! Tab Counter native host
//!
//! Counts the tabs and windows of a browser and paints the count onto the
//! extension's toolbar button.
//!
//! # Features
//! - Incremental counting seeded from one full enumeration
//! - Badge text for short counts, a panning rendered icon for long ones
//! - Debounced, last-writer-wins painting
//! - Native messaging transport to the browser extension

pub mod core;
pub mod counter;
pub mod engine;
pub mod host;
pub mod icon;
pub mod paint;
pub mod scheduler;

pub use core::config::Config;
pub use core::events::HostEvent;
pub use core::settings::{Settings, SettingsStore};
pub use counter::{CounterCache, Counts, Snapshot, TabId, WindowId, WINDOW_ID_NONE};
pub use engine::{Engine, PaintOutcome};
pub use host::{Host, HostError, MemoryHost, NativeHost};
pub use paint::{CounterMode, PaintPlan};
