//! Incremental tab and window counting
//!
//! The cache is seeded once from a full [`Snapshot`] and afterwards only
//! follows delta events, so each tab event costs the same no matter how many
//! tabs are open.

mod cache;
mod snapshot;

pub use cache::{CacheError, CounterCache, Counts, WindowCount};
pub use snapshot::{Snapshot, TabInfo, WindowInfo, WindowKind};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Browser-assigned tab id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i64);

/// Browser-assigned window id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub i64);

/// Window id the browser reports when no window has focus
pub const WINDOW_ID_NONE: WindowId = WindowId(-1);

impl WindowId {
    pub fn is_none(self) -> bool {
        self == WINDOW_ID_NONE
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab#{}", self.0)
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window#{}", self.0)
    }
}
