//! Full window/tab enumeration used to seed the cache

use super::{TabId, WindowId};
use serde::{Deserialize, Serialize};

/// Browser window type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    #[default]
    Normal,
    Popup,
    Panel,
    App,
    Devtools,
}

impl WindowKind {
    /// Only normal windows are counted
    pub fn is_counted(self) -> bool {
        self == WindowKind::Normal
    }
}

/// One tab as seen by a full enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: TabId,
    #[serde(default)]
    pub hidden: bool,
}

/// One window and its tabs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: WindowId,
    #[serde(default, rename = "type")]
    pub kind: WindowKind,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub tabs: Vec<TabInfo>,
}

/// Every window with its tabs, in the browser's enumeration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub windows: Vec<WindowInfo>,
}

impl Snapshot {
    pub fn tab_count(&self) -> usize {
        self.windows.iter().map(|w| w.tabs.len()).sum()
    }
}
