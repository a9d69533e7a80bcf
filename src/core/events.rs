//! Host event definitions

use super::settings::Settings;
use crate::counter::{TabId, WindowId, WindowKind};
use serde::{Deserialize, Serialize};

/// Lifecycle notifications forwarded by the browser side.
///
/// Field names follow the browser's listener arguments so the extension shim
/// can forward them without reshaping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum HostEvent {
    /// A tab was opened
    #[serde(rename_all = "camelCase")]
    TabCreated {
        tab_id: TabId,
        window_id: WindowId,
        #[serde(default)]
        hidden: bool,
    },

    /// A tab was closed
    #[serde(rename_all = "camelCase")]
    TabRemoved {
        tab_id: TabId,
        window_id: WindowId,
        #[serde(default)]
        is_window_closing: bool,
    },

    /// A tab changed; only the visibility part matters here
    #[serde(rename_all = "camelCase")]
    TabUpdated {
        tab_id: TabId,
        window_id: WindowId,
        #[serde(default)]
        hidden: Option<bool>,
    },

    /// A tab was moved into a window. `hidden` is filled in when the shim
    /// already looked it up; otherwise the host is asked.
    #[serde(rename_all = "camelCase")]
    TabAttached {
        tab_id: TabId,
        new_window_id: WindowId,
        #[serde(default)]
        hidden: Option<bool>,
    },

    /// A tab was taken out of a window
    #[serde(rename_all = "camelCase")]
    TabDetached { tab_id: TabId, old_window_id: WindowId },

    /// A tab was swapped for another (prerender, discard)
    #[serde(rename_all = "camelCase")]
    TabReplaced {
        added_tab_id: TabId,
        removed_tab_id: TabId,
    },

    /// The active tab of a window changed
    #[serde(rename_all = "camelCase")]
    TabActivated { tab_id: TabId, window_id: WindowId },

    /// A window was opened
    #[serde(rename_all = "camelCase")]
    WindowCreated {
        window_id: WindowId,
        #[serde(default, rename = "type")]
        kind: WindowKind,
    },

    /// A window was closed
    #[serde(rename_all = "camelCase")]
    WindowRemoved { window_id: WindowId },

    /// Focus moved to a window, or left the browser (`WINDOW_ID_NONE`)
    #[serde(rename_all = "camelCase")]
    WindowFocusChanged { window_id: WindowId },

    /// The options page saved new settings
    #[serde(rename_all = "camelCase")]
    SettingsChanged {
        #[serde(default)]
        settings: Option<Settings>,
    },
}

impl HostEvent {
    /// Short name for log lines
    pub fn name(&self) -> &'static str {
        match self {
            HostEvent::TabCreated { .. } => "tabCreated",
            HostEvent::TabRemoved { .. } => "tabRemoved",
            HostEvent::TabUpdated { .. } => "tabUpdated",
            HostEvent::TabAttached { .. } => "tabAttached",
            HostEvent::TabDetached { .. } => "tabDetached",
            HostEvent::TabReplaced { .. } => "tabReplaced",
            HostEvent::TabActivated { .. } => "tabActivated",
            HostEvent::WindowCreated { .. } => "windowCreated",
            HostEvent::WindowRemoved { .. } => "windowRemoved",
            HostEvent::WindowFocusChanged { .. } => "windowFocusChanged",
            HostEvent::SettingsChanged { .. } => "settingsChanged",
        }
    }
}
