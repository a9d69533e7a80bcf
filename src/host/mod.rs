//! The browser side of the extension
//!
//! Everything that needs the browser (tab queries, icon and badge updates)
//! goes through [`Host`]. [`native::NativeHost`] talks to the extension shim
//! over native messaging; [`memory::MemoryHost`] is an in-process model used
//! by tests and the replay tool.

pub mod memory;
pub mod native;
pub mod protocol;

pub use memory::{HostCall, MemoryHost};
pub use native::NativeHost;
pub use protocol::ProtocolError;

use crate::counter::{Snapshot, TabId};
use crate::icon::IconFrames;
use thiserror::Error;

/// Errors from browser calls. None of them are fatal to the engine.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("No such tab: {0}")]
    NoSuchTab(TabId),

    #[error("Browser connection closed")]
    Disconnected,

    #[error("Browser rejected the call: {0}")]
    Rejected(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Browser API surface used by the engine.
///
/// `tab: None` addresses the global toolbar button rather than one tab.
#[allow(async_fn_in_trait)]
pub trait Host {
    /// Every window with its tabs
    async fn snapshot(&self) -> Result<Snapshot, HostError>;

    /// Active tab of the current window
    async fn active_tab(&self) -> Result<Option<TabId>, HostError>;

    /// Whether a tab is hidden
    async fn tab_hidden(&self, tab: TabId) -> Result<bool, HostError>;

    async fn set_icon_frames(&self, tab: Option<TabId>, frames: &IconFrames)
        -> Result<(), HostError>;

    async fn set_icon_path(&self, tab: Option<TabId>, path: &str) -> Result<(), HostError>;

    async fn set_badge_text(&self, tab: Option<TabId>, text: &str) -> Result<(), HostError>;

    async fn set_badge_background(&self, color: &str) -> Result<(), HostError>;

    /// `None` lets the browser pick a readable color
    async fn set_badge_text_color(&self, color: Option<&str>) -> Result<(), HostError>;

    async fn set_title(&self, tab: Option<TabId>, title: &str) -> Result<(), HostError>;
}
