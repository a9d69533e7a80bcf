//! Per-window visible/total tab counts maintained from delta events

use super::{Snapshot, TabId, WindowId, WindowKind};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, trace};

/// A stored count that disagrees with the tabs the cache knows about
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("{window} has visible {visible} > total {total}")]
    VisibleExceedsTotal {
        window: WindowId,
        visible: u32,
        total: u32,
    },
    #[error("{window} counts {stored:?} but tabs say {recounted:?}")]
    CountMismatch {
        window: WindowId,
        stored: WindowCount,
        recounted: WindowCount,
    },
    #[error("active {0} is not tracked")]
    ActiveUntracked(WindowId),
    #[error("no active window while windows are tracked")]
    NoActiveWindow,
}

/// Tab counts for one window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowCount {
    /// Tabs that are not hidden
    pub visible: u32,
    /// All tabs, hidden included
    pub total: u32,
}

impl WindowCount {
    fn add(&mut self, hidden: bool) {
        self.total += 1;
        if !hidden {
            self.visible += 1;
        }
    }

    fn release(&mut self, hidden: bool) {
        self.total = self.total.saturating_sub(1);
        if !hidden {
            self.visible = self.visible.saturating_sub(1);
        }
        self.visible = self.visible.min(self.total);
    }
}

/// Counts reported to the paint path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    /// Visible tabs in the active window
    pub current_window: u32,
    /// All tabs in the active window
    pub current_window_total: u32,
    /// Visible tabs across every tracked window
    pub all_tabs: u32,
    /// All tabs across every tracked window
    pub all_tabs_total: u32,
    /// Number of tracked (normal) windows
    pub all_windows: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TabEntry {
    hidden: bool,
    /// Window the tab is counted in; `None` while detached
    window: Option<WindowId>,
}

/// Process-wide counter state, owned by the engine.
#[derive(Debug, Default)]
pub struct CounterCache {
    windows: BTreeMap<WindowId, WindowCount>,
    tabs: HashMap<TabId, TabEntry>,
    ignored_windows: HashSet<WindowId>,
    active_window: Option<WindowId>,
}

impl CounterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset and seed from a full enumeration. This is the only O(tabs) path.
    pub fn initialize(&mut self, snapshot: &Snapshot) {
        self.windows.clear();
        self.tabs.clear();
        self.ignored_windows.clear();
        self.active_window = None;

        let mut focused = None;
        let mut first = None;
        for window in &snapshot.windows {
            if !window.kind.is_counted() {
                self.ignored_windows.insert(window.id);
                continue;
            }
            let mut count = WindowCount::default();
            for tab in &window.tabs {
                count.add(tab.hidden);
                self.tabs.insert(
                    tab.id,
                    TabEntry {
                        hidden: tab.hidden,
                        window: Some(window.id),
                    },
                );
            }
            self.windows.insert(window.id, count);
            first.get_or_insert(window.id);
            if window.focused {
                focused = Some(window.id);
            }
        }
        self.active_window = focused.or(first);

        debug!(
            windows = self.windows.len(),
            tabs = self.tabs.len(),
            active = ?self.active_window,
            "Counter cache initialized"
        );
    }

    /// Count entry for a window, created on first sight. `None` for ignored
    /// (non-normal) windows and `WINDOW_ID_NONE`.
    fn window_mut(&mut self, window: WindowId) -> Option<&mut WindowCount> {
        if window.is_none() || self.ignored_windows.contains(&window) {
            return None;
        }
        if self.active_window.is_none() {
            self.active_window = Some(window);
        }
        Some(self.windows.entry(window).or_default())
    }

    fn release(&mut self, window: WindowId, hidden: bool) {
        if let Some(count) = self.windows.get_mut(&window) {
            count.release(hidden);
        }
    }

    pub fn on_tab_created(&mut self, tab: TabId, window: WindowId, hidden: bool) {
        if self.tabs.contains_key(&tab) {
            debug!("Ignoring duplicate create for {}", tab);
            return;
        }
        let Some(count) = self.window_mut(window) else {
            trace!("{} created in untracked {}", tab, window);
            return;
        };
        count.add(hidden);
        self.tabs.insert(
            tab,
            TabEntry {
                hidden,
                window: Some(window),
            },
        );
    }

    pub fn on_tab_removed(&mut self, tab: TabId) {
        let Some(entry) = self.tabs.remove(&tab) else {
            trace!("Removed unknown {}", tab);
            return;
        };
        if let Some(window) = entry.window {
            self.release(window, entry.hidden);
        }
    }

    /// Visibility change. Tabs the cache never counted are left alone.
    pub fn on_tab_updated(&mut self, tab: TabId, hidden: bool) {
        let Some(entry) = self.tabs.get_mut(&tab) else {
            debug!("Visibility change for unknown {}", tab);
            return;
        };
        if entry.hidden == hidden {
            return;
        }
        entry.hidden = hidden;
        let Some(window) = entry.window else {
            return;
        };
        if let Some(count) = self.windows.get_mut(&window) {
            if hidden {
                count.visible = count.visible.saturating_sub(1);
            } else {
                count.visible = (count.visible + 1).min(count.total);
            }
        }
    }

    pub fn on_tab_detached(&mut self, tab: TabId) {
        let Some(entry) = self.tabs.get_mut(&tab) else {
            return;
        };
        let hidden = entry.hidden;
        if let Some(window) = entry.window.take() {
            self.release(window, hidden);
        }
    }

    /// `looked_up` is the host's answer for the tab's visibility, `None` when
    /// the lookup failed. Falls back to the last known value, then to hidden.
    pub fn on_tab_attached(&mut self, tab: TabId, window: WindowId, looked_up: Option<bool>) {
        let previous = self.tabs.get(&tab).copied();
        if let Some(TabEntry {
            hidden,
            window: Some(old),
        }) = previous
        {
            // attach without a detach: stop counting it in the old window
            self.release(old, hidden);
        }

        let hidden = looked_up
            .or(previous.map(|entry| entry.hidden))
            .unwrap_or(true);

        match self.window_mut(window) {
            Some(count) => {
                count.add(hidden);
                self.tabs.insert(
                    tab,
                    TabEntry {
                        hidden,
                        window: Some(window),
                    },
                );
            }
            None => {
                self.tabs.remove(&tab);
            }
        }
    }

    /// The counted slot moves from the removed id to the added one.
    pub fn on_tab_replaced(&mut self, added: TabId, removed: TabId) {
        let Some(entry) = self.tabs.remove(&removed) else {
            return;
        };
        if self.tabs.contains_key(&added) {
            // already counted through its own create event
            if let Some(window) = entry.window {
                self.release(window, entry.hidden);
            }
            return;
        }
        self.tabs.insert(added, entry);
    }

    /// A non-normal window may already have been counted through a tab event
    /// that arrived first; that count and its tabs are dropped.
    pub fn on_window_created(&mut self, window: WindowId, kind: WindowKind) {
        if kind.is_counted() {
            self.window_mut(window);
            return;
        }
        self.ignored_windows.insert(window);
        if self.windows.remove(&window).is_some() {
            self.tabs.retain(|_, entry| entry.window != Some(window));
            debug!("{} turned out to be {:?}, no longer counted", window, kind);
            self.fall_back_from(window);
        }
    }

    pub fn on_window_removed(&mut self, window: WindowId) {
        self.ignored_windows.remove(&window);
        if self.windows.remove(&window).is_some() {
            self.fall_back_from(window);
        }
    }

    /// Pick the lowest tracked window when `window` was the active one
    fn fall_back_from(&mut self, window: WindowId) {
        if self.active_window == Some(window) {
            self.active_window = self.windows.keys().next().copied();
            debug!(
                "Active {} gone, falling back to {:?}",
                window, self.active_window
            );
        }
    }

    pub fn on_activated(&mut self, window: WindowId) {
        if self.windows.contains_key(&window) {
            self.active_window = Some(window);
        }
    }

    /// Focus moved. Losing focus entirely keeps the last active window.
    pub fn on_focus_changed(&mut self, window: WindowId) {
        if !window.is_none() && self.windows.contains_key(&window) {
            self.active_window = Some(window);
        }
    }

    pub fn read_counts(&self) -> Counts {
        let current = self
            .active_window
            .and_then(|window| self.windows.get(&window))
            .copied()
            .unwrap_or_default();
        let (all_tabs, all_tabs_total) = self
            .windows
            .values()
            .fold((0, 0), |(visible, total), count| {
                (visible + count.visible, total + count.total)
            });

        Counts {
            current_window: current.visible,
            current_window_total: current.total,
            all_tabs,
            all_tabs_total,
            all_windows: self.windows.len() as u32,
        }
    }

    pub fn active_window(&self) -> Option<WindowId> {
        self.active_window
    }

    pub fn window(&self, window: WindowId) -> Option<WindowCount> {
        self.windows.get(&window).copied()
    }

    pub fn windows(&self) -> impl Iterator<Item = (WindowId, WindowCount)> + '_ {
        self.windows.iter().map(|(id, count)| (*id, *count))
    }

    /// Every tab the cache currently knows, counted or detached
    pub fn tab_ids(&self) -> impl Iterator<Item = TabId> + '_ {
        self.tabs.keys().copied()
    }

    pub fn is_hidden(&self, tab: TabId) -> Option<bool> {
        self.tabs.get(&tab).map(|entry| entry.hidden)
    }

    /// Recount every window from the tab map and compare with the stored
    /// counts. Returns the first violation found.
    pub fn check_invariants(&self) -> Result<(), CacheError> {
        let mut recount: BTreeMap<WindowId, WindowCount> = self
            .windows
            .keys()
            .map(|id| (*id, WindowCount::default()))
            .collect();
        for (tab, entry) in &self.tabs {
            let Some(window) = entry.window else {
                continue;
            };
            match recount.get_mut(&window) {
                Some(count) => count.add(entry.hidden),
                None => {
                    // the tab's window closed before its own removal arrived
                    trace!("{} still points at closed {}", tab, window);
                }
            }
        }

        for (window, count) in &self.windows {
            if count.visible > count.total {
                return Err(CacheError::VisibleExceedsTotal {
                    window: *window,
                    visible: count.visible,
                    total: count.total,
                });
            }
            let recounted = recount.get(window).copied().unwrap_or_default();
            if recounted != *count {
                return Err(CacheError::CountMismatch {
                    window: *window,
                    stored: *count,
                    recounted,
                });
            }
        }

        match self.active_window {
            Some(window) if !self.windows.contains_key(&window) => {
                Err(CacheError::ActiveUntracked(window))
            }
            None if !self.windows.is_empty() => Err(CacheError::NoActiveWindow),
            _ => Ok(()),
        }
    }
}
