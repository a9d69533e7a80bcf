//! In-process browser model
//!
//! Keeps a small window/tab model that answers queries the way the browser
//! would, and records every command instead of drawing anything. Helpers such
//! as [`MemoryHost::open_tab`] update the model and return the event the
//! browser would have sent, so callers can feed it to the engine.

use super::{Host, HostError};
use crate::core::events::HostEvent;
use crate::counter::{Snapshot, TabId, TabInfo, WindowId, WindowInfo, WindowKind};
use crate::icon::IconFrames;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

/// One recorded browser action call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    SetIconFrames { tab: Option<TabId> },
    SetIconPath { tab: Option<TabId>, path: String },
    SetBadgeText { tab: Option<TabId>, text: String },
    SetBadgeBackground { color: String },
    SetBadgeTextColor { color: Option<String> },
    SetTitle { tab: Option<TabId>, title: String },
}

impl HostCall {
    pub fn tab(&self) -> Option<TabId> {
        match self {
            HostCall::SetIconFrames { tab }
            | HostCall::SetIconPath { tab, .. }
            | HostCall::SetBadgeText { tab, .. }
            | HostCall::SetTitle { tab, .. } => *tab,
            HostCall::SetBadgeBackground { .. } | HostCall::SetBadgeTextColor { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
struct MemWindow {
    kind: WindowKind,
    tabs: Vec<TabId>,
    active: Option<TabId>,
}

#[derive(Debug, Clone, Copy)]
struct MemTab {
    window: Option<WindowId>,
    hidden: bool,
}

#[derive(Debug, Default)]
struct State {
    windows: BTreeMap<WindowId, MemWindow>,
    tabs: HashMap<TabId, MemTab>,
    /// Last focused window; kept when focus leaves the browser
    current: Option<WindowId>,
    next_tab: i64,
    next_window: i64,
    calls: Vec<HostCall>,
    fail_queries: bool,
    fail_commands: bool,
}

impl State {
    fn window_mut(&mut self, window: WindowId) -> &mut MemWindow {
        self.windows.entry(window).or_insert_with(|| MemWindow {
            kind: WindowKind::Normal,
            tabs: Vec::new(),
            active: None,
        })
    }

    fn detach(&mut self, tab: TabId) {
        let Some(window) = self.tabs.get_mut(&tab).and_then(|t| t.window.take()) else {
            return;
        };
        if let Some(w) = self.windows.get_mut(&window) {
            w.tabs.retain(|t| *t != tab);
            if w.active == Some(tab) {
                w.active = None;
            }
        }
    }

    fn attach(&mut self, tab: TabId, window: WindowId, hidden: Option<bool>) {
        self.detach(tab);
        let entry = self.tabs.entry(tab).or_insert(MemTab {
            window: None,
            hidden: false,
        });
        entry.window = Some(window);
        if let Some(hidden) = hidden {
            entry.hidden = hidden;
        }
        let w = self.window_mut(window);
        if !w.tabs.contains(&tab) {
            w.tabs.push(tab);
        }
        if self.current.is_none() {
            self.current = Some(window);
        }
    }

    fn remove_tab(&mut self, tab: TabId) {
        self.detach(tab);
        self.tabs.remove(&tab);
    }

    fn apply(&mut self, event: &HostEvent) {
        match *event {
            HostEvent::TabCreated {
                tab_id,
                window_id,
                hidden,
            } => self.attach(tab_id, window_id, Some(hidden)),
            HostEvent::TabRemoved { tab_id, .. } => self.remove_tab(tab_id),
            HostEvent::TabUpdated {
                tab_id,
                hidden: Some(hidden),
                ..
            } => {
                if let Some(tab) = self.tabs.get_mut(&tab_id) {
                    tab.hidden = hidden;
                }
            }
            HostEvent::TabUpdated { hidden: None, .. } => {}
            HostEvent::TabAttached {
                tab_id,
                new_window_id,
                hidden,
            } => self.attach(tab_id, new_window_id, hidden),
            HostEvent::TabDetached { tab_id, .. } => self.detach(tab_id),
            HostEvent::TabReplaced {
                added_tab_id,
                removed_tab_id,
            } => {
                let Some(old) = self.tabs.remove(&removed_tab_id) else {
                    return;
                };
                self.tabs.insert(added_tab_id, old);
                if let Some(w) = old.window.and_then(|id| self.windows.get_mut(&id)) {
                    for tab in w.tabs.iter_mut().filter(|t| **t == removed_tab_id) {
                        *tab = added_tab_id;
                    }
                    if w.active == Some(removed_tab_id) {
                        w.active = Some(added_tab_id);
                    }
                }
            }
            HostEvent::TabActivated { tab_id, window_id } => {
                self.window_mut(window_id).active = Some(tab_id);
            }
            HostEvent::WindowCreated { window_id, kind } => {
                self.window_mut(window_id).kind = kind;
            }
            HostEvent::WindowRemoved { window_id } => {
                if let Some(w) = self.windows.remove(&window_id) {
                    for tab in w.tabs {
                        self.tabs.remove(&tab);
                    }
                }
                if self.current == Some(window_id) {
                    self.current = self.windows.keys().next().copied();
                }
            }
            HostEvent::WindowFocusChanged { window_id } => {
                if !window_id.is_none() {
                    self.current = Some(window_id);
                }
            }
            HostEvent::SettingsChanged { .. } => {}
        }
        self.next_tab = self.next_tab.max(self.tabs.keys().map(|t| t.0).max().unwrap_or(0));
        self.next_window = self
            .next_window
            .max(self.windows.keys().map(|w| w.0).max().unwrap_or(0));
    }

    fn record(&mut self, call: HostCall) -> Result<(), HostError> {
        if self.fail_commands {
            return Err(HostError::Rejected("command failure injected".into()));
        }
        if let Some(tab) = call.tab() {
            if !self.tabs.contains_key(&tab) {
                return Err(HostError::NoSuchTab(tab));
            }
        }
        self.calls.push(call);
        Ok(())
    }

    fn check_queries(&self) -> Result<(), HostError> {
        if self.fail_queries {
            return Err(HostError::Rejected("query failure injected".into()));
        }
        Ok(())
    }
}

/// [`Host`] over an in-memory window/tab model.
#[derive(Debug, Default)]
pub struct MemoryHost {
    state: Mutex<State>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the model as if the browser had sent `event`
    pub fn apply(&self, event: &HostEvent) {
        self.state.lock().apply(event);
    }

    fn emit(&self, event: HostEvent) -> HostEvent {
        self.apply(&event);
        event
    }

    pub fn open_window(&self, kind: WindowKind) -> (WindowId, HostEvent) {
        let id = {
            let mut state = self.state.lock();
            state.next_window += 1;
            WindowId(state.next_window)
        };
        let event = self.emit(HostEvent::WindowCreated {
            window_id: id,
            kind,
        });
        (id, event)
    }

    pub fn open_tab(&self, window: WindowId, hidden: bool) -> (TabId, HostEvent) {
        let id = {
            let mut state = self.state.lock();
            state.next_tab += 1;
            TabId(state.next_tab)
        };
        let event = self.emit(HostEvent::TabCreated {
            tab_id: id,
            window_id: window,
            hidden,
        });
        (id, event)
    }

    /// Open a window whose first tab is announced before the window itself,
    /// as browsers do when a tab is torn off or a popup is opened
    pub fn open_window_tab_first(
        &self,
        kind: WindowKind,
        hidden: bool,
    ) -> (WindowId, TabId, Vec<HostEvent>) {
        let id = {
            let mut state = self.state.lock();
            state.next_window += 1;
            WindowId(state.next_window)
        };
        let (tab, created) = self.open_tab(id, hidden);
        let announced = self.emit(HostEvent::WindowCreated {
            window_id: id,
            kind,
        });
        (id, tab, vec![created, announced])
    }

    pub fn close_tab(&self, tab: TabId) -> Option<HostEvent> {
        let window = self.state.lock().tabs.get(&tab)?.window?;
        Some(self.emit(HostEvent::TabRemoved {
            tab_id: tab,
            window_id: window,
            is_window_closing: false,
        }))
    }

    pub fn set_hidden(&self, tab: TabId, hidden: bool) -> Option<HostEvent> {
        let window = self.state.lock().tabs.get(&tab)?.window?;
        Some(self.emit(HostEvent::TabUpdated {
            tab_id: tab,
            window_id: window,
            hidden: Some(hidden),
        }))
    }

    /// Detach then attach; the attach event leaves `hidden` for the engine to
    /// look up
    pub fn move_tab(&self, tab: TabId, to: WindowId) -> Vec<HostEvent> {
        let Some(from) = self.state.lock().tabs.get(&tab).and_then(|t| t.window) else {
            return Vec::new();
        };
        vec![
            self.emit(HostEvent::TabDetached {
                tab_id: tab,
                old_window_id: from,
            }),
            self.emit(HostEvent::TabAttached {
                tab_id: tab,
                new_window_id: to,
                hidden: None,
            }),
        ]
    }

    pub fn replace_tab(&self, old: TabId) -> Option<(TabId, HostEvent)> {
        let id = {
            let mut state = self.state.lock();
            if !state.tabs.contains_key(&old) {
                return None;
            }
            state.next_tab += 1;
            TabId(state.next_tab)
        };
        let event = self.emit(HostEvent::TabReplaced {
            added_tab_id: id,
            removed_tab_id: old,
        });
        Some((id, event))
    }

    pub fn activate(&self, tab: TabId) -> Option<HostEvent> {
        let window = self.state.lock().tabs.get(&tab)?.window?;
        Some(self.emit(HostEvent::TabActivated {
            tab_id: tab,
            window_id: window,
        }))
    }

    /// `WINDOW_ID_NONE` means focus left the browser
    pub fn focus(&self, window: WindowId) -> HostEvent {
        self.emit(HostEvent::WindowFocusChanged { window_id: window })
    }

    /// Tab removals (flagged as window closing) followed by the window removal
    pub fn close_window(&self, window: WindowId) -> Vec<HostEvent> {
        let tabs = match self.state.lock().windows.get(&window) {
            Some(w) => w.tabs.clone(),
            None => return Vec::new(),
        };
        let mut events: Vec<HostEvent> = tabs
            .into_iter()
            .map(|tab| {
                self.emit(HostEvent::TabRemoved {
                    tab_id: tab,
                    window_id: window,
                    is_window_closing: true,
                })
            })
            .collect();
        events.push(self.emit(HostEvent::WindowRemoved { window_id: window }));
        events
    }

    pub fn set_fail_queries(&self, fail: bool) {
        self.state.lock().fail_queries = fail;
    }

    pub fn set_fail_commands(&self, fail: bool) {
        self.state.lock().fail_commands = fail;
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.state.lock().calls.clone()
    }

    pub fn take_calls(&self) -> Vec<HostCall> {
        std::mem::take(&mut self.state.lock().calls)
    }

    /// Latest badge text set for `tab` (`None` = global)
    pub fn badge_text(&self, tab: Option<TabId>) -> Option<String> {
        self.state.lock().calls.iter().rev().find_map(|call| match call {
            HostCall::SetBadgeText { tab: t, text } if *t == tab => Some(text.clone()),
            _ => None,
        })
    }

    /// Latest title set for `tab` (`None` = global)
    pub fn title(&self, tab: Option<TabId>) -> Option<String> {
        self.state.lock().calls.iter().rev().find_map(|call| match call {
            HostCall::SetTitle { tab: t, title } if *t == tab => Some(title.clone()),
            _ => None,
        })
    }

    /// Latest icon path set for `tab` (`None` = global)
    pub fn icon_path(&self, tab: Option<TabId>) -> Option<String> {
        self.state.lock().calls.iter().rev().find_map(|call| match call {
            HostCall::SetIconPath { tab: t, path } if *t == tab => Some(path.clone()),
            _ => None,
        })
    }

    /// How many icon images were pushed for `tab`
    pub fn frame_count(&self, tab: TabId) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, HostCall::SetIconFrames { tab: Some(t) } if *t == tab))
            .count()
    }
}

impl Host for MemoryHost {
    async fn snapshot(&self) -> Result<Snapshot, HostError> {
        let state = self.state.lock();
        state.check_queries()?;
        let windows = state
            .windows
            .iter()
            .map(|(id, w)| WindowInfo {
                id: *id,
                kind: w.kind,
                focused: state.current == Some(*id),
                tabs: w
                    .tabs
                    .iter()
                    .map(|tab| TabInfo {
                        id: *tab,
                        hidden: state.tabs.get(tab).is_some_and(|t| t.hidden),
                    })
                    .collect(),
            })
            .collect();
        Ok(Snapshot { windows })
    }

    async fn active_tab(&self) -> Result<Option<TabId>, HostError> {
        let state = self.state.lock();
        state.check_queries()?;
        let Some(window) = state.current.and_then(|id| state.windows.get(&id)) else {
            return Ok(None);
        };
        Ok(window.active.or_else(|| window.tabs.first().copied()))
    }

    async fn tab_hidden(&self, tab: TabId) -> Result<bool, HostError> {
        let state = self.state.lock();
        state.check_queries()?;
        state
            .tabs
            .get(&tab)
            .map(|t| t.hidden)
            .ok_or(HostError::NoSuchTab(tab))
    }

    async fn set_icon_frames(
        &self,
        tab: Option<TabId>,
        _frames: &IconFrames,
    ) -> Result<(), HostError> {
        self.state.lock().record(HostCall::SetIconFrames { tab })
    }

    async fn set_icon_path(&self, tab: Option<TabId>, path: &str) -> Result<(), HostError> {
        self.state.lock().record(HostCall::SetIconPath {
            tab,
            path: path.to_string(),
        })
    }

    async fn set_badge_text(&self, tab: Option<TabId>, text: &str) -> Result<(), HostError> {
        self.state.lock().record(HostCall::SetBadgeText {
            tab,
            text: text.to_string(),
        })
    }

    async fn set_badge_background(&self, color: &str) -> Result<(), HostError> {
        self.state.lock().record(HostCall::SetBadgeBackground {
            color: color.to_string(),
        })
    }

    async fn set_badge_text_color(&self, color: Option<&str>) -> Result<(), HostError> {
        self.state.lock().record(HostCall::SetBadgeTextColor {
            color: color.map(str::to_string),
        })
    }

    async fn set_title(&self, tab: Option<TabId>, title: &str) -> Result<(), HostError> {
        self.state.lock().record(HostCall::SetTitle {
            tab,
            title: title.to_string(),
        })
    }
}
