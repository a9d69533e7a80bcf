//! Incremental counting versus a fresh enumeration
//!
//! Random browser activity is applied to the in-memory browser; the cache
//! follows the resulting events and must always agree with a cache seeded
//! from a full snapshot of the same browser.

use proptest::prelude::*;
use tab_counter::core::events::HostEvent;
use tab_counter::counter::{CounterCache, TabId, WindowId, WindowKind, WINDOW_ID_NONE};
use tab_counter::host::{Host, MemoryHost};

#[derive(Debug, Clone)]
enum Op {
    OpenWindow { popup: bool },
    /// First tab announced before the window, of any kind
    OpenWindowTabFirst { kind: WindowKind, hidden: bool },
    OpenTab { window: usize, hidden: bool },
    CloseTab(usize),
    SetHidden(usize, bool),
    MoveTab { tab: usize, window: usize },
    ReplaceTab(usize),
    Activate(usize),
    Focus(usize),
    FocusNone,
    CloseWindow(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        1 => any::<bool>().prop_map(|popup| Op::OpenWindow { popup }),
        1 => (window_kind(), any::<bool>())
            .prop_map(|(kind, hidden)| Op::OpenWindowTabFirst { kind, hidden }),
        4 => (any::<usize>(), any::<bool>())
            .prop_map(|(window, hidden)| Op::OpenTab { window, hidden }),
        2 => any::<usize>().prop_map(Op::CloseTab),
        2 => (any::<usize>(), any::<bool>()).prop_map(|(tab, hidden)| Op::SetHidden(tab, hidden)),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(tab, window)| Op::MoveTab { tab, window }),
        1 => any::<usize>().prop_map(Op::ReplaceTab),
        1 => any::<usize>().prop_map(Op::Activate),
        1 => any::<usize>().prop_map(Op::Focus),
        1 => Just(Op::FocusNone),
        1 => any::<usize>().prop_map(Op::CloseWindow),
    ]
}

fn window_kind() -> impl Strategy<Value = WindowKind> {
    prop_oneof![
        Just(WindowKind::Normal),
        Just(WindowKind::Popup),
        Just(WindowKind::Panel),
        Just(WindowKind::Devtools),
    ]
}

fn pick<T: Copy>(items: &[T], index: usize) -> Option<T> {
    if items.is_empty() {
        None
    } else {
        Some(items[index % items.len()])
    }
}

/// Run one op against the browser model, returning the events it produced
fn perform(
    host: &MemoryHost,
    op: &Op,
    windows: &mut Vec<WindowId>,
    tabs: &mut Vec<TabId>,
) -> Vec<HostEvent> {
    match *op {
        Op::OpenWindow { popup } => {
            let kind = if popup {
                WindowKind::Popup
            } else {
                WindowKind::Normal
            };
            let (id, event) = host.open_window(kind);
            windows.push(id);
            vec![event]
        }
        Op::OpenWindowTabFirst { kind, hidden } => {
            let (window, tab, events) = host.open_window_tab_first(kind, hidden);
            windows.push(window);
            tabs.push(tab);
            events
        }
        Op::OpenTab { window, hidden } => match pick(windows, window) {
            Some(window) => {
                let (id, event) = host.open_tab(window, hidden);
                tabs.push(id);
                vec![event]
            }
            None => Vec::new(),
        },
        Op::CloseTab(tab) => {
            let Some(tab) = pick(tabs, tab) else {
                return Vec::new();
            };
            tabs.retain(|t| *t != tab);
            host.close_tab(tab).into_iter().collect()
        }
        Op::SetHidden(tab, hidden) => pick(tabs, tab)
            .and_then(|tab| host.set_hidden(tab, hidden))
            .into_iter()
            .collect(),
        Op::MoveTab { tab, window } => match (pick(tabs, tab), pick(windows, window)) {
            (Some(tab), Some(window)) => host.move_tab(tab, window),
            _ => Vec::new(),
        },
        Op::ReplaceTab(tab) => {
            let Some(old) = pick(tabs, tab) else {
                return Vec::new();
            };
            match host.replace_tab(old) {
                Some((new, event)) => {
                    tabs.retain(|t| *t != old);
                    tabs.push(new);
                    vec![event]
                }
                None => Vec::new(),
            }
        }
        Op::Activate(tab) => pick(tabs, tab)
            .and_then(|tab| host.activate(tab))
            .into_iter()
            .collect(),
        Op::Focus(window) => pick(windows, window)
            .map(|window| host.focus(window))
            .into_iter()
            .collect(),
        Op::FocusNone => vec![host.focus(WINDOW_ID_NONE)],
        Op::CloseWindow(window) => {
            let Some(window) = pick(windows, window) else {
                return Vec::new();
            };
            windows.retain(|w| *w != window);
            let events = host.close_window(window);
            for event in &events {
                if let HostEvent::TabRemoved { tab_id, .. } = event {
                    tabs.retain(|t| t != tab_id);
                }
            }
            events
        }
    }
}

/// Feed an event to the cache the way the engine does
fn follow(cache: &mut CounterCache, host: &MemoryHost, event: HostEvent) {
    match event {
        HostEvent::TabCreated {
            tab_id,
            window_id,
            hidden,
        } => cache.on_tab_created(tab_id, window_id, hidden),
        HostEvent::TabRemoved { tab_id, .. } => cache.on_tab_removed(tab_id),
        HostEvent::TabUpdated {
            tab_id,
            hidden: Some(hidden),
            ..
        } => cache.on_tab_updated(tab_id, hidden),
        HostEvent::TabUpdated { hidden: None, .. } => {}
        HostEvent::TabAttached {
            tab_id,
            new_window_id,
            hidden,
        } => {
            let looked_up =
                hidden.or_else(|| tokio_test::block_on(host.tab_hidden(tab_id)).ok());
            cache.on_tab_attached(tab_id, new_window_id, looked_up);
        }
        HostEvent::TabDetached { tab_id, .. } => cache.on_tab_detached(tab_id),
        HostEvent::TabReplaced {
            added_tab_id,
            removed_tab_id,
        } => cache.on_tab_replaced(added_tab_id, removed_tab_id),
        HostEvent::TabActivated { window_id, .. } => cache.on_activated(window_id),
        HostEvent::WindowCreated { window_id, kind } => cache.on_window_created(window_id, kind),
        HostEvent::WindowRemoved { window_id } => cache.on_window_removed(window_id),
        HostEvent::WindowFocusChanged { window_id } => cache.on_focus_changed(window_id),
        HostEvent::SettingsChanged { .. } => {}
    }
}

fn fresh(host: &MemoryHost) -> CounterCache {
    let snapshot = tokio_test::block_on(host.snapshot()).unwrap();
    let mut cache = CounterCache::new();
    cache.initialize(&snapshot);
    cache
}

proptest! {
    #[test]
    fn incremental_counts_match_enumeration(ops in prop::collection::vec(op(), 1..120)) {
        let host = MemoryHost::new();
        let (first, _) = host.open_window(WindowKind::Normal);
        let mut windows = vec![first];
        let mut tabs = Vec::new();

        let mut cache = fresh(&host);
        for op in &ops {
            for event in perform(&host, op, &mut windows, &mut tabs) {
                follow(&mut cache, &host, event);
            }
            prop_assert_eq!(cache.check_invariants(), Ok(()), "after {:?}", op);

            let oracle = fresh(&host);
            let incremental = cache.read_counts();
            let expected = oracle.read_counts();
            prop_assert_eq!(incremental.all_tabs, expected.all_tabs, "after {:?}", op);
            prop_assert_eq!(
                incremental.all_tabs_total,
                expected.all_tabs_total,
                "after {:?}",
                op
            );
            prop_assert_eq!(incremental.all_windows, expected.all_windows, "after {:?}", op);
            prop_assert_eq!(
                cache.windows().collect::<Vec<_>>(),
                oracle.windows().collect::<Vec<_>>(),
                "after {:?}",
                op
            );
        }
    }

    #[test]
    fn visible_never_exceeds_total(ops in prop::collection::vec(op(), 1..60)) {
        let host = MemoryHost::new();
        let (first, _) = host.open_window(WindowKind::Normal);
        let mut windows = vec![first];
        let mut tabs = Vec::new();
        let mut cache = fresh(&host);

        for op in &ops {
            for event in perform(&host, op, &mut windows, &mut tabs) {
                follow(&mut cache, &host, event);
            }
            let counts = cache.read_counts();
            prop_assert!(counts.current_window <= counts.current_window_total);
            prop_assert!(counts.all_tabs <= counts.all_tabs_total);
        }
    }
}
