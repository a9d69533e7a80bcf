//! Engine scenarios against the in-memory browser

use std::sync::Arc;
use std::time::Duration;
use tab_counter::core::settings::Settings;
use tab_counter::counter::{TabId, WindowKind, WINDOW_ID_NONE};
use tab_counter::host::{HostCall, MemoryHost};
use tab_counter::icon::{FontBook, PanScheduler};
use tab_counter::paint::TITLE;
use tab_counter::{Config, Engine, HostEvent, PaintOutcome, PaintPlan};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Longer than both the debounce and the activation window
const SETTLE: Duration = Duration::from_millis(1001);

fn engine_for(host: &Arc<MemoryHost>, settings: Settings) -> Engine<MemoryHost> {
    Engine::new(Arc::clone(host), &Config::default())
        .with_settings(settings)
        .with_pans(PanScheduler::new(FontBook::builtin()))
}

fn all_tabs() -> Settings {
    Settings {
        counter: 1,
        ..Settings::default()
    }
}

async fn feed(
    engine: &mut Engine<MemoryHost>,
    events: Vec<HostEvent>,
    now: &mut Instant,
) -> Option<PaintOutcome> {
    for event in events {
        engine.handle_event(event, *now).await;
    }
    *now += SETTLE;
    engine.step(*now).await
}

fn badge(text: &str) -> Option<PaintOutcome> {
    Some(PaintOutcome::Painted(PaintPlan::Badge { text: text.into() }))
}

#[tokio::test]
async fn test_open_and_close_tabs() {
    let host = Arc::new(MemoryHost::new());
    let (w1, _) = host.open_window(WindowKind::Normal);
    let (first, _) = host.open_tab(w1, false);
    let mut engine = engine_for(&host, Settings::default());
    let mut now = Instant::now();
    engine.initialize(now).await;
    assert_eq!(host.badge_text(Some(first)).as_deref(), Some("1"));

    let (second, created) = host.open_tab(w1, false);
    assert_eq!(feed(&mut engine, vec![created], &mut now).await, badge("2"));

    let removed = host.close_tab(second).unwrap();
    assert_eq!(feed(&mut engine, vec![removed], &mut now).await, badge("1"));
    assert_eq!(host.badge_text(Some(first)).as_deref(), Some("1"));
}

#[tokio::test]
async fn test_current_window_of_two() {
    let host = Arc::new(MemoryHost::new());
    let (w1, _) = host.open_window(WindowKind::Normal);
    let (w2, _) = host.open_window(WindowKind::Normal);
    let first = host.open_tab(w1, false).0;
    for _ in 0..2 {
        host.open_tab(w1, false);
    }
    for _ in 0..5 {
        host.open_tab(w2, false);
    }
    let mut engine = engine_for(&host, Settings::default());

    assert_eq!(
        engine.initialize(Instant::now()).await,
        PaintOutcome::Painted(PaintPlan::Badge { text: "3".into() })
    );
    assert_eq!(host.badge_text(Some(first)).as_deref(), Some("3"));
    assert_eq!(host.frame_count(first), 0);
    assert_eq!(engine.counts().all_tabs, 8);
}

#[tokio::test]
async fn test_hidden_tabs_are_not_counted() {
    let host = Arc::new(MemoryHost::new());
    let (w1, _) = host.open_window(WindowKind::Normal);
    let (first, _) = host.open_tab(w1, false);
    let (other, _) = host.open_tab(w1, false);
    let mut engine = engine_for(&host, Settings::default());
    let mut now = Instant::now();
    engine.initialize(now).await;

    let hide = host.set_hidden(other, true).unwrap();
    assert_eq!(feed(&mut engine, vec![hide], &mut now).await, badge("1"));
    let title = host.title(Some(first)).unwrap();
    assert!(title.starts_with(TITLE));
    assert!(title.ends_with("Hidden tabs: 1"));

    let show = host.set_hidden(other, false).unwrap();
    assert_eq!(feed(&mut engine, vec![show], &mut now).await, badge("2"));
    assert!(!host.title(Some(first)).unwrap().contains("Hidden"));
}

#[tokio::test]
async fn test_moving_tabs_looks_up_visibility() {
    let host = Arc::new(MemoryHost::new());
    let (w1, _) = host.open_window(WindowKind::Normal);
    let (w2, _) = host.open_window(WindowKind::Normal);
    host.open_tab(w1, false);
    let (hidden, _) = host.open_tab(w1, true);
    host.open_tab(w2, false);
    let mut engine = engine_for(&host, all_tabs());
    let mut now = Instant::now();
    engine.initialize(now).await;

    let events = host.move_tab(hidden, w2);
    feed(&mut engine, events, &mut now).await;

    let moved_into = engine.cache().window(w2).unwrap();
    assert_eq!((moved_into.visible, moved_into.total), (1, 2));
    let moved_from = engine.cache().window(w1).unwrap();
    assert_eq!((moved_from.visible, moved_from.total), (1, 1));
    assert_eq!(engine.cache().is_hidden(hidden), Some(true));
}

#[tokio::test]
async fn test_closing_a_window() {
    let host = Arc::new(MemoryHost::new());
    let (w1, _) = host.open_window(WindowKind::Normal);
    let (w2, _) = host.open_window(WindowKind::Normal);
    let (kept, _) = host.open_tab(w1, false);
    host.open_tab(w2, false);
    host.open_tab(w2, false);
    let mut engine = engine_for(
        &host,
        Settings {
            counter: 4,
            ..Settings::default()
        },
    );
    let mut now = Instant::now();
    assert_eq!(
        engine.initialize(now).await,
        PaintOutcome::Painted(PaintPlan::Badge { text: "2".into() })
    );

    let events = host.close_window(w2);
    assert_eq!(events.len(), 3);
    assert_eq!(feed(&mut engine, events, &mut now).await, badge("1"));
    assert_eq!(engine.counts().all_tabs, 1);
    assert_eq!(host.badge_text(Some(kept)).as_deref(), Some("1"));
}

#[tokio::test]
async fn test_popup_windows_are_ignored() {
    let host = Arc::new(MemoryHost::new());
    let (w1, _) = host.open_window(WindowKind::Normal);
    host.open_tab(w1, false);
    let mut engine = engine_for(&host, all_tabs());
    let mut now = Instant::now();
    engine.initialize(now).await;

    let (popup, opened) = host.open_window(WindowKind::Popup);
    let (_, created) = host.open_tab(popup, false);
    feed(&mut engine, vec![opened, created], &mut now).await;

    let counts = engine.counts();
    assert_eq!(counts.all_tabs, 1);
    assert_eq!(counts.all_windows, 1);
}

#[tokio::test]
async fn test_large_count_pans_then_returns_to_badge() {
    let host = Arc::new(MemoryHost::new());
    let (w1, _) = host.open_window(WindowKind::Normal);
    let mut last = TabId(0);
    for _ in 0..1000 {
        last = host.open_tab(w1, false).0;
    }
    let active = TabId(1);
    let mut engine = engine_for(&host, all_tabs());
    let mut now = Instant::now();

    assert_eq!(
        engine.initialize(now).await,
        PaintOutcome::Painted(PaintPlan::Animated {
            text: "1000".into()
        })
    );
    assert_eq!(host.badge_text(Some(active)).as_deref(), Some(""));
    assert_eq!(host.frame_count(active), 1);
    assert!(engine.pans().is_running(active));

    // the animation keeps pushing frames on its own
    now += Duration::from_millis(100);
    assert_eq!(engine.step(now).await, None);
    assert_eq!(host.frame_count(active), 2);

    let removed = host.close_tab(last).unwrap();
    assert_eq!(feed(&mut engine, vec![removed], &mut now).await, badge("999"));
    assert!(!engine.pans().owns_icon(active));
    assert_eq!(
        host.icon_path(Some(active)).as_deref(),
        Some("icons/tabcounter.plain.min.svg")
    );
    assert_eq!(host.badge_text(Some(active)).as_deref(), Some("999"));
}

#[tokio::test]
async fn test_focus_loss_pauses_and_focus_gain_resumes() {
    let host = Arc::new(MemoryHost::new());
    let (w1, _) = host.open_window(WindowKind::Normal);
    for _ in 0..1200 {
        host.open_tab(w1, false);
    }
    let active = TabId(1);
    let mut engine = engine_for(&host, all_tabs());
    let mut now = Instant::now();
    engine.initialize(now).await;
    assert!(engine.pans().is_running(active));

    now += Duration::from_millis(600);
    engine.step(now).await;
    let phase = engine.pans().phase(active, now).unwrap();

    let lost = host.focus(WINDOW_ID_NONE);
    engine.handle_event(lost, now).await;
    assert!(engine.pans().is_paused(active));
    assert!(!engine.is_paint_pending());

    // nothing moves while paused
    now += Duration::from_secs(5);
    let frames = host.frame_count(active);
    assert_eq!(engine.step(now).await, None);
    assert_eq!(host.frame_count(active), frames);
    assert_eq!(engine.pans().phase(active, now), Some(phase));

    let gained = host.focus(w1);
    engine.handle_event(gained, now).await;
    assert!(engine.pans().is_running(active));
    assert_eq!(host.frame_count(active), frames + 1);
    assert!((engine.pans().phase(active, now).unwrap() - phase).abs() < 1e-6);
}

#[tokio::test]
async fn test_switching_tabs_pauses_the_hidden_pan() {
    let host = Arc::new(MemoryHost::new());
    let (w1, _) = host.open_window(WindowKind::Normal);
    for _ in 0..1000 {
        host.open_tab(w1, false);
    }
    let (first, second) = (TabId(1), TabId(2));
    let mut engine = engine_for(&host, all_tabs());
    let mut now = Instant::now();
    engine.initialize(now).await;
    assert!(engine.pans().is_running(first));

    let activated = host.activate(second).unwrap();
    let outcome = feed(&mut engine, vec![activated], &mut now).await;
    assert_eq!(
        outcome,
        Some(PaintOutcome::Painted(PaintPlan::Animated {
            text: "1000".into()
        }))
    );
    assert!(engine.pans().is_paused(first));
    assert!(engine.pans().is_running(second));

    // only the visible tab keeps receiving frames
    let frames = host.frame_count(first);
    now += Duration::from_millis(500);
    engine.step(now).await;
    assert_eq!(host.frame_count(first), frames);
    assert!(host.frame_count(second) >= 2);

    let back = host.activate(first).unwrap();
    feed(&mut engine, vec![back], &mut now).await;
    assert!(engine.pans().is_running(first));
    assert!(engine.pans().is_paused(second));
    assert_eq!(host.frame_count(first), frames + 1);
}

#[tokio::test]
async fn test_disabling_clears_everything() {
    let host = Arc::new(MemoryHost::new());
    let (w1, _) = host.open_window(WindowKind::Normal);
    let (w2, _) = host.open_window(WindowKind::Normal);
    let tabs = [
        host.open_tab(w1, false).0,
        host.open_tab(w1, false).0,
        host.open_tab(w2, false).0,
    ];
    let mut engine = engine_for(&host, Settings::default());
    let mut now = Instant::now();
    engine.initialize(now).await;
    host.take_calls();

    let disable = HostEvent::SettingsChanged {
        settings: Some(Settings {
            counter: 3,
            ..Settings::default()
        }),
    };
    assert_eq!(
        feed(&mut engine, vec![disable], &mut now).await,
        Some(PaintOutcome::Disabled)
    );

    assert_eq!(host.badge_text(None).as_deref(), Some(""));
    assert_eq!(host.title(None).as_deref(), Some(TITLE));
    for tab in tabs {
        assert_eq!(host.badge_text(Some(tab)).as_deref(), Some(""));
        assert_eq!(host.title(Some(tab)).as_deref(), Some(TITLE));
    }

    // counting continues while disabled
    let (_, created) = host.open_tab(w1, false);
    feed(&mut engine, vec![created], &mut now).await;
    assert_eq!(engine.counts().current_window, 3);

    let enable = HostEvent::SettingsChanged {
        settings: Some(Settings::default()),
    };
    assert_eq!(feed(&mut engine, vec![enable], &mut now).await, badge("3"));
}

#[tokio::test]
async fn test_settings_apply_badge_colors() {
    let host = Arc::new(MemoryHost::new());
    let (w1, _) = host.open_window(WindowKind::Normal);
    host.open_tab(w1, false);
    let mut engine = engine_for(&host, Settings::default());
    let mut now = Instant::now();
    engine.initialize(now).await;
    host.take_calls();

    let changed = HostEvent::SettingsChanged {
        settings: Some(Settings {
            badge_color: "#336699".into(),
            badge_text_color: Some("#ffffff".into()),
            icon: "tabcounter.custom.svg".into(),
            ..Settings::default()
        }),
    };
    feed(&mut engine, vec![changed], &mut now).await;

    let calls = host.calls();
    assert!(calls.contains(&HostCall::SetBadgeBackground {
        color: "#336699".into()
    }));
    assert!(calls.contains(&HostCall::SetBadgeTextColor {
        color: Some("#ffffff".into())
    }));
    assert_eq!(
        host.icon_path(None).as_deref(),
        Some("icons/tabcounter.custom.svg")
    );
    assert_eq!(engine.settings().version, env!("CARGO_PKG_VERSION"));

    let auto = HostEvent::SettingsChanged {
        settings: Some(Settings {
            badge_text_color: Some("#ffffff".into()),
            badge_text_color_auto: true,
            ..Settings::default()
        }),
    };
    feed(&mut engine, vec![auto], &mut now).await;
    assert_eq!(
        host.calls().iter().rev().find(|call| matches!(call, HostCall::SetBadgeTextColor { .. })),
        Some(&HostCall::SetBadgeTextColor { color: None })
    );
}

#[tokio::test]
async fn test_recorded_event_log() {
    let fixture = include_str!("../fixtures/events/two_windows.jsonl");

    let host = Arc::new(MemoryHost::new());
    let mut engine = engine_for(&host, Settings::default());
    let mut now = Instant::now();
    engine.initialize(now).await;

    for line in fixture.lines().filter(|line| !line.trim().is_empty()) {
        let event: HostEvent = serde_json::from_str(line).unwrap();
        host.apply(&event);
        feed(&mut engine, vec![event], &mut now).await;
        assert_eq!(engine.cache().check_invariants(), Ok(()));
    }

    let counts = engine.counts();
    assert_eq!(counts.current_window, 3);
    assert_eq!(counts.all_tabs, 3);
    assert_eq!(counts.all_tabs_total, 3);
    assert_eq!(counts.all_windows, 1);
    assert_eq!(host.badge_text(Some(TabId(6))).as_deref(), Some("3"));
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_coalesces_a_burst() {
    let host = Arc::new(MemoryHost::new());
    let (w1, _) = host.open_window(WindowKind::Normal);
    let (first, _) = host.open_tab(w1, false);
    let mut engine = engine_for(&host, Settings::default());
    engine.initialize(Instant::now()).await;
    host.take_calls();

    let (tx, rx) = mpsc::unbounded_channel();
    let driver_host = Arc::clone(&host);
    let driver = async move {
        for _ in 0..5 {
            let (_, created) = driver_host.open_tab(w1, false);
            tx.send(created).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        drop(tx);
    };
    tokio::join!(engine.run(rx), driver);

    assert_eq!(host.badge_text(Some(first)).as_deref(), Some("6"));
    let badge_writes = host
        .calls()
        .iter()
        .filter(|call| matches!(call, HostCall::SetBadgeText { tab: Some(_), .. }))
        .count();
    assert_eq!(badge_writes, 1);
}
