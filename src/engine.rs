//! Event loop tying the counter cache, paint scheduling and pans together
//!
//! The engine owns all mutable state. Browser events update the cache
//! synchronously and request a paint; paints are debounced, and the only
//! async gap inside a paint (asking for the active tab) is re-validated with
//! the paint generation before anything tab-specific is written.

use crate::core::config::Config;
use crate::core::events::HostEvent;
use crate::core::settings::{Settings, SettingsStore};
use crate::counter::{CounterCache, Counts, TabId};
use crate::host::{Host, HostError};
use crate::icon::{FontBook, IconFrames, PanScheduler, PanStart, StyleOptions};
use crate::paint::{decide, tooltip, CounterMode, PaintCoordinator, PaintPlan, PaintTicket, TITLE};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Badge text shown until the first paint
pub const STARTUP_BADGE: &str = "wait";

/// Badge background shown until settings are applied
const STARTUP_BADGE_COLOR: &str = "#000000";

/// Result of one paint attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaintOutcome {
    Painted(PaintPlan),
    /// Newer events arrived while the paint was waiting on the browser
    Stale,
    NoActiveTab,
    Disabled,
}

/// Data a paint carries across its async gap
type PaintResult = (PaintTicket, PaintPlan, Counts, Result<Option<TabId>, HostError>);
type InFlight = Pin<Box<dyn Future<Output = PaintResult>>>;

/// Single owner of the counter state and everything painted from it.
pub struct Engine<H: Host> {
    host: Arc<H>,
    cache: CounterCache,
    pans: PanScheduler,
    paint: PaintCoordinator,
    settings: Settings,
    store: Option<SettingsStore>,
    style: &'static StyleOptions,
    fps: u32,
}

impl<H: Host + 'static> Engine<H> {
    pub fn new(host: Arc<H>, config: &Config) -> Self {
        Self {
            host,
            cache: CounterCache::new(),
            pans: PanScheduler::new(FontBook::new(config.font.backend)),
            paint: PaintCoordinator::new(&config.paint),
            settings: Settings::default(),
            store: None,
            style: config.pan.style.options(),
            fps: config.pan.fps,
        }
    }

    /// Persist settings to `store`, loading the stored ones now
    pub fn with_store(mut self, store: SettingsStore) -> Self {
        match store.load() {
            Ok(settings) => self.settings = settings,
            Err(e) => warn!("Failed to load settings, using defaults: {:#}", e),
        }
        self.store = Some(store);
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_pans(mut self, pans: PanScheduler) -> Self {
        self.pans = pans;
        self
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    pub fn cache(&self) -> &CounterCache {
        &self.cache
    }

    pub fn pans(&self) -> &PanScheduler {
        &self.pans
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn counts(&self) -> Counts {
        self.cache.read_counts()
    }

    pub fn is_paint_pending(&self) -> bool {
        self.paint.is_pending()
    }

    /// Show the startup badge, seed the cache, apply settings and paint once.
    pub async fn initialize(&mut self, now: Instant) -> PaintOutcome {
        log_host(
            self.host.set_badge_text(None, STARTUP_BADGE).await,
            "startup badge",
        );
        log_host(
            self.host.set_badge_background(STARTUP_BADGE_COLOR).await,
            "startup badge color",
        );

        match self.host.snapshot().await {
            Ok(snapshot) => {
                self.cache.initialize(&snapshot);
                info!(
                    "Seeded counter with {} window(s), {} tab(s)",
                    snapshot.windows.len(),
                    snapshot.tab_count()
                );
            }
            Err(e) => warn!("Failed to enumerate tabs, starting empty: {}", e),
        }

        self.apply_settings().await;
        self.paint_now(now).await
    }

    /// Apply one browser event to the cache and request whatever paint it
    /// needs.
    pub async fn handle_event(&mut self, event: HostEvent, now: Instant) {
        trace!("Handling {}", event.name());
        self.route_event(event, now).await;
        debug_assert_eq!(self.cache.check_invariants(), Ok(()));
    }

    async fn route_event(&mut self, event: HostEvent, now: Instant) {
        match event {
            HostEvent::TabCreated {
                tab_id,
                window_id,
                hidden,
            } => {
                self.cache.on_tab_created(tab_id, window_id, hidden);
                self.paint.schedule_paint(now);
            }
            HostEvent::TabRemoved { tab_id, .. } => {
                self.cache.on_tab_removed(tab_id);
                self.pans.forget(tab_id);
                self.paint.schedule_paint(now);
            }
            HostEvent::TabUpdated {
                tab_id,
                hidden: Some(hidden),
                ..
            } => {
                self.cache.on_tab_updated(tab_id, hidden);
                self.paint.schedule_paint(now);
            }
            HostEvent::TabUpdated { hidden: None, .. } => {}
            HostEvent::TabAttached {
                tab_id,
                new_window_id,
                hidden,
            } => {
                let looked_up = match hidden {
                    Some(hidden) => Some(hidden),
                    None => match self.host.tab_hidden(tab_id).await {
                        Ok(hidden) => Some(hidden),
                        Err(e) => {
                            debug!("Visibility lookup for {} failed: {}", tab_id, e);
                            None
                        }
                    },
                };
                self.cache.on_tab_attached(tab_id, new_window_id, looked_up);
                self.paint.schedule_paint(now);
            }
            HostEvent::TabDetached { tab_id, .. } => {
                self.cache.on_tab_detached(tab_id);
                self.paint.schedule_paint(now);
            }
            HostEvent::TabReplaced {
                added_tab_id,
                removed_tab_id,
            } => {
                self.cache.on_tab_replaced(added_tab_id, removed_tab_id);
                self.pans.forget(removed_tab_id);
                self.paint.schedule_paint(now);
            }
            HostEvent::TabActivated { tab_id, window_id } => {
                self.cache.on_activated(window_id);
                self.pans.pause_others(tab_id, now);
                self.paint.schedule_activation_paint(now);
            }
            HostEvent::WindowCreated { window_id, kind } => {
                self.cache.on_window_created(window_id, kind);
                self.paint.schedule_paint(now);
            }
            HostEvent::WindowRemoved { window_id } => {
                self.cache.on_window_removed(window_id);
                self.paint.schedule_paint(now);
            }
            HostEvent::WindowFocusChanged { window_id } => {
                self.cache.on_focus_changed(window_id);
                if window_id.is_none() {
                    self.pans.pause_all(now);
                    return;
                }
                match self.host.active_tab().await {
                    Ok(Some(tab)) if self.pans.is_paused(tab) => {
                        if let Some(frames) = self.pans.resume(tab, now) {
                            self.push_frames(tab, &frames).await;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => debug!("Active tab lookup on focus failed: {}", e),
                }
                self.paint.schedule_paint(now);
            }
            HostEvent::SettingsChanged { settings } => {
                self.update_settings(settings);
                self.apply_settings().await;
                self.paint.schedule_paint(now);
            }
        }
    }

    fn update_settings(&mut self, settings: Option<Settings>) {
        match (settings, &self.store) {
            (Some(mut settings), store) => {
                settings.stamp_version();
                if let Some(store) = store {
                    if let Err(e) = store.save(&settings) {
                        warn!("Failed to save settings: {:#}", e);
                    }
                }
                self.settings = settings;
            }
            (None, Some(store)) => match store.load() {
                Ok(settings) => self.settings = settings,
                Err(e) => warn!("Failed to reload settings: {:#}", e),
            },
            (None, None) => {}
        }
        debug!("Settings now {:?}", self.settings);
    }

    /// Push badge colors and the default icon, and blank everything when the
    /// counter is disabled.
    pub async fn apply_settings(&mut self) {
        let host = Arc::clone(&self.host);

        log_host(
            host.set_badge_background(&self.settings.badge_color).await,
            "badge color",
        );
        if self.settings.badge_text_color_auto {
            log_host(host.set_badge_text_color(None).await, "badge text color");
        } else if let Some(color) = &self.settings.badge_text_color {
            log_host(
                host.set_badge_text_color(Some(color.as_str())).await,
                "badge text color",
            );
        }
        let icon = self.settings.icon_path();
        log_host(host.set_icon_path(None, &icon).await, "icon");

        if self.settings.counter_mode() != CounterMode::Disabled {
            return;
        }

        info!("Counter disabled, clearing badges");
        self.paint.cancel();
        for tab in self.pans.clear_all() {
            log_host(host.set_icon_path(Some(tab), &icon).await, "icon reset");
        }
        log_host(host.set_badge_text(None, "").await, "badge");
        log_host(host.set_title(None, TITLE).await, "title");

        let mut tabs: Vec<TabId> = self.cache.tab_ids().collect();
        tabs.sort();
        for tab in tabs {
            log_host(host.set_badge_text(Some(tab), "").await, "badge");
            log_host(host.set_title(Some(tab), TITLE).await, "title");
        }
    }

    /// Earliest moment [`Engine::step`] has work. Paint deadlines are left
    /// out while a paint is in flight.
    pub fn next_deadline(&self, paint_in_flight: bool) -> Option<Instant> {
        let paint = if paint_in_flight {
            None
        } else {
            self.paint.next_deadline()
        };
        match (self.pans.next_deadline(), paint) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Push due pan frames, then paint when the debounce expired.
    pub async fn step(&mut self, now: Instant) -> Option<PaintOutcome> {
        self.push_due_frames(now).await;
        if self.paint.take_due(now) {
            Some(self.paint_now(now).await)
        } else {
            None
        }
    }

    async fn push_due_frames(&mut self, now: Instant) {
        for (tab, frames) in self.pans.tick(now) {
            self.push_frames(tab, &frames).await;
        }
    }

    /// Paint right away, bypassing the debounce
    pub async fn paint_now(&mut self, now: Instant) -> PaintOutcome {
        match self.start_paint() {
            Some(in_flight) => {
                let (ticket, plan, counts, active) = in_flight.await;
                self.finish_paint(ticket, plan, counts, active, now).await
            }
            None => PaintOutcome::Disabled,
        }
    }

    /// Take a paint ticket and start the active tab query. `None` when the
    /// counter is disabled.
    fn start_paint(&mut self) -> Option<InFlight> {
        let ticket = self.paint.begin_paint();
        let counts = self.cache.read_counts();
        let plan = decide(&counts, self.settings.counter_mode());
        if plan == PaintPlan::Disabled {
            return None;
        }
        let host = Arc::clone(&self.host);
        Some(Box::pin(async move {
            let active = host.active_tab().await;
            (ticket, plan, counts, active)
        }))
    }

    /// Second half of a paint: drop it when stale, otherwise write the
    /// active tab's badge, icon and title.
    pub async fn finish_paint(
        &mut self,
        ticket: PaintTicket,
        plan: PaintPlan,
        counts: Counts,
        active: Result<Option<TabId>, HostError>,
        now: Instant,
    ) -> PaintOutcome {
        if !self.paint.is_current(ticket) {
            trace!(
                "Dropping stale paint (generation {} < {})",
                ticket.generation(),
                self.paint.generation()
            );
            return PaintOutcome::Stale;
        }

        let tab = match active {
            Ok(Some(tab)) => tab,
            Ok(None) => return PaintOutcome::NoActiveTab,
            Err(e) => {
                debug!("Active tab lookup failed: {}", e);
                return PaintOutcome::NoActiveTab;
            }
        };

        self.pans.pause_others(tab, now);
        let host = Arc::clone(&self.host);
        match &plan {
            PaintPlan::Disabled => return PaintOutcome::Disabled,
            PaintPlan::Animated { text } => {
                log_host(host.set_badge_text(Some(tab), "").await, "badge");
                let period = self.settings.pan_period();
                match self
                    .pans
                    .start_or_update(tab, text, self.style, period, self.fps, now)
                {
                    PanStart::Static(Some(frames)) | PanStart::Animated(Some(frames)) => {
                        self.push_frames(tab, &frames).await;
                    }
                    PanStart::AlreadyRunning | PanStart::Static(None) | PanStart::Animated(None) => {}
                }
            }
            PaintPlan::Badge { text } => {
                if self.pans.owns_icon(tab) {
                    self.pans.forget(tab);
                    log_host(
                        host.set_icon_path(Some(tab), &self.settings.icon_path()).await,
                        "icon reset",
                    );
                }
                log_host(host.set_badge_text(Some(tab), text).await, "badge");
            }
        }
        log_host(host.set_title(Some(tab), &tooltip(&counts)).await, "title");

        debug!("Painted {} on {}", plan, tab);
        PaintOutcome::Painted(plan)
    }

    async fn push_frames(&self, tab: TabId, frames: &IconFrames) {
        log_host(self.host.set_icon_frames(Some(tab), frames).await, "icon frames");
    }

    /// Drive the engine until the event stream closes.
    ///
    /// Events keep being handled while a paint waits for the browser; a paint
    /// that comes back after newer events is dropped by its ticket.
    pub async fn run(&mut self, mut events: mpsc::UnboundedReceiver<HostEvent>) {
        let mut in_flight: Option<InFlight> = None;

        loop {
            let deadline = self.next_deadline(in_flight.is_some());

            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event, Instant::now()).await,
                    None => {
                        info!("Event stream closed, stopping");
                        break;
                    }
                },
                (ticket, plan, counts, active) = poll_in_flight(&mut in_flight) => {
                    in_flight = None;
                    self.finish_paint(ticket, plan, counts, active, Instant::now()).await;
                },
                _ = sleep_until(deadline) => {
                    let now = Instant::now();
                    self.push_due_frames(now).await;
                    if in_flight.is_none() && self.paint.take_due(now) {
                        in_flight = self.start_paint();
                    }
                },
            }
        }

        let stopped = self.pans.clear_all();
        if !stopped.is_empty() {
            debug!("Dropped {} pan(s) on shutdown", stopped.len());
        }
    }
}

async fn poll_in_flight(slot: &mut Option<InFlight>) -> PaintResult {
    match slot {
        Some(in_flight) => in_flight.await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Host failures are never fatal; vanished tabs are routine.
fn log_host(result: Result<(), HostError>, what: &str) {
    match result {
        Ok(()) => {}
        Err(HostError::NoSuchTab(tab)) => trace!("Skipped {} for closed {}", what, tab),
        Err(e) => warn!("Failed to set {}: {}", what, e),
    }
}
