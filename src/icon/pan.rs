//! Per-tab panning animation
//!
//! Each tab owns at most one animation. A running animation has a repeating
//! task in [`RepeatingTasks`]; a paused one keeps its state and the phase it
//! was paused at so it can continue where it stopped.

use super::font::FontBook;
use super::geometry::{compute_geometry, Geometry};
use super::render::{render_frames, render_static_frames, IconFrames, LARGE_ICON, SMALL_ICON};
use super::style::StyleOptions;
use crate::counter::TabId;
use crate::scheduler::RepeatingTasks;
use std::collections::HashMap;
use std::f64::consts::PI;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Cosine ease over one cycle: 0 at both ends, 1 at half phase, zero slope at
/// the turning points
pub fn ease(u: f64) -> f64 {
    (1.0 - (2.0 * PI * u).cos()) / 2.0
}

/// Frame interval for a frame rate
pub fn frame_interval(fps: u32) -> Duration {
    Duration::from_millis((1000.0 / f64::from(fps.max(1))).round() as u64)
}

#[derive(Debug, Clone)]
struct PanState {
    text: String,
    style: StyleOptions,
    period: Duration,
    fps: u32,
    small: Geometry,
    large: Geometry,
    t0: Instant,
    saved_phase: f64,
    running: bool,
}

impl PanState {
    fn matches(&self, text: &str, style: &StyleOptions, period: Duration, fps: u32) -> bool {
        self.text == text && self.style.key == style.key && self.period == period && self.fps == fps
    }

    fn phase(&self, now: Instant) -> f64 {
        if !self.running {
            return self.saved_phase;
        }
        let cycle = self.period.as_secs_f64();
        if cycle <= 0.0 {
            return 0.0;
        }
        let elapsed = now.saturating_duration_since(self.t0).as_secs_f64();
        (elapsed % cycle) / cycle
    }
}

/// What `start_or_update` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanStart {
    /// The identical animation is already running
    AlreadyRunning,
    /// The text fits; the frames are `None` when the same text and style were
    /// already rendered for this tab (or rendering failed)
    Static(Option<IconFrames>),
    /// An animation was started or resumed; the first frame is attached
    Animated(Option<IconFrames>),
}

/// Owns every tab's pan state and the repeating tasks that drive them.
pub struct PanScheduler {
    states: HashMap<TabId, PanState>,
    tasks: RepeatingTasks<TabId>,
    last_rendered: HashMap<TabId, (String, &'static str)>,
    fonts: FontBook,
}

impl PanScheduler {
    pub fn new(fonts: FontBook) -> Self {
        Self {
            states: HashMap::new(),
            tasks: RepeatingTasks::new(),
            last_rendered: HashMap::new(),
            fonts,
        }
    }

    /// Show `text` on `tab`, animating it when it does not fit.
    pub fn start_or_update(
        &mut self,
        tab: TabId,
        text: &str,
        style: &StyleOptions,
        period: Duration,
        fps: u32,
        now: Instant,
    ) -> PanStart {
        if let Some(state) = self.states.get(&tab) {
            if state.matches(text, style, period, fps) {
                if state.running {
                    return PanStart::AlreadyRunning;
                }
                trace!("{} pan is paused with the same text, resuming", tab);
                return PanStart::Animated(self.resume(tab, now));
            }
        }

        self.stop(tab);

        let font = self.fonts.resolve(style);
        let small = compute_geometry(SMALL_ICON, text, style, font);
        let large = compute_geometry(LARGE_ICON, text, style, font);

        if !small.needs_pan() && !large.needs_pan() {
            let key = (text.to_string(), style.key);
            if self.last_rendered.get(&tab) == Some(&key) {
                return PanStart::Static(None);
            }
            return match render_static_frames(text, style, font) {
                Ok(frames) => {
                    self.last_rendered.insert(tab, key);
                    PanStart::Static(Some(frames))
                }
                Err(e) => {
                    warn!("Failed to render static icon for {}: {}", tab, e);
                    PanStart::Static(None)
                }
            };
        }

        let first = match render_frames(text, &small, &large, 0.0, style, font) {
            Ok(frames) => Some(frames),
            Err(e) => {
                warn!("Failed to render first pan frame for {}: {}", tab, e);
                None
            }
        };

        let interval = frame_interval(fps);
        self.tasks.insert(tab, interval, now + interval);
        self.last_rendered.remove(&tab);
        self.states.insert(
            tab,
            PanState {
                text: text.to_string(),
                style: *style,
                period,
                fps,
                small,
                large,
                t0: now,
                saved_phase: 0.0,
                running: true,
            },
        );
        debug!(
            "Started pan for {} ({:?}, offsets {}/{})",
            tab, text, small.max_offset, large.max_offset
        );

        PanStart::Animated(first)
    }

    /// Render the next frame of every animation whose task is due
    pub fn tick(&mut self, now: Instant) -> Vec<(TabId, IconFrames)> {
        let mut frames = Vec::new();
        for tab in self.tasks.due(now) {
            let Some(state) = self.states.get(&tab) else {
                self.tasks.cancel(tab);
                continue;
            };
            let progress = ease(state.phase(now)) as f32;
            let font = self.fonts.resolve(&state.style);
            match render_frames(&state.text, &state.small, &state.large, progress, &state.style, font)
            {
                Ok(rendered) => frames.push((tab, rendered)),
                Err(e) => warn!("Failed to render pan frame for {}: {}", tab, e),
            }
        }
        frames
    }

    /// Pause every running animation, remembering its phase. Returns how many
    /// were paused.
    pub fn pause_all(&mut self, now: Instant) -> usize {
        self.pause_where(now, |_| true)
    }

    /// Pause every animation except the one on `visible`; only the active
    /// tab's icon is on screen.
    pub fn pause_others(&mut self, visible: TabId, now: Instant) -> usize {
        self.pause_where(now, |tab| tab != visible)
    }

    fn pause_where(&mut self, now: Instant, mut select: impl FnMut(TabId) -> bool) -> usize {
        let mut paused = 0;
        for (tab, state) in self.states.iter_mut() {
            if !state.running || !select(*tab) {
                continue;
            }
            state.saved_phase = state.phase(now);
            state.running = false;
            self.tasks.cancel(*tab);
            paused += 1;
        }
        if paused > 0 {
            debug!("Paused {} pan(s)", paused);
        }
        paused
    }

    /// Continue a paused animation from its saved phase. Returns the
    /// continuation frame, or `None` when there was nothing to resume.
    pub fn resume(&mut self, tab: TabId, now: Instant) -> Option<IconFrames> {
        let state = self.states.get_mut(&tab)?;
        if state.running {
            return None;
        }

        let back = state.period.mul_f64(state.saved_phase);
        state.t0 = now.checked_sub(back).unwrap_or(now);
        state.running = true;
        let interval = frame_interval(state.fps);
        self.tasks.insert(tab, interval, now + interval);
        debug!("Resumed pan for {} at phase {:.3}", tab, state.saved_phase);

        let progress = ease(state.phase(now)) as f32;
        let font = self.fonts.resolve(&state.style);
        match render_frames(&state.text, &state.small, &state.large, progress, &state.style, font) {
            Ok(frames) => Some(frames),
            Err(e) => {
                warn!("Failed to render resumed frame for {}: {}", tab, e);
                None
            }
        }
    }

    /// Cancel and discard the animation for `tab`
    pub fn stop(&mut self, tab: TabId) {
        self.tasks.cancel(tab);
        if self.states.remove(&tab).is_some() {
            trace!("Stopped pan for {}", tab);
        }
    }

    /// Drop everything known about `tab`, including its last static render
    pub fn forget(&mut self, tab: TabId) {
        self.stop(tab);
        self.last_rendered.remove(&tab);
    }

    /// Stop everything. Returns the tabs whose icon was overridden.
    pub fn clear_all(&mut self) -> Vec<TabId> {
        let mut tabs: Vec<TabId> = self
            .states
            .keys()
            .chain(self.last_rendered.keys())
            .copied()
            .collect();
        tabs.sort();
        tabs.dedup();
        self.states.clear();
        self.last_rendered.clear();
        self.tasks.clear();
        tabs
    }

    /// True when this scheduler has put custom pixels on the tab's icon
    pub fn owns_icon(&self, tab: TabId) -> bool {
        self.states.contains_key(&tab) || self.last_rendered.contains_key(&tab)
    }

    pub fn is_running(&self, tab: TabId) -> bool {
        self.states.get(&tab).is_some_and(|state| state.running)
    }

    pub fn is_paused(&self, tab: TabId) -> bool {
        self.states.get(&tab).is_some_and(|state| !state.running)
    }

    /// Cycle phase in `0..1`, frozen while paused
    pub fn phase(&self, tab: TabId, now: Instant) -> Option<f64> {
        self.states.get(&tab).map(|state| state.phase(now))
    }

    /// Current pan offsets for the small and large icon
    pub fn offsets(&self, tab: TabId, now: Instant) -> Option<(f32, f32)> {
        let state = self.states.get(&tab)?;
        let progress = ease(state.phase(now)) as f32;
        Some((
            state.small.max_offset * progress,
            state.large.max_offset * progress,
        ))
    }

    pub fn running_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.tasks.next_deadline()
    }
}
