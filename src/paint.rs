//! Paint decisions and scheduling
//!
//! Turns cached counts plus the counter mode into a [`PaintPlan`], and
//! coalesces bursts of events into a single paint. A generation counter lets
//! a paint that finishes after newer events arrived notice that its data is
//! stale.

use crate::core::config::PaintConfig;
use crate::counter::Counts;
use crate::icon::is_all_digits;
use crate::scheduler::Debounce;
use std::fmt;
use tokio::time::Instant;

/// Tooltip and title prefix
pub const TITLE: &str = "Tab Counter";

/// All-digit texts this long are drawn as a panning icon instead of a badge
pub const ANIMATE_MIN_DIGITS: usize = 4;

/// What the counter shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CounterMode {
    /// Visible tabs in the active window
    #[default]
    CurrentWindow,
    /// Visible tabs across all windows
    AllTabs,
    /// `current/all`
    Both,
    /// No counter at all
    Disabled,
    /// Number of normal windows
    AllWindows,
}

impl TryFrom<u8> for CounterMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CounterMode::CurrentWindow),
            1 => Ok(CounterMode::AllTabs),
            2 => Ok(CounterMode::Both),
            3 => Ok(CounterMode::Disabled),
            4 => Ok(CounterMode::AllWindows),
            other => Err(other),
        }
    }
}

impl From<CounterMode> for u8 {
    fn from(mode: CounterMode) -> Self {
        match mode {
            CounterMode::CurrentWindow => 0,
            CounterMode::AllTabs => 1,
            CounterMode::Both => 2,
            CounterMode::Disabled => 3,
            CounterMode::AllWindows => 4,
        }
    }
}

impl CounterMode {
    /// Text for the given counts, `None` when disabled
    pub fn text(self, counts: &Counts) -> Option<String> {
        match self {
            CounterMode::CurrentWindow => Some(counts.current_window.to_string()),
            CounterMode::AllTabs => Some(counts.all_tabs.to_string()),
            CounterMode::Both => Some(format!("{}/{}", counts.current_window, counts.all_tabs)),
            CounterMode::Disabled => None,
            CounterMode::AllWindows => Some(counts.all_windows.to_string()),
        }
    }
}

/// How one paint presents the count
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaintPlan {
    /// Counter off: nothing to paint
    Disabled,
    /// Panning icon, native badge blanked
    Animated { text: String },
    /// Native badge text, icon back to the configured file
    Badge { text: String },
}

impl PaintPlan {
    pub fn text(&self) -> Option<&str> {
        match self {
            PaintPlan::Disabled => None,
            PaintPlan::Animated { text } | PaintPlan::Badge { text } => Some(text),
        }
    }
}

impl fmt::Display for PaintPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaintPlan::Disabled => f.write_str("disabled"),
            PaintPlan::Animated { text } => write!(f, "animated {:?}", text),
            PaintPlan::Badge { text } => write!(f, "badge {:?}", text),
        }
    }
}

/// Choose the presentation for the current counts
pub fn decide(counts: &Counts, mode: CounterMode) -> PaintPlan {
    let Some(text) = mode.text(counts) else {
        return PaintPlan::Disabled;
    };
    if is_all_digits(&text) && text.len() >= ANIMATE_MIN_DIGITS {
        PaintPlan::Animated { text }
    } else {
        PaintPlan::Badge { text }
    }
}

/// Multi-line tooltip for the toolbar button
pub fn tooltip(counts: &Counts) -> String {
    let mut title = format!(
        "{}\nTabs in this window:  {}\nTabs in all windows: {}\nNumber of windows: {}",
        TITLE, counts.current_window, counts.all_tabs, counts.all_windows
    );
    let hidden = counts.all_tabs_total.saturating_sub(counts.all_tabs);
    if hidden > 0 {
        title.push_str(&format!("\nHidden tabs: {}", hidden));
    }
    title
}

/// Generation captured when a paint starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaintTicket(u64);

impl PaintTicket {
    pub fn generation(self) -> u64 {
        self.0
    }
}

/// Debounced paint trigger with a last-writer-wins generation guard.
#[derive(Debug)]
pub struct PaintCoordinator {
    generation: u64,
    settle: Debounce,
    activation: Debounce,
}

impl PaintCoordinator {
    pub fn new(config: &PaintConfig) -> Self {
        Self {
            generation: 0,
            settle: Debounce::trailing(config.debounce()),
            activation: Debounce::leading(config.activation_window()),
        }
    }

    /// Ask for a paint once the current burst of events settles
    pub fn schedule_paint(&mut self, now: Instant) {
        self.generation += 1;
        self.settle.trigger(now);
    }

    /// Tab switches paint right away (at most once per activation window)
    /// and again once things settle
    pub fn schedule_activation_paint(&mut self, now: Instant) {
        self.generation += 1;
        self.activation.trigger(now);
        self.settle.trigger(now);
    }

    /// True when a paint is due; consumes the pending trigger(s)
    pub fn take_due(&mut self, now: Instant) -> bool {
        // both debouncers must be drained, no short-circuit
        self.settle.take_due(now) | self.activation.take_due(now)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.settle.next_deadline(), self.activation.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.settle.is_pending() || self.activation.is_pending()
    }

    pub fn begin_paint(&self) -> PaintTicket {
        PaintTicket(self.generation)
    }

    /// False once anything was scheduled after the ticket was taken
    pub fn is_current(&self, ticket: PaintTicket) -> bool {
        ticket.0 == self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(&mut self) {
        self.settle.cancel();
        self.activation.cancel();
    }
}
