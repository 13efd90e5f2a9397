use std::time::{Duration, Instant};

use crate::preferences::Section;

/// Scroll distances are measured in units; one terminal row is this many.
pub const ROW_UNITS: u32 = 20;
pub const JUMP_OFFSET_UNITS: u32 = 80;
pub const BACK_TO_TOP_THRESHOLD_UNITS: u32 = 300;
pub const SCROLL_DEBOUNCE: Duration = Duration::from_millis(50);
pub const EXPAND_SETTLE_DELAY: Duration = Duration::from_millis(100);
pub const SMOOTH_SCROLL_DURATION: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavItem {
    pub label: String,
    /// Anchor to scroll to; `None` marks a non-interactive placeholder.
    pub target: Option<String>,
}

impl NavItem {
    pub fn link(label: &str, target: String) -> Self {
        Self {
            label: label.to_string(),
            target: Some(target),
        }
    }

    pub fn placeholder(label: &str) -> Self {
        Self {
            label: label.to_string(),
            target: None,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.target.is_some()
    }
}

/// The top-level section an anchor lives in.
pub fn owning_section(anchor: &str) -> Option<Section> {
    if anchor.starts_with(crate::daily::ANCHOR_PREFIX) {
        Some(Section::Daily)
    } else if anchor.starts_with(crate::entries::ANCHOR_PREFIX) {
        Some(Section::Baogao)
    } else {
        None
    }
}

/// Trailing-edge debounce: every `schedule` pushes the deadline out again.
#[derive(Debug, Clone)]
pub struct Debouncer {
    wait: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            deadline: None,
        }
    }

    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.wait);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// True exactly once per quiet period, when it has elapsed.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// A single delayed action. Scheduling again replaces the pending one.
#[derive(Debug, Clone)]
pub struct OneShot<T> {
    pending: Option<(Instant, T)>,
}

impl<T> Default for OneShot<T> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<T> OneShot<T> {
    pub fn schedule(&mut self, now: Instant, delay: Duration, value: T) {
        self.pending = Some((now + delay, value));
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((due, _)) if now >= *due => self.pending.take().map(|(_, value)| value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SmoothScroll {
    from: u32,
    to: u32,
    started: Instant,
}

impl SmoothScroll {
    fn position(&self, now: Instant) -> u32 {
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        let t = (elapsed / SMOOTH_SCROLL_DURATION.as_secs_f64()).clamp(0.0, 1.0);
        // ease-in-out cubic
        let eased = if t < 0.5 {
            4.0 * t * t * t
        } else {
            1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
        };
        let from = self.from as f64;
        let to = self.to as f64;
        (from + (to - from) * eased).round().max(0.0) as u32
    }

    fn finished(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) >= SMOOTH_SCROLL_DURATION
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    Drawer,
    DrawerToggle,
    Elsewhere,
}

/// Drawer, scroll position, back-to-top visibility and the timers that
/// drive them. Time is always passed in so the behavior is deterministic.
#[derive(Debug, Clone)]
pub struct Chrome {
    drawer_open: bool,
    position: u32,
    max_position: u32,
    back_to_top_visible: bool,
    sample: Debouncer,
    animation: Option<SmoothScroll>,
    pending_jump: OneShot<String>,
}

impl Default for Chrome {
    fn default() -> Self {
        Self {
            drawer_open: false,
            position: 0,
            max_position: u32::MAX,
            back_to_top_visible: false,
            sample: Debouncer::new(SCROLL_DEBOUNCE),
            animation: None,
            pending_jump: OneShot::default(),
        }
    }
}

impl Chrome {
    pub fn drawer_open(&self) -> bool {
        self.drawer_open
    }

    pub fn open_drawer(&mut self) {
        self.drawer_open = true;
    }

    pub fn close_drawer(&mut self) {
        self.drawer_open = false;
    }

    pub fn toggle_drawer(&mut self) {
        self.drawer_open = !self.drawer_open;
    }

    /// Returns true when the click closed the drawer.
    pub fn handle_click(&mut self, target: ClickTarget) -> bool {
        if self.drawer_open && target == ClickTarget::Elsewhere {
            self.drawer_open = false;
            return true;
        }
        false
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn position_rows(&self) -> u32 {
        self.position / ROW_UNITS
    }

    pub fn back_to_top_visible(&self) -> bool {
        self.back_to_top_visible
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some() || self.pending_jump.is_pending() || self.sample.is_pending()
    }

    /// Shrinking the page below the current position clamps it, which counts
    /// as a scroll for the back-to-top sample.
    pub fn set_max_position(&mut self, max: u32, now: Instant) -> bool {
        self.max_position = max;
        if self.position > max {
            self.set_position(max, now)
        } else {
            false
        }
    }

    /// Manual scroll. Ignored while the drawer holds the scroll lock.
    pub fn scroll_rows(&mut self, rows: i64, now: Instant) -> bool {
        if self.drawer_open {
            return false;
        }
        self.animation = None;
        let delta = rows.saturating_mul(ROW_UNITS as i64);
        let target = (self.position as i64)
            .saturating_add(delta)
            .clamp(0, self.max_position as i64) as u32;
        self.set_position(target, now)
    }

    pub fn smooth_scroll_to(&mut self, target: u32, now: Instant) {
        let to = target.min(self.max_position);
        self.animation = Some(SmoothScroll {
            from: self.position,
            to,
            started: now,
        });
    }

    pub fn back_to_top(&mut self, now: Instant) {
        self.smooth_scroll_to(0, now);
    }

    /// Queues a scroll to `anchor` once the expand transition has settled.
    pub fn request_jump(&mut self, anchor: String, now: Instant) {
        self.pending_jump.schedule(now, EXPAND_SETTLE_DELAY, anchor);
    }

    /// Advances every timer. `resolve` maps an anchor to its offset in units
    /// from the top of the page. Returns true when anything visible changed.
    pub fn tick<F>(&mut self, now: Instant, resolve: F) -> bool
    where
        F: Fn(&str) -> Option<u32>,
    {
        let mut changed = false;

        if let Some(anchor) = self.pending_jump.take_due(now) {
            match resolve(&anchor) {
                Some(offset) => {
                    self.smooth_scroll_to(offset.saturating_sub(JUMP_OFFSET_UNITS), now);
                }
                None => tracing::debug!(anchor, "jump target vanished before scroll"),
            }
        }

        if let Some(animation) = self.animation {
            let position = animation.position(now).min(self.max_position);
            changed |= self.set_position(position, now);
            if animation.finished(now) {
                self.animation = None;
            }
        }

        if self.sample.take_due(now) {
            let visible = self.position > BACK_TO_TOP_THRESHOLD_UNITS;
            if visible != self.back_to_top_visible {
                self.back_to_top_visible = visible;
                changed = true;
            }
        }

        changed
    }

    fn set_position(&mut self, position: u32, now: Instant) -> bool {
        if position == self.position {
            return false;
        }
        self.position = position;
        self.sample.schedule(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn debounce_fires_once_after_quiet_period() {
        let start = Instant::now();
        let mut debounce = Debouncer::new(SCROLL_DEBOUNCE);
        debounce.schedule(start);
        debounce.schedule(start + ms(30));
        assert!(!debounce.take_due(start + ms(60)));
        assert!(debounce.take_due(start + ms(80)));
        assert!(!debounce.take_due(start + ms(200)));
    }

    #[test]
    fn one_shot_replaces_pending_value() {
        let start = Instant::now();
        let mut shot = OneShot::default();
        shot.schedule(start, ms(100), "a");
        shot.schedule(start + ms(10), ms(100), "b");
        assert_eq!(shot.take_due(start + ms(105)), None);
        assert_eq!(shot.take_due(start + ms(110)), Some("b"));
        assert_eq!(shot.take_due(start + ms(500)), None);
    }

    #[test]
    fn back_to_top_follows_debounced_position() {
        let start = Instant::now();
        let mut chrome = Chrome::default();
        // 16 rows = 320 units
        chrome.scroll_rows(16, start);
        assert!(!chrome.tick(start + ms(10), |_| None));
        assert!(!chrome.back_to_top_visible());
        assert!(chrome.tick(start + ms(60), |_| None));
        assert!(chrome.back_to_top_visible());

        chrome.scroll_rows(-1, start + ms(100));
        chrome.tick(start + ms(200), |_| None);
        // exactly 300 is not past the threshold
        assert_eq!(chrome.position(), 300);
        assert!(!chrome.back_to_top_visible());
    }

    #[test]
    fn shrinking_page_resamples_back_to_top() {
        let start = Instant::now();
        let mut chrome = Chrome::default();
        chrome.scroll_rows(20, start);
        chrome.tick(start + ms(60), |_| None);
        assert!(chrome.back_to_top_visible());

        // a collapsed section leaves nothing to scroll
        assert!(chrome.set_max_position(0, start + ms(100)));
        assert_eq!(chrome.position(), 0);
        assert!(chrome.is_animating());
        assert!(chrome.tick(start + ms(500), |_| None));
        assert!(!chrome.back_to_top_visible());
        assert!(!chrome.set_max_position(0, start + ms(600)));
    }

    #[test]
    fn jump_waits_for_settle_delay_then_lands_below_header() {
        let start = Instant::now();
        let mut chrome = Chrome::default();
        chrome.request_jump("baogao-3".into(), start);
        chrome.tick(start + ms(50), |_| Some(1000));
        assert_eq!(chrome.position(), 0);

        let resolve = |anchor: &str| (anchor == "baogao-3").then_some(1000);
        chrome.tick(start + ms(100), resolve);
        chrome.tick(start + ms(100) + SMOOTH_SCROLL_DURATION, resolve);
        assert_eq!(chrome.position(), 1000 - JUMP_OFFSET_UNITS);
        assert!(chrome.animation.is_none());
    }

    #[test]
    fn jump_near_top_does_not_underflow() {
        let start = Instant::now();
        let mut chrome = Chrome::default();
        chrome.request_jump("daily-a".into(), start);
        chrome.tick(start + ms(100), |_| Some(40));
        chrome.tick(start + ms(400), |_| Some(40));
        assert_eq!(chrome.position(), 0);
    }

    #[test]
    fn smooth_scroll_passes_through_intermediate_positions() {
        let start = Instant::now();
        let mut chrome = Chrome::default();
        chrome.smooth_scroll_to(2000, start);
        chrome.tick(start + ms(125), |_| None);
        let midway = chrome.position();
        assert!(midway > 0 && midway < 2000, "midway was {midway}");
        chrome.tick(start + ms(300), |_| None);
        assert_eq!(chrome.position(), 2000);
    }

    #[test]
    fn drawer_locks_scroll_and_closes_on_outside_click() {
        let start = Instant::now();
        let mut chrome = Chrome::default();
        chrome.open_drawer();
        assert!(!chrome.scroll_rows(5, start));
        assert_eq!(chrome.position(), 0);

        assert!(!chrome.handle_click(ClickTarget::Drawer));
        assert!(!chrome.handle_click(ClickTarget::DrawerToggle));
        assert!(chrome.drawer_open());
        assert!(chrome.handle_click(ClickTarget::Elsewhere));
        assert!(!chrome.drawer_open());
        assert!(chrome.scroll_rows(5, start));
    }

    #[test]
    fn scroll_is_clamped_to_page() {
        let start = Instant::now();
        let mut chrome = Chrome::default();
        chrome.set_max_position(100, start);
        chrome.scroll_rows(50, start);
        assert_eq!(chrome.position(), 100);
        chrome.scroll_rows(-50, start);
        assert_eq!(chrome.position(), 0);
    }

    #[test]
    fn anchors_map_to_sections() {
        assert_eq!(owning_section("daily-morning"), Some(Section::Daily));
        assert_eq!(owning_section("baogao-12"), Some(Section::Baogao));
        assert_eq!(owning_section("elsewhere"), None);
    }

    #[test]
    fn placeholders_are_not_interactive() {
        assert!(NavItem::link("A", "daily-a".into()).is_interactive());
        assert!(!NavItem::placeholder("...").is_interactive());
    }
}
