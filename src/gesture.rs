//! Pointer gesture recognition for renderer surfaces.
//!
//! [`GestureEngine`] turns raw press / motion / release events into at most
//! one semantic [`Gesture`] per input burst. It never reads the clock itself:
//! every call takes `now`, so the same event sequence always resolves the
//! same way. The long-press "timer" is just a due time plus the generation of
//! the press that armed it; [`GestureEngine::tick`] fires it only if that
//! press is still armed, so a superseded timer is a no-op.

use std::time::{Duration, Instant};

use crate::config::Config;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Button {
    Left,
    Right,
    Middle,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Point {
    pub x: u16,
    pub y: u16,
}

impl Point {
    pub fn new(x: u16, y: u16) -> Self { Point { x, y } }

    /// Chebyshev distance in cells.
    pub fn distance(self, other: Point) -> u16 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }
}

/// Keys as the surface cares about them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyInput {
    Char(char),
    Up,
    Down,
    Enter,
    Escape,
    Other(String),
}

impl KeyInput {
    /// Name forwarded to the coordinator in `key` inputs.
    pub fn name(&self) -> String {
        match self {
            KeyInput::Char(c) => c.to_string(),
            KeyInput::Up => "Up".to_string(),
            KeyInput::Down => "Down".to_string(),
            KeyInput::Enter => "Enter".to_string(),
            KeyInput::Escape => "Escape".to_string(),
            KeyInput::Other(s) => s.clone(),
        }
    }
}

/// Why a left press turned into a right-click.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RightClickCause {
    LongPress,
    DoubleTap,
    Modifier,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gesture {
    Click { at: Point, button: Button },
    SimulatedRightClick { at: Point, cause: RightClickCause },
    /// Drag-to-copy between the press and release positions, in event order.
    Drag { from: Point, to: Point },
}

#[derive(Clone, Copy, Debug)]
pub struct GestureTuning {
    pub long_press: Duration,
    pub long_press_tolerance: u16,
    pub drag_tolerance: u16,
    pub double_tap_window: Duration,
    pub double_tap_distance: u16,
}

impl From<&Config> for GestureTuning {
    fn from(c: &Config) -> Self {
        GestureTuning {
            long_press: c.long_press,
            long_press_tolerance: c.long_press_tolerance,
            drag_tolerance: c.drag_tolerance,
            double_tap_window: c.double_tap_window,
            double_tap_distance: c.double_tap_distance,
        }
    }
}

impl Default for GestureTuning {
    fn default() -> Self { GestureTuning::from(&Config::default()) }
}

#[derive(Clone, Copy, Debug)]
struct Press {
    at: Point,
    when: Instant,
    /// Latest pointer position seen since the press.
    last: Point,
    armed: bool,
    generation: u64,
}

#[derive(Clone, Copy, Debug)]
struct LongPressTimer {
    generation: u64,
    due: Instant,
}

#[derive(Debug)]
pub struct GestureEngine {
    tuning: GestureTuning,
    press: Option<Press>,
    timer: Option<LongPressTimer>,
    generation: u64,
    skip_next_release: bool,
    last_tap: Option<(Instant, Point)>,
}

impl GestureEngine {
    pub fn new(tuning: GestureTuning) -> Self {
        GestureEngine { tuning, press: None, timer: None, generation: 0, skip_next_release: false, last_tap: None }
    }

    pub fn press(&mut self, now: Instant, at: Point, button: Button, mods: Modifiers) -> Option<Gesture> {
        if let Some(g) = self.fire_due(now) { return Some(g); }
        self.timer = None;
        self.press = None;

        if button != Button::Left {
            // The paired release carries nothing new and has no press bookkeeping.
            self.skip_next_release = true;
            return Some(Gesture::Click { at, button });
        }

        if let Some((when, pos)) = self.last_tap.take() {
            if now.saturating_duration_since(when) <= self.tuning.double_tap_window
                && pos.distance(at) <= self.tuning.double_tap_distance
            {
                self.skip_next_release = true;
                return Some(Gesture::SimulatedRightClick { at, cause: RightClickCause::DoubleTap });
            }
        }

        if mods.shift || mods.ctrl {
            self.skip_next_release = true;
            return Some(Gesture::SimulatedRightClick { at, cause: RightClickCause::Modifier });
        }

        self.generation += 1;
        self.skip_next_release = false;
        self.press = Some(Press { at, when: now, last: at, armed: true, generation: self.generation });
        self.timer = Some(LongPressTimer { generation: self.generation, due: now + self.tuning.long_press });
        None
    }

    pub fn motion(&mut self, now: Instant, at: Point) -> Option<Gesture> {
        if let Some(g) = self.fire_due(now) { return Some(g); }
        let tolerance = self.tuning.long_press_tolerance;
        if let Some(p) = self.press.as_mut() {
            p.last = at;
            if p.armed && p.at.distance(at) > tolerance {
                p.armed = false;
            }
        }
        None
    }

    pub fn release(&mut self, now: Instant, at: Point) -> Option<Gesture> {
        if let Some(g) = self.fire_due(now) {
            // The long-press resolved this burst; this is its release.
            self.skip_next_release = false;
            self.press = None;
            return Some(g);
        }
        if self.skip_next_release {
            self.skip_next_release = false;
            self.press = None;
            return None;
        }
        let p = self.press.take()?;
        self.timer = None;
        if p.at.distance(at) > self.tuning.drag_tolerance {
            return Some(Gesture::Drag { from: p.at, to: at });
        }
        if p.armed && now.saturating_duration_since(p.when) < self.tuning.long_press {
            self.last_tap = Some((now, at));
            return Some(Gesture::Click { at, button: Button::Left });
        }
        None
    }

    /// Fire the long-press if it is due and its press is still armed.
    pub fn tick(&mut self, now: Instant) -> Option<Gesture> {
        self.fire_due(now)
    }

    /// When the caller should next call [`tick`](Self::tick), if ever.
    pub fn deadline(&self) -> Option<Instant> {
        let t = self.timer?;
        let p = self.press?;
        (p.armed && p.generation == t.generation).then_some(t.due)
    }

    /// Swallow the next release (its press was consumed elsewhere, e.g. by a menu).
    pub fn suppress_next_release(&mut self) {
        self.press = None;
        self.timer = None;
        self.skip_next_release = true;
    }

    /// Forget everything in flight. Used when a modal overlay takes over input.
    pub fn reset(&mut self) {
        self.press = None;
        self.timer = None;
        self.skip_next_release = false;
        self.last_tap = None;
    }

    fn fire_due(&mut self, now: Instant) -> Option<Gesture> {
        let timer = self.timer?;
        if now < timer.due { return None; }
        self.timer = None;
        let p = self.press.as_mut()?;
        if !p.armed || p.generation != timer.generation { return None; }
        p.armed = false;
        if p.at.distance(p.last) > self.tuning.long_press_tolerance { return None; }
        self.skip_next_release = true;
        // Position is latched at press time.
        Some(Gesture::SimulatedRightClick { at: p.at, cause: RightClickCause::LongPress })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug)]
    enum Ev {
        Press(u64, u16, u16, Button),
        Move(u64, u16, u16),
        Release(u64, u16, u16),
        Tick(u64),
    }

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    fn replay(events: &[Ev]) -> Vec<Gesture> {
        let base = Instant::now();
        let mut e = GestureEngine::new(GestureTuning::default());
        let mut out = Vec::new();
        for ev in events {
            let g = match *ev {
                Ev::Press(t, x, y, b) => e.press(base + ms(t), Point::new(x, y), b, Modifiers::default()),
                Ev::Move(t, x, y) => e.motion(base + ms(t), Point::new(x, y)),
                Ev::Release(t, x, y) => e.release(base + ms(t), Point::new(x, y)),
                Ev::Tick(t) => e.tick(base + ms(t)),
            };
            out.extend(g);
        }
        out
    }

    #[test]
    fn quick_tap_is_a_left_click() {
        let got = replay(&[Ev::Press(0, 10, 5, Button::Left), Ev::Release(50, 10, 5)]);
        assert_eq!(got, vec![Gesture::Click { at: Point::new(10, 5), button: Button::Left }]);
    }

    #[test]
    fn long_hold_fires_once_and_swallows_release() {
        let expected = vec![Gesture::SimulatedRightClick { at: Point::new(10, 5), cause: RightClickCause::LongPress }];
        // Timer observed before the release.
        let got = replay(&[Ev::Press(0, 10, 5, Button::Left), Ev::Tick(400), Ev::Release(500, 10, 5)]);
        assert_eq!(got, expected);
        // Release arrives first; the overdue timer still wins.
        let got = replay(&[Ev::Press(0, 10, 5, Button::Left), Ev::Release(500, 10, 5)]);
        assert_eq!(got, expected);
    }

    #[test]
    fn long_press_latches_press_position() {
        let got = replay(&[
            Ev::Press(0, 10, 5, Button::Left),
            Ev::Move(100, 11, 6),
            Ev::Tick(450),
            Ev::Release(460, 11, 6),
        ]);
        assert_eq!(got, vec![Gesture::SimulatedRightClick { at: Point::new(10, 5), cause: RightClickCause::LongPress }]);
    }

    #[test]
    fn horizontal_release_far_away_is_a_drag() {
        let got = replay(&[Ev::Press(0, 10, 5, Button::Left), Ev::Release(80, 40, 5)]);
        assert_eq!(got, vec![Gesture::Drag { from: Point::new(10, 5), to: Point::new(40, 5) }]);
    }

    #[test]
    fn second_tap_becomes_right_click() {
        let got = replay(&[
            Ev::Press(0, 10, 5, Button::Left),
            Ev::Release(50, 10, 5),
            Ev::Press(250, 11, 5, Button::Left),
            Ev::Release(300, 11, 5),
        ]);
        assert_eq!(got, vec![
            Gesture::Click { at: Point::new(10, 5), button: Button::Left },
            Gesture::SimulatedRightClick { at: Point::new(11, 5), cause: RightClickCause::DoubleTap },
        ]);
    }

    #[test]
    fn slow_second_tap_is_just_another_click() {
        let got = replay(&[
            Ev::Press(0, 10, 5, Button::Left),
            Ev::Release(50, 10, 5),
            Ev::Press(600, 10, 5, Button::Left),
            Ev::Release(650, 10, 5),
        ]);
        assert_eq!(got.len(), 2);
        assert!(got.iter().all(|g| matches!(g, Gesture::Click { button: Button::Left, .. })));
    }

    #[test]
    fn moving_away_cancels_long_press() {
        let got = replay(&[
            Ev::Press(0, 10, 5, Button::Left),
            Ev::Move(100, 20, 5),
            Ev::Tick(500),
            Ev::Release(600, 20, 5),
        ]);
        assert_eq!(got, vec![Gesture::Drag { from: Point::new(10, 5), to: Point::new(20, 5) }]);
    }

    #[test]
    fn wiggle_out_and_back_resolves_nothing() {
        let got = replay(&[
            Ev::Press(0, 10, 5, Button::Left),
            Ev::Move(50, 15, 5),
            Ev::Move(100, 10, 5),
            Ev::Release(150, 10, 5),
        ]);
        assert!(got.is_empty());
    }

    #[test]
    fn right_and_middle_press_resolve_immediately() {
        let got = replay(&[
            Ev::Press(0, 3, 2, Button::Right),
            Ev::Release(30, 9, 2),
            Ev::Press(100, 4, 4, Button::Middle),
            Ev::Release(120, 20, 4),
        ]);
        assert_eq!(got, vec![
            Gesture::Click { at: Point::new(3, 2), button: Button::Right },
            Gesture::Click { at: Point::new(4, 4), button: Button::Middle },
        ]);
    }

    #[test]
    fn modifier_click_is_right_click() {
        let base = Instant::now();
        let mut e = GestureEngine::new(GestureTuning::default());
        let g = e.press(base, Point::new(2, 2), Button::Left, Modifiers { shift: true, ctrl: false });
        assert_eq!(g, Some(Gesture::SimulatedRightClick { at: Point::new(2, 2), cause: RightClickCause::Modifier }));
        assert_eq!(e.release(base + ms(20), Point::new(8, 2)), None);
        assert_eq!(e.deadline(), None);
    }

    #[test]
    fn replay_is_deterministic() {
        let events = [
            Ev::Press(0, 1, 1, Button::Left),
            Ev::Release(40, 1, 1),
            Ev::Press(900, 5, 3, Button::Left),
            Ev::Move(950, 6, 3),
            Ev::Tick(1300),
            Ev::Release(1400, 6, 3),
            Ev::Press(2000, 0, 0, Button::Left),
            Ev::Release(2050, 12, 9),
        ];
        assert_eq!(replay(&events), replay(&events));
        assert_eq!(replay(&events).len(), 3);
    }

    #[test]
    fn deadline_tracks_armed_press_only() {
        let base = Instant::now();
        let mut e = GestureEngine::new(GestureTuning::default());
        assert_eq!(e.deadline(), None);
        e.press(base, Point::new(0, 0), Button::Left, Modifiers::default());
        assert_eq!(e.deadline(), Some(base + ms(400)));
        e.motion(base + ms(10), Point::new(10, 0));
        assert_eq!(e.deadline(), None);
        assert_eq!(e.tick(base + ms(500)), None);
    }

    #[test]
    fn suppressed_release_is_swallowed() {
        let base = Instant::now();
        let mut e = GestureEngine::new(GestureTuning::default());
        e.suppress_next_release();
        assert_eq!(e.release(base, Point::new(1, 1)), None);
        // A release with no press behind it is ignored too.
        assert_eq!(e.release(base + ms(10), Point::new(1, 1)), None);
    }
}
