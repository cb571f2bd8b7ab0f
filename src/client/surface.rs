//! Renderer state for one surface, free of IO.
//!
//! The event loop feeds terminal events and server messages in and carries
//! out the returned [`Effect`]s. Keeping the state machine here lets the
//! whole input path be driven from tests with synthetic time.

use std::time::Instant;

use tracing::debug;

use crate::clipboard::extract_span;
use crate::config::Config;
use crate::gesture::{Button, Gesture, GestureEngine, GestureTuning, KeyInput, Modifiers, Point};
use crate::menu::{ContextMenu, MenuOutcome};
use crate::protocol::Body;
use crate::regions::{resolve_left_click, resolve_right_click, Resolved};
use crate::rendering::{StyledFrame, SurfaceView};
use crate::types::*;

use super::viewport::Viewport;

/// Terminal input, already stripped of backend types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurfaceEvent {
    Press { at: Point, button: Button, mods: Modifiers },
    Release { at: Point },
    Motion { at: Point },
    Scroll { up: bool },
    Key(KeyInput),
    Resize { width: u16, height: u16 },
    Tick,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    Send(Body),
    Copy(String),
    /// Make this surface's pane the active tmux pane, remembering the previous one.
    FocusSelf,
    /// Give focus back to the pane active before [`Effect::FocusSelf`].
    RestoreFocus,
    Redraw,
}

pub struct Surface {
    pane_id: String,
    edge_zone: u16,
    scroll_step: usize,
    viewport: Viewport,
    gestures: GestureEngine,
    menu: Option<ContextMenu>,
    frame: Option<StyledFrame>,
    /// Highest sequence number received; echoed in inputs.
    last_seq: u64,
    connected: bool,
}

impl Surface {
    pub fn new(config: &Config, pane_id: &str, width: u16, height: u16) -> Self {
        Surface {
            pane_id: pane_id.to_string(),
            edge_zone: config.edge_zone_width,
            scroll_step: config.scroll_step.max(1),
            viewport: Viewport::new(width, height),
            gestures: GestureEngine::new(GestureTuning::from(config)),
            menu: None,
            frame: None,
            last_seq: 0,
            connected: false,
        }
    }

    pub fn viewport(&self) -> Viewport { self.viewport }

    pub fn last_seq(&self) -> u64 { self.last_seq }

    pub fn menu(&self) -> Option<&ContextMenu> { self.menu.as_ref() }

    pub fn is_connected(&self) -> bool { self.connected }

    pub fn view(&self) -> SurfaceView<'_> {
        SurfaceView {
            frame: self.frame.as_ref(),
            offset: self.viewport.offset,
            menu: self.menu.as_ref(),
            connected: self.connected,
        }
    }

    /// Next instant the event loop must wake for, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.menu.is_some() { return None; }
        self.gestures.deadline()
    }

    pub fn subscribe_body(&self, color_profile: ColorProfile) -> Body {
        Body::Subscribe(SubscribePayload {
            width: self.viewport.width,
            height: self.viewport.height,
            color_profile,
            pane_id: self.pane_id.clone(),
        })
    }

    // ── link lifecycle ──

    pub fn on_connected(&mut self) -> Vec<Effect> {
        self.connected = true;
        // A restarted coordinator numbers from 1 again.
        self.last_seq = 0;
        vec![Effect::Redraw]
    }

    pub fn on_disconnected(&mut self) -> Vec<Effect> {
        self.connected = false;
        self.gestures.reset();
        let mut fx = Vec::new();
        if self.menu.take().is_some() {
            fx.push(Effect::RestoreFocus);
        }
        fx.push(Effect::Redraw);
        fx
    }

    // ── server messages ──

    pub fn on_render(&mut self, payload: RenderPayload) -> Vec<Effect> {
        if payload.sequence_num > self.last_seq {
            self.last_seq = payload.sequence_num;
        } else {
            debug!(event = "stale_frame", seq = payload.sequence_num, last = self.last_seq);
        }
        let clamped = self.viewport.set_total(payload.line_count());
        self.frame = Some(StyledFrame::new(payload));
        let mut fx = Vec::new();
        if clamped {
            fx.push(self.viewport_update());
        }
        fx.push(Effect::Redraw);
        fx
    }

    pub fn on_menu(&mut self, payload: MenuPayload) -> Vec<Effect> {
        let mut fx = Vec::new();
        if self.menu.is_some() {
            // The open menu is superseded; it still owes its one answer.
            fx.push(self.menu_select(None));
        } else {
            fx.push(Effect::FocusSelf);
        }
        self.gestures.reset();
        self.menu = Some(ContextMenu::open(payload, self.viewport.width, self.viewport.height));
        fx.push(Effect::Redraw);
        fx
    }

    // ── terminal input ──

    pub fn handle_event(&mut self, now: Instant, ev: SurfaceEvent) -> Vec<Effect> {
        if let SurfaceEvent::Resize { width, height } = ev {
            return self.on_resize(width, height);
        }
        if self.menu.is_some() {
            return self.menu_event(ev);
        }
        let gesture = match ev {
            SurfaceEvent::Press { at, button, mods } => self.gestures.press(now, at, button, mods),
            SurfaceEvent::Release { at } => self.gestures.release(now, at),
            SurfaceEvent::Motion { at } => self.gestures.motion(now, at),
            SurfaceEvent::Tick => self.gestures.tick(now),
            SurfaceEvent::Scroll { up } => {
                let step = self.scroll_step as isize;
                return if self.viewport.scroll_by(if up { -step } else { step }) {
                    vec![self.viewport_update(), Effect::Redraw]
                } else {
                    Vec::new()
                };
            }
            SurfaceEvent::Key(key) => {
                return vec![Effect::Send(Body::Input(InputPayload {
                    kind: InputKind::Key,
                    button: MouseButton::None,
                    key: key.name(),
                    ..self.input_base()
                }))];
            }
            SurfaceEvent::Resize { .. } => return Vec::new(),
        };
        match gesture {
            Some(g) => self.on_gesture(g),
            None => Vec::new(),
        }
    }

    fn on_resize(&mut self, width: u16, height: u16) -> Vec<Effect> {
        let clamped = self.viewport.set_size(width, height);
        if let Some(menu) = self.menu.as_mut() {
            menu.relayout(width, height);
        }
        let mut fx = Vec::with_capacity(3);
        // Sent ahead of the resize so the re-render it triggers sees the new offset.
        if clamped {
            fx.push(self.viewport_update());
        }
        fx.push(Effect::Send(Body::Resize(ResizePayload { width, height, pane_id: self.pane_id.clone() })));
        fx.push(Effect::Redraw);
        fx
    }

    fn on_gesture(&mut self, g: Gesture) -> Vec<Effect> {
        let Some(frame) = self.frame.as_ref() else { return Vec::new(); };
        let regions = &frame.payload.regions;
        let (offset, width) = (self.viewport.offset, self.viewport.width);
        let (at, button, resolved) = match g {
            Gesture::Click { at, button: Button::Left } => {
                let r = resolve_left_click(regions, at.x, at.y, offset, width, self.edge_zone);
                let button = if r.as_right_click { Button::Right } else { Button::Left };
                (at, button, r)
            }
            Gesture::Click { at, button } => (at, button, resolve_right_click(regions, at.x, at.y, offset, width)),
            Gesture::SimulatedRightClick { at, .. } => {
                let mut r = resolve_right_click(regions, at.x, at.y, offset, width);
                r.as_right_click = true;
                (at, Button::Right, r)
            }
            Gesture::Drag { from, to } => {
                let text = extract_span(&frame.payload.content, offset, from, to);
                return if text.is_empty() { Vec::new() } else { vec![Effect::Copy(text)] };
            }
        };
        let simulated = match g {
            Gesture::SimulatedRightClick { .. } => true,
            Gesture::Click { button: Button::Left, .. } => resolved.as_right_click,
            _ => false,
        };
        vec![Effect::Send(Body::Input(self.action_input(at, button, simulated, resolved)))]
    }

    fn action_input(&self, at: Point, button: Button, simulated: bool, r: Resolved) -> InputPayload {
        InputPayload {
            kind: InputKind::Action,
            mouse_x: at.x as i32,
            mouse_y: at.y as i32,
            button: match button {
                Button::Left => MouseButton::Left,
                Button::Right => MouseButton::Right,
                Button::Middle => MouseButton::Middle,
            },
            resolved_action: r.action,
            resolved_target: r.target,
            is_simulated_right_click: simulated,
            ..self.input_base()
        }
    }

    fn input_base(&self) -> InputPayload {
        InputPayload {
            sequence_num: self.last_seq,
            action: "press".to_string(),
            viewport_offset: self.viewport.offset,
            pane_id: self.pane_id.clone(),
            is_touch_mode: self.frame.as_ref().is_some_and(|f| f.payload.is_touch_mode),
            ..InputPayload::default()
        }
    }

    fn viewport_update(&self) -> Effect {
        Effect::Send(Body::ViewportUpdate(ViewportPayload { viewport_offset: self.viewport.offset }))
    }

    // ── menu mode ──

    fn menu_event(&mut self, ev: SurfaceEvent) -> Vec<Effect> {
        let Some(menu) = self.menu.as_mut() else { return Vec::new(); };
        let (outcome, by_press) = match ev {
            SurfaceEvent::Press { at, .. } => (menu.on_press(at.x, at.y), true),
            SurfaceEvent::Release { at } => (menu.on_release(at.x, at.y), false),
            SurfaceEvent::Motion { at } => {
                let before = menu.highlighted();
                menu.on_motion(at.x, at.y);
                return if menu.highlighted() != before { vec![Effect::Redraw] } else { Vec::new() };
            }
            SurfaceEvent::Scroll { .. } => (menu.on_scroll(), false),
            SurfaceEvent::Key(ref key) => {
                let before = menu.highlighted();
                let outcome = menu.on_key(key);
                if outcome.is_none() {
                    return if menu.highlighted() != before { vec![Effect::Redraw] } else { Vec::new() };
                }
                (outcome, false)
            }
            SurfaceEvent::Tick | SurfaceEvent::Resize { .. } => return Vec::new(),
        };
        let Some(outcome) = outcome else { return Vec::new(); };
        if by_press {
            self.gestures.suppress_next_release();
        }
        let index = match outcome {
            MenuOutcome::Selected(i) => Some(i),
            MenuOutcome::Cancelled => None,
        };
        let select = self.menu_select(index);
        self.menu = None;
        vec![select, Effect::RestoreFocus, Effect::Redraw]
    }

    fn menu_select(&self, index: Option<usize>) -> Effect {
        Effect::Send(Body::Input(InputPayload {
            kind: InputKind::MenuSelect,
            mouse_x: index.map_or(MENU_CANCEL, |i| i as i32),
            button: MouseButton::None,
            ..self.input_base()
        }))
    }
}
