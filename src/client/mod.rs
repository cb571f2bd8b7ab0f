//! Renderer client: draws one surface inside a tmux pane and reports
//! gestures back to the coordinator.

mod connection;
mod surface;
mod viewport;

use std::io::{self, Stdout};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers, MouseButton as CtMouseButton,
    MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::{debug, info, warn};

use crate::clipboard::copy_to_clipboard;
use crate::config::Config;
use crate::error::Result;
use crate::gesture::{Button, KeyInput, Modifiers, Point};
use crate::rendering::draw_surface;
use crate::session::SessionPaths;
use crate::tmux::{Control, Tmux};
use crate::types::ColorProfile;

pub use connection::{Connection, Incoming};
pub use surface::{Effect, Surface, SurfaceEvent};
pub use viewport::Viewport;

/// Upper bound on how long the loop sleeps waiting for terminal input.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Clone, Debug)]
pub struct RendererOptions {
    pub session_id: String,
    pub client_id: String,
    pub pane_id: String,
    pub color_profile: ColorProfile,
}

type Term = Terminal<CrosstermBackend<Stdout>>;

/// Take over the terminal and run until input fails.
pub fn run_renderer(config: Config, opts: RendererOptions) -> Result<()> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    let _ = terminal.hide_cursor();

    let result = event_loop(&mut terminal, &config, &opts);

    // Always restore, even on error, so the pane is usable afterwards.
    let _ = disable_raw_mode();
    let out = terminal.backend_mut();
    let _ = execute!(out, crossterm::style::Print("\x1b[0m"));
    let _ = execute!(out, DisableMouseCapture, LeaveAlternateScreen);
    let _ = terminal.show_cursor();
    result
}

struct Link {
    conn: Connection,
    rx: Receiver<Incoming>,
}

fn event_loop(terminal: &mut Term, config: &Config, opts: &RendererOptions) -> Result<()> {
    let paths = SessionPaths::new(&config.runtime_dir, &opts.session_id);
    let tmux = match Tmux::locate() {
        Ok(t) => Some(t),
        Err(e) => { warn!(event = "tmux_unavailable", error = %e); None }
    };
    let size = terminal.size()?;
    let mut surface = Surface::new(config, &opts.pane_id, size.width, size.height);
    let mut link: Option<Link> = None;
    let mut next_attempt = Instant::now();
    let mut restore_focus: Option<String> = None;
    let mut dirty = true;

    loop {
        let mut effects: Vec<Effect> = Vec::new();

        if link.is_none() && Instant::now() >= next_attempt {
            match Connection::connect(&paths.socket, &opts.client_id, config) {
                Ok((conn, rx)) => {
                    info!(event = "connected", client_id = %opts.client_id, socket = %paths.socket.display());
                    conn.start_keepalive(config.ping_interval);
                    effects.extend(surface.on_connected());
                    effects.push(Effect::Send(surface.subscribe_body(opts.color_profile)));
                    link = Some(Link { conn, rx });
                }
                Err(e) => {
                    debug!(event = "connect_failed", error = %e);
                    next_attempt = Instant::now() + config.reconnect_delay;
                }
            }
        }

        // ── Drain server traffic ──
        let mut lost = false;
        if let Some(l) = link.as_ref() {
            loop {
                match l.rx.try_recv() {
                    Ok(Incoming::Render(p)) => effects.extend(surface.on_render(p)),
                    Ok(Incoming::Menu(m)) => effects.extend(surface.on_menu(m)),
                    Ok(Incoming::Pong) => {}
                    Ok(Incoming::Closed) | Err(TryRecvError::Disconnected) => { lost = true; break; }
                    Err(TryRecvError::Empty) => break,
                }
            }
        }

        // ── Terminal input ──
        let now = Instant::now();
        let timeout = surface.next_deadline()
            .map(|d| d.saturating_duration_since(now).min(POLL_INTERVAL))
            .unwrap_or(POLL_INTERVAL);
        if effects.is_empty() && event::poll(timeout)? {
            if let Some(ev) = translate(event::read()?) {
                effects.extend(surface.handle_event(Instant::now(), ev));
            }
        }
        effects.extend(surface.handle_event(Instant::now(), SurfaceEvent::Tick));

        // ── Apply ──
        for fx in effects {
            match fx {
                Effect::Send(body) => {
                    if let Some(l) = link.as_ref() {
                        if let Err(e) = l.conn.send(body) {
                            debug!(event = "send_failed", error = %e);
                            lost = true;
                        }
                    }
                }
                Effect::Copy(text) => {
                    if let Some(t) = tmux.as_ref() { copy_to_clipboard(t, &text); }
                }
                Effect::FocusSelf => {
                    if let Some(t) = tmux.as_ref() {
                        restore_focus = t.current_pane().filter(|p| *p != opts.pane_id);
                        if let Err(e) = t.select_pane(&opts.pane_id) {
                            debug!(event = "focus_failed", error = %e);
                        }
                    }
                }
                Effect::RestoreFocus => {
                    if let (Some(t), Some(prev)) = (tmux.as_ref(), restore_focus.take()) {
                        let _ = t.select_pane(&prev);
                    }
                }
                Effect::Redraw => dirty = true,
            }
        }

        if lost {
            if let Some(l) = link.take() {
                l.conn.close();
                info!(event = "disconnected", client_id = %opts.client_id);
            }
            for fx in surface.on_disconnected() {
                match fx {
                    Effect::RestoreFocus => {
                        if let (Some(t), Some(prev)) = (tmux.as_ref(), restore_focus.take()) {
                            let _ = t.select_pane(&prev);
                        }
                    }
                    _ => dirty = true,
                }
            }
            next_attempt = Instant::now() + config.reconnect_delay;
        }

        if dirty {
            terminal.draw(|f| draw_surface(f, &surface.view()))?;
            dirty = false;
        }
    }
}

fn map_button(b: CtMouseButton) -> Button {
    match b {
        CtMouseButton::Left => Button::Left,
        CtMouseButton::Right => Button::Right,
        CtMouseButton::Middle => Button::Middle,
    }
}

/// Backend event to surface event; `None` for events the surface ignores.
fn translate(ev: Event) -> Option<SurfaceEvent> {
    match ev {
        Event::Mouse(me) => {
            let at = Point::new(me.column, me.row);
            match me.kind {
                MouseEventKind::Down(b) => Some(SurfaceEvent::Press {
                    at,
                    button: map_button(b),
                    mods: Modifiers {
                        shift: me.modifiers.contains(KeyModifiers::SHIFT),
                        ctrl: me.modifiers.contains(KeyModifiers::CONTROL),
                    },
                }),
                MouseEventKind::Up(_) => Some(SurfaceEvent::Release { at }),
                MouseEventKind::Drag(_) | MouseEventKind::Moved => Some(SurfaceEvent::Motion { at }),
                MouseEventKind::ScrollUp => Some(SurfaceEvent::Scroll { up: true }),
                MouseEventKind::ScrollDown => Some(SurfaceEvent::Scroll { up: false }),
                _ => None,
            }
        }
        Event::Key(k) if k.kind == KeyEventKind::Press => {
            let key = match k.code {
                KeyCode::Char(c) => KeyInput::Char(c),
                KeyCode::Up => KeyInput::Up,
                KeyCode::Down => KeyInput::Down,
                KeyCode::Enter => KeyInput::Enter,
                KeyCode::Esc => KeyInput::Escape,
                other => KeyInput::Other(format!("{other:?}")),
            };
            Some(SurfaceEvent::Key(key))
        }
        Event::Resize(width, height) => Some(SurfaceEvent::Resize { width, height }),
        _ => None,
    }
}
