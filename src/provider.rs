//! Built-in content provider: the tmux window list of one session.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info, warn};
use unicode_width::UnicodeWidthChar;

use crate::error::Result;
use crate::server::{Handler, RenderRequest, Server};
use crate::tmux::Control;
use crate::types::*;

const LIST_FORMAT: &str = "#{window_id}\t#{window_index}\t#{window_name}\t#{window_active}";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowInfo {
    pub id: String,
    pub index: String,
    pub name: String,
    pub active: bool,
}

fn parse_windows(out: &str) -> Vec<WindowInfo> {
    out.lines()
        .filter_map(|l| {
            let mut parts = l.splitn(4, '\t');
            let id = parts.next()?.trim();
            let index = parts.next()?;
            let name = parts.next()?;
            let active = parts.next()?.trim() == "1";
            (!id.is_empty()).then(|| WindowInfo { id: id.into(), index: index.into(), name: name.into(), active })
        })
        .collect()
}

/// Truncate or pad to exactly `width` display columns.
fn fit(s: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for ch in s.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > width { break; }
        out.push(ch);
        used += w;
    }
    out.extend(std::iter::repeat(' ').take(width - used));
    out
}

/// Accent for the header line at a given colour tier.
fn accent(profile: ColorProfile) -> &'static str {
    match profile {
        ColorProfile::TrueColor => "\x1b[1;38;2;137;180;250m",
        ColorProfile::Ansi256 => "\x1b[1;38;5;111m",
        ColorProfile::Ansi => "\x1b[1;34m",
        ColorProfile::Ascii => "",
    }
}

fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// tmux commands behind the items of an open menu, by item index.
struct PendingMenu {
    commands: Vec<Option<Vec<String>>>,
}

pub struct WindowList<C: Control> {
    ctl: C,
    session: String,
    pending: Mutex<HashMap<String, PendingMenu>>,
}

impl<C: Control + 'static> WindowList<C> {
    pub fn new(ctl: C, session: &str) -> Self {
        WindowList { ctl, session: session.to_string(), pending: Mutex::new(HashMap::new()) }
    }

    /// Raw window listing; changes whenever anything visible changes.
    /// Fails once the session is gone.
    pub fn snapshot(&self) -> Result<String> {
        self.ctl.run(&["list-windows", "-t", &self.session, "-F", LIST_FORMAT])
    }

    pub fn windows(&self) -> Vec<WindowInfo> {
        self.snapshot().map(|out| parse_windows(&out)).unwrap_or_default()
    }

    pub fn build_frame(&self, windows: &[WindowInfo], width: u16, profile: ColorProfile) -> RenderPayload {
        let width = width.max(1) as usize;
        let mut lines = Vec::with_capacity(windows.len() + 3);
        let mut regions = Vec::with_capacity(windows.len() + 1);

        let header = fit(&format!(" {}", self.session), width);
        lines.push(match accent(profile) {
            "" => header,
            a => format!("{a}{header}\x1b[0m"),
        });
        for w in windows {
            let marker = if w.active && profile == ColorProfile::Ascii { '*' } else { ' ' };
            let text = fit(&format!("{marker}{}: {}", w.index, w.name), width);
            regions.push(ClickableRegion {
                start_line: lines.len(),
                end_line: lines.len(),
                start_col: 0,
                end_col: 0,
                action: "select_window".into(),
                target: w.id.clone(),
            });
            lines.push(if w.active && profile != ColorProfile::Ascii { format!("\x1b[7m{text}\x1b[27m") } else { text });
        }
        lines.push(String::new());
        regions.push(ClickableRegion {
            start_line: lines.len(),
            end_line: lines.len(),
            action: "new_window".into(),
            ..Default::default()
        });
        lines.push(fit(" [+] new window", width));

        RenderPayload {
            total_lines: lines.len(),
            content: lines.join("\n"),
            regions,
            ..Default::default()
        }
    }

    /// Handle an action input. Returns a menu to open, if the input asked for one.
    pub fn handle_action(&self, client_id: &str, input: &InputPayload) -> Option<MenuPayload> {
        let wants_menu = input.is_simulated_right_click || input.button == MouseButton::Right;
        match (input.resolved_action.as_str(), wants_menu) {
            ("select_window", true) => {
                let target = input.resolved_target.as_str();
                let name = self.windows().into_iter().find(|w| w.id == target).map(|w| w.name).unwrap_or_default();
                let menu = MenuPayload {
                    title: name.clone(),
                    y: (input.mouse_y.max(0) as u16).saturating_add(1),
                    items: vec![
                        MenuItemPayload::header(format!("Window {name}")),
                        MenuItemPayload::item("New window", "n"),
                        MenuItemPayload::separator(),
                        MenuItemPayload::item("Kill window", "x"),
                    ],
                };
                let pending = PendingMenu {
                    commands: vec![
                        None,
                        Some(argv(&["new-window", "-a", "-t", target])),
                        None,
                        Some(argv(&["kill-window", "-t", target])),
                    ],
                };
                self.lock_pending().insert(client_id.to_string(), pending);
                Some(menu)
            }
            ("select_window", false) => {
                self.run_logged(&["select-window", "-t", &input.resolved_target]);
                None
            }
            ("new_window", _) => {
                let target = format!("{}:", self.session);
                self.run_logged(&["new-window", "-t", &target]);
                None
            }
            (action, _) => {
                debug!(event = "unhandled_action", client_id, action);
                None
            }
        }
    }

    /// Handle a `menu_select` answer; runs the chosen command if there is one.
    pub fn handle_menu_select(&self, client_id: &str, input: &InputPayload) {
        let Some(pending) = self.lock_pending().remove(client_id) else {
            debug!(event = "menu_select_without_menu", client_id);
            return;
        };
        let Some(idx) = input.menu_index() else { return; };
        if let Some(Some(args)) = pending.commands.get(idx) {
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            self.run_logged(&args);
        }
    }

    fn run_logged(&self, args: &[&str]) {
        if let Err(e) = self.ctl.run(args) {
            warn!(event = "tmux_command_failed", error = %e);
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingMenu>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Control + 'static> Handler for WindowList<C> {
    fn render(&self, req: &RenderRequest<'_>) -> Option<RenderPayload> {
        let windows = self.windows();
        Some(self.build_frame(&windows, req.width, req.color_profile))
    }

    fn on_input(&self, server: &Server, client_id: &str, input: &InputPayload) {
        match input.kind {
            InputKind::Action => {
                if let Some(menu) = self.handle_action(client_id, input) {
                    server.send_menu(client_id, menu);
                } else {
                    server.broadcast_render();
                }
            }
            InputKind::MenuSelect => {
                self.handle_menu_select(client_id, input);
                server.broadcast_render();
            }
            InputKind::Key => debug!(event = "key", client_id, key = %input.key),
        }
    }

    fn on_disconnect(&self, _server: &Server, client_id: &str) {
        if self.lock_pending().remove(client_id).is_some() {
            info!(event = "pending_menu_dropped", client_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tmux::fake::FakeTmux;

    const LISTING: &str = "@1\t1\teditor\t0\n@2\t2\tshell\t1\n";

    fn provider() -> WindowList<FakeTmux> {
        let t = FakeTmux::default();
        t.reply("list-windows", LISTING);
        t.reply("select-window", "");
        t.reply("new-window", "");
        t.reply("kill-window", "");
        WindowList::new(t, "work")
    }

    #[test]
    fn frame_has_one_region_per_window_plus_button() {
        let p = provider();
        let frame = p.build_frame(&p.windows(), 20, ColorProfile::TrueColor);
        assert_eq!(frame.total_lines, 5);
        assert_eq!(frame.regions.len(), 3);
        assert_eq!(frame.regions[0].target, "@1");
        assert_eq!(frame.regions[1].start_line, 2);
        assert_eq!(frame.regions[2].action, "new_window");
        assert_eq!(frame.regions[2].start_line, 4);
        let lines: Vec<&str> = frame.content.lines().collect();
        assert!(lines[2].starts_with("\x1b[7m 2: shell"));
        assert!(!lines[1].contains('\x1b'));
    }

    #[test]
    fn ascii_profile_emits_no_escapes() {
        let p = provider();
        let frame = p.build_frame(&p.windows(), 20, ColorProfile::Ascii);
        assert!(!frame.content.contains('\x1b'));
        assert!(frame.content.contains("*2: shell"));
    }

    #[test]
    fn right_click_opens_menu_and_selection_runs_command() {
        let p = provider();
        let input = InputPayload {
            resolved_action: "select_window".into(),
            resolved_target: "@1".into(),
            is_simulated_right_click: true,
            button: MouseButton::Right,
            mouse_y: 1,
            ..Default::default()
        };
        let menu = p.handle_action("c1", &input).unwrap();
        assert_eq!(menu.items[0].label, "Window editor");
        assert_eq!(menu.y, 2);
        let select = InputPayload { kind: InputKind::MenuSelect, mouse_x: 3, ..Default::default() };
        p.handle_menu_select("c1", &select);
        assert!(p.ctl.calls().contains(&vec!["kill-window".to_string(), "-t".into(), "@1".into()]));
        // The pending menu is consumed.
        let before = p.ctl.calls().len();
        p.handle_menu_select("c1", &select);
        assert_eq!(p.ctl.calls().len(), before);
    }

    #[test]
    fn cancelled_menu_runs_nothing() {
        let p = provider();
        let input = InputPayload {
            resolved_action: "select_window".into(),
            resolved_target: "@2".into(),
            is_simulated_right_click: true,
            ..Default::default()
        };
        p.handle_action("c1", &input).unwrap();
        let before = p.ctl.calls().len();
        p.handle_menu_select("c1", &InputPayload { kind: InputKind::MenuSelect, mouse_x: MENU_CANCEL, ..Default::default() });
        assert_eq!(p.ctl.calls().len(), before);
        assert!(p.lock_pending().is_empty());
    }

    #[test]
    fn plain_click_selects_window() {
        let p = provider();
        let input = InputPayload { resolved_action: "select_window".into(), resolved_target: "@2".into(), ..Default::default() };
        assert!(p.handle_action("c1", &input).is_none());
        assert_eq!(p.ctl.calls().last().unwrap(), &vec!["select-window".to_string(), "-t".into(), "@2".into()]);
    }
}
