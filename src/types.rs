use serde::{Deserialize, Serialize};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Colour capability of an attached terminal, ranked weakest first so the
/// derived `Ord` gives the negotiation order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorProfile {
    /// No colour at all.
    Ascii,
    /// 16-colour ANSI.
    Ansi,
    Ansi256,
    #[default]
    TrueColor,
}

impl ColorProfile {
    /// Best guess for the terminal the current process is attached to,
    /// following the usual COLORTERM / TERM conventions.
    pub fn detect() -> Self {
        let colorterm = std::env::var("COLORTERM").unwrap_or_default().to_lowercase();
        if colorterm == "truecolor" || colorterm == "24bit" { return ColorProfile::TrueColor; }
        let term = std::env::var("TERM").unwrap_or_default().to_lowercase();
        if term.is_empty() || term == "dumb" { return ColorProfile::Ascii; }
        if term.contains("256color") { return ColorProfile::Ansi256; }
        ColorProfile::Ansi
    }
}

/// Floor reported by `min_color_profile` when nobody is attached.
pub const DEFAULT_COLOR_FLOOR: ColorProfile = ColorProfile::Ansi256;

/// A hit-test rectangle mapped to a semantic action.
///
/// Lines are content lines (scroll offset already applied); columns are
/// half-open `[start_col, end_col)`. `end_col == 0` means "to the right
/// edge of the viewport" and is resolved at hit-test time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickableRegion {
    pub start_line: usize,
    pub end_line: usize,
    #[serde(default)]
    pub start_col: u16,
    #[serde(default)]
    pub end_col: u16,
    pub action: String,
    #[serde(default)]
    pub target: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderPayload {
    pub content: String,
    #[serde(default)]
    pub regions: Vec<ClickableRegion>,
    #[serde(default)]
    pub total_lines: usize,
    #[serde(default)]
    pub sequence_num: u64,
    #[serde(default)]
    pub is_touch_mode: bool,
    /// Surface background (`#rrggbb`), empty for terminal default.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub background: String,
    /// Background of the neighbouring terminal panes, used for blending edges.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub terminal_background: String,
}

impl RenderPayload {
    /// Line count to scroll against: the declared total, or the content's own.
    pub fn line_count(&self) -> usize {
        if self.total_lines > 0 { self.total_lines } else { self.content.lines().count() }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    #[default]
    Action,
    Key,
    MenuSelect,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
    None,
}

/// Index sent in `mouse_x` of a `menu_select` input when the menu was dismissed.
pub const MENU_CANCEL: i32 = -1;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPayload {
    #[serde(default)]
    pub sequence_num: u64,
    #[serde(rename = "type", default)]
    pub kind: InputKind,
    /// Column of the event, or the selected item index for `menu_select`.
    #[serde(default)]
    pub mouse_x: i32,
    #[serde(default)]
    pub mouse_y: i32,
    #[serde(default)]
    pub button: MouseButton,
    #[serde(default = "default_press")]
    pub action: String,
    #[serde(default)]
    pub viewport_offset: usize,
    #[serde(default)]
    pub resolved_action: String,
    #[serde(default)]
    pub resolved_target: String,
    #[serde(default)]
    pub pane_id: String,
    #[serde(default)]
    pub is_simulated_right_click: bool,
    #[serde(default)]
    pub is_touch_mode: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
}

fn default_press() -> String { "press".to_string() }

impl InputPayload {
    /// Selected menu index, `None` on cancel or for non-menu inputs.
    pub fn menu_index(&self) -> Option<usize> {
        if self.kind != InputKind::MenuSelect || self.mouse_x < 0 { return None; }
        Some(self.mouse_x as usize)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItemPayload {
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(default)]
    pub separator: bool,
    #[serde(default)]
    pub header: bool,
}

impl MenuItemPayload {
    pub fn item(label: impl Into<String>, key: impl Into<String>) -> Self {
        MenuItemPayload { label: label.into(), key: key.into(), separator: false, header: false }
    }

    pub fn separator() -> Self {
        MenuItemPayload { label: String::new(), key: String::new(), separator: true, header: false }
    }

    pub fn header(label: impl Into<String>) -> Self {
        MenuItemPayload { label: label.into(), key: String::new(), separator: false, header: true }
    }

    /// Separators and headers never take a highlight or a selection.
    pub fn selectable(&self) -> bool { !self.separator && !self.header }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuPayload {
    #[serde(default)]
    pub title: String,
    /// Preferred top row of the menu on the surface.
    #[serde(default)]
    pub y: u16,
    pub items: Vec<MenuItemPayload>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribePayload {
    pub width: u16,
    pub height: u16,
    #[serde(default)]
    pub color_profile: ColorProfile,
    #[serde(default)]
    pub pane_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizePayload {
    pub width: u16,
    pub height: u16,
    #[serde(default)]
    pub pane_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportPayload {
    pub viewport_offset: usize,
}
