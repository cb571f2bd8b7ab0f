//! Colour and SGR parsing for frame content.
//!
//! Frames arrive as text with embedded ANSI escapes. This module turns them
//! into ratatui lines once per frame so drawing is a plain slice copy.

use ratatui::prelude::*;
use ratatui::style::{Modifier, Style};

use crate::clipboard::ansi_regex;

// ─── Color mapping ──────────────────────────────────────────────────────────

/// Map a colour string to a ratatui `Color`.
///
/// Supports: named colours, `brightX`, `colourN`/`colorN`, `#RRGGBB` and
/// `default`/`terminal`. Anything else maps to `Reset`.
pub fn map_color(name: &str) -> Color {
    let name = name.trim();
    if let Some(hex_str) = name.strip_prefix('#') {
        if hex_str.len() == 6 && hex_str.is_ascii() {
            if let (Ok(r), Ok(g), Ok(b)) = (
                u8::from_str_radix(&hex_str[0..2], 16),
                u8::from_str_radix(&hex_str[2..4], 16),
                u8::from_str_radix(&hex_str[4..6], 16),
            ) {
                return Color::Rgb(r, g, b);
            }
        }
    }
    let lower = name.to_lowercase();
    if let Some(idx_str) = lower.strip_prefix("colour").or_else(|| lower.strip_prefix("color")) {
        if let Ok(idx) = idx_str.parse::<u8>() {
            return Color::Indexed(idx);
        }
    }
    match lower.as_str() {
        "black" => Color::Black,
        "red" => Color::Red,
        "green" => Color::Green,
        "yellow" => Color::Yellow,
        "blue" => Color::Blue,
        "magenta" => Color::Magenta,
        "cyan" => Color::Cyan,
        "white" => Color::Gray,
        "brightblack" | "bright-black" => Color::DarkGray,
        "brightred" | "bright-red" => Color::LightRed,
        "brightgreen" | "bright-green" => Color::LightGreen,
        "brightyellow" | "bright-yellow" => Color::LightYellow,
        "brightblue" | "bright-blue" => Color::LightBlue,
        "brightmagenta" | "bright-magenta" => Color::LightMagenta,
        "brightcyan" | "bright-cyan" => Color::LightCyan,
        "brightwhite" | "bright-white" => Color::White,
        _ => Color::Reset,
    }
}

/// Background colour for a surface, `None` for the terminal default.
pub fn background(value: &str) -> Option<Color> {
    if value.trim().is_empty() { return None; }
    match map_color(value) {
        Color::Reset => None,
        c => Some(c),
    }
}

/// The sixteen base colours in SGR order (30-37, then 90-97).
fn ansi16(n: u8) -> Color {
    match n {
        0 => Color::Black,
        1 => Color::Red,
        2 => Color::Green,
        3 => Color::Yellow,
        4 => Color::Blue,
        5 => Color::Magenta,
        6 => Color::Cyan,
        7 => Color::Gray,
        8 => Color::DarkGray,
        9 => Color::LightRed,
        10 => Color::LightGreen,
        11 => Color::LightYellow,
        12 => Color::LightBlue,
        13 => Color::LightMagenta,
        14 => Color::LightCyan,
        _ => Color::White,
    }
}

// ─── SGR ────────────────────────────────────────────────────────────────────

/// Extended colour after a 38/48: `5;N` or `2;R;G;B`. Returns the colour and
/// how many parameters it consumed.
fn extended_color(params: &[u16]) -> (Option<Color>, usize) {
    match params.first() {
        Some(5) => (params.get(1).map(|&n| Color::Indexed(n.min(255) as u8)), 2),
        Some(2) => match (params.get(1), params.get(2), params.get(3)) {
            (Some(&r), Some(&g), Some(&b)) => (Some(Color::Rgb(r.min(255) as u8, g.min(255) as u8, b.min(255) as u8)), 4),
            _ => (None, params.len()),
        },
        _ => (None, 1),
    }
}

/// Apply the parameters of one `ESC [ ... m` sequence.
pub fn apply_sgr(mut style: Style, params: &str) -> Style {
    let nums: Vec<u16> = if params.is_empty() {
        vec![0]
    } else {
        params.split(|c: char| c == ';' || c == ':').map(|p| p.parse().unwrap_or(0)).collect()
    };
    let mut i = 0;
    while i < nums.len() {
        let n = nums[i];
        i += 1;
        style = match n {
            0 => Style::default(),
            1 => style.add_modifier(Modifier::BOLD),
            2 => style.add_modifier(Modifier::DIM),
            3 => style.add_modifier(Modifier::ITALIC),
            4 => style.add_modifier(Modifier::UNDERLINED),
            5 => style.add_modifier(Modifier::SLOW_BLINK),
            7 => style.add_modifier(Modifier::REVERSED),
            8 => style.add_modifier(Modifier::HIDDEN),
            9 => style.add_modifier(Modifier::CROSSED_OUT),
            22 => style.remove_modifier(Modifier::BOLD | Modifier::DIM),
            23 => style.remove_modifier(Modifier::ITALIC),
            24 => style.remove_modifier(Modifier::UNDERLINED),
            25 => style.remove_modifier(Modifier::SLOW_BLINK),
            27 => style.remove_modifier(Modifier::REVERSED),
            28 => style.remove_modifier(Modifier::HIDDEN),
            29 => style.remove_modifier(Modifier::CROSSED_OUT),
            30..=37 => style.fg(ansi16((n - 30) as u8)),
            39 => style.fg(Color::Reset),
            40..=47 => style.bg(ansi16((n - 40) as u8)),
            49 => style.bg(Color::Reset),
            90..=97 => style.fg(ansi16((n - 90 + 8) as u8)),
            100..=107 => style.bg(ansi16((n - 100 + 8) as u8)),
            38 | 48 => {
                let (color, used) = extended_color(&nums[i..]);
                i += used;
                match (n, color) {
                    (38, Some(c)) => style.fg(c),
                    (48, Some(c)) => style.bg(c),
                    _ => style,
                }
            }
            _ => style,
        };
    }
    style
}

/// One content line to styled spans. Non-SGR escapes are dropped; the style
/// carried in from previous lines is passed in and the final style returned.
pub fn ansi_line(text: &str, mut style: Style) -> (Line<'static>, Style) {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut last = 0;
    if let Some(re) = ansi_regex() {
        for m in re.find_iter(text) {
            if m.start() > last {
                spans.push(Span::styled(text[last..m.start()].to_string(), style));
            }
            let seq = m.as_str();
            if let Some(params) = seq.strip_prefix("\x1b[").and_then(|s| s.strip_suffix('m')) {
                style = apply_sgr(style, params);
            }
            last = m.end();
        }
    }
    if last < text.len() {
        spans.push(Span::styled(text[last..].to_string(), style));
    }
    (Line::from(spans), style)
}

/// Whole frame content to lines, with SGR state carried across newlines.
pub fn ansi_to_lines(content: &str) -> Vec<Line<'static>> {
    let mut style = Style::default();
    content
        .lines()
        .map(|l| {
            let (line, next) = ansi_line(l, style);
            style = next;
            line
        })
        .collect()
}
