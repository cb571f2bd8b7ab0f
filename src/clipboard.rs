//! Drag-to-copy: pull plain text out of a rendered frame and hand it to the
//! system clipboard through tmux.

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::OnceLock;

use base64::Engine as _;
use regex::Regex;
use tracing::{debug, warn};
use unicode_width::UnicodeWidthChar;

use crate::gesture::Point;
use crate::tmux::Control;

/// CSI, OSC (BEL or ST terminated) and two-byte escapes.
static ANSI_RE: OnceLock<Option<Regex>> = OnceLock::new();

pub(crate) fn ansi_regex() -> Option<&'static Regex> {
    ANSI_RE.get_or_init(|| {
        Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]").ok()
    }).as_ref()
}

pub fn strip_ansi(s: &str) -> String {
    match ansi_regex() {
        Some(re) => re.replace_all(s, "").into_owned(),
        None => s.to_string(),
    }
}

/// Cells `[c0, c1]` of a plain line, by display column. A wide glyph is
/// taken when its first cell falls in range.
fn columns(line: &str, c0: u16, c1: u16) -> String {
    let mut out = String::new();
    let mut col: u16 = 0;
    for ch in line.chars() {
        if col > c1 { break; }
        let w = UnicodeWidthChar::width(ch).unwrap_or(0) as u16;
        if col >= c0 { out.push(ch); }
        col = col.saturating_add(w);
    }
    out
}

/// Text covered by a drag from `from` to `to` (screen cells) over `content`
/// scrolled by `offset`. Endpoints are put in reading order; the first row
/// starts at its column, the last row stops at its column, rows in between
/// are taken whole. Trailing blanks are dropped per row.
pub fn extract_span(content: &str, offset: usize, from: Point, to: Point) -> String {
    let (top, bot) = if (from.y, from.x) <= (to.y, to.x) { (from, to) } else { (to, from) };
    let lines: Vec<String> = content.lines().map(strip_ansi).collect();
    let mut rows = Vec::new();
    for row in top.y..=bot.y {
        let Some(line) = lines.get(row as usize + offset) else { break; };
        let (c0, c1) = if top.y == bot.y {
            (top.x.min(bot.x), top.x.max(bot.x))
        } else if row == top.y {
            (top.x, u16::MAX)
        } else if row == bot.y {
            (0, bot.x)
        } else {
            (0, u16::MAX)
        };
        rows.push(columns(line, c0, c1).trim_end().to_string());
    }
    rows.join("\n")
}

/// OSC 52 "set clipboard" sequence carrying `text`.
pub fn osc52_sequence(text: &str) -> String {
    format!("\x1b]52;c;{}\x07", base64::engine::general_purpose::STANDARD.encode(text.as_bytes()))
}

/// Store `text` in the tmux paste buffer and push it to every attached
/// client terminal over OSC 52. Best effort; failures are logged.
pub fn copy_to_clipboard(ctl: &dyn Control, text: &str) {
    if text.is_empty() { return; }
    if let Err(e) = ctl.set_buffer(text) {
        warn!(event = "set_buffer_failed", error = %e);
    }
    let seq = osc52_sequence(text);
    for tty in ctl.client_ttys() {
        match OpenOptions::new().write(true).open(&tty) {
            Ok(mut f) => {
                let _ = f.write_all(seq.as_bytes());
                let _ = f.flush();
            }
            Err(e) => debug!(event = "tty_open_failed", tty = %tty, error = %e),
        }
    }
    debug!(event = "copied", bytes = text.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: &str = "\x1b[1m windows\x1b[0m\n 1: editor   \n\x1b[7m 2: shell\x1b[0m\n 3: logs";

    #[test]
    fn strips_sgr_and_osc() {
        assert_eq!(strip_ansi("\x1b[38;2;1;2;3mhi\x1b[0m"), "hi");
        assert_eq!(strip_ansi("\x1b]8;;http://x\x07link\x1b]8;;\x07"), "link");
    }

    #[test]
    fn single_row_span_uses_column_range() {
        assert_eq!(extract_span(FRAME, 0, Point::new(4, 1), Point::new(9, 1)), "editor");
        // Right-to-left drag gives the same text.
        assert_eq!(extract_span(FRAME, 0, Point::new(9, 1), Point::new(4, 1)), "editor");
    }

    #[test]
    fn multi_row_span_follows_reading_order() {
        let text = extract_span(FRAME, 0, Point::new(4, 3), Point::new(4, 1));
        assert_eq!(text, "editor\n 2: shell\n 3: l");
    }

    #[test]
    fn span_honours_scroll_offset_and_frame_end() {
        assert_eq!(extract_span(FRAME, 2, Point::new(1, 0), Point::new(8, 5)), "2: shell\n 3: logs");
    }

    #[test]
    fn wide_glyphs_count_two_columns() {
        assert_eq!(extract_span("日本語 text", 0, Point::new(2, 0), Point::new(5, 0)), "本語");
    }

    #[test]
    fn osc52_is_base64() {
        assert_eq!(osc52_sequence("hi"), "\x1b]52;c;aGk=\x07");
    }
}
