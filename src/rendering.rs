use ratatui::prelude::*;
use ratatui::widgets::*;
use ratatui::style::{Style, Modifier};
use unicode_width::UnicodeWidthStr;

use crate::menu::ContextMenu;
use crate::style::{ansi_to_lines, background};
use crate::types::RenderPayload;

/// A received frame with its content already parsed into styled lines.
#[derive(Clone, Debug)]
pub struct StyledFrame {
    pub payload: RenderPayload,
    pub lines: Vec<Line<'static>>,
}

impl StyledFrame {
    pub fn new(payload: RenderPayload) -> Self {
        let lines = ansi_to_lines(&payload.content);
        StyledFrame { payload, lines }
    }
}

/// Everything one draw needs, borrowed from the renderer state.
pub struct SurfaceView<'a> {
    pub frame: Option<&'a StyledFrame>,
    pub offset: usize,
    pub menu: Option<&'a ContextMenu>,
    pub connected: bool,
}

pub fn draw_surface(f: &mut Frame, view: &SurfaceView<'_>) {
    let area = f.size();
    if area.width == 0 || area.height == 0 { return; }
    let base = view.frame
        .and_then(|fr| background(&fr.payload.background))
        .map(|c| Style::default().bg(c))
        .unwrap_or_default();

    match view.frame {
        Some(fr) if view.connected => {
            let visible: Vec<Line<'static>> = fr.lines.iter()
                .skip(view.offset)
                .take(area.height as usize)
                .cloned()
                .collect();
            f.render_widget(Clear, area);
            f.render_widget(Paragraph::new(visible).style(base), area);
        }
        _ => {
            let msg = if view.connected { "loading…" } else { "reconnecting…" };
            draw_status_line(f, area, base, msg);
        }
    }

    if let Some(menu) = view.menu {
        draw_menu(f, menu);
    }
}

/// Centered dim one-liner in place of content.
fn draw_status_line(f: &mut Frame, area: Rect, base: Style, msg: &str) {
    f.render_widget(Clear, area);
    f.render_widget(Block::default().style(base), area);
    let row = Rect { x: area.x, y: area.y + area.height / 2, width: area.width, height: 1 };
    let text = Paragraph::new(Line::from(Span::styled(msg.to_string(), Style::default().add_modifier(Modifier::DIM))))
        .alignment(Alignment::Center);
    f.render_widget(text, row);
}

pub fn draw_menu(f: &mut Frame, menu: &ContextMenu) {
    let layout = menu.layout();
    let area = layout.area.intersection(f.size());
    if area.width < 3 || area.height < 3 { return; }
    let payload = menu.payload();

    let mut block = Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray));
    if !payload.title.is_empty() {
        block = block.title(Span::styled(format!(" {} ", payload.title), Style::default().add_modifier(Modifier::BOLD)));
    }
    let inner = block.inner(area);
    f.render_widget(Clear, area);
    f.render_widget(block, area);

    let width = inner.width as usize;
    for (i, item) in payload.items.iter().enumerate() {
        let Some(row) = layout.item_row(i) else { break; };
        let rect = Rect { x: inner.x, y: row, width: inner.width, height: 1 };
        let (line, style) = if item.separator {
            (Line::from("─".repeat(width)), Style::default().fg(Color::DarkGray))
        } else if item.header {
            (Line::from(format!(" {}", item.label)), Style::default().add_modifier(Modifier::BOLD | Modifier::DIM))
        } else {
            let left = format!(" {}", item.label);
            let right = if item.key.is_empty() { String::new() } else { format!("({}) ", item.key) };
            let pad = width.saturating_sub(UnicodeWidthStr::width(left.as_str()) + UnicodeWidthStr::width(right.as_str()));
            let line = Line::from(vec![
                Span::raw(left),
                Span::raw(" ".repeat(pad)),
                Span::styled(right, Style::default().fg(Color::DarkGray)),
            ]);
            let style = if menu.highlighted() == Some(i) {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };
            (line, style)
        };
        f.render_widget(Paragraph::new(line).style(style), rect);
    }
}
