//! Modal context menu drawn over a renderer surface.
//!
//! While a [`ContextMenu`] is open it owns all pointer and key input. Its
//! geometry comes from [`MenuLayout::compute`], which both the drawing code
//! and the hit test use, so what is painted is exactly what is clickable.

use ratatui::layout::Rect;
use unicode_width::UnicodeWidthStr;

use crate::gesture::KeyInput;
use crate::types::{MenuItemPayload, MenuPayload};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuOutcome {
    Selected(usize),
    Cancelled,
}

/// Placement of a menu on a surface. `area` includes the border.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MenuLayout {
    pub area: Rect,
}

impl MenuLayout {
    pub fn compute(menu: &MenuPayload, surface_w: u16, surface_h: u16) -> MenuLayout {
        let widest = menu.items.iter().map(item_width).max().unwrap_or(0);
        let title = UnicodeWidthStr::width(menu.title.as_str()) + 2;
        let inner = widest.max(title).max(8);
        let width = (inner + 2).min(surface_w as usize) as u16;
        let height = (menu.items.len() + 2).min(surface_h as usize) as u16;
        let y = menu.y.min(surface_h.saturating_sub(height));
        MenuLayout { area: Rect::new(0, y, width, height) }
    }

    pub fn contains(&self, x: u16, y: u16) -> bool {
        let a = self.area;
        x >= a.x && x < a.x + a.width && y >= a.y && y < a.y + a.height
    }

    /// Index of the item row at (`x`, `y`), border excluded.
    pub fn item_at(&self, x: u16, y: u16, items: usize) -> Option<usize> {
        let a = self.area;
        if a.width < 3 || a.height < 3 { return None; }
        if x <= a.x || x >= a.x + a.width - 1 { return None; }
        if y <= a.y || y >= a.y + a.height - 1 { return None; }
        let idx = (y - a.y - 1) as usize;
        (idx < items).then_some(idx)
    }

    /// Screen row of item `idx`, if it fits inside the border.
    pub fn item_row(&self, idx: usize) -> Option<u16> {
        let visible = self.area.height.saturating_sub(2) as usize;
        (idx < visible).then(|| self.area.y + 1 + idx as u16)
    }
}

/// Rendered width of an item row: `" label  (k) "`.
fn item_width(item: &MenuItemPayload) -> usize {
    let label = UnicodeWidthStr::width(item.label.as_str());
    let key = if item.key.is_empty() { 0 } else { UnicodeWidthStr::width(item.key.as_str()) + 4 };
    label + key + 2
}

#[derive(Clone, Debug)]
pub struct ContextMenu {
    payload: MenuPayload,
    layout: MenuLayout,
    highlighted: Option<usize>,
    /// The button that opened the menu may still be down; releasing it over
    /// an item selects that item.
    drag_active: bool,
}

impl ContextMenu {
    pub fn open(payload: MenuPayload, surface_w: u16, surface_h: u16) -> Self {
        let layout = MenuLayout::compute(&payload, surface_w, surface_h);
        ContextMenu { payload, layout, highlighted: None, drag_active: true }
    }

    pub fn payload(&self) -> &MenuPayload { &self.payload }

    pub fn layout(&self) -> MenuLayout { self.layout }

    pub fn highlighted(&self) -> Option<usize> { self.highlighted }

    pub fn relayout(&mut self, surface_w: u16, surface_h: u16) {
        self.layout = MenuLayout::compute(&self.payload, surface_w, surface_h);
    }

    fn selectable_at(&self, x: u16, y: u16) -> Option<usize> {
        let idx = self.layout.item_at(x, y, self.payload.items.len())?;
        self.payload.items[idx].selectable().then_some(idx)
    }

    pub fn on_motion(&mut self, x: u16, y: u16) {
        self.highlighted = self.selectable_at(x, y);
    }

    pub fn on_press(&mut self, x: u16, y: u16) -> Option<MenuOutcome> {
        self.drag_active = false;
        if !self.layout.contains(x, y) { return Some(MenuOutcome::Cancelled); }
        self.selectable_at(x, y).map(MenuOutcome::Selected)
    }

    pub fn on_release(&mut self, _x: u16, _y: u16) -> Option<MenuOutcome> {
        if !std::mem::take(&mut self.drag_active) { return None; }
        self.highlighted.map(MenuOutcome::Selected)
    }

    pub fn on_scroll(&mut self) -> Option<MenuOutcome> {
        Some(MenuOutcome::Cancelled)
    }

    pub fn on_key(&mut self, key: &KeyInput) -> Option<MenuOutcome> {
        if let KeyInput::Char(c) = key {
            let shortcut = self.payload.items.iter().position(|it| {
                it.selectable() && it.key.chars().count() == 1 && it.key.starts_with(*c)
            });
            if let Some(idx) = shortcut { return Some(MenuOutcome::Selected(idx)); }
        }
        match key {
            KeyInput::Up | KeyInput::Char('k') => { self.step(-1); None }
            KeyInput::Down | KeyInput::Char('j') => { self.step(1); None }
            KeyInput::Enter => self.highlighted.map(MenuOutcome::Selected),
            KeyInput::Escape | KeyInput::Char('q') => Some(MenuOutcome::Cancelled),
            _ => None,
        }
    }

    /// Move the highlight to the next selectable item in `dir`, wrapping.
    fn step(&mut self, dir: isize) {
        let n = self.payload.items.len() as isize;
        if n == 0 { return; }
        let mut idx = match self.highlighted {
            Some(i) => i as isize,
            None if dir > 0 => -1,
            None => n,
        };
        for _ in 0..n {
            idx = (idx + dir).rem_euclid(n);
            if self.payload.items[idx as usize].selectable() {
                self.highlighted = Some(idx as usize);
                return;
            }
        }
    }
}
