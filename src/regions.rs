//! Client-side hit testing against the regions attached to a frame.

use crate::types::ClickableRegion;

/// Actions that address an entity (window, pane, group) rather than a button.
/// A left click on one of these inside the edge zone opens its menu.
const ENTITY_ACTIONS: &[&str] = &["select_window", "select_pane", "select_group", "toggle_group"];

pub fn is_entity_action(action: &str) -> bool {
    ENTITY_ACTIONS.contains(&action)
}

/// First region containing (`line`, `col`), in storage order.
///
/// `line` is a content line (screen row plus scroll offset). Lines are
/// inclusive on both ends, columns are `[start_col, end_col)` with an
/// `end_col` of 0 meaning the viewport width.
pub fn hit_test(regions: &[ClickableRegion], line: usize, col: u16, width: u16) -> Option<&ClickableRegion> {
    regions.iter().find(|r| {
        if line < r.start_line || line > r.end_line { return false; }
        let end = if r.end_col == 0 { width } else { r.end_col };
        col >= r.start_col && col < end
    })
}

/// Whether `col` lies in the right-hand edge zone of a surface `width` wide.
/// The zone is `zone` columns but never more than a quarter of the surface.
pub fn in_edge_zone(col: u16, width: u16, zone: u16) -> bool {
    let zone = zone.min(width / 4);
    zone > 0 && col >= width - zone
}

/// Outcome of resolving a click on the surface.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolved {
    pub action: String,
    pub target: String,
    /// The click should be treated as a right-click by the coordinator.
    pub as_right_click: bool,
}

/// Resolve a left click at screen (`x`, `y`). Entity regions clicked in the
/// edge zone are upgraded to right-clicks.
pub fn resolve_left_click(
    regions: &[ClickableRegion],
    x: u16,
    y: u16,
    offset: usize,
    width: u16,
    edge_zone: u16,
) -> Resolved {
    let Some(r) = hit_test(regions, y as usize + offset, x, width) else { return Resolved::default(); };
    Resolved {
        action: r.action.clone(),
        target: r.target.clone(),
        as_right_click: is_entity_action(&r.action) && in_edge_zone(x, width, edge_zone),
    }
}

/// Resolve a click that is already a right-click (real or simulated).
pub fn resolve_right_click(regions: &[ClickableRegion], x: u16, y: u16, offset: usize, width: u16) -> Resolved {
    match hit_test(regions, y as usize + offset, x, width) {
        Some(r) => Resolved { action: r.action.clone(), target: r.target.clone(), as_right_click: true },
        None => Resolved { as_right_click: true, ..Resolved::default() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(lines: (usize, usize), cols: (u16, u16), action: &str, target: &str) -> ClickableRegion {
        ClickableRegion {
            start_line: lines.0,
            end_line: lines.1,
            start_col: cols.0,
            end_col: cols.1,
            action: action.into(),
            target: target.into(),
        }
    }

    #[test]
    fn overlapping_regions_resolve_to_the_first_stored() {
        let regions = vec![
            region((2, 4), (0, 0), "select_window", "@1"),
            region((3, 3), (0, 10), "new_window", ""),
        ];
        let hit = hit_test(&regions, 3, 5, 30).unwrap();
        assert_eq!(hit.target, "@1");
    }

    #[test]
    fn zero_end_col_reaches_viewport_edge() {
        let regions = vec![region((0, 0), (5, 0), "select_window", "@2")];
        assert!(hit_test(&regions, 0, 29, 30).is_some());
        assert!(hit_test(&regions, 0, 30, 30).is_none());
        assert!(hit_test(&regions, 0, 4, 30).is_none());
    }

    #[test]
    fn miss_resolves_to_empty_action() {
        let regions = vec![region((0, 0), (0, 0), "select_window", "@1")];
        let r = resolve_left_click(&regions, 3, 5, 0, 30, 2);
        assert_eq!(r, Resolved::default());
    }

    #[test]
    fn scroll_offset_maps_screen_row_to_content_line() {
        let regions = vec![region((12, 12), (0, 0), "select_window", "@7")];
        assert_eq!(resolve_left_click(&regions, 1, 2, 10, 30, 2).target, "@7");
        assert!(resolve_left_click(&regions, 1, 2, 0, 30, 2).action.is_empty());
    }

    #[test]
    fn edge_zone_upgrades_entity_clicks_only() {
        let regions = vec![
            region((0, 0), (0, 0), "select_window", "@1"),
            region((1, 1), (0, 0), "new_window", ""),
        ];
        assert!(resolve_left_click(&regions, 29, 0, 0, 30, 2).as_right_click);
        assert!(!resolve_left_click(&regions, 27, 0, 0, 30, 2).as_right_click);
        assert!(!resolve_left_click(&regions, 29, 1, 0, 30, 2).as_right_click);
    }

    #[test]
    fn edge_zone_shrinks_on_narrow_surfaces() {
        assert!(in_edge_zone(6, 7, 2));
        assert!(!in_edge_zone(5, 7, 2));
        assert!(in_edge_zone(6, 8, 2));
        assert!(!in_edge_zone(2, 3, 2));
        assert!(!in_edge_zone(0, 0, 2));
        assert!(!in_edge_zone(29, 30, 0));
    }
}
