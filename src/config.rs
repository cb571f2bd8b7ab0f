use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Tunables shared by the coordinator and the renderer clients.
///
/// Every field has a compiled-in default and can be overridden through a
/// `PANESIDE_*` environment variable (see [`Config::from_env`]).
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory holding the per-session socket, PID file and logs.
    pub runtime_dir: PathBuf,

    // ── gestures ──
    pub long_press: Duration,
    /// Movement (cells) that cancels a pending long-press.
    pub long_press_tolerance: u16,
    /// Movement (cells) between press and release that turns a click into a drag.
    pub drag_tolerance: u16,
    pub double_tap_window: Duration,
    pub double_tap_distance: u16,
    /// Rightmost columns where a plain click on a window/pane/group opens the menu.
    pub edge_zone_width: u16,
    pub scroll_step: usize,

    // ── transport ──
    pub ping_interval: Duration,
    pub connect_attempts: u32,
    pub connect_backoff: Duration,
    pub reconnect_delay: Duration,
    pub write_timeout: Duration,
    pub max_line_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            runtime_dir: env::temp_dir(),
            long_press: Duration::from_millis(400),
            long_press_tolerance: 3,
            drag_tolerance: 1,
            double_tap_window: Duration::from_millis(300),
            double_tap_distance: 2,
            edge_zone_width: 2,
            scroll_step: 3,
            ping_interval: Duration::from_secs(5),
            connect_attempts: 10,
            connect_backoff: Duration::from_millis(100),
            reconnect_delay: Duration::from_secs(1),
            write_timeout: Duration::from_secs(2),
            max_line_bytes: 8 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut c = Config::default();
        if let Ok(dir) = env::var("PANESIDE_RUNTIME_DIR") {
            if !dir.trim().is_empty() { c.runtime_dir = PathBuf::from(dir); }
        }
        env_millis("PANESIDE_LONG_PRESS_MS", &mut c.long_press);
        env_parse("PANESIDE_LONG_PRESS_TOLERANCE", &mut c.long_press_tolerance);
        env_parse("PANESIDE_DRAG_TOLERANCE", &mut c.drag_tolerance);
        env_millis("PANESIDE_DOUBLE_TAP_MS", &mut c.double_tap_window);
        env_parse("PANESIDE_DOUBLE_TAP_DISTANCE", &mut c.double_tap_distance);
        env_parse("PANESIDE_EDGE_ZONE", &mut c.edge_zone_width);
        env_parse("PANESIDE_SCROLL_STEP", &mut c.scroll_step);
        env_millis("PANESIDE_PING_MS", &mut c.ping_interval);
        env_parse("PANESIDE_CONNECT_ATTEMPTS", &mut c.connect_attempts);
        env_millis("PANESIDE_CONNECT_BACKOFF_MS", &mut c.connect_backoff);
        env_millis("PANESIDE_RECONNECT_MS", &mut c.reconnect_delay);
        env_millis("PANESIDE_WRITE_TIMEOUT_MS", &mut c.write_timeout);
        env_parse("PANESIDE_MAX_LINE_BYTES", &mut c.max_line_bytes);
        c
    }
}

fn env_parse<T: FromStr>(key: &str, slot: &mut T) {
    if let Some(v) = env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok()) {
        *slot = v;
    }
}

fn env_millis(key: &str, slot: &mut Duration) {
    if let Some(ms) = env::var(key).ok().and_then(|s| s.trim().parse::<u64>().ok()) {
        *slot = Duration::from_millis(ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_drag_tolerance_below_long_press_tolerance() {
        let c = Config::default();
        assert!(c.drag_tolerance < c.long_press_tolerance);
        assert!(c.double_tap_window < c.long_press);
    }

    #[test]
    fn env_overrides_are_parsed() {
        env::set_var("PANESIDE_LONG_PRESS_MS", "650");
        env::set_var("PANESIDE_EDGE_ZONE", "4");
        env::set_var("PANESIDE_DRAG_TOLERANCE", "not-a-number");
        let c = Config::from_env();
        env::remove_var("PANESIDE_LONG_PRESS_MS");
        env::remove_var("PANESIDE_EDGE_ZONE");
        env::remove_var("PANESIDE_DRAG_TOLERANCE");
        assert_eq!(c.long_press, Duration::from_millis(650));
        assert_eq!(c.edge_zone_width, 4);
        assert_eq!(c.drag_tolerance, Config::default().drag_tolerance);
    }
}
