use std::panic::{self, AssertUnwindSafe};

use sha2::{Digest, Sha256};
use tracing::error;

use crate::types::RenderPayload;

pub(crate) type ContentHash = [u8; 32];

/// Run a provider callback, converting a panic into `None` plus a log line
/// so it never unwinds into the connection thread that called it.
pub(crate) fn guarded<T>(hook: &'static str, client_id: &str, f: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(v) => Some(v),
        Err(cause) => {
            let msg = cause.downcast_ref::<&str>().map(|s| s.to_string())
                .or_else(|| cause.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic".to_string());
            error!(event = "callback_panic", hook, client_id, panic = %msg);
            None
        }
    }
}

/// Hash of everything a client would see in a frame. The sequence number is
/// left out so two identical frames hash the same.
pub(crate) fn content_hash(p: &RenderPayload) -> ContentHash {
    let mut h = Sha256::new();
    h.update(p.content.as_bytes());
    h.update([0u8]);
    for r in &p.regions {
        h.update(format!("{}:{}:{}:{}:", r.start_line, r.end_line, r.start_col, r.end_col).as_bytes());
        h.update(r.action.as_bytes());
        h.update([0u8]);
        h.update(r.target.as_bytes());
        h.update([0u8]);
    }
    h.update((p.total_lines as u64).to_le_bytes());
    h.update([p.is_touch_mode as u8]);
    h.update(p.background.as_bytes());
    h.update([0u8]);
    h.update(p.terminal_background.as_bytes());
    h.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClickableRegion;

    #[test]
    fn guarded_swallows_panics() {
        assert_eq!(guarded("test", "c1", || 7), Some(7));
        let r: Option<()> = guarded("test", "c1", || panic!("boom"));
        assert_eq!(r, None);
    }

    #[test]
    fn hash_ignores_sequence_but_not_regions() {
        let a = RenderPayload { content: "x".into(), sequence_num: 1, ..Default::default() };
        let b = RenderPayload { sequence_num: 99, ..a.clone() };
        assert_eq!(content_hash(&a), content_hash(&b));

        let c = RenderPayload {
            regions: vec![ClickableRegion { start_line: 0, end_line: 0, action: "select_window".into(), ..Default::default() }],
            ..a.clone()
        };
        assert_ne!(content_hash(&a), content_hash(&c));
    }
}
