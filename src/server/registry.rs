use std::collections::HashMap;
use std::io::{self, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::types::{ColorProfile, DEFAULT_COLOR_FLOOR};
use super::helpers::ContentHash;

/// One accepted socket. Writes go through `writer` so a render and a menu
/// pushed to the same client never interleave on the wire. `render` is held
/// from the provider call to the write, one frame in flight per client.
pub(crate) struct ClientConn {
    pub conn_id: u64,
    render: Mutex<()>,
    writer: Mutex<UnixStream>,
    control: UnixStream,
}

impl ClientConn {
    pub fn new(conn_id: u64, writer: UnixStream, control: UnixStream) -> Self {
        ClientConn { conn_id, render: Mutex::new(()), writer: Mutex::new(writer), control }
    }

    pub fn lock_render(&self) -> MutexGuard<'_, ()> {
        self.render.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lock_writer(&self) -> MutexGuard<'_, UnixStream> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write_line(&self, line: &str) -> io::Result<()> {
        let mut w = self.lock_writer();
        w.write_all(line.as_bytes())?;
        w.flush()
    }

    /// Shut the socket down in both directions; the read loop sees EOF.
    pub fn close(&self) {
        let _ = self.control.shutdown(Shutdown::Both);
    }
}

pub(crate) struct ClientRecord {
    pub conn: Arc<ClientConn>,
    pub width: u16,
    pub height: u16,
    pub viewport_offset: usize,
    pub color_profile: ColorProfile,
    pub pane_id: String,
    pub last_hash: Option<ContentHash>,
}

/// What a render needs, copied out so the lock is not held across the provider call.
pub(crate) struct RenderTarget {
    pub conn: Arc<ClientConn>,
    pub width: u16,
    pub height: u16,
    pub viewport_offset: usize,
    pub pane_id: String,
}

#[derive(Default)]
pub(crate) struct Registry {
    clients: RwLock<HashMap<String, ClientRecord>>,
}

impl Registry {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ClientRecord>> {
        self.clients.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ClientRecord>> {
        self.clients.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace; returns the connection of a replaced record.
    pub fn insert(&self, client_id: &str, record: ClientRecord) -> Option<Arc<ClientConn>> {
        self.write().insert(client_id.to_string(), record).map(|old| old.conn)
    }

    /// Remove `client_id` only if it is still bound to `conn_id`.
    pub fn remove_if_conn(&self, client_id: &str, conn_id: u64) -> bool {
        let mut map = self.write();
        if map.get(client_id).map(|r| r.conn.conn_id) == Some(conn_id) {
            map.remove(client_id);
            return true;
        }
        false
    }

    /// Mutate the record for `client_id` if it still belongs to `conn_id`.
    pub fn update(&self, client_id: &str, conn_id: u64, f: impl FnOnce(&mut ClientRecord)) -> bool {
        let mut map = self.write();
        match map.get_mut(client_id) {
            Some(rec) if rec.conn.conn_id == conn_id => { f(rec); true }
            _ => false,
        }
    }

    pub fn ids(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn render_target(&self, client_id: &str) -> Option<RenderTarget> {
        self.read().get(client_id).map(|r| RenderTarget {
            conn: r.conn.clone(),
            width: r.width,
            height: r.height,
            viewport_offset: r.viewport_offset,
            pane_id: r.pane_id.clone(),
        })
    }

    pub fn conn(&self, client_id: &str) -> Option<Arc<ClientConn>> {
        self.read().get(client_id).map(|r| r.conn.clone())
    }

    /// Store `hash` as last sent unless it equals the previous one.
    /// Returns false when the frame is a duplicate (or the client is gone).
    pub fn replace_hash(&self, client_id: &str, conn_id: u64, hash: ContentHash) -> bool {
        let mut map = self.write();
        match map.get_mut(client_id) {
            Some(rec) if rec.conn.conn_id == conn_id => {
                if rec.last_hash == Some(hash) { return false; }
                rec.last_hash = Some(hash);
                true
            }
            _ => false,
        }
    }

    /// Lowest colour tier across attached clients.
    pub fn min_color_profile(&self) -> ColorProfile {
        self.read().values().map(|r| r.color_profile).min().unwrap_or(DEFAULT_COLOR_FLOOR)
    }

    pub fn drain(&self) -> Vec<Arc<ClientConn>> {
        self.write().drain().map(|(_, r)| r.conn).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(id: u64) -> Arc<ClientConn> {
        let (a, _b) = UnixStream::pair().unwrap();
        let c = a.try_clone().unwrap();
        Arc::new(ClientConn::new(id, a, c))
    }

    fn record(conn: Arc<ClientConn>, profile: ColorProfile) -> ClientRecord {
        ClientRecord { conn, width: 20, height: 10, viewport_offset: 0, color_profile: profile, pane_id: String::new(), last_hash: None }
    }

    #[test]
    fn color_floor_is_lowest_attached_tier() {
        let reg = Registry::default();
        assert_eq!(reg.min_color_profile(), DEFAULT_COLOR_FLOOR);
        reg.insert("a", record(conn(1), ColorProfile::TrueColor));
        reg.insert("b", record(conn(2), ColorProfile::Ansi256));
        assert_eq!(reg.min_color_profile(), ColorProfile::Ansi256);
        reg.insert("c", record(conn(3), ColorProfile::Ascii));
        assert_eq!(reg.min_color_profile(), ColorProfile::Ascii);
    }

    #[test]
    fn stale_connection_cannot_remove_newer_record() {
        let reg = Registry::default();
        reg.insert("a", record(conn(1), ColorProfile::TrueColor));
        reg.insert("a", record(conn(2), ColorProfile::TrueColor));
        assert!(!reg.remove_if_conn("a", 1));
        assert_eq!(reg.len(), 1);
        assert!(reg.remove_if_conn("a", 2));
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn duplicate_hash_is_rejected() {
        let reg = Registry::default();
        reg.insert("a", record(conn(1), ColorProfile::TrueColor));
        assert!(reg.replace_hash("a", 1, [1; 32]));
        assert!(!reg.replace_hash("a", 1, [1; 32]));
        assert!(reg.replace_hash("a", 1, [2; 32]));
        assert!(!reg.replace_hash("missing", 1, [3; 32]));
    }
}
