//! Coordinator side of the sidebar protocol.
//!
//! The server owns every renderer connection for one tmux session. It hands
//! render requests to a [`Handler`] (the content provider), deduplicates
//! frames per client by content hash, stamps sequence numbers at send time
//! and forwards input back to the handler.

mod connection;
mod helpers;
mod registry;

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::protocol::{Body, Message};
use crate::session::SessionPaths;
use crate::types::*;

use helpers::{content_hash, guarded};
use registry::{ClientConn, Registry};

/// Everything the content provider is told when a frame is needed.
#[derive(Clone, Debug)]
pub struct RenderRequest<'a> {
    pub client_id: &'a str,
    pub width: u16,
    pub height: u16,
    pub viewport_offset: usize,
    pub pane_id: &'a str,
    /// Weakest colour tier among attached clients; output should not exceed it.
    pub color_profile: ColorProfile,
}

/// Callbacks into the state-owning side. All methods may be called
/// concurrently for different clients and must not block indefinitely.
/// Panics are caught and logged at the call site.
pub trait Handler: Send + Sync + 'static {
    fn render(&self, req: &RenderRequest<'_>) -> Option<RenderPayload>;

    fn on_connect(&self, _server: &Server, _client_id: &str, _sub: &SubscribePayload) {}

    fn on_input(&self, _server: &Server, _client_id: &str, _input: &InputPayload) {}

    fn on_resize(&self, _server: &Server, _client_id: &str, _width: u16, _height: u16) {}

    fn on_disconnect(&self, _server: &Server, _client_id: &str) {}
}

struct Shared {
    config: Config,
    paths: SessionPaths,
    handler: Arc<dyn Handler>,
    registry: Registry,
    conns: Mutex<HashMap<u64, Arc<ClientConn>>>,
    seq: AtomicU64,
    conn_counter: AtomicU64,
    shutting_down: AtomicBool,
}

#[derive(Clone)]
pub struct Server {
    inner: Arc<Shared>,
}

impl Server {
    /// Claim the session's PID file, bind a fresh socket and start accepting.
    ///
    /// Only these startup steps can fail; everything after is logged and skipped.
    pub fn start(config: Config, session_id: &str, handler: Arc<dyn Handler>) -> Result<Server> {
        let paths = SessionPaths::new(&config.runtime_dir, session_id);
        paths.claim_pid_file()?;
        let listener = match bind(&paths) {
            Ok(l) => l,
            Err(e) => {
                paths.release_if_owned();
                return Err(e.into());
            }
        };
        info!(event = "server_start", session_id, socket = %paths.socket.display());

        let server = Server {
            inner: Arc::new(Shared {
                config,
                paths,
                handler,
                registry: Registry::default(),
                conns: Mutex::new(HashMap::new()),
                seq: AtomicU64::new(0),
                conn_counter: AtomicU64::new(0),
                shutting_down: AtomicBool::new(false),
            }),
        };

        let acceptor = server.clone();
        thread::spawn(move || {
            for conn in listener.incoming() {
                if acceptor.inner.shutting_down.load(Ordering::Acquire) { break; }
                match conn {
                    Ok(stream) => {
                        let srv = acceptor.clone();
                        thread::spawn(move || connection::handle_connection(srv, stream));
                    }
                    Err(e) => warn!(event = "accept_error", error = %e),
                }
            }
            debug!(event = "accept_loop_exit");
        });
        Ok(server)
    }

    pub fn socket_path(&self) -> &Path {
        &self.inner.paths.socket
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn client_ids(&self) -> Vec<String> {
        self.inner.registry.ids()
    }

    pub fn client_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Last sequence number stamped on a sent frame (0 before the first).
    pub fn last_sequence(&self) -> u64 {
        self.inner.seq.load(Ordering::Acquire)
    }

    /// Lowest colour capability across connected clients, or
    /// [`DEFAULT_COLOR_FLOOR`] with nobody attached.
    pub fn min_color_profile(&self) -> ColorProfile {
        self.inner.registry.min_color_profile()
    }

    /// Re-render every client. Ids are snapshotted first; the registry lock
    /// is never held across a provider call or a socket write.
    pub fn broadcast_render(&self) {
        for id in self.inner.registry.ids() {
            self.send_render_to_client(&id);
        }
    }

    /// Animation-tick entry point: only `active_id` is re-rendered.
    pub fn render_active_only(&self, active_id: &str) {
        if self.inner.registry.conn(active_id).is_some() {
            self.send_render_to_client(active_id);
        }
    }

    /// Ask the provider for a frame and send it unless it matches the last
    /// frame this client received. Returns true when a frame hit the wire.
    pub fn send_render_to_client(&self, client_id: &str) -> bool {
        let Some(conn) = self.inner.registry.conn(client_id) else { return false; };
        // Size and offset are read under the render lock so the last frame
        // written reflects the latest state.
        let _rendering = conn.lock_render();
        let Some(target) = self.inner.registry.render_target(client_id) else { return false; };
        if target.conn.conn_id != conn.conn_id { return false; }
        let req = RenderRequest {
            client_id,
            width: target.width,
            height: target.height,
            viewport_offset: target.viewport_offset,
            pane_id: &target.pane_id,
            color_profile: self.min_color_profile(),
        };
        let handler = self.inner.handler.clone();
        let Some(Some(mut payload)) = guarded("render", client_id, || handler.render(&req)) else { return false; };

        let hash = content_hash(&payload);
        // Held across hash check, stamping and write so frames leave in
        // sequence order for this client.
        let mut w = target.conn.lock_writer();
        if !self.inner.registry.replace_hash(client_id, target.conn.conn_id, hash) {
            debug!(event = "render_dedup", client_id);
            return false;
        }
        payload.sequence_num = self.inner.seq.fetch_add(1, Ordering::AcqRel) + 1;
        let seq = payload.sequence_num;
        let line = match Message::new(client_id, Body::Render(payload)).encode() {
            Ok(l) => l,
            Err(e) => { warn!(event = "render_encode_error", client_id, error = %e); return false; }
        };
        if let Err(e) = std::io::Write::write_all(&mut *w, line.as_bytes()).and_then(|_| std::io::Write::flush(&mut *w)) {
            warn!(event = "render_write_error", client_id, error = %e);
            drop(w);
            target.conn.close();
            return false;
        }
        debug!(event = "render_sent", client_id, seq, bytes = line.len());
        true
    }

    /// Push a context menu to one client.
    pub fn send_menu(&self, client_id: &str, menu: MenuPayload) -> bool {
        let Some(conn) = self.inner.registry.conn(client_id) else { return false; };
        let line = match Message::new(client_id, Body::Menu(menu)).encode() {
            Ok(l) => l,
            Err(e) => { warn!(event = "menu_encode_error", client_id, error = %e); return false; }
        };
        if let Err(e) = conn.write_line(&line) {
            warn!(event = "menu_write_error", client_id, error = %e);
            conn.close();
            return false;
        }
        true
    }

    /// Close every connection and remove the socket and PID file if they
    /// still belong to this process.
    pub fn shutdown(&self) {
        if self.inner.shutting_down.swap(true, Ordering::AcqRel) { return; }
        info!(event = "server_shutdown", clients = self.client_count());
        for conn in self.inner.registry.drain() {
            conn.close();
        }
        let conns: Vec<Arc<ClientConn>> = self.lock_conns().drain().map(|(_, c)| c).collect();
        for conn in conns {
            conn.close();
        }
        // Wake the accept loop so it notices the flag.
        let _ = UnixStream::connect(&self.inner.paths.socket);
        self.inner.paths.release_if_owned();
    }

    /// Whether the PID file still names this process.
    pub fn owns_session(&self) -> bool {
        self.inner.paths.owns_pid_file()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::Acquire)
    }

    fn lock_conns(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Arc<ClientConn>>> {
        self.inner.conns.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_conn_id(&self) -> u64 {
        self.inner.conn_counter.fetch_add(1, Ordering::AcqRel) + 1
    }
}

fn bind(paths: &SessionPaths) -> std::io::Result<UnixListener> {
    if let Some(parent) = paths.socket.parent() {
        std::fs::create_dir_all(parent)?;
    }
    paths.remove_stale_socket()?;
    let listener = UnixListener::bind(&paths.socket)?;
    let _ = std::fs::set_permissions(&paths.socket, std::fs::Permissions::from_mode(0o600));
    Ok(listener)
}
