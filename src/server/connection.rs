use std::io::BufReader;
use std::os::unix::net::UnixStream;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::protocol::{read_frame, Body, Frame, Message};
use super::helpers::guarded;
use super::registry::{ClientConn, ClientRecord};
use super::Server;

/// Per-connection read loop. Runs on its own thread until EOF, a read
/// error, or `unsubscribe`; the client record is removed on the way out.
pub(crate) fn handle_connection(server: Server, stream: UnixStream) {
    let conn_id = server.next_conn_id();
    let config = server.config().clone();
    let (writer, control) = match (stream.try_clone(), stream.try_clone()) {
        (Ok(w), Ok(c)) => (w, c),
        _ => return,
    };
    let _ = writer.set_write_timeout(Some(config.write_timeout));
    let conn = Arc::new(ClientConn::new(conn_id, writer, control));
    server.lock_conns().insert(conn_id, conn.clone());
    debug!(event = "accept", conn_id);

    let mut reader = BufReader::with_capacity(256 * 1024, stream);
    let mut buf: Vec<u8> = Vec::with_capacity(64 * 1024);
    let mut subscribed: Option<String> = None;

    loop {
        match read_frame(&mut reader, &mut buf, config.max_line_bytes) {
            Ok(Frame::Eof) => break,
            Ok(Frame::Oversized) => {
                warn!(event = "frame_too_large", conn_id, max = config.max_line_bytes);
                continue;
            }
            Ok(Frame::Line) => {}
            Err(e) => {
                debug!(event = "read_error", conn_id, error = %e);
                break;
            }
        }
        let Ok(line) = std::str::from_utf8(&buf) else {
            warn!(event = "bad_utf8", conn_id);
            continue;
        };
        if line.trim().is_empty() { continue; }
        let msg = match Message::decode(line) {
            Ok(m) => m,
            Err(e) => {
                warn!(event = "bad_message", conn_id, error = %e);
                continue;
            }
        };

        match msg.body {
            Body::Subscribe(sub) => {
                let client_id = msg.client_id;
                if client_id.is_empty() {
                    warn!(event = "subscribe_without_id", conn_id);
                    continue;
                }
                if let Some(prev) = subscribed.take() {
                    if prev != client_id { drop_client(&server, &prev, conn_id); }
                }
                let record = ClientRecord {
                    conn: conn.clone(),
                    width: sub.width,
                    height: sub.height,
                    viewport_offset: 0,
                    color_profile: sub.color_profile,
                    pane_id: sub.pane_id.clone(),
                    last_hash: None,
                };
                if let Some(old) = server.inner.registry.insert(&client_id, record) {
                    if old.conn_id != conn_id {
                        info!(event = "client_replaced", client_id = %client_id, old_conn = old.conn_id, conn_id);
                    }
                }
                info!(event = "subscribe", client_id = %client_id, conn_id, width = sub.width, height = sub.height,
                    color_profile = ?sub.color_profile);
                subscribed = Some(client_id.clone());
                let handler = server.inner.handler.clone();
                guarded("on_connect", &client_id, || handler.on_connect(&server, &client_id, &sub));
                server.send_render_to_client(&client_id);
            }
            Body::Unsubscribe => {
                if let Some(id) = subscribed.take() {
                    drop_client(&server, &id, conn_id);
                }
                break;
            }
            Body::Resize(size) => {
                let Some(id) = subscribed.as_deref() else { continue; };
                let updated = server.inner.registry.update(id, conn_id, |rec| {
                    rec.width = size.width;
                    rec.height = size.height;
                    if !size.pane_id.is_empty() { rec.pane_id = size.pane_id.clone(); }
                    // The frame answering a resize must not be deduplicated away.
                    rec.last_hash = None;
                });
                if !updated { continue; }
                let handler = server.inner.handler.clone();
                guarded("on_resize", id, || handler.on_resize(&server, id, size.width, size.height));
                server.send_render_to_client(id);
            }
            Body::ViewportUpdate(vp) => {
                let Some(id) = subscribed.as_deref() else { continue; };
                server.inner.registry.update(id, conn_id, |rec| rec.viewport_offset = vp.viewport_offset);
            }
            Body::Input(input) => {
                let Some(id) = subscribed.as_deref() else { continue; };
                let handler = server.inner.handler.clone();
                guarded("on_input", id, || handler.on_input(&server, id, &input));
            }
            Body::Ping => {
                let id = subscribed.clone().unwrap_or(msg.client_id);
                if let Ok(line) = Message::new(id, Body::Pong).encode() {
                    if let Err(e) = conn.write_line(&line) {
                        debug!(event = "pong_write_error", conn_id, error = %e);
                        break;
                    }
                }
            }
            other @ (Body::Render(_) | Body::Menu(_) | Body::Pong) => {
                debug!(event = "unexpected_message", conn_id, kind = ?other.kind());
            }
        }
    }

    if let Some(id) = subscribed.take() {
        drop_client(&server, &id, conn_id);
    }
    server.lock_conns().remove(&conn_id);
    conn.close();
    debug!(event = "connection_closed", conn_id);
}

fn drop_client(server: &Server, client_id: &str, conn_id: u64) {
    if !server.inner.registry.remove_if_conn(client_id, conn_id) { return; }
    info!(event = "disconnect", client_id, conn_id);
    let handler = server.inner.handler.clone();
    guarded("on_disconnect", client_id, || handler.on_disconnect(server, client_id));
}
