use std::io::{BufReader, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::{read_frame, Body, Frame, Message};
use crate::types::{MenuPayload, RenderPayload};

/// Server-to-client traffic as the event loop consumes it.
#[derive(Debug)]
pub enum Incoming {
    Render(RenderPayload),
    Menu(MenuPayload),
    Pong,
    /// The reader hit EOF or an error; the link is dead.
    Closed,
}

/// One live link to the coordinator. Clones share the socket; sends from
/// the event loop and the keepalive thread are serialized by `writer`.
#[derive(Clone)]
pub struct Connection {
    client_id: Arc<str>,
    writer: Arc<Mutex<UnixStream>>,
    control: Arc<UnixStream>,
    alive: Arc<AtomicBool>,
}

impl Connection {
    /// Connect with bounded retries and start the reader thread.
    pub fn connect(path: &Path, client_id: &str, config: &Config) -> Result<(Connection, Receiver<Incoming>)> {
        let attempts = config.connect_attempts.max(1);
        let max_line = config.max_line_bytes;
        let mut stream = None;
        for attempt in 1..=attempts {
            match UnixStream::connect(path) {
                Ok(s) => { stream = Some(s); break; }
                Err(e) => {
                    debug!(event = "connect_retry", attempt, error = %e);
                    if attempt < attempts { thread::sleep(config.connect_backoff); }
                }
            }
        }
        let stream = stream.ok_or_else(|| Error::ConnectFailed { attempts, path: path.to_path_buf() })?;
        stream.set_write_timeout(Some(config.write_timeout))?;
        let writer = stream.try_clone()?;
        let control = stream.try_clone()?;

        let alive = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::channel::<Incoming>();
        let reader_alive = alive.clone();
        thread::spawn(move || {
            let mut reader = BufReader::with_capacity(256 * 1024, stream);
            let mut buf: Vec<u8> = Vec::with_capacity(64 * 1024);
            loop {
                match read_frame(&mut reader, &mut buf, max_line) {
                    Ok(Frame::Line) => {}
                    Ok(Frame::Oversized) => { warn!(event = "frame_too_large", max = max_line); continue; }
                    Ok(Frame::Eof) | Err(_) => break,
                }
                let Ok(line) = std::str::from_utf8(&buf) else {
                    warn!(event = "bad_utf8");
                    continue;
                };
                if line.trim().is_empty() { continue; }
                let msg = match Message::decode(line) {
                    Ok(m) => m,
                    Err(e) => { warn!(event = "bad_message", error = %e); continue; }
                };
                let incoming = match msg.body {
                    Body::Render(p) => Incoming::Render(p),
                    Body::Menu(p) => Incoming::Menu(p),
                    Body::Pong => Incoming::Pong,
                    other => { debug!(event = "unexpected_message", kind = ?other.kind()); continue; }
                };
                if tx.send(incoming).is_err() { break; }
            }
            reader_alive.store(false, Ordering::Release);
            let _ = tx.send(Incoming::Closed);
        });

        let conn = Connection {
            client_id: Arc::from(client_id),
            writer: Arc::new(Mutex::new(writer)),
            control: Arc::new(control),
            alive,
        };
        Ok((conn, rx))
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn send(&self, body: Body) -> Result<()> {
        if !self.is_alive() { return Err(Error::Disconnected); }
        let line = Message::new(&*self.client_id, body).encode()?;
        let mut w = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let res = w.write_all(line.as_bytes()).and_then(|_| w.flush());
        if let Err(e) = res {
            drop(w);
            self.close();
            return Err(e.into());
        }
        Ok(())
    }

    /// Ping every `interval` until the link dies.
    pub fn start_keepalive(&self, interval: Duration) {
        let conn = self.clone();
        thread::spawn(move || loop {
            thread::sleep(interval);
            if !conn.is_alive() || conn.send(Body::Ping).is_err() { break; }
        });
    }

    /// Mark dead and shut the socket; the reader thread sees EOF and exits.
    pub fn close(&self) {
        self.alive.store(false, Ordering::Release);
        let _ = self.control.shutdown(Shutdown::Both);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;
    use std::os::unix::net::UnixListener;

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    fn config(attempts: u32) -> Config {
        Config {
            connect_attempts: attempts,
            connect_backoff: ms(1),
            write_timeout: ms(100),
            max_line_bytes: 4096,
            ..Config::default()
        }
    }

    #[test]
    fn connect_gives_up_after_bounded_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.sock");
        let err = Connection::connect(&path, "c1", &config(3)).err().unwrap();
        assert!(matches!(err, Error::ConnectFailed { attempts: 3, .. }));
    }

    #[test]
    fn frames_are_delivered_and_eof_reports_closed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let (conn, rx) = Connection::connect(&path, "c1", &config(1)).unwrap();
        let (mut server_side, _) = listener.accept().unwrap();

        conn.send(Body::Ping).unwrap();
        let mut line = String::new();
        BufReader::new(server_side.try_clone().unwrap()).read_line(&mut line).unwrap();
        assert_eq!(line, "{\"type\":\"ping\",\"client_id\":\"c1\"}\n");

        server_side.write_all(b"garbage\n{\"type\":\"pong\",\"client_id\":\"c1\"}\n").unwrap();
        assert!(matches!(rx.recv_timeout(ms(1000)).unwrap(), Incoming::Pong));
        drop(server_side);
        assert!(matches!(rx.recv_timeout(ms(1000)).unwrap(), Incoming::Closed));
        assert!(!conn.is_alive());
        assert!(matches!(conn.send(Body::Ping), Err(Error::Disconnected)));
    }

    #[test]
    fn undecodable_and_oversized_lines_do_not_drop_the_link() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let (conn, rx) = Connection::connect(&path, "c1", &config(1)).unwrap();
        let (mut server_side, _) = listener.accept().unwrap();

        server_side.write_all(b"\xff\xfe bad\n").unwrap();
        server_side.write_all(format!("{}\n", "x".repeat(8192)).as_bytes()).unwrap();
        server_side.write_all(b"{\"type\":\"pong\",\"client_id\":\"c1\"}\n").unwrap();
        assert!(matches!(rx.recv_timeout(ms(1000)).unwrap(), Incoming::Pong));
        assert!(conn.is_alive());
    }
}
