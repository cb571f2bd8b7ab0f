use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};

/// Socket and PID file locations for one coordinator session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionPaths {
    pub socket: PathBuf,
    pub pid_file: PathBuf,
}

impl SessionPaths {
    pub fn new(runtime_dir: &Path, session_id: &str) -> Self {
        let name = sanitize_session_id(session_id);
        SessionPaths {
            socket: runtime_dir.join(format!("paneside-{name}.sock")),
            pid_file: runtime_dir.join(format!("paneside-{name}.pid")),
        }
    }

    /// Claim the PID file for this process.
    ///
    /// Fails with [`Error::AlreadyRunning`] when another live process holds it;
    /// a file naming a dead process (or garbage) is treated as stale and replaced.
    pub fn claim_pid_file(&self) -> Result<()> {
        if let Some(pid) = read_pid(&self.pid_file) {
            if pid != own_pid() && pid_alive(pid) {
                return Err(Error::AlreadyRunning { pid, pid_file: self.pid_file.clone() });
            }
            debug!(event = "stale_pid_file", pid, path = %self.pid_file.display());
        }
        if let Some(parent) = self.pid_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let _ = fs::remove_file(&self.pid_file);
        self.create_pid_file()
    }

    /// Create the PID file exclusively. An existing file, whoever wrote it,
    /// means another instance got there first.
    fn create_pid_file(&self) -> Result<()> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&self.pid_file) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let pid = read_pid(&self.pid_file).unwrap_or(0);
                return Err(Error::AlreadyRunning { pid, pid_file: self.pid_file.clone() });
            }
            Err(e) => return Err(e.into()),
        };
        write!(file, "{}", own_pid())?;
        Ok(())
    }

    /// True while the PID file still names this process.
    pub fn owns_pid_file(&self) -> bool {
        read_pid(&self.pid_file) == Some(own_pid())
    }

    /// Remove socket and PID file, but only if they still belong to us.
    /// A newer instance that replaced them keeps its files.
    pub fn release_if_owned(&self) {
        if !self.owns_pid_file() {
            info!(event = "cleanup_skipped", reason = "pid file owned by another instance");
            return;
        }
        let _ = fs::remove_file(&self.socket);
        let _ = fs::remove_file(&self.pid_file);
    }

    /// Remove a leftover socket file before binding.
    pub fn remove_stale_socket(&self) -> io::Result<()> {
        match fs::remove_file(&self.socket) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Tmux session ids look like `$3`. ASCII letters, digits and `-` pass
/// through; every other byte becomes `_` plus two hex digits, so distinct
/// ids never share a file name.
pub fn sanitize_session_id(id: &str) -> String {
    if id.is_empty() { return "default".to_string(); }
    let mut out = String::with_capacity(id.len());
    for b in id.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' {
            out.push(b as char);
        } else {
            out.push_str(&format!("_{b:02x}"));
        }
    }
    out
}

fn read_pid(path: &Path) -> Option<i32> {
    fs::read_to_string(path).ok().and_then(|s| s.trim().parse::<i32>().ok()).filter(|p| *p > 0)
}

pub fn own_pid() -> i32 {
    std::process::id() as i32
}

/// Zero-signal liveness probe. EPERM means the process exists but belongs
/// to someone else, which still counts as alive.
pub fn pid_alive(pid: i32) -> bool {
    if pid <= 0 { return false; }
    let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if rc == 0 { return true; }
    io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dead_pid() -> i32 {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id() as i32;
        child.wait().unwrap();
        pid
    }

    #[test]
    fn session_ids_are_sanitized() {
        assert_eq!(sanitize_session_id("$3"), "_243");
        assert_eq!(sanitize_session_id("work-1"), "work-1");
        assert_eq!(sanitize_session_id("my work"), "my_20work");
        assert_eq!(sanitize_session_id(""), "default");
        let paths = SessionPaths::new(Path::new("/run/x"), "$0");
        assert_eq!(paths.socket, PathBuf::from("/run/x/paneside-_240.sock"));
        assert_eq!(paths.pid_file, PathBuf::from("/run/x/paneside-_240.pid"));
    }

    #[test]
    fn distinct_session_ids_get_distinct_files() {
        let ids = ["$3", "_3", "_243", "3", "a/b", "a_b", "a.b"];
        let names: std::collections::HashSet<String> = ids.iter().map(|id| sanitize_session_id(id)).collect();
        assert_eq!(names.len(), ids.len());
    }

    #[test]
    fn live_pid_blocks_claim() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SessionPaths::new(dir.path(), "live");
        // pid 1 always exists; EPERM counts as alive for non-root runs.
        fs::write(&paths.pid_file, "1").unwrap();
        let err = paths.claim_pid_file().unwrap_err();
        assert!(matches!(err, Error::AlreadyRunning { pid: 1, .. }));
    }

    #[test]
    fn stale_pid_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SessionPaths::new(dir.path(), "stale");
        fs::write(&paths.pid_file, dead_pid().to_string()).unwrap();
        paths.claim_pid_file().unwrap();
        assert!(paths.owns_pid_file());
    }

    #[test]
    fn pid_file_is_created_exclusively() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SessionPaths::new(dir.path(), "racy");
        paths.create_pid_file().unwrap();
        assert!(paths.owns_pid_file());
        // A second creator loses even when the file names its own pid.
        let err = paths.create_pid_file().unwrap_err();
        assert!(matches!(err, Error::AlreadyRunning { pid, .. } if pid == own_pid()));

        fs::write(&paths.pid_file, dead_pid().to_string()).unwrap();
        assert!(matches!(paths.create_pid_file(), Err(Error::AlreadyRunning { .. })));
    }

    #[test]
    fn release_leaves_foreign_files_alone() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SessionPaths::new(dir.path(), "race");
        fs::write(&paths.socket, "").unwrap();
        fs::write(&paths.pid_file, "1").unwrap();
        paths.release_if_owned();
        assert!(paths.socket.exists());
        assert!(paths.pid_file.exists());

        fs::write(&paths.pid_file, own_pid().to_string()).unwrap();
        paths.release_if_owned();
        assert!(!paths.socket.exists());
        assert!(!paths.pid_file.exists());
    }
}
