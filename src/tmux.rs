//! Thin shell over the `tmux` command line.
//!
//! Everything that talks to tmux goes through [`Control`], so the window
//! list provider and the renderer's focus/clipboard handling can be tested
//! against a recording fake.

use std::path::PathBuf;
use std::process::Command;
use std::sync::OnceLock;

use tracing::debug;

use crate::error::{Error, Result};

pub trait Control: Send + Sync {
    /// Run one tmux command and return its stdout.
    fn run(&self, args: &[&str]) -> Result<String>;

    fn set_buffer(&self, text: &str) -> Result<()> {
        self.run(&["set-buffer", "--", text]).map(|_| ())
    }

    /// TTY paths of every attached tmux client.
    fn client_ttys(&self) -> Vec<String> {
        self.run(&["list-clients", "-F", "#{client_tty}"])
            .map(|out| out.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect())
            .unwrap_or_default()
    }

    fn current_pane(&self) -> Option<String> {
        let out = self.run(&["display-message", "-p", "#{pane_id}"]).ok()?;
        let id = out.trim();
        (!id.is_empty()).then(|| id.to_string())
    }

    fn select_pane(&self, pane_id: &str) -> Result<()> {
        self.run(&["select-pane", "-t", pane_id]).map(|_| ())
    }
}

/// The real tmux binary, resolved once from `PATH`.
#[derive(Clone, Debug)]
pub struct Tmux {
    bin: PathBuf,
}

static TMUX_BIN: OnceLock<Option<PathBuf>> = OnceLock::new();

impl Tmux {
    pub fn locate() -> Result<Tmux> {
        let bin = TMUX_BIN.get_or_init(|| which::which("tmux").ok());
        bin.clone().map(|bin| Tmux { bin }).ok_or(Error::TmuxNotFound)
    }
}

impl Control for Tmux {
    fn run(&self, args: &[&str]) -> Result<String> {
        let out = Command::new(&self.bin).args(args).output()?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            debug!(event = "tmux_failed", command = args.first().copied().unwrap_or(""), stderr = %stderr);
            return Err(Error::Tmux { command: args.first().copied().unwrap_or("").to_string(), stderr });
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Records every command and answers from a canned table keyed by the
    /// first argument.
    #[derive(Default)]
    pub struct FakeTmux {
        pub calls: Mutex<Vec<Vec<String>>>,
        pub replies: Mutex<HashMap<String, String>>,
    }

    impl FakeTmux {
        pub fn reply(&self, command: &str, out: &str) {
            self.replies.lock().unwrap().insert(command.to_string(), out.to_string());
        }

        pub fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Control for FakeTmux {
        fn run(&self, args: &[&str]) -> Result<String> {
            self.calls.lock().unwrap().push(args.iter().map(|s| s.to_string()).collect());
            let first = args.first().copied().unwrap_or("");
            match self.replies.lock().unwrap().get(first) {
                Some(out) => Ok(out.clone()),
                None => Err(Error::Tmux { command: first.to_string(), stderr: "no reply".into() }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeTmux;
    use super::*;

    #[test]
    fn helpers_parse_tmux_output() {
        let t = FakeTmux::default();
        t.reply("list-clients", "/dev/pts/3\n\n/dev/pts/7\n");
        t.reply("display-message", "%12\n");
        assert_eq!(t.client_ttys(), vec!["/dev/pts/3", "/dev/pts/7"]);
        assert_eq!(t.current_pane().as_deref(), Some("%12"));
    }

    #[test]
    fn failures_degrade_to_empty() {
        let t = FakeTmux::default();
        assert!(t.client_ttys().is_empty());
        assert_eq!(t.current_pane(), None);
        assert!(t.set_buffer("x").is_err());
        assert_eq!(t.calls()[2], vec!["set-buffer", "--", "x"]);
    }
}
