use std::path::PathBuf;

use crate::protocol::MessageType;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("already running (pid {pid}, pid file {})", pid_file.display())]
    AlreadyRunning { pid: i32, pid_file: PathBuf },

    #[error("unknown message type {0:?}")]
    UnknownMessage(String),

    #[error("bad {kind:?} payload: {source}")]
    BadPayload {
        kind: MessageType,
        #[source]
        source: serde_json::Error,
    },

    #[error("disconnected")]
    Disconnected,

    #[error("could not connect to {} after {attempts} attempts", path.display())]
    ConnectFailed { attempts: u32, path: PathBuf },

    #[error("tmux binary not found in PATH")]
    TmuxNotFound,

    #[error("tmux {command} failed: {stderr}")]
    Tmux { command: String, stderr: String },
}

pub type Result<T> = std::result::Result<T, Error>;
