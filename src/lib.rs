//! Sidebar coordinator and renderer clients for tmux.
//!
//! One [`server::Server`] per tmux session owns the state and renders
//! frames; each sidebar or header pane runs a renderer
//! ([`client::run_renderer`]) that draws frames, turns raw mouse input into
//! gestures and reports them back over a local socket.

pub mod clipboard;
pub mod client;
pub mod config;
pub mod error;
pub mod gesture;
pub mod menu;
pub mod protocol;
pub mod provider;
pub mod regions;
pub mod rendering;
pub mod server;
pub mod session;
pub mod style;
pub mod tmux;
pub mod types;
