use clap::{Parser, Subcommand};

use paneside::types::ColorProfile;

/// Sidebar coordinator and renderer for tmux.
#[derive(Parser, Debug)]
#[command(name = "paneside", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the coordinator for one tmux session.
    Server {
        /// tmux session the sidebars belong to.
        #[arg(long, env = "PANESIDE_SESSION")]
        session: String,

        /// How often to poll tmux for changes, in milliseconds.
        #[arg(long, default_value_t = 500)]
        poll_ms: u64,
    },
    /// Draw one sidebar surface in the current terminal.
    Render {
        #[arg(long, env = "PANESIDE_SESSION")]
        session: String,

        /// Stable id for this surface; defaults to `sidebar-<pane id>`.
        #[arg(long)]
        client_id: Option<String>,

        /// tmux pane hosting this surface.
        #[arg(long, env = "TMUX_PANE")]
        pane_id: String,

        /// Colour tier to advertise: ascii, ansi, ansi256 or truecolor.
        /// Detected from the environment when omitted.
        #[arg(long, value_parser = parse_color_profile)]
        color: Option<ColorProfile>,
    },
}

fn parse_color_profile(s: &str) -> Result<ColorProfile, String> {
    serde_json::from_value(serde_json::Value::String(s.to_lowercase()))
        .map_err(|_| format!("unknown colour profile {s:?}"))
}
