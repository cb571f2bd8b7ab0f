mod cli;

use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use paneside::client::{run_renderer, RendererOptions};
use paneside::config::Config;
use paneside::error::Result;
use paneside::provider::WindowList;
use paneside::server::Server;
use paneside::session::sanitize_session_id;
use paneside::tmux::Tmux;
use paneside::types::{ColorProfile, VERSION};

use crate::cli::{Cli, Command};

/// Log to `<runtime dir>/paneside-<role>.log`. Renderers own the terminal,
/// so nothing may go to stdout or stderr once running.
fn init_logging(config: &Config, role: &str) {
    let path = config.runtime_dir.join(format!("paneside-{role}.log"));
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else { return; };
    let filter = EnvFilter::try_from_env("PANESIDE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
}

fn run_server(config: Config, session: &str, poll: Duration) -> Result<()> {
    let tmux = Tmux::locate()?;
    let provider = Arc::new(WindowList::new(tmux, session));
    let server = Server::start(config, session, provider.clone())?;

    let mut last = String::new();
    loop {
        thread::sleep(poll);
        if !server.owns_session() {
            warn!(event = "session_claimed_elsewhere", session);
            break;
        }
        match provider.snapshot() {
            Ok(snap) => {
                if snap != last {
                    last = snap;
                    server.broadcast_render();
                }
            }
            Err(e) => {
                info!(event = "session_gone", session, error = %e);
                break;
            }
        }
    }
    server.shutdown();
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::from_env();

    let result = match cli.command {
        Command::Server { session, poll_ms } => {
            init_logging(&config, &format!("server-{}", sanitize_session_id(&session)));
            info!(event = "start", role = "server", version = VERSION);
            run_server(config, &session, Duration::from_millis(poll_ms.max(50)))
        }
        Command::Render { session, client_id, pane_id, color } => {
            init_logging(&config, "render");
            let opts = RendererOptions {
                session_id: session,
                client_id: client_id.unwrap_or_else(|| format!("sidebar-{pane_id}")),
                pane_id,
                color_profile: color.unwrap_or_else(ColorProfile::detect),
            };
            info!(event = "start", role = "render", version = VERSION, client_id = %opts.client_id);
            run_renderer(config, opts)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(event = "fatal", error = %e);
            eprintln!("paneside: {e}");
            ExitCode::FAILURE
        }
    }
}
