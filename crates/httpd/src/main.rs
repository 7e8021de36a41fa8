//! CLI entry point: parses arguments, binds the server, and runs the event
//! loop on the calling thread until SIGINT/SIGTERM.
use std::{
    path::PathBuf,
    process::ExitCode,
    sync::{Arc, atomic::AtomicBool},
};

use clap::Parser;
use httpd_core::{Server, ServerConfig, ServerStartupError};

/// A single-threaded HTTP/1.0 static file server with a long-poll broadcast
/// chat endpoint at `/broadcast.service`.
#[derive(Parser, Debug)]
#[command(name = "httpd", version)]
struct Args {
    /// Port number or /etc/services service name to bind.
    #[arg(short = 'p', long = "port")]
    port: Option<String>,

    /// Directory GET requests are served from.
    #[arg(long = "root", default_value = ".")]
    root: PathBuf,

    /// Directory access.log, error.log and the chat log are written to.
    #[arg(long = "logs", default_value = "logs")]
    logs: PathBuf,

    /// File served in place of a missing document on a 404.
    #[arg(long = "not-found", default_value = "404.html")]
    not_found: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let Some(port) = args.port else {
        return fail(&ServerStartupError::MissingPort);
    };

    let config = match ServerConfig::new(&port, args.root, args.logs, args.not_found) {
        Ok(config) => config,
        Err(err) => return fail(&err),
    };

    let mut server = match Server::bind(config) {
        Ok(server) => server,
        Err(err) => return fail(&err),
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    if let Err(err) = install_signal_handlers(&shutdown) {
        tracing::error!(%err, "failed to install signal handlers");
        return ExitCode::FAILURE;
    }

    tracing::info!(addr = ?server.local_addr(), "httpd listening");

    if let Err(err) = server.run(&shutdown) {
        tracing::error!(%err, "event loop exited with an error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Registers SIGINT/SIGTERM to flip `shutdown`, letting the event loop
/// notice it at the next readiness-wait timeout and exit cleanly instead of
/// killing the process mid-response.
fn install_signal_handlers(shutdown: &Arc<AtomicBool>) -> Result<(), std::io::Error> {
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(shutdown))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(shutdown))?;
    Ok(())
}

fn fail(err: &ServerStartupError) -> ExitCode {
    tracing::error!(%err, "startup failed");
    ExitCode::FAILURE
}
