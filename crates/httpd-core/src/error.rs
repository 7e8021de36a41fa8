use std::{net::SocketAddr, path::PathBuf};

use thiserror::Error;

/// Startup failures. All of these are fatal to the process (exit code 1);
/// nothing here is raised once the event loop is running.
#[derive(Error, Debug)]
pub enum ServerStartupError {
    #[error("no port or service name given")]
    MissingPort,

    #[error("could not resolve port/service {0:?}: {1}")]
    PortResolution(String, #[source] std::io::Error),

    #[error("failed to create readiness poll: {0}")]
    Poll(#[source] std::io::Error),

    #[error("failed to bind {0}: {1}")]
    Bind(SocketAddr, #[source] std::io::Error),

    #[error("failed to open log file {0}: {1}")]
    LogOpen(PathBuf, #[source] std::io::Error),

    #[error("failed to initialize chat log at {0}: {1}")]
    ChatLogInit(PathBuf, #[source] std::io::Error),
}
