//! httpd-core
//!
//! The event-driven connection lifecycle behind a tiny HTTP/1.0 static file
//! server with a long-poll broadcast chat service bolted onto the same
//! connection state machine. One thread, one blocking readiness wait, no
//! locks.
pub mod buffer;
pub mod chat;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
mod server;

pub use config::ServerConfig;
pub use error::ServerStartupError;
pub use server::Server;
