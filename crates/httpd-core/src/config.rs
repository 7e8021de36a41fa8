use std::{
    ffi::CString,
    io,
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
};

use crate::error::ServerStartupError;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub document_root: PathBuf,
    pub not_found_path: PathBuf,
    pub logs_dir: PathBuf,
}

impl ServerConfig {
    pub fn new(
        port_or_service: &str,
        document_root: PathBuf,
        logs_dir: PathBuf,
        not_found_path: PathBuf,
    ) -> Result<Self, ServerStartupError> {
        let port = resolve_port(port_or_service)?;
        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        Ok(Self { bind_addr, document_root, not_found_path, logs_dir })
    }
}

/// Resolves `-p`'s argument: either a decimal port, or a service name
/// looked up in the system services database for `tcp`. Both paths are
/// normalized to host byte order here and only converted to network order
/// once, at bind time.
pub fn resolve_port(spec: &str) -> Result<u16, ServerStartupError> {
    if let Ok(port) = spec.parse::<u16>() {
        if port == 0 {
            return Err(ServerStartupError::PortResolution(
                spec.to_string(),
                io::Error::new(io::ErrorKind::InvalidInput, "port must be in 1..=65535"),
            ));
        }
        return Ok(port);
    }

    resolve_service_port(spec).ok_or_else(|| {
        ServerStartupError::PortResolution(
            spec.to_string(),
            io::Error::new(io::ErrorKind::NotFound, "unknown service name for tcp"),
        )
    })
}

fn resolve_service_port(name: &str) -> Option<u16> {
    let c_name = CString::new(name).ok()?;
    let c_proto = CString::new("tcp").ok()?;
    // SAFETY: both CStrings outlive the call; getservbyname returns a
    // pointer into static/thread-local storage we only read from.
    unsafe {
        let ent = libc::getservbyname(c_name.as_ptr(), c_proto.as_ptr());
        if ent.is_null() {
            return None;
        }
        // s_port is already in network byte order.
        Some(u16::from_be((*ent).s_port as u16))
    }
}
