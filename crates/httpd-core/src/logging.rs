//! Access/error request logs: two append-only, timestamped-text handles,
//! each supporting one atomic "append one formatted line" operation.
//! Unrelated to the internal `tracing` diagnostics emitted around
//! accept/close/error paths.
use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::Path,
};

fn timestamp() -> String {
    chrono::Local::now().format("[%d/%b/%Y %H:%M:%S]").to_string()
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

pub struct AccessLog(File);

impl AccessLog {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self(open_append(path)?))
    }

    pub fn log_get(&mut self, url: &str, status: u16, reason: &str) {
        let _ = writeln!(self.0, "{} GET {url} {status} {reason}", timestamp());
    }
}

pub struct ErrorLog(File);

impl ErrorLog {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self(open_append(path)?))
    }

    pub fn log_get(&mut self, url: &str, status: u16, reason: &str) {
        let _ = writeln!(self.0, "{} GET {url} {status} {reason}", timestamp());
    }
}
