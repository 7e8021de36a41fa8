//! The broadcast chat topic: a single append-only file that is the canonical
//! state. Publishing appends; subscribing replays the whole file, which
//! makes the protocol self-synchronizing.
use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

const CHAT_LOG_FILE: &str = "chat_log";

pub fn log_path(logs_dir: &Path) -> PathBuf {
    logs_dir.join(CHAT_LOG_FILE)
}

/// Ensures the log directory and an (possibly empty) chat log file exist, so
/// a receiver subscribing before any message has ever been sent still gets a
/// valid replay of zero bytes.
pub fn ensure_exists(logs_dir: &Path) -> io::Result<()> {
    fs::create_dir_all(logs_dir)?;
    OpenOptions::new().create(true).append(true).open(log_path(logs_dir))?;
    Ok(())
}

/// Appends `body` to the chat log. Opened, written, and closed fresh every
/// call — no file-handle caching — so concurrent readers always observe a
/// consistent, fully-written file.
pub fn append(logs_dir: &Path, body: &[u8]) -> io::Result<()> {
    let mut f = OpenOptions::new().append(true).open(log_path(logs_dir))?;
    f.write_all(body)
}

/// Opens the chat log read-only for a newly-parked receiver to replay.
pub fn open_for_replay(logs_dir: &Path) -> io::Result<File> {
    File::open(log_path(logs_dir))
}
