//! Append-only JSONL session log.
//!
//! Logs live at `<sessions_dir>/<provider>/<session_id>.jsonl`. A log is
//! opened under a placeholder id and renamed once, after the agent exits, to
//! the thread id the agent reported. A resumed thread already has a log under
//! that id; the new run's lines are appended to it.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::SessionError;

/// Path of the log for `session_id` under `sessions_dir`.
pub fn log_path(sessions_dir: &Path, provider: &str, session_id: &str) -> PathBuf {
    sessions_dir
        .join(provider)
        .join(format!("{session_id}.jsonl"))
}

/// An open session log. The file handle is released when this is dropped.
#[derive(Debug)]
pub struct SessionLog {
    sessions_dir: PathBuf,
    provider: String,
    path: PathBuf,
    file: File,
}

impl SessionLog {
    /// Create the provider directory if needed and open the log for append.
    pub fn open(sessions_dir: &Path, provider: &str, session_id: &str) -> Result<Self, SessionError> {
        let path = log_path(sessions_dir, provider, session_id);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| SessionError::LogOpen {
                path: path.clone(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| SessionError::LogOpen {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), "opened session log");
        Ok(Self {
            sessions_dir: sessions_dir.to_path_buf(),
            provider: provider.to_string(),
            path,
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one line plus a trailing newline, flushed before returning.
    pub fn append(&mut self, line: &str) -> Result<(), SessionError> {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        self.file
            .write_all(&buf)
            .and_then(|()| self.file.flush())
            .map_err(|source| SessionError::LogWrite {
                path: self.path.clone(),
                source,
            })
    }

    /// Close the log and move it to the authoritative id's path.
    ///
    /// If a log for that id already exists its content is kept and this run is
    /// appended after it. Best effort: on any filesystem error the data stays
    /// where it was. Returns the path that holds the log.
    pub fn finalize(self, authoritative_id: Option<&str>) -> PathBuf {
        let Self {
            sessions_dir,
            provider,
            path,
            file,
        } = self;
        drop(file);

        let Some(id) = authoritative_id.filter(|id| !id.is_empty()) else {
            return path;
        };
        let target = log_path(&sessions_dir, &provider, id);
        if target == path {
            return path;
        }
        let moved = if target.exists() {
            append_into(&path, &target)
        } else {
            fs::rename(&path, &target)
        };
        match moved {
            Ok(()) => {
                debug!(from = %path.display(), to = %target.display(), "moved session log");
                target
            }
            Err(e) => {
                warn!(
                    from = %path.display(),
                    to = %target.display(),
                    error = %e,
                    "failed to move session log"
                );
                path
            }
        }
    }
}

/// Append the content of `from` to `to`, then remove `from`.
fn append_into(from: &Path, to: &Path) -> io::Result<()> {
    let mut source = File::open(from)?;
    let mut target = OpenOptions::new().read(true).append(true).open(to)?;
    // Keep line boundaries when the earlier log lacks a trailing newline.
    if target.seek(SeekFrom::End(-1)).is_ok() {
        let mut last = [0u8; 1];
        target.read_exact(&mut last)?;
        if last[0] != b'\n' {
            target.write_all(b"\n")?;
        }
    }
    io::copy(&mut source, &mut target)?;
    target.flush()?;
    drop(source);
    fs::remove_file(from)
}
