//! Size-based rotating log file.
//!
//! `relay.log` rolls over to `relay.log.1` once the next event would push it
//! past the size limit; older backups shift up by one and the oldest beyond
//! the backup count is dropped.

use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use parking_lot::{Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Debug)]
struct State {
    path: PathBuf,
    file: File,
    written: u64,
    max_bytes: u64,
    backups: usize,
}

impl State {
    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.backups > 0 {
            for index in (1..self.backups).rev() {
                let from = self.backup_path(index);
                if from.exists() {
                    std::fs::rename(&from, self.backup_path(index + 1))?;
                }
            }
            std::fs::rename(&self.path, self.backup_path(1))?;
        }

        self.file = File::create(&self.path)?;
        self.written = 0;

        Ok(())
    }
}

impl Write for State {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let incoming = buf.len() as u64;
        if self.max_bytes > 0 && self.written > 0 && self.written + incoming > self.max_bytes {
            self.rotate()?;
        }

        self.file.write_all(buf)?;
        self.written += incoming;

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// A log file that rotates by size
///
/// A `max_bytes` of 0 never rotates. With `backups` of 0 the file is
/// truncated instead of renamed.
#[derive(Debug)]
pub struct RotatingFile {
    state: Mutex<State>,
}

impl RotatingFile {
    /// Open `path` for appending, creating it if missing
    ///
    /// # Errors
    /// If the file cannot be opened or its size read
    pub fn open(path: impl AsRef<Path>, max_bytes: u64, backups: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();

        Ok(Self {
            state: Mutex::new(State {
                path,
                file,
                written,
                max_bytes,
                backups,
            }),
        })
    }
}

/// Holds the file lock for the duration of one event
pub struct RotatingWriter<'a>(MutexGuard<'a, State>);

impl Write for RotatingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<'a> MakeWriter<'a> for RotatingFile {
    type Writer = RotatingWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingWriter(self.state.lock())
    }
}
