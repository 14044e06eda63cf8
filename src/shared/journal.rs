use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::clock::VirtualClock;

/// Append-only event log; every line is prefixed with the virtual time.
///
/// A journal is only reachable through the workspace lock, which keeps lines
/// whole and their timestamps non-decreasing.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl Journal {
    /// Create (or truncate) the journal file
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Write one timestamped line and flush it
    pub fn record(&mut self, at: VirtualClock, message: &str) {
        tracing::trace!(target: "journal", "{at} {message}");
        let written = writeln!(self.writer, "{at} {message}").and_then(|_| self.writer.flush());
        if let Err(e) = written {
            tracing::warn!("Failed to write journal {}: {e}", self.path.display());
        }
    }
}

impl Drop for Journal {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_prefixes_timestamp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output.log");

        let mut journal = Journal::create(&path).unwrap();
        journal.record(VirtualClock::new(0, 100), "coordinator loaded 3 items");
        journal.record(VirtualClock::new(1, 0), "coordinator exit");
        drop(journal);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "[0:100] coordinator loaded 3 items\n[1:0] coordinator exit\n"
        );
    }

    #[test]
    fn test_create_truncates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output.log");
        std::fs::write(&path, "stale\n").unwrap();

        let journal = Journal::create(&path).unwrap();
        drop(journal);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
