use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// The two result destinations, partitioned by classification outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    Palindrome,
    NonPalindrome,
}

/// Append-only text file holding one classified item per line
#[derive(Debug)]
pub struct ResultSink {
    kind: SinkKind,
    path: PathBuf,
}

impl ResultSink {
    /// Create the sink file empty, truncating anything left by an earlier run
    pub fn create(kind: SinkKind, path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        File::create(&path)?;
        Ok(Self { kind, path })
    }

    pub fn kind(&self) -> SinkKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `item` as a single line.
    ///
    /// The line goes out in one `write_all`, so an aborted writer never
    /// leaves a partial item behind.
    pub fn append(&mut self, item: &str) -> io::Result<()> {
        let mut line = String::with_capacity(item.len() + 1);
        line.push_str(item);
        line.push('\n');

        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_truncates_and_append_adds_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("palin.out");
        std::fs::write(&path, "old\n").unwrap();

        let mut sink = ResultSink::create(SinkKind::Palindrome, &path).unwrap();
        sink.append("civic").unwrap();
        sink.append("racecar").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "civic\nracecar\n");
    }

    #[test]
    fn test_append_fails_when_file_removed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.out");

        let mut sink = ResultSink::create(SinkKind::NonPalindrome, &path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(sink.append("hello").is_err());
    }
}
