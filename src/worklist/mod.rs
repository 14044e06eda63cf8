//! Immutable, index-addressable list of work items
//!
//! The list is built once from a newline-separated source and never mutated
//! afterwards. Lookups go through an offset table; the flat NUL-separated
//! wire form is available through [`WorkList::encode`] and [`item_at`].

use std::io::BufRead;
use std::ops::Range;

mod codec;

pub use codec::{SENTINEL, SEPARATOR, item_at};

/// Errors raised while building a work list
#[derive(Debug, thiserror::Error)]
pub enum WorkListError {
    #[error("failed to read work items: {0}")]
    Io(#[from] std::io::Error),

    #[error("item on line {line} contains a NUL byte")]
    NulInItem { line: usize },
}

/// Ordered sequence of work items backed by a single contiguous buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkList {
    text: String,
    offsets: Vec<Range<usize>>,
}

impl WorkList {
    /// Build a list from already-split lines. Trailing `\r` / `\n` are stripped.
    pub fn from_lines<I, S>(lines: I) -> Result<Self, WorkListError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();
        for (number, line) in lines.into_iter().enumerate() {
            let item = line.as_ref().trim_end_matches(['\n', '\r']);
            if item.as_bytes().contains(&SEPARATOR) {
                return Err(WorkListError::NulInItem { line: number + 1 });
            }
            let start = list.text.len();
            list.text.push_str(item);
            list.offsets.push(start..list.text.len());
        }
        Ok(list)
    }

    /// Read one item per line until end of input.
    ///
    /// Bytes that are not valid UTF-8 become U+FFFD, so any input loads and
    /// no item can contain the [`SENTINEL`] byte.
    pub fn load<R: BufRead>(reader: R) -> Result<Self, WorkListError> {
        let mut lines = Vec::new();
        let mut replaced = 0;
        for line in reader.split(b'\n') {
            let line = line?;
            match String::from_utf8(line) {
                Ok(text) => lines.push(text),
                Err(e) => {
                    replaced += 1;
                    lines.push(String::from_utf8_lossy(e.as_bytes()).into_owned());
                }
            }
        }
        if replaced > 0 {
            tracing::warn!("{replaced} input lines were not valid UTF-8 and were decoded lossily");
        }
        Self::from_lines(lines)
    }

    /// Item at `index`, or `None` past the end
    pub fn get(&self, index: usize) -> Option<&str> {
        self.offsets.get(index).map(|range| &self.text[range.clone()])
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.offsets.iter().map(|range| &self.text[range.clone()])
    }

    /// Serialize into the flat wire form: every item followed by a NUL,
    /// the whole buffer closed by [`SENTINEL`].
    pub fn encode(&self) -> Vec<u8> {
        codec::encode(self.iter(), self.encoded_len())
    }

    /// Size of [`WorkList::encode`] without building the buffer
    pub fn encoded_len(&self) -> usize {
        self.text.len() + self.offsets.len() + 1
    }
}
