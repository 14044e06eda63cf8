use crate::worklist::{self, WorkList};

/// Fixed header accounted for every workspace: clock seconds, clock nanos
/// and item count.
pub const HEADER_BYTES: usize = 3 * std::mem::size_of::<u64>();

/// Read-only data published by the coordinator for its workers.
///
/// Holds the list twice: the offset table workers index into, and the flat
/// NUL-separated buffer that [`Workspace::scan_item`] walks.
#[derive(Debug)]
pub struct Workspace {
    items: WorkList,
    wire: Vec<u8>,
}

impl Workspace {
    pub fn new(items: WorkList) -> Self {
        let wire = items.encode();
        Self { items, wire }
    }

    /// Bytes the workspace accounts for: header plus the serialized list
    pub fn size_for(items: &WorkList) -> usize {
        HEADER_BYTES + items.encoded_len()
    }

    pub fn size_bytes(&self) -> usize {
        HEADER_BYTES + self.wire.len()
    }

    /// Constant-time lookup through the offset table
    pub fn item(&self, index: usize) -> Option<&str> {
        self.items.get(index)
    }

    /// Lookup by scanning the flat buffer from the start
    pub fn scan_item(&self, index: usize) -> Option<&str> {
        worklist::item_at(&self.wire, index)
    }

    pub fn wire(&self) -> &[u8] {
        &self.wire
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}
