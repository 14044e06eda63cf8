/// Terminates every item in the flat buffer
pub const SEPARATOR: u8 = 0x00;

/// Closes the flat buffer. `0xFF` never appears in UTF-8 text.
pub const SENTINEL: u8 = 0xFF;

pub(super) fn encode<'a>(items: impl Iterator<Item = &'a str>, capacity: usize) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(capacity);
    for item in items {
        buffer.extend_from_slice(item.as_bytes());
        buffer.push(SEPARATOR);
    }
    buffer.push(SENTINEL);
    buffer
}

/// Scan a flat buffer for the item at `index`.
///
/// Walks from the start counting NUL-terminated items and stops at the
/// sentinel, or at the end of the slice if the sentinel is missing. Returns a
/// view into `buffer`; `None` when the index is out of range or the item is
/// not valid UTF-8.
pub fn item_at(buffer: &[u8], index: usize) -> Option<&str> {
    let mut current = 0;
    let mut start = 0;

    for (position, &byte) in buffer.iter().enumerate() {
        match byte {
            SENTINEL => return None,
            SEPARATOR => {
                if current == index {
                    return std::str::from_utf8(&buffer[start..position]).ok();
                }
                current += 1;
                start = position + 1;
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(items: &[&str]) -> Vec<u8> {
        encode(items.iter().copied(), 0)
    }

    #[test]
    fn test_wire_layout() {
        assert_eq!(buffer(&["ab", "c"]), b"ab\0c\0\xFF".to_vec());
        assert_eq!(buffer(&[]), vec![SENTINEL]);
    }

    #[test]
    fn test_item_at_finds_each_item() {
        let buf = buffer(&["civic", "hello", "racecar"]);
        assert_eq!(item_at(&buf, 0), Some("civic"));
        assert_eq!(item_at(&buf, 1), Some("hello"));
        assert_eq!(item_at(&buf, 2), Some("racecar"));
    }

    #[test]
    fn test_item_at_stops_at_sentinel() {
        let buf = buffer(&["civic"]);
        assert_eq!(item_at(&buf, 1), None);
        assert_eq!(item_at(&buf, usize::MAX), None);
    }

    #[test]
    fn test_item_at_never_reads_past_sentinel() {
        // Bytes after the sentinel look like a valid item but must be ignored
        let mut buf = buffer(&["a"]);
        buf.extend_from_slice(b"ghost\0");
        assert_eq!(item_at(&buf, 1), None);
    }

    #[test]
    fn test_item_at_tolerates_truncated_buffer() {
        assert_eq!(item_at(b"abc", 0), None);
        assert_eq!(item_at(b"", 0), None);
    }

    #[test]
    fn test_item_at_is_pure() {
        let buf = buffer(&["noon", "moon"]);
        let first = item_at(&buf, 1);
        let second = item_at(&buf, 1);
        assert_eq!(first, second);
        assert_eq!(first, Some("moon"));
    }
}
