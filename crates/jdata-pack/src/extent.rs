//! Byte extents: the exact (offset, length) span of each leaf in its source
//! buffer, recorded during decoding and consumed by the patch writer.

/// Absolute byte span of one leaf's payload in the source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteExtent {
    pub offset: u64,
    pub length: u32,
}

impl ByteExtent {
    pub fn new(offset: u64, length: u32) -> Self {
        Self { offset, length }
    }
}

/// Ordered `(path, extent)` pairs in document order.
///
/// Extents embed absolute offsets tied to one exact byte layout; a map from
/// one parse must never be applied to bytes from a different parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtentMap {
    entries: Vec<(String, ByteExtent)>,
}

impl ExtentMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: String, extent: ByteExtent) {
        self.entries.push((path, extent));
    }

    /// Exact-string lookup.
    pub fn get(&self, path: &str) -> Option<ByteExtent> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, e)| *e)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ByteExtent)> {
        self.entries.iter().map(|(p, e)| (p.as_str(), *e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_insert_and_lookup() {
        let mut map = ExtentMap::new();
        map.insert("$.a".into(), ByteExtent::new(3, 1));
        map.insert("$.b[0]".into(), ByteExtent::new(9, 4));
        assert_eq!(map.get("$.a"), Some(ByteExtent::new(3, 1)));
        assert_eq!(map.get("$.b[0]"), Some(ByteExtent::new(9, 4)));
        assert_eq!(map.get("$.missing"), None);
        let paths: Vec<&str> = map.iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["$.a", "$.b[0]"]);
    }
}
