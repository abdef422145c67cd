//! In-place patch writer.
//!
//! Overwrites the byte extents recorded at parse time with newly encoded
//! values, without reflowing or resizing the buffer — each patch is O(1) per
//! field. Extents are tied to one exact byte layout: never apply a map from
//! one parse to bytes produced by another.

use std::fs::OpenOptions;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::PatchError;
use crate::extent::ExtentMap;
use crate::node::Node;
use crate::Endian;

/// Random-access write destination for patches. In-memory buffers (including
/// memory-mapped regions) and seekable streams must yield identical bytes.
pub trait PatchTarget {
    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()>;
}

impl PatchTarget for [u8] {
    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        let start = usize::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset out of range"))?;
        let end = start
            .checked_add(bytes.len())
            .filter(|&e| e <= self.len())
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "extent past end of buffer"))?;
        self[start..end].copy_from_slice(bytes);
        Ok(())
    }
}

impl PatchTarget for Vec<u8> {
    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        self.as_mut_slice().write_at(offset, bytes)
    }
}

/// Wraps any seekable stream (a file, a cursor) as a patch target.
pub struct StreamTarget<W: Write + Seek>(pub W);

impl<W: Write + Seek> PatchTarget for StreamTarget<W> {
    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        self.0.seek(SeekFrom::Start(offset))?;
        self.0.write_all(bytes)
    }
}

/// Result of one `(path, value)` pair. Pairs are independent; one failure
/// never aborts the rest of the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchOutcome {
    pub path: String,
    pub found: bool,
    /// Exact bytes written, padding included.
    pub written: Option<Vec<u8>>,
    pub error: Option<PatchError>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PatchWriter {
    pub endian: Endian,
}

impl PatchWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endian(endian: Endian) -> Self {
        Self { endian }
    }

    /// Applies each `(path, value)` pair against its recorded extent.
    ///
    /// I/O failures on the target are infrastructure errors and abort the
    /// call; per-value problems (`ExtentTooSmall`, unencodable kinds) are
    /// reported in that pair's outcome only.
    pub fn apply<T: PatchTarget + ?Sized>(
        &self,
        target: &mut T,
        map: &ExtentMap,
        pairs: &[(String, Node)],
    ) -> io::Result<Vec<PatchOutcome>> {
        let mut outcomes = Vec::with_capacity(pairs.len());
        for (path, value) in pairs {
            let extent = match map.get(path) {
                Some(e) => e,
                None => {
                    outcomes.push(PatchOutcome {
                        path: path.clone(),
                        found: false,
                        written: None,
                        error: None,
                    });
                    continue;
                }
            };
            let slot = extent.length as usize;
            match self.encode_slot(value) {
                Ok(mut bytes) => {
                    if bytes.len() > slot {
                        outcomes.push(PatchOutcome {
                            path: path.clone(),
                            found: true,
                            written: None,
                            error: Some(PatchError::ExtentTooSmall {
                                need: bytes.len(),
                                have: slot,
                            }),
                        });
                        continue;
                    }
                    bytes.resize(slot, b' ');
                    target.write_at(extent.offset, &bytes)?;
                    outcomes.push(PatchOutcome {
                        path: path.clone(),
                        found: true,
                        written: Some(bytes),
                        error: None,
                    });
                }
                Err(e) => outcomes.push(PatchOutcome {
                    path: path.clone(),
                    found: true,
                    written: None,
                    error: Some(e),
                }),
            }
        }
        Ok(outcomes)
    }

    /// Patches a file in place; the handle lives only for this call and is
    /// released on every exit path.
    pub fn apply_to_file<P: AsRef<Path>>(
        &self,
        path: P,
        map: &ExtentMap,
        pairs: &[(String, Node)],
    ) -> io::Result<Vec<PatchOutcome>> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut target = StreamTarget(file);
        self.apply(&mut target, map, pairs)
    }

    /// Fixed-slot encoding: payload bytes only, no markers for scalars with a
    /// payload; marker byte itself for the no-payload kinds.
    fn encode_slot(&self, value: &Node) -> Result<Vec<u8>, PatchError> {
        let out = match value {
            Node::Null => vec![b'Z'],
            Node::Bool(true) => vec![b'T'],
            Node::Bool(false) => vec![b'F'],
            Node::I8(v) => vec![*v as u8],
            Node::U8(v) => vec![*v],
            Node::I16(v) => self.order(&v.to_be_bytes(), &v.to_le_bytes()),
            Node::I32(v) => self.order(&v.to_be_bytes(), &v.to_le_bytes()),
            Node::I64(v) => self.order(&v.to_be_bytes(), &v.to_le_bytes()),
            Node::F32(v) => self.order(&v.to_be_bytes(), &v.to_le_bytes()),
            Node::F64(v) => self.order(&v.to_be_bytes(), &v.to_le_bytes()),
            Node::Str(s) | Node::HiPrec(s) => s.as_bytes().to_vec(),
            Node::Char(c) => vec![if (*c as u32) < 256 { *c as u8 } else { b'?' }],
            Node::Bytes(b) => b.clone(),
            Node::Array(_) => return Err(PatchError::Unencodable("array")),
            Node::Object(_) => return Err(PatchError::Unencodable("object")),
            Node::Tensor(_) => return Err(PatchError::Unencodable("tensor")),
            Node::Sparse(_) => return Err(PatchError::Unencodable("sparse")),
            Node::Complex(_) => return Err(PatchError::Unencodable("complex")),
            Node::Map(_) => return Err(PatchError::Unencodable("map")),
        };
        Ok(out)
    }

    fn order(&self, be: &[u8], le: &[u8]) -> Vec<u8> {
        match self.endian {
            Endian::Big => be.to_vec(),
            Endian::Little => le.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BjdataDecoder;
    use std::io::Cursor;

    /// `{"arr": [{"c": "x"}, {"c": "y"}, {"c": "z"}]}`
    fn fixture() -> Vec<u8> {
        b"{U\x03arr[{U\x01cSU\x01x}{U\x01cSU\x01y}{U\x01cSU\x01z}]}".to_vec()
    }

    #[test]
    fn test_patch_single_byte_slot() {
        let mut buf = fixture();
        let (_, map) = BjdataDecoder::new().decode_with_extents(&buf).unwrap();
        let writer = PatchWriter::new();
        let outcomes = writer
            .apply(
                &mut buf,
                &map,
                &[("$.arr[2].c".to_string(), Node::Str("5".into()))],
            )
            .unwrap();
        assert!(outcomes[0].found);
        assert_eq!(outcomes[0].written.as_deref(), Some(b"5".as_slice()));
        // Re-decode the patched buffer and observe the new value.
        let node = BjdataDecoder::new().decode(&buf).unwrap();
        let arr = match node.get("arr") {
            Some(Node::Array(items)) => items.clone(),
            other => panic!("expected array, got {:?}", other),
        };
        assert_eq!(arr[2].get("c"), Some(&Node::Str("5".into())));
    }

    #[test]
    fn test_patch_too_large_leaves_buffer_unchanged() {
        let mut buf = fixture();
        let before = buf.clone();
        let (_, map) = BjdataDecoder::new().decode_with_extents(&buf).unwrap();
        let outcomes = PatchWriter::new()
            .apply(
                &mut buf,
                &map,
                &[("$.arr[2].c".to_string(), Node::Str("55".into()))],
            )
            .unwrap();
        assert_eq!(
            outcomes[0].error,
            Some(PatchError::ExtentTooSmall { need: 2, have: 1 })
        );
        assert_eq!(buf, before);
    }

    #[test]
    fn test_space_padding_fills_extent() {
        // "hi" slot patched with one-byte string → "5 " (space padded).
        let mut buf = b"{U\x01sSU\x02hi}".to_vec();
        let (_, map) = BjdataDecoder::new().decode_with_extents(&buf).unwrap();
        let outcomes = PatchWriter::new()
            .apply(&mut buf, &map, &[("$.s".to_string(), Node::Str("5".into()))])
            .unwrap();
        assert_eq!(outcomes[0].written.as_deref(), Some(b"5 ".as_slice()));
        let node = BjdataDecoder::new().decode(&buf).unwrap();
        assert_eq!(node.get("s"), Some(&Node::Str("5 ".into())));
    }

    #[test]
    fn test_batch_isolation_and_missing_path() {
        let mut buf = fixture();
        let (_, map) = BjdataDecoder::new().decode_with_extents(&buf).unwrap();
        let outcomes = PatchWriter::new()
            .apply(
                &mut buf,
                &map,
                &[
                    ("$.nope".to_string(), Node::Str("x".into())),
                    ("$.arr[0].c".to_string(), Node::Str("qq".into())),
                    ("$.arr[1].c".to_string(), Node::Str("w".into())),
                ],
            )
            .unwrap();
        assert!(!outcomes[0].found);
        assert!(outcomes[1].error.is_some());
        // Third pair still applied.
        assert_eq!(outcomes[2].written.as_deref(), Some(b"w".as_slice()));
        let node = BjdataDecoder::new().decode(&buf).unwrap();
        let arr = match node.get("arr") {
            Some(Node::Array(items)) => items.clone(),
            other => panic!("expected array, got {:?}", other),
        };
        assert_eq!(arr[1].get("c"), Some(&Node::Str("w".into())));
    }

    #[test]
    fn test_numeric_and_bool_slots() {
        // {"n": int32 7, "t": true}
        let mut buf = b"{U\x01nl\x00\x00\x00\x07U\x01tT}".to_vec();
        let (_, map) = BjdataDecoder::new().decode_with_extents(&buf).unwrap();
        let outcomes = PatchWriter::new()
            .apply(
                &mut buf,
                &map,
                &[
                    ("$.n".to_string(), Node::I32(-9)),
                    ("$.t".to_string(), Node::Bool(false)),
                ],
            )
            .unwrap();
        assert!(outcomes.iter().all(|o| o.error.is_none()));
        let node = BjdataDecoder::new().decode(&buf).unwrap();
        assert_eq!(node.get("n"), Some(&Node::I32(-9)));
        assert_eq!(node.get("t"), Some(&Node::Bool(false)));
    }

    #[test]
    fn test_stream_target_matches_buffer_target() {
        let base = fixture();
        let (_, map) = BjdataDecoder::new().decode_with_extents(&base).unwrap();
        let pairs = vec![("$.arr[0].c".to_string(), Node::Str("9".into()))];

        let mut in_memory = base.clone();
        PatchWriter::new()
            .apply(&mut in_memory, &map, &pairs)
            .unwrap();

        let mut streamed = base.clone();
        {
            let mut target = StreamTarget(Cursor::new(&mut streamed));
            PatchWriter::new().apply(&mut target, &map, &pairs).unwrap();
        }
        assert_eq!(in_memory, streamed);
    }

    #[test]
    fn test_file_target() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("jdata_patch_test_{}.bjd", std::process::id()));
        std::fs::write(&path, fixture()).unwrap();
        let (_, map) = BjdataDecoder::new()
            .decode_with_extents(&fixture())
            .unwrap();
        PatchWriter::new()
            .apply_to_file(
                &path,
                &map,
                &[("$.arr[1].c".to_string(), Node::Str("k".into()))],
            )
            .unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::remove_file(&path).ok();
        let node = BjdataDecoder::new().decode(&bytes).unwrap();
        let arr = match node.get("arr") {
            Some(Node::Array(items)) => items.clone(),
            other => panic!("expected array, got {:?}", other),
        };
        assert_eq!(arr[1].get("c"), Some(&Node::Str("k".into())));
    }
}
