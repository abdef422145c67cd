//! High-level BJData/JData document handling: one call to parse + rebuild
//! native arrays, query by path, and patch recorded byte extents in place.
//!
//! # Example
//!
//! ```
//! use jdata::{dump, parse, query};
//! use jdata_pack::Node;
//!
//! let doc = Node::Object(vec![(
//!     "a".into(),
//!     Node::Array(vec![Node::I8(1), Node::I8(2), Node::I8(3)]),
//! )]);
//! let bytes = dump(&doc).unwrap();
//! let loaded = parse(&bytes).unwrap();
//! assert_eq!(query(&loaded.root, "$.a[1]").unwrap(), Node::I8(2));
//! ```

use std::io;
use std::path::Path;

use thiserror::Error;

pub use jdata_annot::{
    annotate, reconstruct, AnnotError, ByteCodec, CodecError, CodecRegistry, ReconstructOptions,
};
pub use jdata_json_path::{JsonPath, ParseError, PathError, PathParser, Segment};
pub use jdata_pack::{
    BjdataDecoder, BjdataEncoder, ByteExtent, ComplexArray, DecodeError, DecodeOptions, Dtype,
    Endian, EncodeError, ExtentMap, NdArray, Node, PatchError, PatchOutcome, PatchWriter,
    SparseArray,
};

/// Umbrella error for the document-level API.
#[derive(Debug, Error)]
pub enum JdataError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Annot(#[from] AnnotError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    PathParse(#[from] ParseError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Per-parse configuration for [`parse_with_options`].
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub decode: DecodeOptions,
    pub reconstruct: ReconstructOptions,
    /// Skip envelope reconstruction and keep the raw parsed tree.
    pub raw: bool,
}

/// A parsed document plus the extent map addressing its source bytes.
///
/// The extent map is tied to the exact byte layout it was parsed from; never
/// mix it with bytes from a different parse.
#[derive(Debug, Clone)]
pub struct Document {
    pub root: Node,
    pub extents: ExtentMap,
}

/// Parses with default options and the built-in codec registry.
pub fn parse(bytes: &[u8]) -> Result<Document, JdataError> {
    parse_with_options(bytes, &LoadOptions::default(), &CodecRegistry::with_builtins())
}

pub fn parse_with_options(
    bytes: &[u8],
    opts: &LoadOptions,
    registry: &CodecRegistry,
) -> Result<Document, JdataError> {
    let decoder = BjdataDecoder::with_options(opts.decode.clone());
    let (raw, extents) = decoder.decode_with_extents(bytes)?;
    let root = if opts.raw {
        raw
    } else {
        reconstruct(raw, &opts.reconstruct, registry)?
    };
    Ok(Document { root, extents })
}

/// Reads and parses a file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Document, JdataError> {
    let bytes = std::fs::read(path)?;
    parse(&bytes)
}

/// Lowers native arrays to envelopes and encodes to wire bytes.
pub fn dump(root: &Node) -> Result<Vec<u8>, JdataError> {
    dump_with_endian(root, Endian::Big)
}

pub fn dump_with_endian(root: &Node, endian: Endian) -> Result<Vec<u8>, JdataError> {
    let lowered = annotate(root.clone());
    let mut enc = BjdataEncoder::with_endian(endian);
    Ok(enc.encode(&lowered)?)
}

/// Writes a document tree to a file.
pub fn save<P: AsRef<Path>>(path: P, root: &Node) -> Result<(), JdataError> {
    let bytes = dump(root)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Compiles `path` and evaluates it against `root`, collapsing a singleton
/// result to the bare value.
pub fn query(root: &Node, path: &str) -> Result<Node, JdataError> {
    let compiled = PathParser::parse(path)?;
    Ok(jdata_json_path::get(&compiled, root)?)
}

/// Canonicalizes each pair's path through the path parser, then patches the
/// in-memory buffer at its recorded extent.
pub fn set(
    buffer: &mut Vec<u8>,
    extents: &ExtentMap,
    pairs: &[(&str, Node)],
) -> Result<Vec<PatchOutcome>, JdataError> {
    let pairs = canonical_pairs(pairs)?;
    Ok(PatchWriter::new().apply(buffer, extents, &pairs)?)
}

/// File-backed variant of [`set`]; the handle lives only for this call.
pub fn set_file<P: AsRef<Path>>(
    path: P,
    extents: &ExtentMap,
    pairs: &[(&str, Node)],
) -> Result<Vec<PatchOutcome>, JdataError> {
    let pairs = canonical_pairs(pairs)?;
    Ok(PatchWriter::new().apply_to_file(path, extents, &pairs)?)
}

fn canonical_pairs(pairs: &[(&str, Node)]) -> Result<Vec<(String, Node)>, JdataError> {
    pairs
        .iter()
        .map(|(p, v)| {
            let mut compiled = PathParser::parse(p)?;
            // Extent paths carry sanitized key names, so queries may use the
            // raw form; re-derive it the way the path engine does for lookups.
            for seg in &mut compiled.segments {
                sanitize_segment(seg);
            }
            Ok((compiled.to_string(), v.clone()))
        })
        .collect()
}

fn sanitize_segment(seg: &mut Segment) {
    match seg {
        Segment::Key(name) => *name = jdata_pack::name::encode_name(name),
        Segment::DeepScan(inner) => sanitize_segment(inner),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_and_set_share_path_canonicalization() {
        let doc = Node::Object(vec![(
            "arr".into(),
            Node::Array(vec![Node::Str("x".into()), Node::Str("y".into())]),
        )]);
        let mut bytes = dump(&doc).unwrap();
        let loaded = parse(&bytes).unwrap();
        assert_eq!(query(&loaded.root, "$.arr[1]").unwrap(), Node::Str("y".into()));

        let outcomes = set(
            &mut bytes,
            &loaded.extents,
            &[("$.arr[1]", Node::Str("z".into()))],
        )
        .unwrap();
        assert!(outcomes[0].found);
        let reloaded = parse(&bytes).unwrap();
        assert_eq!(query(&reloaded.root, "$.arr[1]").unwrap(), Node::Str("z".into()));
    }

    #[test]
    fn test_set_accepts_raw_key_names() {
        // The wire name "my field" is stored (and extent-mapped) in its
        // sanitized form; callers patch with the raw name.
        let doc = Node::Object(vec![(
            "my_0x20_field".to_string(),
            Node::Str("old".into()),
        )]);
        let mut bytes = dump(&doc).unwrap();
        let loaded = parse(&bytes).unwrap();
        let outcomes = set(
            &mut bytes,
            &loaded.extents,
            &[("$['my field']", Node::Str("new".into()))],
        )
        .unwrap();
        assert!(outcomes[0].found && outcomes[0].error.is_none());
        let reloaded = parse(&bytes).unwrap();
        assert_eq!(
            query(&reloaded.root, "$['my field']").unwrap(),
            Node::Str("new".into())
        );
    }
}
