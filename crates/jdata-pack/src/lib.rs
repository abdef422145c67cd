//! Binary codec for the BJData/UBJSON wire format: decoding with byte-extent
//! maps, canonical encoding, field-name sanitization, and O(1) in-place
//! patching of recorded extents.
//!
//! # Example
//!
//! ```
//! use jdata_pack::{BjdataDecoder, BjdataEncoder, Node};
//!
//! let node = Node::Object(vec![("answer".into(), Node::I8(42))]);
//! let bytes = BjdataEncoder::new().encode(&node).unwrap();
//! let back = BjdataDecoder::new().decode(&bytes).unwrap();
//! assert_eq!(back, node);
//! ```

mod node;
pub use node::{ComplexArray, Dtype, NdArray, Node, SparseArray};

mod error;
pub use error::{DecodeError, EncodeError, PatchError};

mod extent;
pub use extent::{ByteExtent, ExtentMap};

pub mod name;

mod scan;
pub use scan::{match_bracket, BracketSpan};

mod decoder;
pub use decoder::{BjdataDecoder, DecodeOptions, Endian};

mod encoder;
pub use encoder::BjdataEncoder;

mod patch;
pub use patch::{PatchOutcome, PatchTarget, PatchWriter, StreamTarget};
