//! JData array-envelope reconstruction for BJData/UBJSON trees.
//!
//! A parsed object carrying `_ArrayType_` plus `_ArrayData_` (or
//! `_ArrayZipData_`) is an array envelope: metadata sufficient to rebuild a
//! typed dense, sparse or complex array from a flat element list. This crate
//! rebuilds those (and `_MapData_` maps) into native nodes, and lowers native
//! nodes back into envelopes for the wire encoder.
//!
//! # Example
//!
//! ```
//! use jdata_annot::{reconstruct, CodecRegistry, ReconstructOptions};
//! use jdata_pack::{Dtype, NdArray, Node};
//!
//! let envelope = Node::Object(vec![
//!     ("_ArrayType_".into(), Node::Str("int32".into())),
//!     ("_ArraySize_".into(), Node::Array(vec![Node::I64(2), Node::I64(2)])),
//!     (
//!         "_ArrayData_".into(),
//!         Node::Tensor(NdArray::from_f64s(Dtype::Int32, vec![4], &[1.0, 2.0, 3.0, 4.0])),
//!     ),
//! ]);
//! let registry = CodecRegistry::with_builtins();
//! let node = reconstruct(envelope, &ReconstructOptions::default(), &registry).unwrap();
//! match node {
//!     Node::Tensor(t) => assert_eq!(t.shape, vec![2, 2]),
//!     other => panic!("expected tensor, got {:?}", other),
//! }
//! ```

mod error;
pub use error::{AnnotError, CodecError};

mod codec;
pub use codec::{from_base64, to_base64, ByteCodec, CodecRegistry};

mod decode;
pub use decode::{reconstruct, ReconstructOptions};

mod encode;
pub use encode::annotate;
