//! BJData/UBJSON encoder.
//!
//! Emits the canonical form: scalar markers matching each value's width,
//! string lengths using the smallest integer marker that fits, typed arrays
//! as `[$<type>#` blocks (with a plain dimension vector for N-D shapes), and
//! raw object field names restored via [`crate::name::decode_name`].
//!
//! Sparse/complex/map nodes have no direct wire form; lower them to array
//! envelopes first (see the `jdata-annot` crate).

use crate::error::EncodeError;
use crate::name::decode_name;
use crate::node::{NdArray, Node};
use crate::Endian;

pub struct BjdataEncoder {
    pub endian: Endian,
    out: Vec<u8>,
}

impl Default for BjdataEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BjdataEncoder {
    pub fn new() -> Self {
        Self {
            endian: Endian::Big,
            out: Vec::new(),
        }
    }

    pub fn with_endian(endian: Endian) -> Self {
        Self {
            endian,
            out: Vec::new(),
        }
    }

    pub fn encode(&mut self, value: &Node) -> Result<Vec<u8>, EncodeError> {
        self.out.clear();
        self.write_any(value)?;
        Ok(std::mem::take(&mut self.out))
    }

    fn write_any(&mut self, value: &Node) -> Result<(), EncodeError> {
        match value {
            Node::Null => self.out.push(b'Z'),
            Node::Bool(true) => self.out.push(b'T'),
            Node::Bool(false) => self.out.push(b'F'),
            Node::I8(v) => {
                self.out.push(b'i');
                self.out.push(*v as u8);
            }
            Node::U8(v) => {
                self.out.push(b'U');
                self.out.push(*v);
            }
            Node::I16(v) => {
                self.out.push(b'I');
                self.put(&v.to_be_bytes(), &v.to_le_bytes());
            }
            Node::I32(v) => {
                self.out.push(b'l');
                self.put(&v.to_be_bytes(), &v.to_le_bytes());
            }
            Node::I64(v) => {
                self.out.push(b'L');
                self.put(&v.to_be_bytes(), &v.to_le_bytes());
            }
            Node::F32(v) => {
                self.out.push(b'd');
                self.put(&v.to_be_bytes(), &v.to_le_bytes());
            }
            Node::F64(v) => {
                self.out.push(b'D');
                self.put(&v.to_be_bytes(), &v.to_le_bytes());
            }
            Node::Str(s) => {
                self.out.push(b'S');
                self.write_length(s.len());
                self.out.extend_from_slice(s.as_bytes());
            }
            Node::HiPrec(s) => {
                self.out.push(b'H');
                self.write_length(s.len());
                self.out.extend_from_slice(s.as_bytes());
            }
            Node::Char(c) => {
                self.out.push(b'C');
                self.out.push(if (*c as u32) < 256 { *c as u8 } else { b'?' });
            }
            Node::Bytes(b) => {
                self.out.extend_from_slice(b"[$U#");
                self.write_length(b.len());
                self.out.extend_from_slice(b);
            }
            Node::Array(items) => {
                self.out.push(b'[');
                for item in items {
                    self.write_any(item)?;
                }
                self.out.push(b']');
            }
            Node::Object(pairs) => {
                self.out.push(b'{');
                for (key, val) in pairs {
                    self.write_key(key);
                    self.write_any(val)?;
                }
                self.out.push(b'}');
            }
            Node::Tensor(t) => self.write_tensor(t),
            Node::Sparse(_) => return Err(EncodeError::UnsupportedNode("sparse")),
            Node::Complex(_) => return Err(EncodeError::UnsupportedNode("complex")),
            Node::Map(_) => return Err(EncodeError::UnsupportedNode("map")),
        }
        Ok(())
    }

    fn write_tensor(&mut self, t: &NdArray) {
        self.out.push(b'[');
        self.out.push(b'$');
        self.out.push(t.dtype.marker());
        self.out.push(b'#');
        // A uint8 block with a scalar count is the Bytes blob shorthand, so
        // uint8 tensors always carry an explicit dimension vector.
        if t.shape.len() == 1 && t.dtype != crate::node::Dtype::Uint8 {
            self.write_length(t.count());
        } else {
            self.out.push(b'[');
            for &d in &t.shape {
                self.write_length(d);
            }
            self.out.push(b']');
        }
        if self.endian.needs_swap() {
            let size = t.dtype.size();
            for chunk in t.data.chunks_exact(size) {
                self.out.extend(chunk.iter().rev());
            }
        } else {
            self.out.extend_from_slice(&t.data);
        }
    }

    /// Field name: raw wire form, length-prefixed, no `S` marker.
    fn write_key(&mut self, key: &str) {
        let raw = decode_name(key);
        self.write_length(raw.len());
        self.out.extend_from_slice(raw.as_bytes());
    }

    /// Length as the smallest integer marker that fits.
    fn write_length(&mut self, len: usize) {
        if len <= u8::MAX as usize {
            self.out.push(b'U');
            self.out.push(len as u8);
        } else if len <= i16::MAX as usize {
            self.out.push(b'I');
            let v = len as i16;
            self.put(&v.to_be_bytes(), &v.to_le_bytes());
        } else if len <= i32::MAX as usize {
            self.out.push(b'l');
            let v = len as i32;
            self.put(&v.to_be_bytes(), &v.to_le_bytes());
        } else {
            self.out.push(b'L');
            let v = len as i64;
            self.put(&v.to_be_bytes(), &v.to_le_bytes());
        }
    }

    #[inline]
    fn put(&mut self, be: &[u8], le: &[u8]) {
        match self.endian {
            Endian::Big => self.out.extend_from_slice(be),
            Endian::Little => self.out.extend_from_slice(le),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Dtype;
    use crate::BjdataDecoder;

    fn roundtrip(node: &Node) -> Vec<u8> {
        let mut enc = BjdataEncoder::new();
        let bytes = enc.encode(node).unwrap();
        let back = BjdataDecoder::new().decode(&bytes).unwrap();
        assert_eq!(&back, node);
        bytes
    }

    #[test]
    fn test_scalar_roundtrips() {
        roundtrip(&Node::Null);
        roundtrip(&Node::Bool(true));
        roundtrip(&Node::I8(-5));
        roundtrip(&Node::U8(200));
        roundtrip(&Node::I16(-3000));
        roundtrip(&Node::I32(1 << 20));
        roundtrip(&Node::I64(-(1i64 << 40)));
        roundtrip(&Node::F32(1.25));
        roundtrip(&Node::F64(-0.5));
        roundtrip(&Node::Str("héllo".into()));
        roundtrip(&Node::HiPrec("314159265358979323846".into()));
        roundtrip(&Node::Char('q'));
    }

    #[test]
    fn test_container_roundtrips() {
        roundtrip(&Node::Array(vec![
            Node::I8(1),
            Node::Str("two".into()),
            Node::Array(vec![Node::Null]),
        ]));
        roundtrip(&Node::Object(vec![
            ("alpha".into(), Node::Bool(false)),
            ("_ArrayType_".into(), Node::Str("int8".into())),
        ]));
        roundtrip(&Node::Bytes(vec![0, 1, 254, 255]));
    }

    #[test]
    fn test_tensor_roundtrip_both_endians() {
        let t = NdArray::from_f64s(Dtype::Int32, vec![2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let node = Node::Tensor(t);
        roundtrip(&node);

        let mut enc = BjdataEncoder::with_endian(Endian::Little);
        let bytes = enc.encode(&node).unwrap();
        let dec = BjdataDecoder::with_options(crate::DecodeOptions {
            endian: Endian::Little,
            ..Default::default()
        });
        assert_eq!(dec.decode(&bytes).unwrap(), node);
    }

    #[test]
    fn test_escaped_key_restored_on_wire() {
        let node = Node::Object(vec![("my_0x20_key".into(), Node::Null)]);
        let mut enc = BjdataEncoder::new();
        let bytes = enc.encode(&node).unwrap();
        // Raw name "my key" (6 bytes) back on the wire.
        assert_eq!(&bytes[..9], b"{U\x06my key");
        let back = BjdataDecoder::new().decode(&bytes).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_bytes_wire_shape() {
        let mut enc = BjdataEncoder::new();
        let bytes = enc.encode(&Node::Bytes(vec![9, 8])).unwrap();
        assert_eq!(bytes, b"[$U#U\x02\x09\x08");
    }

    #[test]
    fn test_unsupported_nodes() {
        let mut enc = BjdataEncoder::new();
        let sparse = Node::Sparse(crate::SparseArray {
            dtype: Dtype::Float64,
            shape: [1, 1],
            rows: vec![0],
            cols: vec![0],
            values: vec![1.0],
            imag: None,
        });
        assert_eq!(
            enc.encode(&sparse).unwrap_err(),
            EncodeError::UnsupportedNode("sparse")
        );
    }

    #[test]
    fn test_encode_decode_encode_is_fixed_point() {
        let node = Node::Object(vec![
            (
                "data".into(),
                Node::Tensor(NdArray::from_f64s(Dtype::Float32, vec![4], &[1.0, 2.0, 3.0, 4.0])),
            ),
            ("label".into(), Node::Str("m".into())),
        ]);
        let mut enc = BjdataEncoder::new();
        let first = enc.encode(&node).unwrap();
        let back = BjdataDecoder::new().decode(&first).unwrap();
        let second = enc.encode(&back).unwrap();
        assert_eq!(first, second);
    }
}
