//! [`Node`] — the universal value type produced by the BJData/UBJSON decoder
//! and consumed by the array reconstructor, path engine and patch writer.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Element type of a typed array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    Int8,
    Uint8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl Dtype {
    /// Size of one element in bytes.
    #[inline]
    pub fn size(self) -> usize {
        match self {
            Dtype::Int8 | Dtype::Uint8 => 1,
            Dtype::Int16 => 2,
            Dtype::Int32 | Dtype::Float32 => 4,
            Dtype::Int64 | Dtype::Float64 => 8,
        }
    }

    /// The one-byte wire marker for this element type.
    #[inline]
    pub fn marker(self) -> u8 {
        match self {
            Dtype::Int8 => b'i',
            Dtype::Uint8 => b'U',
            Dtype::Int16 => b'I',
            Dtype::Int32 => b'l',
            Dtype::Int64 => b'L',
            Dtype::Float32 => b'd',
            Dtype::Float64 => b'D',
        }
    }

    pub fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            b'i' => Some(Dtype::Int8),
            b'U' => Some(Dtype::Uint8),
            b'I' => Some(Dtype::Int16),
            b'l' => Some(Dtype::Int32),
            b'L' => Some(Dtype::Int64),
            b'd' => Some(Dtype::Float32),
            b'D' => Some(Dtype::Float64),
            _ => None,
        }
    }

    /// Canonical type name used in array envelopes.
    pub fn name(self) -> &'static str {
        match self {
            Dtype::Int8 => "int8",
            Dtype::Uint8 => "uint8",
            Dtype::Int16 => "int16",
            Dtype::Int32 => "int32",
            Dtype::Int64 => "int64",
            Dtype::Float32 => "float32",
            Dtype::Float64 => "float64",
        }
    }

    /// Parses an envelope type name. `single`/`double` are accepted as
    /// aliases emitted by MATLAB-family encoders.
    pub fn parse_name(name: &str) -> Option<Self> {
        match name {
            "int8" => Some(Dtype::Int8),
            "uint8" => Some(Dtype::Uint8),
            "int16" => Some(Dtype::Int16),
            "int32" => Some(Dtype::Int32),
            "int64" => Some(Dtype::Int64),
            "float32" | "single" => Some(Dtype::Float32),
            "float64" | "double" => Some(Dtype::Float64),
            _ => None,
        }
    }
}

/// Dense typed multi-dimensional array.
///
/// Elements live in `data` in host byte order, row-major with respect to
/// `shape`. The decoder's fixed-width fast path produces these directly.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    pub dtype: Dtype,
    pub shape: Vec<usize>,
    pub data: Vec<u8>,
}

impl NdArray {
    /// Wraps a row-major, host-endian element buffer.
    pub fn row_major(dtype: Dtype, shape: Vec<usize>, data: Vec<u8>) -> Self {
        Self { dtype, shape, data }
    }

    /// Reorders a column-major flat buffer into row-major storage.
    pub fn from_col_major(dtype: Dtype, shape: Vec<usize>, data: Vec<u8>) -> Self {
        let size = dtype.size();
        let count = data.len() / size;
        if shape.len() < 2 || count < 2 {
            return Self { dtype, shape, data };
        }
        // Row-major strides (in elements) for the target layout.
        let mut rstride = vec![1usize; shape.len()];
        for d in (0..shape.len() - 1).rev() {
            rstride[d] = rstride[d + 1] * shape[d + 1];
        }
        let mut out = vec![0u8; data.len()];
        let mut idx = vec![0usize; shape.len()];
        for c in 0..count {
            let mut pos = 0usize;
            for d in 0..shape.len() {
                pos += idx[d] * rstride[d];
            }
            out[pos * size..(pos + 1) * size].copy_from_slice(&data[c * size..(c + 1) * size]);
            // Column-major order advances the first axis fastest.
            for item in idx.iter_mut().zip(shape.iter()) {
                let (i, dim) = item;
                *i += 1;
                if *i < *dim {
                    break;
                }
                *i = 0;
            }
        }
        Self { dtype, shape, data: out }
    }

    /// Builds an array by casting `f64` staging values to the target dtype.
    pub fn from_f64s(dtype: Dtype, shape: Vec<usize>, vals: &[f64]) -> Self {
        let mut data = Vec::with_capacity(vals.len() * dtype.size());
        for &v in vals {
            match dtype {
                Dtype::Int8 => data.extend_from_slice(&(v as i8).to_ne_bytes()),
                Dtype::Uint8 => data.extend_from_slice(&(v as u8).to_ne_bytes()),
                Dtype::Int16 => data.extend_from_slice(&(v as i16).to_ne_bytes()),
                Dtype::Int32 => data.extend_from_slice(&(v as i32).to_ne_bytes()),
                Dtype::Int64 => data.extend_from_slice(&(v as i64).to_ne_bytes()),
                Dtype::Float32 => data.extend_from_slice(&(v as f32).to_ne_bytes()),
                Dtype::Float64 => data.extend_from_slice(&v.to_ne_bytes()),
            }
        }
        Self { dtype, shape, data }
    }

    /// Number of elements.
    pub fn count(&self) -> usize {
        self.data.len() / self.dtype.size()
    }

    /// Element `i` (flat row-major order) widened to `f64`.
    pub fn elem_f64(&self, i: usize) -> f64 {
        let s = self.dtype.size();
        let b = &self.data[i * s..(i + 1) * s];
        match self.dtype {
            Dtype::Int8 => i8::from_ne_bytes([b[0]]) as f64,
            Dtype::Uint8 => b[0] as f64,
            Dtype::Int16 => i16::from_ne_bytes([b[0], b[1]]) as f64,
            Dtype::Int32 => i32::from_ne_bytes([b[0], b[1], b[2], b[3]]) as f64,
            Dtype::Int64 => i64::from_ne_bytes(b.try_into().unwrap_or_default()) as f64,
            Dtype::Float32 => f32::from_ne_bytes([b[0], b[1], b[2], b[3]]) as f64,
            Dtype::Float64 => f64::from_ne_bytes(b.try_into().unwrap_or_default()),
        }
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        (0..self.count()).map(|i| self.elem_f64(i)).collect()
    }

    /// Element `i` as a scalar [`Node`] of the matching width.
    pub fn scalar_at(&self, i: usize) -> Node {
        let s = self.dtype.size();
        let b = &self.data[i * s..(i + 1) * s];
        match self.dtype {
            Dtype::Int8 => Node::I8(i8::from_ne_bytes([b[0]])),
            Dtype::Uint8 => Node::U8(b[0]),
            Dtype::Int16 => Node::I16(i16::from_ne_bytes([b[0], b[1]])),
            Dtype::Int32 => Node::I32(i32::from_ne_bytes([b[0], b[1], b[2], b[3]])),
            Dtype::Int64 => Node::I64(i64::from_ne_bytes(b.try_into().unwrap_or_default())),
            Dtype::Float32 => Node::F32(f32::from_ne_bytes([b[0], b[1], b[2], b[3]])),
            Dtype::Float64 => Node::F64(f64::from_ne_bytes(b.try_into().unwrap_or_default())),
        }
    }

    /// Indexes along the leading axis: a scalar for 1-D arrays, otherwise a
    /// sub-array of shape `shape[1..]`.
    pub fn index(&self, i: usize) -> Option<Node> {
        let outer = *self.shape.first()?;
        if i >= outer {
            return None;
        }
        if self.shape.len() == 1 {
            return Some(self.scalar_at(i));
        }
        let chunk = self.count() / outer * self.dtype.size();
        Some(Node::Tensor(NdArray {
            dtype: self.dtype,
            shape: self.shape[1..].to_vec(),
            data: self.data[i * chunk..(i + 1) * chunk].to_vec(),
        }))
    }
}

/// Sparse matrix in triplet form. Indices are 0-based; the 1-based wire
/// convention is converted at the envelope boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseArray {
    pub dtype: Dtype,
    pub shape: [usize; 2],
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
    pub values: Vec<f64>,
    pub imag: Option<Vec<f64>>,
}

impl SparseArray {
    pub fn nnz(&self) -> usize {
        self.values.len()
    }
}

/// Complex array with separate real/imaginary component vectors, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexArray {
    pub dtype: Dtype,
    pub shape: Vec<usize>,
    pub re: Vec<f64>,
    pub im: Vec<f64>,
}

/// Universal value type spanning the raw parsed tree and the reconstructed
/// native-array model.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    /// Length-prefixed UTF-8 string (`S`).
    Str(String),
    /// Single one-byte char (`C`).
    Char(char),
    /// High-precision number carried as its decimal string (`H`).
    HiPrec(String),
    /// Raw byte blob (the `[$U#` shorthand).
    Bytes(Vec<u8>),
    Array(Vec<Node>),
    /// Ordered object with unique sanitized keys.
    Object(Vec<(String, Node)>),
    Tensor(NdArray),
    Sparse(SparseArray),
    Complex(ComplexArray),
    /// Ordered map; keys need not be strings.
    Map(Vec<(Node, Node)>),
}

impl Node {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Node::I8(v) => Some(*v as i64),
            Node::U8(v) => Some(*v as i64),
            Node::I16(v) => Some(*v as i64),
            Node::I32(v) => Some(*v as i64),
            Node::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Node::F32(v) => Some(*v as f64),
            Node::F64(v) => Some(*v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        self.as_i64().and_then(|v| usize::try_from(v).ok())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Member lookup on an object node.
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Object(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for Node {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Node::Null,
            serde_json::Value::Bool(b) => Node::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Node::I64(i)
                } else {
                    Node::F64(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Node::Str(s),
            serde_json::Value::Array(arr) => {
                Node::Array(arr.into_iter().map(Node::from).collect())
            }
            serde_json::Value::Object(obj) => {
                Node::Object(obj.into_iter().map(|(k, v)| (k, Node::from(v))).collect())
            }
        }
    }
}

impl From<Node> for serde_json::Value {
    fn from(n: Node) -> Self {
        use serde_json::Value;
        match n {
            Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(b),
            Node::I8(v) => serde_json::json!(v),
            Node::U8(v) => serde_json::json!(v),
            Node::I16(v) => serde_json::json!(v),
            Node::I32(v) => serde_json::json!(v),
            Node::I64(v) => serde_json::json!(v),
            Node::F32(v) => serde_json::json!(v),
            Node::F64(v) => serde_json::json!(v),
            Node::Str(s) => Value::String(s),
            Node::Char(c) => Value::String(c.to_string()),
            Node::HiPrec(s) => Value::String(s),
            Node::Bytes(b) => Value::String(format!(
                "data:application/octet-stream;base64,{}",
                BASE64.encode(&b)
            )),
            Node::Array(arr) => Value::Array(arr.into_iter().map(Value::from).collect()),
            Node::Object(obj) => Value::Object(
                obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ),
            Node::Tensor(t) => tensor_to_json(&t, 0, 0, t.count()),
            Node::Sparse(s) => {
                let mut obj = serde_json::Map::new();
                obj.insert("size".into(), serde_json::json!(s.shape));
                obj.insert("rows".into(), serde_json::json!(s.rows));
                obj.insert("cols".into(), serde_json::json!(s.cols));
                obj.insert("values".into(), serde_json::json!(s.values));
                if let Some(im) = s.imag {
                    obj.insert("imag".into(), serde_json::json!(im));
                }
                Value::Object(obj)
            }
            Node::Complex(c) => {
                let mut obj = serde_json::Map::new();
                obj.insert("size".into(), serde_json::json!(c.shape));
                obj.insert("real".into(), serde_json::json!(c.re));
                obj.insert("imag".into(), serde_json::json!(c.im));
                Value::Object(obj)
            }
            Node::Map(pairs) => Value::Array(
                pairs
                    .into_iter()
                    .map(|(k, v)| Value::Array(vec![Value::from(k), Value::from(v)]))
                    .collect(),
            ),
        }
    }
}

/// Renders a tensor as nested JSON arrays, row-major.
fn tensor_to_json(t: &NdArray, axis: usize, start: usize, len: usize) -> serde_json::Value {
    if axis == t.shape.len() || t.shape.is_empty() {
        if len == 1 {
            return serde_json::Value::from(t.scalar_at(start));
        }
        return serde_json::Value::Array(
            (start..start + len)
                .map(|i| serde_json::Value::from(t.scalar_at(i)))
                .collect(),
        );
    }
    let dim = t.shape[axis];
    let chunk = len / dim.max(1);
    serde_json::Value::Array(
        (0..dim)
            .map(|i| {
                if axis + 1 == t.shape.len() {
                    serde_json::Value::from(t.scalar_at(start + i))
                } else {
                    tensor_to_json(t, axis + 1, start + i * chunk, chunk)
                }
            })
            .collect(),
    )
}
