//! Array-envelope reconstruction.
//!
//! Walks a parsed tree depth-first, children before parents, replacing JData
//! array/map envelopes (`_ArrayType_`, `_ArrayData_`, `_ArrayZipData_`,
//! `_MapData_`, …) with native [`Node::Tensor`]/[`Node::Sparse`]/
//! [`Node::Complex`]/[`Node::Map`] values.
//!
//! Dimension-ordering note: under format version ≥ 2 the dense path takes the
//! staging buffer row-major against the declared dims; the sparse and complex
//! paths read their staging column-major regardless of version. That
//! asymmetry matches the observed wire producers and is pinned by tests.

use jdata_pack::{ComplexArray, Dtype, Endian, NdArray, Node, SparseArray};

use crate::codec::{from_base64, CodecRegistry};
use crate::error::AnnotError;

/// Reconstruction configuration, passed by argument. Format version is an
/// explicit field here, never ambient state.
#[derive(Debug, Clone)]
pub struct ReconstructOptions {
    /// Recurse into children before testing each object for an envelope.
    pub recursive: bool,
    /// Dimension-ordering convention of the wire producer.
    pub format_version: u8,
    /// Base64-decode binary zip carriers (text carriers always decode).
    pub base64: bool,
    /// Byte order of decompressed payloads.
    pub endian: Endian,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            format_version: 2,
            base64: false,
            endian: Endian::Big,
        }
    }
}

/// Envelope key prefixes, probed canonical-first.
const PREFIXES: [&str; 2] = ["_", "x0x5F_"];

/// Rebuilds native arrays/maps throughout `node`.
pub fn reconstruct(
    node: Node,
    opts: &ReconstructOptions,
    registry: &CodecRegistry,
) -> Result<Node, AnnotError> {
    match node {
        Node::Object(pairs) => {
            let pairs = if opts.recursive {
                pairs
                    .into_iter()
                    .map(|(k, v)| Ok((k, reconstruct(v, opts, registry)?)))
                    .collect::<Result<Vec<_>, AnnotError>>()?
            } else {
                pairs
            };
            rebuild_envelope(pairs, opts, registry)
        }
        Node::Array(items) if opts.recursive => Ok(Node::Array(
            items
                .into_iter()
                .map(|v| reconstruct(v, opts, registry))
                .collect::<Result<Vec<_>, AnnotError>>()?,
        )),
        other => Ok(other),
    }
}

fn take(pairs: &mut Vec<(String, Node)>, prefix: &str, field: &str) -> Option<Node> {
    let key = format!("{prefix}{field}");
    let i = pairs.iter().position(|(k, _)| *k == key)?;
    Some(pairs.remove(i).1)
}

fn has(pairs: &[(String, Node)], prefix: &str, field: &str) -> bool {
    let key = format!("{prefix}{field}");
    pairs.iter().any(|(k, _)| *k == key)
}

fn rebuild_envelope(
    mut pairs: Vec<(String, Node)>,
    opts: &ReconstructOptions,
    registry: &CodecRegistry,
) -> Result<Node, AnnotError> {
    let Some(prefix) = PREFIXES.iter().copied().find(|p| {
        has(&pairs, p, "ArrayType_") || has(&pairs, p, "MapData_")
    }) else {
        return Ok(Node::Object(pairs));
    };

    let is_array = has(&pairs, prefix, "ArrayType_")
        && (has(&pairs, prefix, "ArrayData_") || has(&pairs, prefix, "ArrayZipData_"));
    if is_array {
        return rebuild_array(&mut pairs, prefix, opts, registry);
    }
    if let Some(md) = take(&mut pairs, prefix, "MapData_") {
        return rebuild_map(md);
    }
    Ok(Node::Object(pairs))
}

/// Flat element buffer in wire linear order plus the observed 2-D staging
/// shape, when one was visible.
struct Staging {
    dtype: Dtype,
    data: Vec<u8>,
    wire_shape: Option<Vec<usize>>,
}

impl Staging {
    fn count(&self) -> usize {
        self.data.len() / self.dtype.size()
    }

    fn to_f64_vec(&self) -> Vec<f64> {
        NdArray::row_major(self.dtype, vec![self.count()], self.data.clone()).to_f64_vec()
    }
}

fn rebuild_array(
    pairs: &mut Vec<(String, Node)>,
    prefix: &str,
    opts: &ReconstructOptions,
    registry: &CodecRegistry,
) -> Result<Node, AnnotError> {
    let type_name = match take(pairs, prefix, "ArrayType_") {
        Some(Node::Str(s)) => s,
        _ => return Err(AnnotError::BadField("ArrayType")),
    };
    let dtype = Dtype::parse_name(&type_name).ok_or(AnnotError::UnknownDtype(type_name))?;

    let dims = match take(pairs, prefix, "ArraySize_") {
        Some(node) => Some(dims_from(&node, "ArraySize")?),
        None => None,
    };

    let sparse_flag = take(pairs, prefix, "ArrayIsSparse_");
    let complex_flag = take(pairs, prefix, "ArrayIsComplex_");
    let is_sparse = truthy(sparse_flag.as_ref());
    let is_complex = truthy(complex_flag.as_ref());
    // The legacy boolean form of the flag marks transposed component pairs.
    let complex_bool_form = matches!(complex_flag, Some(Node::Bool(_)));

    let staging = if let Some(zip_data) = take(pairs, prefix, "ArrayZipData_") {
        unzip_staging(pairs, prefix, dtype, zip_data, opts, registry)?
    } else {
        let data = take(pairs, prefix, "ArrayData_").ok_or(AnnotError::BadField("ArrayData"))?;
        data_staging(dtype, data)?
    };

    if is_sparse {
        rebuild_sparse(staging, dtype, dims, is_complex)
    } else if is_complex {
        rebuild_complex(staging, dtype, dims, complex_bool_form)
    } else {
        rebuild_dense(staging, dtype, dims, opts.format_version)
    }
}

/// Resolves and runs the decompression collaborator, then reinterprets the
/// raw bytes as the declared dtype and checks them against `ArrayZipSize`.
fn unzip_staging(
    pairs: &mut Vec<(String, Node)>,
    prefix: &str,
    dtype: Dtype,
    zip_data: Node,
    opts: &ReconstructOptions,
    registry: &CodecRegistry,
) -> Result<Staging, AnnotError> {
    let method = match take(pairs, prefix, "ArrayZipType_") {
        Some(Node::Str(s)) => s,
        _ => return Err(AnnotError::BadField("ArrayZipType")),
    };
    let zip_size = match take(pairs, prefix, "ArrayZipSize_") {
        Some(node) => Some(dims_from(&node, "ArrayZipSize")?),
        None => None,
    };

    // Text carriers are always base64; binary carriers only when asked.
    let packed = match zip_data {
        Node::Str(s) => from_base64(s.as_bytes()).map_err(AnnotError::Codec)?,
        Node::Bytes(b) if opts.base64 => from_base64(&b).map_err(AnnotError::Codec)?,
        Node::Bytes(b) => b,
        _ => return Err(AnnotError::BadField("ArrayZipData")),
    };

    let codec = registry
        .get(&method)
        .ok_or(AnnotError::UnsupportedCompression(method))?;
    let mut raw = codec.decode(&packed)?;

    if raw.len() % dtype.size() != 0 {
        return Err(AnnotError::ShapeMismatch {
            declared: raw.len() / dtype.size(),
            actual: raw.len(),
        });
    }
    if opts.endian.needs_swap() {
        for chunk in raw.chunks_exact_mut(dtype.size()) {
            chunk.reverse();
        }
    }
    let count = raw.len() / dtype.size();
    if let Some(dims) = &zip_size {
        let declared: usize = dims.iter().product();
        if declared != count {
            return Err(AnnotError::ShapeMismatch {
                declared,
                actual: count,
            });
        }
    }
    Ok(Staging {
        dtype,
        data: raw,
        wire_shape: zip_size.filter(|d| d.len() >= 2),
    })
}

/// Casts an uncompressed `ArrayData` value into the staging buffer,
/// flattening any per-row cell representation column-major.
fn data_staging(dtype: Dtype, data: Node) -> Result<Staging, AnnotError> {
    match data {
        Node::Tensor(t) => {
            let wire_shape = (t.shape.len() >= 2).then(|| t.shape.clone());
            let data = if t.dtype == dtype {
                t.data
            } else {
                NdArray::from_f64s(dtype, vec![t.count()], &t.to_f64_vec()).data
            };
            Ok(Staging {
                dtype,
                data,
                wire_shape,
            })
        }
        Node::Bytes(b) => {
            let data = if dtype == Dtype::Uint8 {
                b
            } else {
                let vals: Vec<f64> = b.iter().map(|&v| v as f64).collect();
                NdArray::from_f64s(dtype, vec![vals.len()], &vals).data
            };
            Ok(Staging {
                dtype,
                data,
                wire_shape: None,
            })
        }
        Node::Array(items) => {
            let all_rows = !items.is_empty() && items.iter().all(|n| {
                matches!(n, Node::Array(_) | Node::Tensor(_))
            });
            if all_rows {
                let rows: Vec<Vec<f64>> = items
                    .iter()
                    .map(row_to_f64s)
                    .collect::<Result<_, _>>()?;
                let r = rows.len();
                let c = rows[0].len();
                if rows.iter().any(|row| row.len() != c) {
                    return Err(AnnotError::ShapeMismatch {
                        declared: c,
                        actual: rows.iter().map(Vec::len).max().unwrap_or(0),
                    });
                }
                // Column-major flatten of the row cells.
                let mut flat = vec![0f64; r * c];
                for (i, row) in rows.iter().enumerate() {
                    for (j, &v) in row.iter().enumerate() {
                        flat[i + j * r] = v;
                    }
                }
                Ok(Staging {
                    dtype,
                    data: NdArray::from_f64s(dtype, vec![r * c], &flat).data,
                    wire_shape: Some(vec![r, c]),
                })
            } else {
                let vals: Vec<f64> = items
                    .iter()
                    .map(|n| n.as_f64().ok_or(AnnotError::BadField("ArrayData")))
                    .collect::<Result<_, _>>()?;
                Ok(Staging {
                    dtype,
                    data: NdArray::from_f64s(dtype, vec![vals.len()], &vals).data,
                    wire_shape: None,
                })
            }
        }
        scalar => {
            let v = scalar.as_f64().ok_or(AnnotError::BadField("ArrayData"))?;
            Ok(Staging {
                dtype,
                data: NdArray::from_f64s(dtype, vec![1], &[v]).data,
                wire_shape: None,
            })
        }
    }
}

fn row_to_f64s(node: &Node) -> Result<Vec<f64>, AnnotError> {
    match node {
        Node::Array(items) => items
            .iter()
            .map(|n| n.as_f64().ok_or(AnnotError::BadField("ArrayData")))
            .collect(),
        Node::Tensor(t) => Ok(t.to_f64_vec()),
        _ => Err(AnnotError::BadField("ArrayData")),
    }
}

fn rebuild_dense(
    staging: Staging,
    dtype: Dtype,
    dims: Option<Vec<usize>>,
    format_version: u8,
) -> Result<Node, AnnotError> {
    let count = staging.count();
    let dims = dims
        .or_else(|| staging.wire_shape.clone())
        .unwrap_or_else(|| vec![count]);
    let declared: usize = dims.iter().product();
    if declared != count {
        return Err(AnnotError::ShapeMismatch {
            declared,
            actual: count,
        });
    }
    let tensor = if format_version >= 2 {
        NdArray::row_major(dtype, dims, staging.data)
    } else {
        NdArray::from_col_major(dtype, dims, staging.data)
    };
    Ok(Node::Tensor(tensor))
}

fn rebuild_complex(
    staging: Staging,
    dtype: Dtype,
    dims: Option<Vec<usize>>,
    bool_form: bool,
) -> Result<Node, AnnotError> {
    let total = staging.count();
    let dims = dims.unwrap_or_else(|| vec![total / 2]);
    let n: usize = dims.iter().product();
    if total != 2 * n {
        return Err(AnnotError::ShapeMismatch {
            declared: 2 * n,
            actual: total,
        });
    }
    let vals = staging.to_f64_vec();
    let (re_wire, im_wire): (Vec<f64>, Vec<f64>) = if bool_form {
        // Boolean-flagged envelopes carry the transposed layout: interleaved
        // (re, im) pairs instead of two component halves.
        (
            (0..n).map(|i| vals[2 * i]).collect(),
            (0..n).map(|i| vals[2 * i + 1]).collect(),
        )
    } else {
        (vals[..n].to_vec(), vals[n..].to_vec())
    };
    // Component vectors are column-major against the declared dims on this
    // path, independent of format version.
    Ok(Node::Complex(ComplexArray {
        dtype,
        shape: dims.clone(),
        re: col_major_to_row(&re_wire, &dims),
        im: col_major_to_row(&im_wire, &dims),
    }))
}

fn col_major_to_row(vals: &[f64], dims: &[usize]) -> Vec<f64> {
    let mut bytes = Vec::with_capacity(vals.len() * 8);
    for v in vals {
        bytes.extend_from_slice(&v.to_ne_bytes());
    }
    NdArray::from_col_major(Dtype::Float64, dims.to_vec(), bytes).to_f64_vec()
}

enum SparseKind {
    RowVec,
    ColVec,
    General,
}

fn rebuild_sparse(
    staging: Staging,
    dtype: Dtype,
    dims: Option<Vec<usize>>,
    complex: bool,
) -> Result<Node, AnnotError> {
    let (kind, declared_shape) = match &dims {
        Some(d) if d.len() == 2 && d[0] == 1 => (SparseKind::RowVec, Some([1, d[1]])),
        Some(d) if d.len() == 2 && d[1] == 1 => (SparseKind::ColVec, Some([d[0], 1])),
        Some(d) if d.len() == 2 => (SparseKind::General, Some([d[0], d[1]])),
        Some(_) => {
            return Err(AnnotError::InvalidSparseLayout(
                "sparse arrays are two-dimensional".into(),
            ))
        }
        None => (SparseKind::General, None),
    };
    let base = match kind {
        SparseKind::General => 3,
        _ => 2,
    };
    let k = base + usize::from(complex);

    let vals = staging.to_f64_vec();
    // Orient the triplet matrix: expect k columns, transpose when the
    // observed shape is flipped.
    let fields: Vec<Vec<f64>> = match staging.wire_shape.as_deref() {
        Some([r, c]) if *c == k => {
            let nnz = *r;
            (0..k).map(|j| vals[j * nnz..(j + 1) * nnz].to_vec()).collect()
        }
        Some([r, c]) if *r == k => {
            let nnz = *c;
            (0..k)
                .map(|j| (0..nnz).map(|i| vals[j + i * k]).collect())
                .collect()
        }
        Some(shape) => {
            return Err(AnnotError::InvalidSparseLayout(format!(
                "triplet data of shape {:?} does not fit width {}",
                shape, k
            )))
        }
        None => {
            if vals.is_empty() || vals.len() % k != 0 {
                return Err(AnnotError::InvalidSparseLayout(format!(
                    "{} values do not divide into width-{} triplets",
                    vals.len(),
                    k
                )));
            }
            let nnz = vals.len() / k;
            (0..k).map(|j| vals[j * nnz..(j + 1) * nnz].to_vec()).collect()
        }
    };
    let nnz = fields[0].len();

    let index_col = |col: &[f64]| -> Result<Vec<usize>, AnnotError> {
        col.iter()
            .map(|&v| {
                let idx = v as i64 - 1;
                usize::try_from(idx).map_err(|_| {
                    AnnotError::InvalidSparseLayout(format!("index {} below 1", v))
                })
            })
            .collect()
    };

    let (rows, cols, vi) = match kind {
        SparseKind::RowVec => (vec![0usize; nnz], index_col(&fields[0])?, 1),
        SparseKind::ColVec => (index_col(&fields[0])?, vec![0usize; nnz], 1),
        SparseKind::General => (index_col(&fields[0])?, index_col(&fields[1])?, 2),
    };
    let values = fields[vi].clone();
    let imag = complex.then(|| fields[vi + 1].clone());

    let shape = match declared_shape {
        Some(s) => {
            let fits = rows.iter().all(|&r| r < s[0]) && cols.iter().all(|&c| c < s[1]);
            if !fits {
                return Err(AnnotError::InvalidSparseLayout(
                    "triplet index outside the declared shape".into(),
                ));
            }
            s
        }
        None => [
            rows.iter().max().map_or(0, |&m| m + 1),
            cols.iter().max().map_or(0, |&m| m + 1),
        ],
    };

    Ok(Node::Sparse(SparseArray {
        dtype,
        shape,
        rows,
        cols,
        values,
        imag,
    }))
}

fn rebuild_map(data: Node) -> Result<Node, AnnotError> {
    let items = match data {
        Node::Array(items) => items,
        _ => return Err(AnnotError::BadField("MapData")),
    };
    let mut pairs = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Node::Array(mut kv) if kv.len() == 2 => {
                let v = kv.pop().unwrap_or(Node::Null);
                let k = kv.pop().unwrap_or(Node::Null);
                pairs.push((k, v));
            }
            _ => return Err(AnnotError::BadField("MapData")),
        }
    }
    Ok(Node::Map(pairs))
}

fn truthy(flag: Option<&Node>) -> bool {
    match flag {
        Some(Node::Bool(b)) => *b,
        Some(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        None => false,
    }
}

fn dims_from(node: &Node, field: &'static str) -> Result<Vec<usize>, AnnotError> {
    let to_usize = |v: f64| -> Result<usize, AnnotError> {
        usize::try_from(v as i64).map_err(|_| AnnotError::BadField(field))
    };
    match node {
        Node::Tensor(t) => t.to_f64_vec().into_iter().map(to_usize).collect(),
        Node::Array(items) => items
            .iter()
            .map(|n| n.as_f64().ok_or(AnnotError::BadField(field)).and_then(to_usize))
            .collect(),
        scalar => {
            let v = scalar.as_f64().ok_or(AnnotError::BadField(field))?;
            Ok(vec![to_usize(v)?])
        }
    }
}
