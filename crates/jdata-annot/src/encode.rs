//! Envelope lowering: the inverse of reconstruction.
//!
//! Native sparse/complex/map values have no direct wire form; this pass
//! rewrites them into plain-object JData envelopes that the binary encoder
//! can serialize and [`crate::reconstruct`] can rebuild. Dense tensors stay
//! as-is (typed blocks are wire-native).

use jdata_pack::{ComplexArray, Dtype, NdArray, Node, SparseArray};

/// Rewrites sparse/complex/map nodes into array envelopes, recursing through
/// objects and arrays.
pub fn annotate(node: Node) -> Node {
    match node {
        Node::Object(pairs) => Node::Object(
            pairs
                .into_iter()
                .map(|(k, v)| (k, annotate(v)))
                .collect(),
        ),
        Node::Array(items) => Node::Array(items.into_iter().map(annotate).collect()),
        Node::Sparse(s) => sparse_envelope(s),
        Node::Complex(c) => complex_envelope(c),
        Node::Map(pairs) => map_envelope(pairs),
        other => other,
    }
}

fn size_field(dims: &[usize]) -> Node {
    Node::Array(dims.iter().map(|&d| Node::I64(d as i64)).collect())
}

fn sparse_envelope(s: SparseArray) -> Node {
    let nnz = s.nnz();
    // Field columns in wire order; indices go back to 1-based.
    let mut fields: Vec<Vec<f64>> = Vec::new();
    if s.shape[0] == 1 {
        fields.push(s.cols.iter().map(|&c| (c + 1) as f64).collect());
    } else if s.shape[1] == 1 {
        fields.push(s.rows.iter().map(|&r| (r + 1) as f64).collect());
    } else {
        fields.push(s.rows.iter().map(|&r| (r + 1) as f64).collect());
        fields.push(s.cols.iter().map(|&c| (c + 1) as f64).collect());
    }
    fields.push(s.values.clone());
    if let Some(im) = &s.imag {
        fields.push(im.clone());
    }
    let k = fields.len();
    let flat: Vec<f64> = fields.into_iter().flatten().collect();
    let data = NdArray::from_f64s(Dtype::Float64, vec![nnz, k], &flat);

    let mut pairs = vec![
        ("_ArrayType_".to_string(), Node::Str(s.dtype.name().into())),
        ("_ArraySize_".to_string(), size_field(&s.shape)),
        ("_ArrayIsSparse_".to_string(), Node::U8(1)),
    ];
    if s.imag.is_some() {
        pairs.push(("_ArrayIsComplex_".to_string(), Node::U8(1)));
    }
    pairs.push(("_ArrayData_".to_string(), Node::Tensor(data)));
    Node::Object(pairs)
}

fn complex_envelope(c: ComplexArray) -> Node {
    let n = c.re.len();
    // Components are stored column-major against the logical dims, halves
    // concatenated, which is what the numeric-flag read path expects.
    let mut flat = row_major_to_col(&c.re, &c.shape);
    flat.extend(row_major_to_col(&c.im, &c.shape));
    let data = NdArray::from_f64s(c.dtype, vec![2, n], &flat);
    Node::Object(vec![
        ("_ArrayType_".to_string(), Node::Str(c.dtype.name().into())),
        ("_ArraySize_".to_string(), size_field(&c.shape)),
        ("_ArrayIsComplex_".to_string(), Node::U8(1)),
        ("_ArrayData_".to_string(), Node::Tensor(data)),
    ])
}

fn map_envelope(pairs: Vec<(Node, Node)>) -> Node {
    let items: Vec<Node> = pairs
        .into_iter()
        .map(|(k, v)| Node::Array(vec![annotate(k), annotate(v)]))
        .collect();
    Node::Object(vec![("_MapData_".to_string(), Node::Array(items))])
}

/// Reorders a row-major component vector into column-major wire order.
fn row_major_to_col(vals: &[f64], dims: &[usize]) -> Vec<f64> {
    if dims.len() < 2 || vals.len() < 2 {
        return vals.to_vec();
    }
    let mut rstride = vec![1usize; dims.len()];
    for d in (0..dims.len() - 1).rev() {
        rstride[d] = rstride[d + 1] * dims[d + 1];
    }
    let mut out = Vec::with_capacity(vals.len());
    let mut idx = vec![0usize; dims.len()];
    for _ in 0..vals.len() {
        let mut pos = 0usize;
        for d in 0..dims.len() {
            pos += idx[d] * rstride[d];
        }
        out.push(vals[pos]);
        for (i, dim) in idx.iter_mut().zip(dims.iter()) {
            *i += 1;
            if *i < *dim {
                break;
            }
            *i = 0;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_to_col_is_inverse_of_col_to_row() {
        let dims = [2usize, 3];
        let row = [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0];
        let col = row_major_to_col(&row, &dims);
        assert_eq!(col, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_dense_tensor_passes_through() {
        let t = Node::Tensor(NdArray::from_f64s(Dtype::Int8, vec![2], &[1.0, 2.0]));
        assert_eq!(annotate(t.clone()), t);
    }
}
