//! Path evaluation over decoded trees.
//!
//! Object lookups re-derive the sanitized key form before comparing, so
//! callers never pre-escape names. Map nodes are table-like: plain raw-key
//! access only, no index/slice/wildcard and no deep-scan descent. Tensors are
//! addressable along their leading axis.

use thiserror::Error;

use jdata_pack::{name::encode_name, Node};

use crate::ast::{JsonPath, Segment};

/// The soft, branchable "not found" signal. Non-fatal inside a deep scan.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path not found at segment '{0}'")]
    NotFound(String),
}

/// Evaluates a compiled path, returning every match in discovery order.
///
/// A direct segment that resolves nothing fails with
/// [`PathError::NotFound`]; once a deep scan has run, later segments drop
/// non-matching branches silently instead.
pub fn eval(path: &JsonPath, root: &Node) -> Result<Vec<Node>, PathError> {
    let mut frontier = vec![root.clone()];
    let mut scanned = false;
    for seg in &path.segments {
        match seg {
            Segment::Root => continue,
            Segment::DeepScan(inner) => {
                scanned = true;
                let mut matches = Vec::new();
                for node in &frontier {
                    collect_deep(node, inner, &mut matches);
                }
                frontier = matches;
            }
            direct => {
                let mut next = Vec::new();
                for node in &frontier {
                    apply(node, direct, &mut next);
                }
                if next.is_empty() && !scanned {
                    return Err(PathError::NotFound(seg.to_string()));
                }
                frontier = next;
            }
        }
    }
    Ok(frontier)
}

/// Evaluates and collapses: a single match comes back bare, several come back
/// wrapped in an array.
pub fn get(path: &JsonPath, root: &Node) -> Result<Node, PathError> {
    let mut matches = eval(path, root)?;
    if matches.len() == 1 {
        Ok(matches.remove(0))
    } else {
        Ok(Node::Array(matches))
    }
}

fn apply(node: &Node, seg: &Segment, out: &mut Vec<Node>) {
    match seg {
        Segment::Root => out.push(node.clone()),
        Segment::Key(name) => match node {
            Node::Object(pairs) => {
                let escaped = encode_name(name);
                if let Some((_, v)) = pairs
                    .iter()
                    .find(|(k, _)| *k == *name || *k == escaped)
                {
                    out.push(v.clone());
                }
            }
            Node::Map(pairs) => {
                // Raw key comparison only.
                if let Some((_, v)) = pairs
                    .iter()
                    .find(|(k, _)| matches!(k, Node::Str(s) if s == name))
                {
                    out.push(v.clone());
                }
            }
            _ => {}
        },
        Segment::Index(i) => match node {
            Node::Array(items) => {
                if let Some(idx) = resolve_index(*i, items.len()) {
                    out.push(items[idx].clone());
                }
            }
            Node::Tensor(t) => {
                let outer = t.shape.first().copied().unwrap_or(0);
                if let Some(idx) = resolve_index(*i, outer) {
                    if let Some(elem) = t.index(idx) {
                        out.push(elem);
                    }
                }
            }
            _ => {}
        },
        Segment::Slice(lo, hi) => match node {
            Node::Array(items) => {
                let (start, end) = resolve_slice(*lo, *hi, items.len());
                for item in &items[start..end] {
                    out.push(item.clone());
                }
            }
            Node::Tensor(t) => {
                let outer = t.shape.first().copied().unwrap_or(0);
                let (start, end) = resolve_slice(*lo, *hi, outer);
                for idx in start..end {
                    if let Some(elem) = t.index(idx) {
                        out.push(elem);
                    }
                }
            }
            _ => {}
        },
        Segment::Wildcard => match node {
            Node::Object(pairs) => out.extend(pairs.iter().map(|(_, v)| v.clone())),
            Node::Array(items) => out.extend(items.iter().cloned()),
            Node::Tensor(t) => {
                let outer = t.shape.first().copied().unwrap_or(0);
                for idx in 0..outer {
                    if let Some(elem) = t.index(idx) {
                        out.push(elem);
                    }
                }
            }
            _ => {}
        },
        Segment::DeepScan(inner) => collect_deep(node, inner, out),
    }
}

/// Deep scan: matches among this container's immediate children first, then
/// recursion into each child in order.
fn collect_deep(node: &Node, inner: &Segment, out: &mut Vec<Node>) {
    match node {
        Node::Object(pairs) => {
            apply(node, inner, out);
            for (_, v) in pairs {
                collect_deep(v, inner, out);
            }
        }
        Node::Array(items) => {
            apply(node, inner, out);
            for item in items {
                collect_deep(item, inner, out);
            }
        }
        // Map nodes are table-like: deep scan does not descend into them.
        _ => {}
    }
}

fn resolve_index(i: isize, len: usize) -> Option<usize> {
    let idx = if i < 0 { i + len as isize } else { i };
    usize::try_from(idx).ok().filter(|&u| u < len)
}

fn resolve_slice(lo: Option<isize>, hi: Option<isize>, len: usize) -> (usize, usize) {
    let clamp = |v: isize| -> usize {
        let v = if v < 0 { v + len as isize } else { v };
        v.clamp(0, len as isize) as usize
    };
    let start = lo.map(clamp).unwrap_or(0);
    let end = hi.map(clamp).unwrap_or(len);
    (start, end.max(start))
}
