//! Recursive-descent BJData/UBJSON decoder.
//!
//! Wire format markers:
//! - `Z` = null, `T` = true, `F` = false
//! - `i`/`U`/`I`/`l`/`L` = int8/uint8/int16/int32/int64
//! - `d`/`D` = float32/float64
//! - `S` = string (integer length + UTF-8), `C` = char, `H` = high-precision
//!   number carried as a string
//! - `[`/`{` open containers; an optional `$<type>` and `#<count-or-dims>`
//!   header switches to a fixed-width block decode with no close delimiter
//!
//! Multi-byte payloads default to big-endian and can be flipped via
//! [`DecodeOptions::endian`]. The decoder is a pure function over the byte
//! buffer; every scalar/string leaf's payload span is recorded in an
//! [`ExtentMap`] when requested.

use crate::error::DecodeError;
use crate::extent::{ByteExtent, ExtentMap};
use crate::name::encode_name;
use crate::node::{Dtype, NdArray, Node};
use crate::scan::match_bracket;

/// Byte order of multi-byte wire payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Big,
    Little,
}

impl Endian {
    /// Whether wire order differs from host order.
    #[inline]
    pub fn needs_swap(self) -> bool {
        match self {
            Endian::Big => cfg!(target_endian = "little"),
            Endian::Little => cfg!(target_endian = "big"),
        }
    }
}

/// Reader configuration, passed by argument; the decoder holds no shared
/// mutable state.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    pub endian: Endian,
    /// Legacy mode: object field names carry an explicit `S` marker.
    pub legacy_names: bool,
    pub max_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            endian: Endian::Big,
            legacy_names: false,
            max_depth: 512,
        }
    }
}

/// Internal cursor over the input buffer.
struct Cur<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cur<'a> {
    #[inline]
    fn check(&self, n: usize) -> Result<(), DecodeError> {
        match self.pos.checked_add(n) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(DecodeError::Truncated { pos: self.pos }),
        }
    }

    #[inline]
    fn u8(&mut self) -> Result<u8, DecodeError> {
        self.check(1)?;
        let v = self.data[self.pos];
        self.pos += 1;
        Ok(v)
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    #[inline]
    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        self.check(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    fn buf(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        self.check(n)?;
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }
}

/// Explicit reader context threaded down the call chain: cursor, extent sink
/// and container depth.
struct Ctx<'a> {
    cur: Cur<'a>,
    extents: ExtentMap,
    record: bool,
    depth: usize,
}

impl Ctx<'_> {
    fn note(&mut self, path: &str, offset: usize, length: usize) {
        if self.record {
            self.extents
                .insert(path.to_owned(), ByteExtent::new(offset as u64, length as u32));
        }
    }
}

/// Stateless BJData/UBJSON decoder.
#[derive(Default)]
pub struct BjdataDecoder {
    pub opts: DecodeOptions,
}

impl BjdataDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(opts: DecodeOptions) -> Self {
        Self { opts }
    }

    /// Parses one value from the front of `input`.
    pub fn decode(&self, input: &[u8]) -> Result<Node, DecodeError> {
        self.run(input, false).map(|(node, _)| node)
    }

    /// Parses one value and records a byte extent for every leaf.
    pub fn decode_with_extents(&self, input: &[u8]) -> Result<(Node, ExtentMap), DecodeError> {
        self.run(input, true)
    }

    fn run(&self, input: &[u8], record: bool) -> Result<(Node, ExtentMap), DecodeError> {
        let mut ctx = Ctx {
            cur: Cur { data: input, pos: 0 },
            extents: ExtentMap::new(),
            record,
            depth: 0,
        };
        let mut path = String::from("$");
        let node = self.read_value(&mut ctx, &mut path)?;
        Ok((node, ctx.extents))
    }

    fn read_value(&self, ctx: &mut Ctx, path: &mut String) -> Result<Node, DecodeError> {
        let mpos = ctx.cur.pos;
        let marker = ctx.cur.u8()?;
        self.read_marker_value(ctx, path, marker, Some(mpos))
    }

    /// Decodes the value for an already-consumed marker. `marker_pos` is
    /// `None` when the marker came from a container's `$` header, in which
    /// case no-payload values have no bytes of their own to record.
    fn read_marker_value(
        &self,
        ctx: &mut Ctx,
        path: &mut String,
        marker: u8,
        marker_pos: Option<usize>,
    ) -> Result<Node, DecodeError> {
        match marker {
            b'Z' | b'T' | b'F' => {
                if let Some(p) = marker_pos {
                    ctx.note(path, p, 1);
                }
                Ok(match marker {
                    b'Z' => Node::Null,
                    b'T' => Node::Bool(true),
                    _ => Node::Bool(false),
                })
            }
            b'i' => {
                let p = ctx.cur.pos;
                let v = ctx.cur.take::<1>()?;
                ctx.note(path, p, 1);
                Ok(Node::I8(v[0] as i8))
            }
            b'U' => {
                let p = ctx.cur.pos;
                let v = ctx.cur.take::<1>()?;
                ctx.note(path, p, 1);
                Ok(Node::U8(v[0]))
            }
            b'I' => {
                let p = ctx.cur.pos;
                let b = ctx.cur.take::<2>()?;
                ctx.note(path, p, 2);
                Ok(Node::I16(self.order16(b)))
            }
            b'l' => {
                let p = ctx.cur.pos;
                let b = ctx.cur.take::<4>()?;
                ctx.note(path, p, 4);
                Ok(Node::I32(self.order32(b)))
            }
            b'L' => {
                let p = ctx.cur.pos;
                let b = ctx.cur.take::<8>()?;
                ctx.note(path, p, 8);
                Ok(Node::I64(self.order64(b)))
            }
            b'd' => {
                let p = ctx.cur.pos;
                let b = ctx.cur.take::<4>()?;
                ctx.note(path, p, 4);
                Ok(Node::F32(f32::from_bits(self.order32(b) as u32)))
            }
            b'D' => {
                let p = ctx.cur.pos;
                let b = ctx.cur.take::<8>()?;
                ctx.note(path, p, 8);
                Ok(Node::F64(f64::from_bits(self.order64(b) as u64)))
            }
            b'S' | b'H' => {
                let len = self.read_length(ctx)?;
                let p = ctx.cur.pos;
                let bytes = ctx.cur.buf(len)?;
                let s = std::str::from_utf8(bytes)
                    .map_err(|_| DecodeError::InvalidUtf8 { pos: p })?
                    .to_owned();
                ctx.note(path, p, len);
                Ok(if marker == b'S' {
                    Node::Str(s)
                } else {
                    Node::HiPrec(s)
                })
            }
            b'C' => {
                let p = ctx.cur.pos;
                let b = ctx.cur.u8()?;
                ctx.note(path, p, 1);
                Ok(Node::Char(b as char))
            }
            b'[' => self.read_array(ctx, path, marker_pos.unwrap_or(ctx.cur.pos)),
            b'{' => self.read_object(ctx, path, marker_pos.unwrap_or(ctx.cur.pos)),
            other => Err(DecodeError::UnsupportedType {
                marker: other,
                pos: marker_pos.unwrap_or(ctx.cur.pos.saturating_sub(1)),
            }),
        }
    }

    /// Reads an integer-marked scalar used as a length or count.
    fn read_length(&self, ctx: &mut Ctx) -> Result<usize, DecodeError> {
        let pos = ctx.cur.pos;
        let v = self.read_int_scalar(ctx)?;
        usize::try_from(v).map_err(|_| DecodeError::Syntax { pos })
    }

    fn read_int_scalar(&self, ctx: &mut Ctx) -> Result<i64, DecodeError> {
        let pos = ctx.cur.pos;
        let marker = ctx.cur.u8()?;
        match marker {
            b'i' => Ok(ctx.cur.take::<1>()?[0] as i8 as i64),
            b'U' => Ok(ctx.cur.take::<1>()?[0] as i64),
            b'I' => Ok(self.order16(ctx.cur.take::<2>()?) as i64),
            b'l' => Ok(self.order32(ctx.cur.take::<4>()?) as i64),
            b'L' => Ok(self.order64(ctx.cur.take::<8>()?)),
            _ => Err(DecodeError::Syntax { pos }),
        }
    }

    fn read_array(&self, ctx: &mut Ctx, path: &mut String, open: usize) -> Result<Node, DecodeError> {
        ctx.depth += 1;
        if ctx.depth > self.opts.max_depth {
            return Err(DecodeError::Syntax { pos: open });
        }
        let out = self.read_array_inner(ctx, path, open);
        ctx.depth -= 1;
        out
    }

    fn read_array_inner(
        &self,
        ctx: &mut Ctx,
        path: &mut String,
        open: usize,
    ) -> Result<Node, DecodeError> {
        let mut elem_type: Option<u8> = None;
        if ctx.cur.peek() == Some(b'$') {
            ctx.cur.pos += 1;
            elem_type = Some(ctx.cur.u8()?);
        }
        let mut count: Option<usize> = None;
        let mut shape: Option<Vec<usize>> = None;
        if ctx.cur.peek() == Some(b'#') {
            ctx.cur.pos += 1;
            if ctx.cur.peek() == Some(b'[') {
                ctx.cur.pos += 1;
                shape = Some(self.read_dims(ctx)?);
            } else {
                count = Some(self.read_length(ctx)?);
            }
        }
        // Second chance for the type header after the count.
        if elem_type.is_none() && ctx.cur.peek() == Some(b'$') {
            ctx.cur.pos += 1;
            elem_type = Some(ctx.cur.u8()?);
        }

        if let Some(tm) = elem_type {
            let n = match (&count, &shape) {
                (Some(n), _) => *n,
                (None, Some(dims)) => dims
                    .iter()
                    .try_fold(1usize, |acc, &d| acc.checked_mul(d))
                    .ok_or(DecodeError::Syntax { pos: open })?,
                // A type header without a count is malformed.
                (None, None) => return Err(DecodeError::Syntax { pos: open }),
            };
            return self.read_block(ctx, path, open, tm, n, shape);
        }

        if let Some(n) = count {
            // Count without a type: exactly n general values, no close marker.
            let mut items = Vec::with_capacity(n.min(4096));
            for i in 0..n {
                if matches!(ctx.cur.peek(), Some(b']') | Some(b'}')) {
                    return Err(DecodeError::LengthMismatch {
                        declared: n,
                        actual: i,
                    });
                }
                let keep = path.len();
                push_index(path, i);
                let item = self.read_value(ctx, path)?;
                path.truncate(keep);
                items.push(item);
            }
            return Ok(Node::Array(items));
        }

        // No headers: pre-scan for the close delimiter to bound nesting and
        // size the allocation. The span counts this container, which ctx.depth
        // already includes.
        let hint = match_bracket(ctx.cur.data, open);
        if let Some(span) = hint {
            if ctx.depth - 1 + span.max_depth > self.opts.max_depth {
                return Err(DecodeError::Syntax { pos: open });
            }
        }
        let cap = hint
            .map(|s| ((s.close - open) / 4).min(4096))
            .unwrap_or(0);
        let mut items = Vec::with_capacity(cap);
        let mut i = 0usize;
        loop {
            let b = ctx.cur.peek().ok_or(DecodeError::Truncated { pos: ctx.cur.pos })?;
            if b == b']' {
                ctx.cur.pos += 1;
                break;
            }
            let keep = path.len();
            push_index(path, i);
            let item = self.read_value(ctx, path)?;
            path.truncate(keep);
            items.push(item);
            i += 1;
        }
        Ok(Node::Array(items))
    }

    /// Fixed-width block decode: `count × elementSize` raw bytes, swapped to
    /// host order when the wire endianness differs.
    fn read_block(
        &self,
        ctx: &mut Ctx,
        path: &mut String,
        open: usize,
        type_marker: u8,
        count: usize,
        shape: Option<Vec<usize>>,
    ) -> Result<Node, DecodeError> {
        if type_marker == b'U' && shape.is_none() {
            // `[$U#<count>` is the raw byte-blob shorthand.
            let p = ctx.cur.pos;
            let bytes = ctx.cur.buf(count)?.to_vec();
            ctx.note(path, p, count);
            return Ok(Node::Bytes(bytes));
        }
        let dtype = Dtype::from_marker(type_marker).ok_or(DecodeError::UnsupportedType {
            marker: type_marker,
            pos: open,
        })?;
        let byte_len = count
            .checked_mul(dtype.size())
            .ok_or(DecodeError::Syntax { pos: open })?;
        let p = ctx.cur.pos;
        let mut data = ctx.cur.buf(byte_len)?.to_vec();
        ctx.note(path, p, byte_len);
        if self.opts.endian.needs_swap() {
            swap_elements(&mut data, dtype.size());
        }
        let shape = shape.unwrap_or_else(|| vec![count]);
        Ok(Node::Tensor(NdArray::row_major(dtype, shape, data)))
    }

    /// Parses a dimension vector; the opening `[` is already consumed.
    fn read_dims(&self, ctx: &mut Ctx) -> Result<Vec<usize>, DecodeError> {
        let open = ctx.cur.pos;
        let mut elem_type: Option<u8> = None;
        if ctx.cur.peek() == Some(b'$') {
            ctx.cur.pos += 1;
            elem_type = Some(ctx.cur.u8()?);
        }
        let mut count: Option<usize> = None;
        if ctx.cur.peek() == Some(b'#') {
            ctx.cur.pos += 1;
            count = Some(self.read_length(ctx)?);
        }
        let mut dims = Vec::new();
        match (elem_type, count) {
            (Some(tm), Some(n)) => {
                let dtype = Dtype::from_marker(tm).ok_or(DecodeError::UnsupportedType {
                    marker: tm,
                    pos: open,
                })?;
                if matches!(dtype, Dtype::Float32 | Dtype::Float64) {
                    return Err(DecodeError::Syntax { pos: open });
                }
                for _ in 0..n {
                    let mut raw = [0u8; 8];
                    let s = dtype.size();
                    raw[..s].copy_from_slice(ctx.cur.buf(s)?);
                    let v = match dtype {
                        Dtype::Int8 => raw[0] as i8 as i64,
                        Dtype::Uint8 => raw[0] as i64,
                        Dtype::Int16 => self.order16([raw[0], raw[1]]) as i64,
                        Dtype::Int32 => self.order32([raw[0], raw[1], raw[2], raw[3]]) as i64,
                        _ => self.order64(raw),
                    };
                    let d = usize::try_from(v).map_err(|_| DecodeError::Syntax { pos: open })?;
                    dims.push(d);
                }
            }
            (None, Some(n)) => {
                for _ in 0..n {
                    let v = self.read_int_scalar(ctx)?;
                    dims.push(usize::try_from(v).map_err(|_| DecodeError::Syntax { pos: open })?);
                }
            }
            (None, None) => loop {
                let b = ctx.cur.peek().ok_or(DecodeError::Truncated { pos: ctx.cur.pos })?;
                if b == b']' {
                    ctx.cur.pos += 1;
                    break;
                }
                let v = self.read_int_scalar(ctx)?;
                dims.push(usize::try_from(v).map_err(|_| DecodeError::Syntax { pos: open })?);
            },
            (Some(_), None) => return Err(DecodeError::Syntax { pos: open }),
        }
        Ok(dims)
    }

    fn read_object(
        &self,
        ctx: &mut Ctx,
        path: &mut String,
        open: usize,
    ) -> Result<Node, DecodeError> {
        ctx.depth += 1;
        if ctx.depth > self.opts.max_depth {
            return Err(DecodeError::Syntax { pos: open });
        }
        let out = self.read_object_inner(ctx, path, open);
        ctx.depth -= 1;
        out
    }

    fn read_object_inner(
        &self,
        ctx: &mut Ctx,
        path: &mut String,
        open: usize,
    ) -> Result<Node, DecodeError> {
        let mut val_type: Option<u8> = None;
        if ctx.cur.peek() == Some(b'$') {
            ctx.cur.pos += 1;
            val_type = Some(ctx.cur.u8()?);
        }
        let mut count: Option<usize> = None;
        if ctx.cur.peek() == Some(b'#') {
            ctx.cur.pos += 1;
            count = Some(self.read_length(ctx)?);
        }
        if val_type.is_some() && count.is_none() {
            return Err(DecodeError::Syntax { pos: open });
        }

        let mut pairs: Vec<(String, Node)> = Vec::new();
        if let Some(n) = count {
            for i in 0..n {
                if val_type.is_none() && matches!(ctx.cur.peek(), Some(b'}') | Some(b']')) {
                    return Err(DecodeError::LengthMismatch {
                        declared: n,
                        actual: i,
                    });
                }
                self.read_pair(ctx, path, val_type, &mut pairs)?;
            }
        } else {
            let hint = match_bracket(ctx.cur.data, open);
            if let Some(span) = hint {
                if ctx.depth - 1 + span.max_depth > self.opts.max_depth {
                    return Err(DecodeError::Syntax { pos: open });
                }
            }
            loop {
                let b = ctx.cur.peek().ok_or(DecodeError::Truncated { pos: ctx.cur.pos })?;
                if b == b'}' {
                    ctx.cur.pos += 1;
                    break;
                }
                self.read_pair(ctx, path, None, &mut pairs)?;
            }
        }
        Ok(Node::Object(pairs))
    }

    fn read_pair(
        &self,
        ctx: &mut Ctx,
        path: &mut String,
        val_type: Option<u8>,
        pairs: &mut Vec<(String, Node)>,
    ) -> Result<(), DecodeError> {
        let key = self.read_key(ctx)?;
        let keep = path.len();
        push_key(path, &key);
        let val = match val_type {
            Some(t) => self.read_marker_value(ctx, path, t, None)?,
            None => self.read_value(ctx, path)?,
        };
        path.truncate(keep);
        pairs.push((key, val));
        Ok(())
    }

    /// Reads one field name and passes it through sanitization.
    fn read_key(&self, ctx: &mut Ctx) -> Result<String, DecodeError> {
        if self.opts.legacy_names {
            let pos = ctx.cur.pos;
            let m = ctx.cur.u8()?;
            if m != b'S' {
                return Err(DecodeError::Syntax { pos });
            }
        }
        let len = self.read_length(ctx)?;
        let pos = ctx.cur.pos;
        let bytes = ctx.cur.buf(len)?;
        let raw = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 { pos })?;
        Ok(encode_name(raw))
    }

    #[inline]
    fn order16(&self, b: [u8; 2]) -> i16 {
        match self.opts.endian {
            Endian::Big => i16::from_be_bytes(b),
            Endian::Little => i16::from_le_bytes(b),
        }
    }

    #[inline]
    fn order32(&self, b: [u8; 4]) -> i32 {
        match self.opts.endian {
            Endian::Big => i32::from_be_bytes(b),
            Endian::Little => i32::from_le_bytes(b),
        }
    }

    #[inline]
    fn order64(&self, b: [u8; 8]) -> i64 {
        match self.opts.endian {
            Endian::Big => i64::from_be_bytes(b),
            Endian::Little => i64::from_le_bytes(b),
        }
    }
}

/// In-place byte swap of each fixed-width element.
fn swap_elements(data: &mut [u8], size: usize) {
    if size > 1 {
        for chunk in data.chunks_exact_mut(size) {
            chunk.reverse();
        }
    }
}

/// Appends `.key` (identifier-shaped) or `['key']` to a path prefix.
pub(crate) fn push_key(path: &mut String, key: &str) {
    let ident = key
        .chars()
        .enumerate()
        .all(|(i, c)| if i == 0 { c.is_ascii_alphabetic() || c == '_' } else { c.is_ascii_alphanumeric() || c == '_' })
        && !key.is_empty();
    if ident {
        path.push('.');
        path.push_str(key);
    } else {
        path.push_str("['");
        path.push_str(key);
        path.push_str("']");
    }
}

pub(crate) fn push_index(path: &mut String, i: usize) {
    path.push('[');
    path.push_str(&i.to_string());
    path.push(']');
}
