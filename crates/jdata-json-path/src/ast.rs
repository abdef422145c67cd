//! Path AST: an ordered list of segments.

use std::fmt;

/// One step of a compiled path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// `$`
    Root,
    /// `.name` / `['name']`
    Key(String),
    /// `[n]`, negative counts from the end
    Index(isize),
    /// `[lo:hi]`, open bounds default to the full range
    Slice(Option<isize>, Option<isize>),
    /// `[*]`
    Wildcard,
    /// `..name` — match the inner segment at any depth
    DeepScan(Box<Segment>),
}

/// A compiled path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    pub segments: Vec<Segment>,
}

impl JsonPath {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }
}

fn ident_shaped(name: &str) -> bool {
    !name.is_empty()
        && name.chars().enumerate().all(|(i, c)| {
            if i == 0 {
                c.is_ascii_alphabetic() || c == '_'
            } else {
                c.is_ascii_alphanumeric() || c == '_'
            }
        })
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Root => write!(f, "$"),
            Segment::Key(name) => {
                if ident_shaped(name) {
                    write!(f, ".{name}")
                } else {
                    write!(f, "['{name}']")
                }
            }
            Segment::Index(i) => write!(f, "[{i}]"),
            Segment::Slice(lo, hi) => {
                match lo {
                    Some(l) => write!(f, "[{l}:")?,
                    None => write!(f, "[:")?,
                }
                match hi {
                    Some(h) => write!(f, "{h}]"),
                    None => write!(f, "]"),
                }
            }
            Segment::Wildcard => write!(f, "[*]"),
            Segment::DeepScan(inner) => match inner.as_ref() {
                Segment::Key(name) => write!(f, "..{name}"),
                other => write!(f, "..{other}"),
            },
        }
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for seg in &self.segments {
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}
