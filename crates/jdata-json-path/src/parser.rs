//! Path expression parser.
//!
//! Grammar: `$` root, `.name`, `['name']`, `[n]`, `[lo:hi]`, `[*]`, and
//! `..name` / `..['name']` deep scans, freely concatenated.

use thiserror::Error;

use crate::ast::{JsonPath, Segment};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected root identifier '$' at start")]
    ExpectedRoot,
    #[error("unexpected character '{0}' at offset {1}")]
    UnexpectedChar(char, usize),
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("invalid number in selector")]
    InvalidNumber,
    #[error("unclosed quoted name")]
    UnclosedString,
    #[error("invalid selector")]
    InvalidSelector,
}

/// Hand-rolled character-cursor parser.
pub struct PathParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> PathParser<'a> {
    /// Compiles a path string into segments.
    pub fn parse(input: &'a str) -> Result<JsonPath, ParseError> {
        let mut parser = Self { input, pos: 0 };
        parser.parse_path()
    }

    fn parse_path(&mut self) -> Result<JsonPath, ParseError> {
        if self.peek() != Some('$') {
            return Err(ParseError::ExpectedRoot);
        }
        self.advance();
        let mut segments = vec![Segment::Root];

        while let Some(c) = self.peek() {
            match c {
                '.' => {
                    self.advance();
                    if self.peek() == Some('.') {
                        self.advance();
                        segments.push(Segment::DeepScan(Box::new(self.parse_scan_target()?)));
                    } else {
                        let name = self.parse_identifier()?;
                        segments.push(Segment::Key(name));
                    }
                }
                '[' => {
                    segments.push(self.parse_bracket()?);
                }
                other => return Err(ParseError::UnexpectedChar(other, self.pos)),
            }
        }
        Ok(JsonPath::new(segments))
    }

    /// The selector after `..`: a bare name, or one bracket selector.
    fn parse_scan_target(&mut self) -> Result<Segment, ParseError> {
        match self.peek() {
            Some('[') => {
                let seg = self.parse_bracket()?;
                match seg {
                    Segment::Key(_) | Segment::Index(_) => Ok(seg),
                    _ => Err(ParseError::InvalidSelector),
                }
            }
            Some(_) => Ok(Segment::Key(self.parse_identifier()?)),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn parse_bracket(&mut self) -> Result<Segment, ParseError> {
        self.advance(); // consume '['
        let seg = match self.peek() {
            Some('\'') | Some('"') => {
                let name = self.parse_quoted()?;
                Segment::Key(name)
            }
            Some('*') => {
                self.advance();
                Segment::Wildcard
            }
            Some(':') => {
                self.advance();
                let hi = self.parse_optional_int()?;
                Segment::Slice(None, hi)
            }
            Some(c) if c == '-' || c.is_ascii_digit() => {
                let first = self.parse_int()?;
                if self.peek() == Some(':') {
                    self.advance();
                    let hi = self.parse_optional_int()?;
                    Segment::Slice(Some(first), hi)
                } else {
                    Segment::Index(first)
                }
            }
            Some(other) => return Err(ParseError::UnexpectedChar(other, self.pos)),
            None => return Err(ParseError::UnexpectedEnd),
        };
        match self.peek() {
            Some(']') => {
                self.advance();
                Ok(seg)
            }
            Some(other) => Err(ParseError::UnexpectedChar(other, self.pos)),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn parse_identifier(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        if self.pos == start {
            match self.peek() {
                Some(c) => Err(ParseError::UnexpectedChar(c, self.pos)),
                None => Err(ParseError::UnexpectedEnd),
            }
        } else {
            Ok(self.input[start..self.pos].to_string())
        }
    }

    fn parse_quoted(&mut self) -> Result<String, ParseError> {
        let quote = self.peek().ok_or(ParseError::UnexpectedEnd)?;
        self.advance();
        let mut out = String::new();
        loop {
            match self.peek() {
                Some(c) if c == quote => {
                    self.advance();
                    return Ok(out);
                }
                Some('\\') => {
                    self.advance();
                    let escaped = self.peek().ok_or(ParseError::UnclosedString)?;
                    out.push(escaped);
                    self.advance();
                }
                Some(c) => {
                    out.push(c);
                    self.advance();
                }
                None => return Err(ParseError::UnclosedString),
            }
        }
    }

    fn parse_optional_int(&mut self) -> Result<Option<isize>, ParseError> {
        match self.peek() {
            Some(c) if c == '-' || c.is_ascii_digit() => Ok(Some(self.parse_int()?)),
            _ => Ok(None),
        }
    }

    fn parse_int(&mut self) -> Result<isize, ParseError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.advance();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        self.input[start..self.pos]
            .parse()
            .map_err(|_| ParseError::InvalidNumber)
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }
}
