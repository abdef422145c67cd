//! Named byte-transform collaborators: the compression codec registry and
//! base64 helpers.
//!
//! The registry is the seam the reconstructor resolves `ArrayZipType` names
//! through. `zlib`, `gzip` and `lzma` ship built in; anything else (lzip,
//! zstd, …) can be registered by the embedder under its envelope name.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use xz2::read::XzDecoder;
use xz2::stream::{LzmaOptions, Stream};
use xz2::write::XzEncoder;

use crate::error::CodecError;

/// A named, bidirectional byte transform.
pub trait ByteCodec: Send + Sync {
    fn encode(&self, input: &[u8]) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>, CodecError>;
}

fn io_err(e: std::io::Error) -> CodecError {
    CodecError::Io(e.to_string())
}

struct Zlib;

impl ByteCodec for Zlib {
    fn encode(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(input).map_err(io_err)?;
        enc.finish().map_err(io_err)
    }

    fn decode(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        ZlibDecoder::new(input)
            .read_to_end(&mut out)
            .map_err(io_err)?;
        Ok(out)
    }
}

struct Gzip;

impl ByteCodec for Gzip {
    fn encode(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(input).map_err(io_err)?;
        enc.finish().map_err(io_err)
    }

    fn decode(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        GzDecoder::new(input).read_to_end(&mut out).map_err(io_err)?;
        Ok(out)
    }
}

/// LZMA-alone container, the `lzma` envelope name.
struct Lzma;

impl ByteCodec for Lzma {
    fn encode(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let opts = LzmaOptions::new_preset(6).map_err(|e| CodecError::Io(e.to_string()))?;
        let stream =
            Stream::new_lzma_encoder(&opts).map_err(|e| CodecError::Io(e.to_string()))?;
        let mut enc = XzEncoder::new_stream(Vec::new(), stream);
        enc.write_all(input).map_err(io_err)?;
        enc.finish().map_err(io_err)
    }

    fn decode(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let stream =
            Stream::new_lzma_decoder(u64::MAX).map_err(|e| CodecError::Io(e.to_string()))?;
        let mut out = Vec::new();
        XzDecoder::new_stream(input, stream)
            .read_to_end(&mut out)
            .map_err(io_err)?;
        Ok(out)
    }
}

/// Name → codec lookup table.
pub struct CodecRegistry {
    codecs: Vec<(String, Box<dyn ByteCodec>)>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl CodecRegistry {
    /// A registry with no codecs at all.
    pub fn empty() -> Self {
        Self { codecs: Vec::new() }
    }

    /// The built-in set: zlib, gzip, lzma.
    pub fn with_builtins() -> Self {
        let mut reg = Self::empty();
        reg.register("zlib", Box::new(Zlib));
        reg.register("gzip", Box::new(Gzip));
        reg.register("lzma", Box::new(Lzma));
        reg
    }

    /// Registers (or replaces) a codec under an envelope name.
    pub fn register(&mut self, name: &str, codec: Box<dyn ByteCodec>) {
        if let Some(slot) = self.codecs.iter_mut().find(|(n, _)| n == name) {
            slot.1 = codec;
        } else {
            self.codecs.push((name.to_owned(), codec));
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn ByteCodec> {
        self.codecs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.as_ref())
    }
}

/// Encodes bytes to a printable base64 string.
pub fn to_base64(input: &[u8]) -> String {
    BASE64.encode(input)
}

/// Decodes a printable base64 string back to bytes.
pub fn from_base64(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    // Trailing whitespace is common in text carriers.
    let trimmed: Vec<u8> = input
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    BASE64.decode(&trimmed).map_err(|_| CodecError::InvalidBase64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_roundtrips() {
        let reg = CodecRegistry::with_builtins();
        let payload = b"the quick brown fox jumps over the lazy dog".repeat(8);
        for name in ["zlib", "gzip", "lzma"] {
            let codec = reg.get(name).unwrap();
            let packed = codec.encode(&payload).unwrap();
            assert_ne!(packed, payload, "{name} produced identity output");
            assert_eq!(codec.decode(&packed).unwrap(), payload, "{name}");
        }
    }

    #[test]
    fn test_unregistered_name_resolves_to_none() {
        let reg = CodecRegistry::with_builtins();
        assert!(reg.get("lzip").is_none());
        assert!(reg.get("zstd").is_none());
    }

    #[test]
    fn test_custom_registration_overrides() {
        struct Identity;
        impl ByteCodec for Identity {
            fn encode(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
                Ok(input.to_vec())
            }
            fn decode(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
                Ok(input.to_vec())
            }
        }
        let mut reg = CodecRegistry::empty();
        reg.register("lzip", Box::new(Identity));
        assert_eq!(reg.get("lzip").unwrap().decode(b"ab").unwrap(), b"ab");
    }

    #[test]
    fn test_base64_roundtrip_and_whitespace() {
        let data = [0u8, 1, 2, 250, 251, 252];
        let text = to_base64(&data);
        assert_eq!(from_base64(text.as_bytes()).unwrap(), data);
        let padded = format!("{}\n", text);
        assert_eq!(from_base64(padded.as_bytes()).unwrap(), data);
        assert!(from_base64(b"!!not base64!!").is_err());
    }

    #[test]
    fn test_corrupt_stream_is_an_error() {
        let reg = CodecRegistry::with_builtins();
        assert!(reg.get("zlib").unwrap().decode(b"\x00\x01\x02").is_err());
    }
}
