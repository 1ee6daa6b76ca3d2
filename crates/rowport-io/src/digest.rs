//! Pass-through writer that hashes everything written through it.
//!
//! Used by the CLI to report a content digest of the produced file, so two
//! runs over the same input can be compared without diffing the outputs.

use std::io::{self, Write};

/// blake3 digest of a byte stream plus its length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub hex: String,
    pub bytes: u64,
}

pub struct DigestWriter<W: Write> {
    inner: W,
    hasher: blake3::Hasher,
    bytes: u64,
}

impl<W: Write> DigestWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: blake3::Hasher::new(),
            bytes: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    pub fn finish(self) -> (W, Digest) {
        let digest = Digest {
            hex: self.hasher.finalize().to_hex().to_string(),
            bytes: self.bytes,
        };
        (self.inner, digest)
    }
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
