//! Small streaming helpers shared by local storage and the wire protocol.

use sha2::{Digest, Sha256};
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

/// Nanoseconds since the Unix epoch, used as the monotonically-increasing
/// version stamp the master assigns on every finalized write/delete.
pub fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_nanos() as i64
}

/// A `Write` sink that tees every byte through a SHA-256 hasher while
/// forwarding to an inner writer, so a content hash can be computed in one
/// streaming pass instead of buffering the whole payload.
///
/// Grounded in `fsys.DumpBytesToTmpfile`'s use of `io.TeeReader` over the
/// incoming stream while it writes to the tmp file.
pub struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
    written: u64,
}

impl<W: Write> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            written: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Consumes self, returning the inner writer and the hex-encoded digest
    /// of everything written so far.
    pub fn finish(self) -> (W, String) {
        (self.inner, hex::encode(self.hasher.finalize()))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// A `Write` sink that only counts bytes written, discarding the content.
/// Paired with a `flate2::write::GzEncoder` this measures compressed size
/// without buffering it, mirroring `fsys.GetGzipFileSize`'s
/// io.Pipe-to-io.Discard trick.
#[derive(Debug, Default)]
pub struct CountingSink {
    written: u64,
}

impl CountingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.written
    }
}

impl Write for CountingSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_writer_matches_direct_hash() {
        let mut w = HashingWriter::new(Vec::new());
        w.write_all(b"hello world").unwrap();
        let (buf, hash) = w.finish();
        assert_eq!(buf, b"hello world");
        assert_eq!(hash, hex::encode(Sha256::digest(b"hello world")));
    }

    #[test]
    fn counting_sink_counts_without_storing() {
        let mut sink = CountingSink::new();
        sink.write_all(b"abcde").unwrap();
        sink.write_all(b"fg").unwrap();
        assert_eq!(sink.count(), 7);
    }
}
