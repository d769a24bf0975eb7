//! Byte stream abstractions.

use std::io::{Error, ErrorKind, Read, Result, Seek, SeekFrom};

/// Uniform view over a possibly-seekable byte stream.
///
/// Position 0 is the stream position at construction time; all absolute
/// offsets used by this crate are relative to it.
pub trait SourceStream: Read {
    /// Returns whether the stream supports seeking backwards.
    fn is_seekable(&self) -> bool;

    /// Returns the current position from the start of the stream.
    fn stream_position(&mut self) -> Result<u64>;

    /// Moves the stream to an absolute position.
    ///
    /// Fails with [ErrorKind::Unsupported] when the stream cannot seek.
    fn seek_to(&mut self, position: u64) -> Result<u64>;
}

/// Seekable stream backed by any [Read] + [Seek] value.
pub struct SeekStream<R: Read + Seek> {
    stream: R,
}

impl<R: Read + Seek> SeekStream<R> {
    /// Creates a stream with the given value.
    pub fn new(stream: R) -> Self {
        Self { stream }
    }

    /// Returns the wrapped value.
    pub fn into_inner(self) -> R {
        self.stream
    }
}

impl<R: Read + Seek> Read for SeekStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stream.read(buf)
    }
}

impl<R: Read + Seek> SourceStream for SeekStream<R> {
    fn is_seekable(&self) -> bool {
        true
    }

    fn stream_position(&mut self) -> Result<u64> {
        self.stream.stream_position()
    }

    fn seek_to(&mut self, position: u64) -> Result<u64> {
        self.stream.seek(SeekFrom::Start(position))
    }
}

/// Forward-only stream that refuses to seek.
///
/// The position is the count of bytes read so far. Skipping over data is
/// done by the caller with bounded forward reads.
pub struct ForwardStream<R: Read> {
    stream: R,
    position: u64,
}

impl<R: Read> ForwardStream<R> {
    /// Creates a stream with the given value.
    pub fn new(stream: R) -> Self {
        Self {
            stream,
            position: 0,
        }
    }

    /// Returns the wrapped value.
    pub fn into_inner(self) -> R {
        self.stream
    }
}

impl<R: Read> Read for ForwardStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let amount = self.stream.read(buf)?;
        self.position += amount as u64;
        Ok(amount)
    }
}

impl<R: Read> SourceStream for ForwardStream<R> {
    fn is_seekable(&self) -> bool {
        false
    }

    fn stream_position(&mut self) -> Result<u64> {
        Ok(self.position)
    }

    fn seek_to(&mut self, _position: u64) -> Result<u64> {
        Err(Error::new(
            ErrorKind::Unsupported,
            "stream does not support seeking",
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use super::{ForwardStream, SeekStream, SourceStream};

    #[test]
    fn test_seek_stream() {
        let mut stream = SeekStream::new(Cursor::new(b"0123456789".to_vec()));

        assert!(stream.is_seekable());
        assert_eq!(stream.stream_position().unwrap(), 0);

        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"0123");
        assert_eq!(stream.stream_position().unwrap(), 4);

        stream.seek_to(2).unwrap();
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"2345");
    }

    #[test]
    fn test_forward_stream() {
        let mut stream = ForwardStream::new(Cursor::new(b"0123456789".to_vec()));

        assert!(!stream.is_seekable());

        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(stream.stream_position().unwrap(), 4);

        assert!(stream.seek_to(0).is_err());
    }
}
