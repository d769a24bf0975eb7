//! IO helpers.

use std::io::{BufRead, Error, ErrorKind, Read, Result, Write};

use crate::stream::SourceStream;

/// Buffered reader that counts consumed bytes.
///
/// The count represents bytes marked as consumed, not bytes sitting in the
/// internal buffer. Peeking does not affect the count.
pub struct TrackReader<R: Read> {
    stream: R,
    buf: Vec<u8>,
    buf_len_threshold: usize,
    read_count: u64,
}

impl<R: Read> TrackReader<R> {
    /// Creates a reader with the given stream.
    pub fn new(stream: R) -> Self {
        Self {
            stream,
            buf: Vec::new(),
            buf_len_threshold: 4096,
            read_count: 0,
        }
    }

    /// Returns a reference to the wrapped stream.
    pub fn get_ref(&self) -> &R {
        &self.stream
    }

    /// Returns a mutable reference to the wrapped stream.
    ///
    /// Reading or seeking the stream directly desynchronizes the internal
    /// buffer; callers must restore the stream position before resuming use
    /// of this reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.stream
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> R {
        self.stream
    }

    /// Returns the number of bytes consumed from this reader.
    pub fn read_count(&self) -> u64 {
        self.read_count
    }

    /// Returns data from the stream without advancing the stream position.
    ///
    /// At most one read call is made to fill the buffer; the returned slice
    /// may be shorter than requested. An empty slice at a nonzero request
    /// means EOF.
    pub fn peek(&mut self, amount: usize) -> Result<&[u8]> {
        self.fill_buf_impl(amount)?;

        let amount = amount.min(self.buf.len());

        Ok(&self.buf[0..amount])
    }

    /// Reads bytes into `buf` up to and including the next `byte`.
    ///
    /// Stops at EOF without error when the delimiter is missing. Fails with
    /// [ErrorKind::InvalidData] once `limit` bytes arrive without the
    /// delimiter. Returns the number of bytes appended to `buf`.
    pub fn read_until_bounded(
        &mut self,
        byte: u8,
        buf: &mut Vec<u8>,
        limit: u64,
    ) -> Result<usize> {
        let start = buf.len();

        loop {
            let taken = (buf.len() - start) as u64;
            let room = (limit - taken) as usize;
            let available = self.fill_buf()?;

            if available.is_empty() {
                break;
            }

            let window = &available[..available.len().min(room)];

            match window.iter().position(|&b| b == byte) {
                Some(index) => {
                    buf.extend_from_slice(&window[..=index]);
                    self.consume(index + 1);

                    return Ok(buf.len() - start);
                }
                None => {
                    let amount = window.len();
                    buf.extend_from_slice(window);
                    self.consume(amount);

                    if (buf.len() - start) as u64 >= limit {
                        return Err(Error::new(ErrorKind::InvalidData, "line too long"));
                    }
                }
            }
        }

        Ok(buf.len() - start)
    }

    /// Discards exactly `amount` bytes by bounded forward reads.
    pub fn skip(&mut self, amount: u64) -> Result<()> {
        let copied = std::io::copy(&mut Read::by_ref(self).take(amount), &mut std::io::sink())?;

        if copied != amount {
            return Err(ErrorKind::UnexpectedEof.into());
        }

        Ok(())
    }

    fn fill_buf_impl(&mut self, amount: usize) -> Result<()> {
        if self.buf.len() < amount {
            let offset = self.buf.len();
            self.buf.resize(offset + self.buf_len_threshold, 0);
            let amount = self.stream.read(&mut self.buf[offset..])?;
            self.buf.truncate(offset + amount);
        }

        Ok(())
    }

    fn shift_buf(&mut self, amount: usize) {
        self.buf.copy_within(amount.., 0);
        self.buf.truncate(self.buf.len() - amount);
    }
}

impl<R: SourceStream> TrackReader<R> {
    /// Moves the reader to an absolute position of the wrapped stream.
    ///
    /// The internal buffer is discarded and the consumed-byte count is reset
    /// to the target position.
    pub fn seek_to(&mut self, position: u64) -> Result<()> {
        self.stream.seek_to(position)?;
        self.buf.clear();
        self.read_count = position;

        Ok(())
    }
}

impl<R: Read> Read for TrackReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.buf.is_empty() {
            let amount = self.buf.len().min(buf.len());
            buf[0..amount].copy_from_slice(&self.buf[0..amount]);
            self.shift_buf(amount);

            self.read_count += amount as u64;

            Ok(amount)
        } else if buf.len() >= self.buf_len_threshold {
            debug_assert!(self.buf.is_empty());

            let amount = self.stream.read(buf)?;
            self.read_count += amount as u64;

            Ok(amount)
        } else {
            debug_assert!(self.buf.is_empty());

            self.fill_buf()?;
            let amount = buf.len().min(self.buf.len());
            buf[0..amount].copy_from_slice(&self.buf[0..amount]);
            self.consume(amount);

            Ok(amount)
        }
    }
}

impl<R: Read> BufRead for TrackReader<R> {
    fn fill_buf(&mut self) -> Result<&[u8]> {
        self.fill_buf_impl(self.buf_len_threshold)?;

        Ok(&self.buf)
    }

    fn consume(&mut self, amount: usize) {
        let amount = self.buf.len().min(amount);
        self.shift_buf(amount);

        self.read_count += amount as u64;
    }
}

/// Writer that counts bytes committed to the wrapped stream.
pub struct CountWrite<W: Write> {
    stream: W,
    write_count: u64,
}

impl<W: Write> CountWrite<W> {
    /// Creates a writer with the given stream.
    pub fn new(stream: W) -> Self {
        Self {
            stream,
            write_count: 0,
        }
    }

    /// Returns the number of bytes written to the wrapped stream.
    pub fn write_count(&self) -> u64 {
        self.write_count
    }

    /// Returns a reference to the wrapped stream.
    pub fn get_ref(&self) -> &W {
        &self.stream
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> W {
        self.stream
    }
}

impl<W: Write> Write for CountWrite<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let amount = self.stream.write(buf)?;
        self.write_count += amount as u64;
        Ok(amount)
    }

    fn flush(&mut self) -> Result<()> {
        self.stream.flush()
    }
}
