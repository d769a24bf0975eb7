//! Compression and decompression streams.
//!
//! WARC archives compress each record as an independent gzip member so that
//! consuming software can index and seek by member offsets. The write side
//! therefore opens a fresh encoder per record and finishes it at the record
//! trailer; the read side decodes one member at a time with exact raw-byte
//! accounting.

use std::io::{Read, Result, Write};

use flate2::bufread::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression as GzCompression;

use crate::io::TrackReader;

/// Specifies a compression format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Apply no codec. Pass data through as is.
    Raw,
    /// Gzip file format, one member per record.
    Gzip,
}

enum Encoder<W: Write> {
    Raw(W),
    Gzip(GzEncoder<W>),
}

/// Compression of a single record frame.
pub struct Compressor<W: Write> {
    encoder: Encoder<W>,
}

impl<W: Write> Compressor<W> {
    /// Creates a compressor with the given stream and format.
    pub fn new(stream: W, format: CompressionFormat) -> Self {
        let encoder = match format {
            CompressionFormat::Raw => Encoder::Raw(stream),
            CompressionFormat::Gzip => {
                Encoder::Gzip(GzEncoder::new(stream, GzCompression::default()))
            }
        };

        Self { encoder }
    }

    /// Returns a reference to the wrapped stream.
    pub fn get_ref(&self) -> &W {
        match &self.encoder {
            Encoder::Raw(stream) => stream,
            Encoder::Gzip(stream) => stream.get_ref(),
        }
    }

    /// Completes the compression frame and returns the wrapped stream.
    pub fn finish(self) -> Result<W> {
        match self.encoder {
            Encoder::Raw(stream) => Ok(stream),
            Encoder::Gzip(stream) => stream.finish(),
        }
    }
}

impl<W: Write> Write for Compressor<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match &mut self.encoder {
            Encoder::Raw(stream) => stream.write(buf),
            Encoder::Gzip(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match &mut self.encoder {
            Encoder::Raw(stream) => stream.flush(),
            Encoder::Gzip(stream) => stream.flush(),
        }
    }
}

/// Decoder for a single gzip member.
///
/// Reading stops at the end of the member. Because decompression consumes
/// from the buffered raw stream, the raw stream is positioned exactly past
/// the member once the decoder reports end of stream, which keeps member
/// boundary offsets exact.
pub struct MemberDecoder<S: Read> {
    decoder: GzDecoder<TrackReader<S>>,
    decoded_count: u64,
}

impl<S: Read> MemberDecoder<S> {
    /// Creates a decoder positioned at the start of a gzip member.
    pub fn new(stream: TrackReader<S>) -> Self {
        Self {
            decoder: GzDecoder::new(stream),
            decoded_count: 0,
        }
    }

    /// Returns the number of decoded bytes read from this member.
    pub fn decoded_count(&self) -> u64 {
        self.decoded_count
    }

    /// Returns a reference to the wrapped raw stream.
    pub fn get_ref(&self) -> &TrackReader<S> {
        self.decoder.get_ref()
    }

    /// Returns a mutable reference to the wrapped raw stream.
    pub fn get_mut(&mut self) -> &mut TrackReader<S> {
        self.decoder.get_mut()
    }

    /// Returns the wrapped raw stream.
    pub fn into_inner(self) -> TrackReader<S> {
        self.decoder.into_inner()
    }
}

impl<S: Read> Read for MemberDecoder<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let amount = self.decoder.read(buf)?;
        self.decoded_count += amount as u64;
        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read, Write};

    use super::{CompressionFormat, Compressor, MemberDecoder};
    use crate::io::TrackReader;

    #[test]
    fn test_raw_roundtrip() {
        let mut compressor = Compressor::new(Vec::new(), CompressionFormat::Raw);
        compressor.write_all(b"hello").unwrap();
        let output = compressor.finish().unwrap();

        assert_eq!(output, b"hello");
    }

    #[test]
    fn test_gzip_members_concatenate() {
        let mut output = Vec::new();

        for payload in [b"first".as_slice(), b"second".as_slice()] {
            let mut compressor = Compressor::new(output, CompressionFormat::Gzip);
            compressor.write_all(payload).unwrap();
            output = compressor.finish().unwrap();
        }

        let mut raw = TrackReader::new(Cursor::new(output));

        let mut decoder = MemberDecoder::new(raw);
        let mut decoded = Vec::new();
        decoder.read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, b"first");
        assert_eq!(decoder.decoded_count(), 5);
        raw = decoder.into_inner();

        let second_member_offset = raw.read_count();
        assert!(second_member_offset > 0);

        let mut decoder = MemberDecoder::new(raw);
        let mut decoded = Vec::new();
        decoder.read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, b"second");
    }
}
