//! WARC file reading.

use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::rc::Rc;

use flate2::bufread::GzDecoder;

use crate::compress::MemberDecoder;
use crate::error::WarcError;
use crate::fields;
use crate::io::TrackReader;
use crate::record::{self, names, RecordHeader};
use crate::stream::{SeekStream, SourceStream};

const MAX_LINE_LENGTH: u64 = 32768;
const MAX_HEADER_LENGTH: u64 = 65536;

/// Reads a WARC file record by record.
///
/// The reader owns the source stream. Each returned [WarcRecord] carries a
/// lazy [RecordBody] sharing the reader's cursor: on a seekable source,
/// bodies of earlier records remain readable after the reader advances; on a
/// forward-only source, only the most recent body is live and stale handles
/// fail with [WarcError::NotSeekable].
pub struct WarcReader<S: SourceStream> {
    core: Rc<RefCell<ReaderCore<S>>>,
}

impl<S: SourceStream> WarcReader<S> {
    /// Creates a reader over the given source.
    ///
    /// When `compressed` is true the source is treated as a concatenation of
    /// gzip members, each holding one or more records.
    pub fn new(source: S, compressed: bool) -> Self {
        let seekable = source.is_seekable();
        let track = TrackReader::new(source);
        let frame = if compressed {
            Frame::GzipIdle(track)
        } else {
            Frame::Plain(track)
        };

        Self {
            core: Rc::new(RefCell::new(ReaderCore {
                frame,
                seekable,
                serial: 0,
                open_body: None,
                pushback: None,
            })),
        }
    }

    /// Returns the next record, or `None` at the end of the stream.
    ///
    /// An empty source is not an error; the first call returns `None`.
    pub fn next_record(&mut self) -> Result<Option<WarcRecord<S>>, WarcError> {
        let mut core = self.core.borrow_mut();

        let (header, locator) = match core.next_record()? {
            Some(parts) => parts,
            None => return Ok(None),
        };

        let length = header.content_length();
        let cursor = Rc::new(Cell::new(0));
        let serial = core.serial;

        core.open_body = Some(OpenBody {
            length,
            cursor: Rc::clone(&cursor),
            locator,
        });

        drop(core);

        Ok(Some(WarcRecord {
            header,
            body: RecordBody {
                core: Rc::clone(&self.core),
                serial,
                length,
                cursor,
                locator,
            },
        }))
    }
}

impl WarcReader<SeekStream<File>> {
    /// Opens a WARC file at the given path.
    pub fn open<P: AsRef<Path>>(path: P, compressed: bool) -> Result<Self, WarcError> {
        let file = File::open(path)?;

        Ok(Self::new(SeekStream::new(file), compressed))
    }
}

impl<S: SourceStream> Iterator for WarcReader<S> {
    type Item = Result<WarcRecord<S>, WarcError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// A decoded record: eagerly parsed header and lazy body.
pub struct WarcRecord<S: SourceStream> {
    header: RecordHeader,
    body: RecordBody<S>,
}

impl<S: SourceStream> WarcRecord<S> {
    /// Returns the record header.
    pub fn header(&self) -> &RecordHeader {
        &self.header
    }

    /// Returns the record body.
    pub fn body(&mut self) -> &mut RecordBody<S> {
        &mut self.body
    }

    /// Splits the record into header and body.
    pub fn into_parts(self) -> (RecordHeader, RecordBody<S>) {
        (self.header, self.body)
    }
}

/// Lazy stream over a single record's body bytes.
pub struct RecordBody<S: SourceStream> {
    core: Rc<RefCell<ReaderCore<S>>>,
    serial: u64,
    length: u64,
    cursor: Rc<Cell<u64>>,
    locator: BodyLocator,
}

impl<S: SourceStream> RecordBody<S> {
    /// Returns the body length declared by `Content-Length`.
    pub fn len(&self) -> u64 {
        self.length
    }

    /// Returns whether the body is empty.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns the number of body bytes not yet read through this handle.
    pub fn remaining(&self) -> u64 {
        self.length - self.cursor.get()
    }

    /// Reads body bytes into `buf`.
    ///
    /// The buffer is filled completely unless the end of the body is
    /// reached. Returns the number of bytes read; 0 means end of body.
    ///
    /// Fails with [WarcError::NotSeekable] when this handle is stale and the
    /// source cannot seek.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, WarcError> {
        let mut filled = 0;

        while filled < buf.len() {
            let amount = self.core.borrow_mut().read_body(
                self.serial,
                self.length,
                &self.cursor,
                self.locator,
                &mut buf[filled..],
            )?;

            if amount == 0 {
                break;
            }

            filled += amount;
        }

        Ok(filled)
    }

    /// Reads the rest of the body.
    pub fn read_all(&mut self) -> Result<Vec<u8>, WarcError> {
        let mut buf = vec![0u8; self.remaining() as usize];
        let amount = self.read(&mut buf)?;
        buf.truncate(amount);

        Ok(buf)
    }

    /// Reads one `\r\n`-terminated line into `buf`.
    ///
    /// The terminator is included. The last line of a body is not
    /// necessarily terminated. Returns the number of bytes read; 0 means
    /// end of body.
    pub fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<usize, WarcError> {
        buf.clear();

        let mut byte = [0u8; 1];

        loop {
            let amount = self.read(&mut byte)?;

            if amount == 0 {
                break;
            }

            buf.push(byte[0]);

            if byte[0] == b'\n' {
                break;
            }
        }

        Ok(buf.len())
    }
}

impl<S: SourceStream> Read for RecordBody<S> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        RecordBody::read(self, buf).map_err(|error| match error {
            WarcError::Io(error) => error,
            other => std::io::Error::new(std::io::ErrorKind::Other, other),
        })
    }
}

struct OpenBody {
    length: u64,
    cursor: Rc<Cell<u64>>,
    locator: BodyLocator,
}

#[derive(Debug, Clone, Copy)]
enum BodyLocator {
    /// Absolute offset of the body in the uncompressed stream.
    Plain { offset: u64 },
    /// Raw offset of the gzip member plus the decoded offset of the body
    /// within that member.
    Gzip {
        member_offset: u64,
        decoded_offset: u64,
    },
}

enum Frame<S: SourceStream> {
    Plain(TrackReader<S>),
    GzipIdle(TrackReader<S>),
    GzipMember {
        decoder: MemberDecoder<S>,
        member_offset: u64,
    },
    Swapping,
}

struct ReaderCore<S: SourceStream> {
    frame: Frame<S>,
    seekable: bool,
    serial: u64,
    open_body: Option<OpenBody>,
    pushback: Option<u8>,
}

impl<S: SourceStream> ReaderCore<S> {
    fn next_record(&mut self) -> Result<Option<(RecordHeader, BodyLocator)>, WarcError> {
        self.finish_open_body()?;

        let mut line = Vec::new();

        let record_offset = loop {
            if !self.prepare_frame()? {
                return Ok(None);
            }

            let offset = match &self.frame {
                Frame::Plain(track) => track.read_count(),
                Frame::GzipMember { member_offset, .. } => *member_offset,
                Frame::GzipIdle(_) | Frame::Swapping => unreachable!(),
            };

            let amount = self.read_line(&mut line, MAX_LINE_LENGTH)?;

            if amount > 0 {
                break offset;
            }

            // An exhausted or empty member; move on to the next one.
            match std::mem::replace(&mut self.frame, Frame::Swapping) {
                Frame::GzipMember { decoder, .. } => {
                    self.frame = Frame::GzipIdle(decoder.into_inner());
                }
                other => {
                    self.frame = other;
                    return Ok(None);
                }
            }
        };

        tracing::debug!(offset = self.offset_hint(), "begin record");

        let version = record::parse_version(&line)
            .map_err(|error| WarcError::invalid(self.offset_hint(), error))?;

        let header_block = self.read_header_block()?;
        let header_fields = fields::parse_fields(&header_block)
            .map_err(|error| WarcError::invalid(self.offset_hint(), error))?;

        let content_length = match header_fields.get(names::CONTENT_LENGTH) {
            Some(value) if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) => value
                .parse::<u64>()
                .map_err(|error| WarcError::invalid(self.offset_hint(), error))?,
            Some(_) => {
                return Err(WarcError::invalid(
                    self.offset_hint(),
                    "non-numeric Content-Length",
                ))
            }
            None => {
                return Err(WarcError::invalid(
                    self.offset_hint(),
                    "missing Content-Length",
                ))
            }
        };

        self.serial += 1;

        let locator = match &self.frame {
            Frame::Plain(track) => BodyLocator::Plain {
                offset: track.read_count(),
            },
            Frame::GzipMember {
                decoder,
                member_offset,
            } => BodyLocator::Gzip {
                member_offset: *member_offset,
                decoded_offset: decoder.decoded_count(),
            },
            Frame::GzipIdle(_) | Frame::Swapping => unreachable!(),
        };

        tracing::debug!(?locator, content_length, "record body located");

        Ok(Some((
            RecordHeader::new(version, header_fields, content_length, record_offset),
            locator,
        )))
    }

    /// Makes the frame readable for the next record.
    ///
    /// Returns false at the end of the stream.
    fn prepare_frame(&mut self) -> Result<bool, WarcError> {
        match &mut self.frame {
            Frame::Plain(track) => Ok(!track.peek(1)?.is_empty()),
            Frame::GzipMember { .. } => Ok(true),
            Frame::GzipIdle(_) => {
                let mut track = match std::mem::replace(&mut self.frame, Frame::Swapping) {
                    Frame::GzipIdle(track) => track,
                    _ => unreachable!(),
                };

                let at_end = match track.peek(1) {
                    Ok(buffer) => buffer.is_empty(),
                    Err(error) => {
                        self.frame = Frame::GzipIdle(track);
                        return Err(error.into());
                    }
                };

                if at_end {
                    self.frame = Frame::GzipIdle(track);
                    return Ok(false);
                }

                let member_offset = track.read_count();
                tracing::debug!(member_offset, "open member");

                self.frame = Frame::GzipMember {
                    decoder: MemberDecoder::new(track),
                    member_offset,
                };

                Ok(true)
            }
            Frame::Swapping => unreachable!(),
        }
    }

    /// Drains the most recent body, verifies the record trailer, and closes
    /// an exhausted member.
    fn finish_open_body(&mut self) -> Result<(), WarcError> {
        let open = match self.open_body.take() {
            Some(open) => open,
            None => return Ok(()),
        };

        let rest = open.length - open.cursor.get();
        let seekable = self.seekable;
        tracing::debug!(rest, "finish body");

        let sought = match (&mut self.frame, open.locator) {
            (Frame::Plain(track), BodyLocator::Plain { offset }) if seekable => {
                track.seek_to(offset + open.length)?;
                true
            }
            _ => false,
        };

        if !sought {
            self.skip_decoded(rest)?;
        }

        let mut trailer = [0u8; 4];
        self.read_exact_decoded(&mut trailer)?;

        if &trailer != b"\r\n\r\n" {
            return Err(WarcError::invalid(
                self.offset_hint(),
                "malformed record trailer",
            ));
        }

        if matches!(self.frame, Frame::GzipMember { .. }) {
            // Probe whether the member holds another record.
            let mut probe = [0u8; 1];
            let result = self.read_decoded(&mut probe);
            let amount = result.map_err(|error| self.map_io(error))?;

            if amount == 0 {
                match std::mem::replace(&mut self.frame, Frame::Swapping) {
                    Frame::GzipMember { decoder, .. } => {
                        self.frame = Frame::GzipIdle(decoder.into_inner());
                    }
                    _ => unreachable!(),
                }
            } else {
                self.pushback = Some(probe[0]);
            }
        }

        Ok(())
    }

    fn read_header_block(&mut self) -> Result<Vec<u8>, WarcError> {
        let mut block = Vec::new();
        let mut line = Vec::new();

        loop {
            let amount = self.read_line(&mut line, MAX_LINE_LENGTH)?;

            if amount == 0 {
                return Err(WarcError::invalid(
                    self.offset_hint(),
                    "header block not terminated",
                ));
            }

            if line == b"\r\n" {
                break;
            }

            block.extend_from_slice(&line);

            if block.len() as u64 > MAX_HEADER_LENGTH {
                return Err(WarcError::invalid(self.offset_hint(), "header too long"));
            }
        }

        Ok(block)
    }

    /// Reads one line, up to and including the next `\n`, from the decoded
    /// stream.
    fn read_line(&mut self, buf: &mut Vec<u8>, limit: u64) -> Result<usize, WarcError> {
        buf.clear();

        if let Some(byte) = self.pushback.take() {
            buf.push(byte);

            if byte == b'\n' {
                return Ok(1);
            }
        }

        match &mut self.frame {
            Frame::Plain(track) => {
                let offset = track.read_count();
                track
                    .read_until_bounded(b'\n', buf, limit)
                    .map_err(|error| self_map_io(offset, error))?;
            }
            Frame::GzipMember { decoder, .. } => {
                let mut byte = [0u8; 1];

                loop {
                    if buf.len() as u64 >= limit {
                        return Err(WarcError::invalid(
                            decoder.get_ref().read_count(),
                            "line too long",
                        ));
                    }

                    let amount = match decoder.read(&mut byte) {
                        Ok(amount) => amount,
                        Err(error) => {
                            return Err(self_map_io(decoder.get_ref().read_count(), error))
                        }
                    };

                    if amount == 0 {
                        break;
                    }

                    buf.push(byte[0]);

                    if byte[0] == b'\n' {
                        break;
                    }
                }
            }
            Frame::GzipIdle(_) | Frame::Swapping => {}
        }

        Ok(buf.len())
    }

    fn read_decoded(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if let Some(byte) = self.pushback.take() {
            buf[0] = byte;
            return Ok(1);
        }

        match &mut self.frame {
            Frame::Plain(track) => track.read(buf),
            Frame::GzipMember { decoder, .. } => decoder.read(buf),
            Frame::GzipIdle(_) | Frame::Swapping => Ok(0),
        }
    }

    fn read_exact_decoded(&mut self, buf: &mut [u8]) -> Result<(), WarcError> {
        let mut filled = 0;

        while filled < buf.len() {
            let result = self.read_decoded(&mut buf[filled..]);
            let amount = result.map_err(|error| self.map_io(error))?;

            if amount == 0 {
                return Err(WarcError::invalid(
                    self.offset_hint(),
                    "unexpected end of record",
                ));
            }

            filled += amount;
        }

        Ok(())
    }

    fn skip_decoded(&mut self, mut amount: u64) -> Result<(), WarcError> {
        let mut scratch = [0u8; 8192];

        while amount > 0 {
            let want = amount.min(scratch.len() as u64) as usize;
            let result = self.read_decoded(&mut scratch[..want]);
            let read = result.map_err(|error| self.map_io(error))?;

            if read == 0 {
                return Err(WarcError::invalid(
                    self.offset_hint(),
                    "unexpected end of record",
                ));
            }

            amount -= read as u64;
        }

        Ok(())
    }

    /// Reads body bytes on behalf of a [RecordBody] handle.
    fn read_body(
        &mut self,
        serial: u64,
        length: u64,
        cursor: &Cell<u64>,
        locator: BodyLocator,
        buf: &mut [u8],
    ) -> Result<usize, WarcError> {
        let position = cursor.get();
        let remaining = length - position;

        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let want = (buf.len() as u64).min(remaining) as usize;

        // The handle is live only while it is the reader's current body;
        // advancing the reader (even to EOF) drains and detaches it.
        let live = serial == self.serial && self.open_body.is_some();

        let amount = if live {
            let result = self.read_decoded(&mut buf[..want]);
            result.map_err(|error| self.map_io(error))?
        } else if !self.seekable {
            return Err(WarcError::NotSeekable);
        } else {
            self.read_detached(position, locator, &mut buf[..want])?
        };

        cursor.set(position + amount as u64);

        Ok(amount)
    }

    /// Re-reads a saved body position without disturbing the reader cursor.
    ///
    /// The raw stream position is restored afterwards, so the live frame's
    /// buffers stay valid.
    fn read_detached(
        &mut self,
        position: u64,
        locator: BodyLocator,
        buf: &mut [u8],
    ) -> Result<usize, WarcError> {
        let raw = match &mut self.frame {
            Frame::Plain(track) => track.get_mut(),
            Frame::GzipIdle(track) => track.get_mut(),
            Frame::GzipMember { decoder, .. } => decoder.get_mut().get_mut(),
            Frame::Swapping => unreachable!(),
        };

        let saved = raw.stream_position()?;

        let result = match locator {
            BodyLocator::Plain { offset } => read_detached_plain(raw, offset + position, buf),
            BodyLocator::Gzip {
                member_offset,
                decoded_offset,
            } => read_detached_member(raw, member_offset, decoded_offset + position, buf),
        };

        raw.seek_to(saved)?;

        result
    }

    fn offset_hint(&self) -> u64 {
        match &self.frame {
            Frame::Plain(track) => track.read_count(),
            Frame::GzipIdle(track) => track.read_count(),
            Frame::GzipMember { decoder, .. } => decoder.get_ref().read_count(),
            Frame::Swapping => 0,
        }
    }

    fn map_io(&self, error: std::io::Error) -> WarcError {
        self_map_io(self.offset_hint(), error)
    }
}

fn self_map_io(offset: u64, error: std::io::Error) -> WarcError {
    match error.kind() {
        std::io::ErrorKind::InvalidData | std::io::ErrorKind::UnexpectedEof => {
            WarcError::invalid(offset, error)
        }
        _ => WarcError::Io(error),
    }
}

fn read_detached_plain<S: SourceStream>(
    raw: &mut S,
    start: u64,
    buf: &mut [u8],
) -> Result<usize, WarcError> {
    raw.seek_to(start)?;

    let mut filled = 0;

    while filled < buf.len() {
        let amount = raw.read(&mut buf[filled..])?;

        if amount == 0 {
            break;
        }

        filled += amount;
    }

    Ok(filled)
}

fn read_detached_member<S: SourceStream>(
    raw: &mut S,
    member_offset: u64,
    skip: u64,
    buf: &mut [u8],
) -> Result<usize, WarcError> {
    raw.seek_to(member_offset)?;

    let mut decoder = GzDecoder::new(BufReader::new(raw));

    let skipped = std::io::copy(
        &mut Read::by_ref(&mut decoder).take(skip),
        &mut std::io::sink(),
    )
    .map_err(|error| self_map_io(member_offset, error))?;

    if skipped != skip {
        return Err(WarcError::invalid(
            member_offset,
            "record body missing from member",
        ));
    }

    let mut filled = 0;

    while filled < buf.len() {
        let amount = decoder
            .read(&mut buf[filled..])
            .map_err(|error| self_map_io(member_offset, error))?;

        if amount == 0 {
            break;
        }

        filled += amount;
    }

    Ok(filled)
}
