//! WARC file writing.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::Utc;

use crate::compress::{CompressionFormat, Compressor};
use crate::error::WarcError;
use crate::fields::{self, FieldMap};
use crate::io::CountWrite;
use crate::record::{self, names, RecordType};
use crate::uuid as uuidutil;
use crate::DEFAULT_VERSION;

/// Archive-wide configuration for a [WarcWriter].
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Enclose each record in its own gzip member.
    pub compress: bool,
    /// Software name reported in the warcinfo record.
    pub software_name: String,
    /// Software version reported in the warcinfo record.
    pub software_version: String,
    /// Extra fields for the warcinfo payload, in order.
    pub warc_meta: Vec<(String, String)>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            compress: false,
            software_name: env!("CARGO_PKG_NAME").to_string(),
            software_version: env!("CARGO_PKG_VERSION").to_string(),
            warc_meta: Vec::new(),
        }
    }
}

/// Writes a WARC file.
///
/// The first record written through this writer is a generated `warcinfo`
/// record; its ID is carried into every subsequent record of the session as
/// `WARC-Warcinfo-ID`. With compression enabled, every record (the warcinfo
/// too) is written as its own gzip member so that consuming software can
/// index and seek by member offsets.
///
/// Records are either written in one shot with [Self::write_record], or
/// declared with [Self::start_record] and filled with [Self::write_body].
/// The writer never emits a structurally invalid record: header validation
/// happens before any byte reaches the sink, and an overflowing body chunk
/// is rejected without being written.
pub struct WarcWriter<W: Write> {
    sink: Sink<W>,
    state: WriterState,
    config: WriterConfig,
    warcinfo_id: Option<uuid::Uuid>,
    base_position: u64,
}

impl<W: Write> WarcWriter<W> {
    /// Creates a writer with the given sink.
    pub fn new(stream: W, config: WriterConfig) -> Self {
        Self {
            sink: Sink::Idle(CountWrite::new(stream)),
            state: WriterState::Idle,
            config,
            warcinfo_id: None,
            base_position: 0,
        }
    }

    /// Returns the number of bytes committed to the sink.
    pub fn position(&self) -> u64 {
        let written = match &self.sink {
            Sink::Idle(stream) => stream.write_count(),
            Sink::Record(stream) => stream.get_ref().write_count(),
            Sink::Swapping => 0,
        };

        self.base_position + written
    }

    /// Returns the ID of the session's warcinfo record, once one was
    /// written.
    pub fn warcinfo_id(&self) -> Option<&uuid::Uuid> {
        self.warcinfo_id.as_ref()
    }

    /// Returns the wrapped sink.
    ///
    /// Panics if the writer is in the middle of writing a record.
    pub fn into_inner(self) -> W {
        match self.sink {
            Sink::Idle(stream) => stream.into_inner(),
            Sink::Record(_) | Sink::Swapping => panic!("record in progress"),
        }
    }

    /// Writes a complete record in one shot.
    ///
    /// Generates the mandatory headers, appends `extra` headers, and emits
    /// the header block, the payload, and the record trailer. Returns the
    /// generated record ID.
    pub fn write_record(
        &mut self,
        record_type: &str,
        payload: &[u8],
        extra: Option<&FieldMap>,
    ) -> Result<uuid::Uuid, WarcError> {
        self.check_idle()?;
        self.ensure_warcinfo()?;

        let record_id = uuidutil::new_v4();
        let header = self.render_header(record_type, &record_id, payload.len() as u64, None, extra)?;

        tracing::debug!(record_type, %record_id, length = payload.len(), "write record");

        self.begin_frame();
        self.frame_mut().write_all(&header)?;
        self.frame_mut().write_all(payload)?;
        self.frame_mut().write_all(b"\r\n\r\n")?;
        self.end_frame()?;

        Ok(record_id)
    }

    /// Starts a record whose body will arrive in chunks.
    ///
    /// Writes the header block with `Content-Length` set to `length`. The
    /// caller must then deliver exactly `length` body bytes through
    /// [Self::write_body]. Returns the generated record ID.
    pub fn start_record(
        &mut self,
        record_type: &str,
        length: u64,
        extra: Option<&FieldMap>,
    ) -> Result<uuid::Uuid, WarcError> {
        self.check_idle()?;
        self.ensure_warcinfo()?;

        let record_id = uuidutil::new_v4();
        let header = self.render_header(record_type, &record_id, length, None, extra)?;

        tracing::debug!(record_type, %record_id, length, "start record");

        self.begin_frame();
        self.frame_mut().write_all(&header)?;
        self.state = WriterState::InBody { remaining: length };

        Ok(record_id)
    }

    /// Appends body bytes to the record opened by [Self::start_record].
    ///
    /// Overflowing chunks are rejected with
    /// [WarcError::CurrentBlockOverflow] before any byte of the chunk is
    /// written. Empty chunks are no-ops. When the declared length is
    /// reached, the record trailer is written and the writer returns to
    /// idle.
    ///
    /// A non-empty chunk while no record is open is also rejected with
    /// [WarcError::CurrentBlockOverflow] (there is nothing to append to;
    /// the kind is kept for compatibility even though a dedicated kind
    /// would be cleaner).
    pub fn write_body(&mut self, chunk: &[u8]) -> Result<(), WarcError> {
        let remaining = match self.state {
            WriterState::Idle => 0,
            WriterState::InBody { remaining } => remaining,
        };

        if chunk.len() as u64 > remaining {
            return Err(WarcError::CurrentBlockOverflow {
                attempted: chunk.len() as u64,
                remaining,
            });
        }

        if self.state == WriterState::Idle {
            return Ok(());
        }

        self.frame_mut().write_all(chunk)?;

        let remaining = remaining - chunk.len() as u64;

        if remaining == 0 {
            tracing::debug!("end record");

            self.frame_mut().write_all(b"\r\n\r\n")?;
            self.end_frame()?;
            self.state = WriterState::Idle;
        } else {
            self.state = WriterState::InBody { remaining };
        }

        Ok(())
    }

    fn check_idle(&self) -> Result<(), WarcError> {
        match self.state {
            WriterState::Idle => Ok(()),
            WriterState::InBody { remaining } => {
                Err(WarcError::PreviousBlockNotTerminated { remaining })
            }
        }
    }

    /// Writes the warcinfo record once per session, before the first user
    /// record.
    fn ensure_warcinfo(&mut self) -> Result<(), WarcError> {
        if self.warcinfo_id.is_some() {
            return Ok(());
        }

        let mut info = FieldMap::new();
        info.append("format", DEFAULT_VERSION);
        info.append(
            "software",
            format!(
                "{}/{}",
                self.config.software_name, self.config.software_version
            ),
        );

        for (name, value) in &self.config.warc_meta {
            info.append(name.as_str(), value.as_str());
        }

        let mut payload = Vec::new();
        fields::format_fields(&info, &mut payload)?;

        let record_id = uuidutil::new_v4();
        let header = self.render_header(
            RecordType::Warcinfo.as_str(),
            &record_id,
            payload.len() as u64,
            Some("application/warc-fields"),
            None,
        )?;

        tracing::debug!(%record_id, "write warcinfo");

        self.begin_frame();
        self.frame_mut().write_all(&header)?;
        self.frame_mut().write_all(&payload)?;
        self.frame_mut().write_all(b"\r\n\r\n")?;
        self.end_frame()?;

        self.warcinfo_id = Some(record_id);

        Ok(())
    }

    /// Renders and validates the version line and header block.
    ///
    /// All header errors are raised here, before any byte reaches the sink.
    fn render_header(
        &self,
        record_type: &str,
        record_id: &uuid::Uuid,
        content_length: u64,
        content_type: Option<&str>,
        extra: Option<&FieldMap>,
    ) -> Result<Vec<u8>, WarcError> {
        let mut header = FieldMap::new();

        header.append(names::WARC_TYPE, record_type);
        header.append(names::WARC_DATE, record::format_date(Utc::now()));
        header.append(names::WARC_RECORD_ID, uuidutil::format_urn(record_id));

        if let Some(warcinfo_id) = &self.warcinfo_id {
            header.append(names::WARC_WARCINFO_ID, uuidutil::format_urn(warcinfo_id));
        }

        header.append(names::CONTENT_LENGTH, content_length.to_string());

        if let Some(content_type) = content_type {
            header.append(names::CONTENT_TYPE, content_type);
        }

        if let Some(extra) = extra {
            for pair in extra.iter() {
                let normalized = pair.name.normalized();
                let guarded = normalized.starts_with("warc-")
                    || normalized == "content-length"
                    || normalized == "content-type";

                if guarded && header.contains_key(normalized) {
                    return Err(WarcError::DuplicateHeader {
                        name: pair.name.text.clone(),
                    });
                }

                header.append(pair.name.clone(), pair.value.clone());
            }
        }

        let mut buf = Vec::new();
        buf.extend_from_slice(DEFAULT_VERSION.as_bytes());
        buf.extend_from_slice(b"\r\n");
        fields::format_fields(&header, &mut buf)?;
        buf.extend_from_slice(b"\r\n");

        Ok(buf)
    }

    fn begin_frame(&mut self) {
        let stream = match std::mem::replace(&mut self.sink, Sink::Swapping) {
            Sink::Idle(stream) => stream,
            Sink::Record(_) | Sink::Swapping => panic!("record frame already open"),
        };

        let format = if self.config.compress {
            CompressionFormat::Gzip
        } else {
            CompressionFormat::Raw
        };

        self.sink = Sink::Record(Compressor::new(stream, format));
    }

    fn end_frame(&mut self) -> Result<(), WarcError> {
        let compressor = match std::mem::replace(&mut self.sink, Sink::Swapping) {
            Sink::Record(compressor) => compressor,
            Sink::Idle(_) | Sink::Swapping => panic!("no record frame open"),
        };

        let mut stream = compressor.finish()?;
        stream.flush()?;
        self.sink = Sink::Idle(stream);

        Ok(())
    }

    fn frame_mut(&mut self) -> &mut Compressor<CountWrite<W>> {
        match &mut self.sink {
            Sink::Record(compressor) => compressor,
            Sink::Idle(_) | Sink::Swapping => panic!("no record frame open"),
        }
    }
}

impl WarcWriter<File> {
    /// Creates a writer over a file.
    ///
    /// With `truncate` the file is emptied before any bytes are written;
    /// otherwise records are appended and a new warcinfo segment begins.
    pub fn create<P: AsRef<Path>>(
        path: P,
        truncate: bool,
        config: WriterConfig,
    ) -> Result<Self, WarcError> {
        let file = if truncate {
            std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)?
        } else {
            std::fs::OpenOptions::new().append(true).create(true).open(path)?
        };

        let base_position = file.metadata()?.len();
        let mut writer = Self::new(file, config);
        writer.base_position = base_position;

        Ok(writer)
    }
}

enum Sink<W: Write> {
    Idle(CountWrite<W>),
    Record(Compressor<CountWrite<W>>),
    Swapping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Idle,
    InBody { remaining: u64 },
}
