use chrono::NaiveDateTime;

use crate::annotation::{to_ticks, Annotation, AnnotationList};
use crate::config::EncoderConfig;
use crate::error::{EdfError, Result};
use crate::header::{serialize_header, RecordCount, RECORD_COUNT_OFFSET};
use crate::record::RecordPacker;
use crate::signal::{SampleBatch, SignalTable};
use crate::sink::RecordSink;
use crate::{EDFLIB_TIME_DIMENSION, EDF_MAX_SIGNALS};

/// Lifecycle of an [`EncodingSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Header written, no data record yet
    Open,
    /// At least one data record written
    Writing,
    /// Finalized; the output is a complete file
    Closed,
    /// Failed or abandoned; the output was discarded
    Aborted,
}

/// Outcome of a successfully closed session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSummary {
    pub records: u64,
    /// Total output size, header included
    pub bytes: u64,
    /// Recording length covered by the data records
    pub duration_seconds: f64,
    /// Waveform samples filled in with `digital_min`
    pub padded_samples: u64,
    /// Annotations rendered into the annotation channel
    pub annotations_written: usize,
    /// Annotations that were accepted but are not in the file, because
    /// their record had no room or their onset lies after the last record
    pub annotations_dropped: usize,
}

/// One EDF file being written to one sink
///
/// Opening the session writes the header. Every call to
/// [`write_record`](Self::write_record) appends exactly one data record.
/// [`close`](Self::close) makes the header's record count match the
/// records actually written and flushes the sink.
///
/// If the record count never changes from what the header announced
/// (`EncoderConfig::planned_records`), no byte is rewritten; otherwise the
/// count field is patched once at close. Any failure, as well as dropping
/// a session that was not closed, discards the output through
/// [`RecordSink::discard`], so a caller never ends up with a partial file.
///
/// # Examples
///
/// ```rust
/// use vitaledf::{EncoderConfig, EncodingSession, MemorySink, SampleBatch, SignalDescriptor, SignalTable};
///
/// let table = SignalTable::builder()
///     .signal(SignalDescriptor::new("spo2", "%", 1).with_physical_range(0.0, 100.0).with_digital_range(0, 100))?
///     .build()?;
///
/// let mut session = EncodingSession::open(table, EncoderConfig::default(), MemorySink::new())?;
/// for value in [96.0, 0.0, 100.0] {
///     session.write_record(&[SampleBatch::Scalar(value)])?;
/// }
/// let summary = session.close()?;
/// assert_eq!(summary.records, 3);
///
/// let bytes = session.into_sink().unwrap().into_inner();
/// assert_eq!(&bytes[236..244], b"3       ");
/// assert_eq!(bytes.len(), 512 + 3 * 2);
/// # Ok::<(), vitaledf::EdfError>(())
/// ```
pub struct EncodingSession<S: RecordSink> {
    sink: Option<S>,
    config: EncoderConfig,
    packer: RecordPacker,
    annotations: AnnotationList,
    announced: RecordCount,
    record_duration: i64,
    records_written: u64,
    bytes_written: u64,
    state: SessionState,
}

impl<S: RecordSink> EncodingSession<S> {
    /// Validates the configuration and writes the header to `sink`
    ///
    /// # Errors
    ///
    /// * `EdfError::InvalidConfig` - the configuration cannot be encoded
    /// * `EdfError::TooManySignals` - the table plus the annotation channel
    ///   exceed the signal limit
    /// * `EdfError::SinkWrite` - writing the header failed
    ///
    /// On any error the sink has already been discarded.
    pub fn open(table: SignalTable, config: EncoderConfig, mut sink: S) -> Result<Self> {
        let total_signals = table.len() + usize::from(config.annotations);
        let checked = config.validate().and_then(|_| {
            if total_signals > EDF_MAX_SIGNALS {
                Err(EdfError::TooManySignals(total_signals))
            } else {
                Ok(())
            }
        });
        if let Err(e) = checked {
            discard_quietly(&mut sink);
            return Err(e);
        }

        let announced = match config.planned_records {
            Some(count) => RecordCount::Known(count),
            None => RecordCount::Unknown,
        };
        let header = serialize_header(&table, &config, announced);

        if let Err(e) = sink.write_all(&header) {
            discard_quietly(&mut sink);
            return Err(EdfError::SinkWrite(e));
        }

        log::debug!(
            "EDF session opened: {} signals, {} bytes per record, {}s per record",
            total_signals,
            table.record_bytes(),
            config.record_duration_seconds
        );

        Ok(EncodingSession {
            sink: Some(sink),
            packer: RecordPacker::new(table, config.annotations),
            annotations: AnnotationList::new(),
            announced,
            record_duration: to_ticks(config.record_duration_seconds),
            records_written: 0,
            bytes_written: header.len() as u64,
            state: SessionState::Open,
            config,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn table(&self) -> &SignalTable {
        self.packer.table()
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn start(&self) -> NaiveDateTime {
        self.config.start
    }

    fn ensure_writable(&self) -> Result<()> {
        match self.state {
            SessionState::Open | SessionState::Writing => Ok(()),
            SessionState::Closed | SessionState::Aborted => Err(EdfError::SessionClosed),
        }
    }

    /// Appends one data record: one batch per signal, in table order
    ///
    /// # Errors
    ///
    /// * `EdfError::SessionClosed` - the session was closed or aborted
    /// * `EdfError::RecordShape` - wrong number of batches
    /// * `EdfError::SinkWrite` - the sink failed
    ///
    /// Errors other than `SessionClosed` abort the session and discard
    /// the output, since a missing record would shift the time of every
    /// later one.
    pub fn write_record(&mut self, batches: &[SampleBatch]) -> Result<()> {
        self.ensure_writable()?;

        let tal = self
            .config
            .annotations
            .then(|| self.annotations.tal_for_record(self.records_written, self.record_duration));

        let record = match self.packer.pack(batches, tal.as_ref()) {
            Ok(record) => record,
            Err(e) => {
                self.abort_with(&e);
                return Err(e);
            }
        };

        let written = match self.sink.as_mut() {
            Some(sink) => sink.write_all(record).map(|_| record.len()),
            None => return Err(EdfError::SessionClosed),
        };

        match written {
            Ok(len) => {
                self.records_written += 1;
                self.bytes_written += len as u64;
                self.state = SessionState::Writing;
                Ok(())
            }
            Err(e) => {
                let e = EdfError::SinkWrite(e);
                self.abort_with(&e);
                Err(e)
            }
        }
    }

    /// Adds an event to the annotation channel
    ///
    /// The onset must fall into a data record that has not been written
    /// yet.
    ///
    /// # Errors
    ///
    /// * `EdfError::SessionClosed` - the session was closed or aborted
    /// * `EdfError::InvalidAnnotation` - annotations are disabled, the
    ///   annotation is malformed, or its record was already written
    pub fn add_annotation(&mut self, onset_seconds: f64, duration_seconds: Option<f64>, description: &str) -> Result<()> {
        self.ensure_writable()?;

        if !self.config.annotations {
            return Err(EdfError::InvalidAnnotation(
                "annotations are not enabled for this session".to_string(),
            ));
        }

        let annotation = Annotation::new(onset_seconds, duration_seconds, description)?;
        let written_until = self.records_written as i64 * self.record_duration;
        if annotation.onset < written_until {
            return Err(EdfError::InvalidAnnotation(format!(
                "onset {}s lies in an already written data record",
                onset_seconds
            )));
        }

        self.annotations.push(annotation);
        Ok(())
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations.len()
    }

    /// Finalizes the file
    ///
    /// Annotations whose onset lies after the last written record cannot
    /// be placed; each is logged and counted in
    /// [`SessionSummary::annotations_dropped`].
    ///
    /// # Errors
    ///
    /// * `EdfError::SessionClosed` - the session was already closed or
    ///   aborted
    /// * `EdfError::SinkWrite` - updating the record count or flushing
    ///   failed; the output has been discarded
    pub fn close(&mut self) -> Result<SessionSummary> {
        self.ensure_writable()?;

        let actual = RecordCount::Known(self.records_written);
        let result = match self.sink.as_mut() {
            Some(sink) => {
                let patched = if self.announced != actual {
                    log::debug!(
                        "header announced {:?} records, {} written; rewriting count",
                        self.announced,
                        self.records_written
                    );
                    sink.patch(RECORD_COUNT_OFFSET, &actual.field())
                } else {
                    Ok(())
                };
                patched.and_then(|_| sink.flush())
            }
            None => return Err(EdfError::SessionClosed),
        };

        if let Err(e) = result {
            let e = EdfError::SinkWrite(e);
            self.abort_with(&e);
            return Err(e);
        }

        self.state = SessionState::Closed;
        let mut unwritten = 0;
        for annotation in self.annotations.pending() {
            log::warn!(
                "annotation '{}' at {}s lies after the last data record, not written",
                annotation.description,
                annotation.onset_seconds()
            );
            unwritten += 1;
        }
        let summary = SessionSummary {
            records: self.records_written,
            bytes: self.bytes_written,
            duration_seconds: (self.records_written as i64 * self.record_duration) as f64
                / EDFLIB_TIME_DIMENSION as f64,
            padded_samples: self.packer.padded_samples(),
            annotations_written: self.annotations.written(),
            annotations_dropped: self.annotations.dropped() + unwritten,
        };
        log::info!(
            "EDF session closed: {} records, {} bytes, {:.1}s",
            summary.records,
            summary.bytes,
            summary.duration_seconds
        );
        Ok(summary)
    }

    /// Abandons the session and discards its output
    ///
    /// # Errors
    ///
    /// * `EdfError::SessionClosed` - the session was already closed or
    ///   aborted
    /// * `EdfError::SinkWrite` - the sink could not discard its output
    pub fn abort(&mut self) -> Result<()> {
        self.ensure_writable()?;
        self.state = SessionState::Aborted;
        match self.sink.as_mut() {
            Some(sink) => sink.discard().map_err(EdfError::SinkWrite),
            None => Ok(()),
        }
    }

    fn abort_with(&mut self, cause: &EdfError) {
        log::warn!(
            "EDF session aborted after {} records: {}",
            self.records_written,
            cause
        );
        self.state = SessionState::Aborted;
        if let Some(sink) = self.sink.as_mut() {
            discard_quietly(sink);
        }
    }

    /// Hands back the sink of a closed session
    ///
    /// Returns `None` unless the session was closed successfully; an
    /// unfinished session is discarded instead.
    pub fn into_sink(mut self) -> Option<S> {
        if self.state == SessionState::Closed {
            self.sink.take()
        } else {
            None
        }
    }
}

impl<S: RecordSink> Drop for EncodingSession<S> {
    fn drop(&mut self) {
        if matches!(self.state, SessionState::Open | SessionState::Writing) {
            log::warn!(
                "EDF session dropped without close after {} records, discarding output",
                self.records_written
            );
            self.state = SessionState::Aborted;
            if let Some(sink) = self.sink.as_mut() {
                discard_quietly(sink);
            }
        }
    }
}

fn discard_quietly<S: RecordSink>(sink: &mut S) {
    if let Err(e) = sink.discard() {
        log::error!("failed to discard partial EDF output: {}", e);
    }
}
